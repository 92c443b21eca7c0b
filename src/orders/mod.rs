pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod models;
pub mod repository;
pub mod status_machine;
pub mod stock;

pub use error::*;
pub use handlers::*;
pub use lifecycle::*;
pub use models::*;
pub use repository::*;
pub use status_machine::*;
pub use stock::*;
