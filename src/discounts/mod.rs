pub mod error;
pub mod handlers;
pub mod models;
pub mod projection;
pub mod repository;
pub mod scheduler;
pub mod service;

pub use error::*;
pub use handlers::*;
pub use models::*;
pub use projection::*;
pub use repository::*;
pub use scheduler::*;
pub use service::*;
