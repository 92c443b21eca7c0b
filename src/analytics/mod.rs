pub mod accumulator;
pub mod handlers;
pub mod models;
pub mod reports;

pub use accumulator::*;
pub use handlers::*;
pub use models::*;
pub use reports::*;
