pub mod clock;
pub mod error;
pub mod models;
pub mod services;

pub use clock::*;
pub use error::*;
pub use models::*;
pub use services::*;
