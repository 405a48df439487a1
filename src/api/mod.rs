pub mod handlers;
pub mod health;
pub mod service;

pub use handlers::*;
pub use health::*;
pub use service::*;
