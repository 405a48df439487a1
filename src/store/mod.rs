pub mod mysql;
pub mod traits;

pub use mysql::*;
pub use traits::*;
