pub mod factory;
pub mod grouping;

pub use factory::*;
pub use grouping::*;
