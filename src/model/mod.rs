pub mod dataset;
pub mod filter;
pub mod genome;
pub mod release;
pub mod sequence;

pub use dataset::*;
pub use filter::*;
pub use genome::*;
pub use release::*;
pub use sequence::*;
