pub mod sample;
pub mod labels;
pub mod errors;

pub use sample::*;
pub use labels::*;
pub use errors::*;
