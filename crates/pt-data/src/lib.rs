pub mod loaders;
pub mod split;

pub use loaders::*;
pub use split::*;
