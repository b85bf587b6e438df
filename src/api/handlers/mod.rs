pub mod model;
pub mod predict;

pub use model::*;
pub use predict::*;
