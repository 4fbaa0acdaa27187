//! Core of the tileseed engine: grid geometry, the coverage-aware meta-tile
//! traversal, the bounded worker pool and cache cleanup, plus the capability
//! traits a concrete tile cache implements.

pub mod cache;
pub use cache::*;
pub mod grid;
pub use grid::*;
pub mod progress;
pub use progress::*;
pub mod seed;
pub use seed::*;
pub mod types;
pub use types::*;
