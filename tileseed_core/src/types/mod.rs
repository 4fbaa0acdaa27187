//! Value types: tile coordinates, bounding rectangles and reference systems.

mod bounds;
pub use bounds::*;

mod srs;
pub use srs::*;

mod tile_coord;
pub use tile_coord::*;
