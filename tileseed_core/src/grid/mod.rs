//! Grid geometry: the tile pyramid, meta-tile grouping and the coverage
//! predicate the traversal descends with.

mod coverage;
pub use coverage::*;

mod meta_grid;
pub use meta_grid::*;

mod tile_grid;
pub use tile_grid::*;
