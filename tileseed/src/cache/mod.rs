//! The concrete tile cache: a directory layout per level plus an upstream
//! map source rendering meta tiles.

mod dir_cache;
pub use dir_cache::*;

mod source;
pub use source::*;
