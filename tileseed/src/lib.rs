//! Pre-renders map tile caches over a bounding box and expires stale tiles.
//!
//! The engine lives in `tileseed_core`; this crate adds the concrete
//! directory cache, the HTTP map source, the YAML configuration documents and
//! the command-line front end.

pub mod cache;
pub mod config;
pub mod tools;
