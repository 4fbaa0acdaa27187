//! The capability a tile cache exposes to the seeding engine.
//!
//! The engine never touches tile bytes itself. It asks the cache to
//! materialize batches of coordinates and, during cleanup, for the directory
//! that holds a level. How tiles are rendered, locked and stored is the
//! cache's contract; the engine only needs the error classification below to
//! decide between retrying, skipping and giving up.

use crate::{TileCoord, TileGrid};
use async_trait::async_trait;
use std::fmt::{self, Display};
use std::path::PathBuf;
use std::time::SystemTime;

/// Why a batch of tiles could not be materialized.
#[derive(Debug)]
pub enum CacheError {
	/// The upstream service hiccupped; trying again later may succeed.
	SourceTransient(String),
	/// The upstream answer is wrong and will stay wrong (bad request,
	/// undecodable body). Retrying is pointless.
	SourceFatal(String),
	/// Reading or writing the cache failed.
	Io(std::io::Error),
}

impl CacheError {
	/// True for error classes that exponential backoff may recover from.
	pub fn is_recoverable(&self) -> bool {
		match self {
			CacheError::SourceTransient(_) | CacheError::Io(_) => true,
			CacheError::SourceFatal(_) => false,
		}
	}
}

impl Display for CacheError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CacheError::SourceTransient(msg) => write!(f, "tile source error (transient): {msg}"),
			CacheError::SourceFatal(msg) => write!(f, "tile source error: {msg}"),
			CacheError::Io(err) => write!(f, "cache I/O error: {err}"),
		}
	}
}

impl std::error::Error for CacheError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			CacheError::Io(err) => Some(err),
			_ => None,
		}
	}
}

impl From<std::io::Error> for CacheError {
	fn from(err: std::io::Error) -> Self {
		CacheError::Io(err)
	}
}

/// A tile cache the engine can seed and clean.
#[async_trait]
pub trait TileCache: Send + Sync {
	fn name(&self) -> &str;

	fn grid(&self) -> &TileGrid;

	/// The directory holding one level of cached tiles, or `None` when the
	/// cache has no filesystem layout to clean.
	fn level_location(&self, level: u8) -> Option<PathBuf>;

	/// Renders and persists the given tiles. Tiles that are already cached
	/// are kept, unless their mtime precedes `remove_before`, in which case
	/// they are rendered again. Safe for concurrent invocation.
	async fn load_tile_coords(&self, coords: &[TileCoord], remove_before: Option<SystemTime>) -> Result<(), CacheError>;
}
