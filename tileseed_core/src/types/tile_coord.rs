//! This module defines the `TileCoord` structure, the address of a single tile
//! inside a tile pyramid: a column `x`, a row `y` and a zoom `level`. Rows are
//! counted from the south edge of the grid, so `y = 0` is the southernmost row.

use anyhow::{Result, ensure};
use std::fmt::{self, Debug};

#[derive(Eq, PartialEq, Clone, Hash, Copy)]
pub struct TileCoord {
	pub x: u32,
	pub y: u32,
	pub level: u8,
}

impl TileCoord {
	pub fn new(level: u8, x: u32, y: u32) -> Result<TileCoord> {
		ensure!(level <= 31, "tile level {level} out of range, the deepest pyramid level is 31");
		Ok(TileCoord { x, y, level })
	}

	pub fn as_tuple(&self) -> (u32, u32, u8) {
		(self.x, self.y, self.level)
	}
}

impl Debug for TileCoord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		// the level/column/row order tiles are addressed by everywhere else
		write!(f, "TileCoord({}/{}/{})", self.level, self.x, self.y)
	}
}

impl PartialOrd for TileCoord {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for TileCoord {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		self
			.level
			.cmp(&other.level)
			.then(self.y.cmp(&other.y))
			.then(self.x.cmp(&other.x))
	}
}
