//! The tile pyramid of one cache: an extent, a tile size in pixels and a
//! number of zoom levels.
//!
//! Level `l` halves the resolution of level `l + 1`; the number of columns is
//! always `2^l`, while the number of rows follows the aspect ratio of the
//! extent. The geodetic grid (2:1 extent) therefore has a single row up to
//! level 1 and `2^(l-1)` rows above that, and its level-0 world tile is
//! clipped to an effective 256x128 pixels. Rows are counted from the south
//! edge.
//!
//! # Examples
//!
//! ```
//! use tileseed_core::{TileCoord, TileGrid};
//!
//! let grid = TileGrid::geodetic(10);
//! assert_eq!(grid.level_dims(2).unwrap(), (4, 2));
//!
//! let bbox = grid.tile_bbox(&TileCoord::new(2, 2, 1).unwrap()).unwrap();
//! assert_eq!(bbox.as_tuple(), (0.0, 0.0, 90.0, 90.0));
//! ```

use crate::{Bounds, Srs, TileCoord};
use anyhow::{Result, ensure};
use std::fmt::Debug;

// Tolerance in tile units for bbox edges that sit exactly on a tile boundary.
const EDGE_TOLERANCE: f64 = 1e-9;

#[derive(Clone, PartialEq)]
pub struct TileGrid {
	srs: Srs,
	extent: Bounds,
	tile_size: (u32, u32),
	levels: u8,
}

impl TileGrid {
	pub fn new(srs: Srs, extent: Bounds, tile_size: (u32, u32), levels: u8) -> Result<TileGrid> {
		ensure!(levels >= 1 && levels <= 31, "levels ({levels}) must be in 1..=31");
		ensure!(tile_size.0 >= 1 && tile_size.1 >= 1, "tile size must not be zero");
		ensure!(extent.width() > 0.0 && extent.height() > 0.0, "grid extent must not be empty");
		Ok(TileGrid {
			srs,
			extent,
			tile_size,
			levels,
		})
	}

	/// The global EPSG:4326 grid with 256px tiles.
	pub fn geodetic(levels: u8) -> TileGrid {
		TileGrid {
			srs: Srs::WGS84,
			extent: Bounds {
				x_min: -180.0,
				y_min: -90.0,
				x_max: 180.0,
				y_max: 90.0,
			},
			tile_size: (256, 256),
			levels,
		}
	}

	/// The global EPSG:3857 grid with 256px tiles.
	pub fn web_mercator(levels: u8) -> TileGrid {
		let e = 20_037_508.342_789_244;
		TileGrid {
			srs: Srs::WEB_MERCATOR,
			extent: Bounds {
				x_min: -e,
				y_min: -e,
				x_max: e,
				y_max: e,
			},
			tile_size: (256, 256),
			levels,
		}
	}

	pub fn srs(&self) -> Srs {
		self.srs
	}

	pub fn extent(&self) -> &Bounds {
		&self.extent
	}

	pub fn tile_size(&self) -> (u32, u32) {
		self.tile_size
	}

	pub fn levels(&self) -> u8 {
		self.levels
	}

	/// Map units per pixel at `level`.
	pub fn resolution(&self, level: u8) -> Result<f64> {
		ensure!(level < self.levels, "level ({level}) must be < {}", self.levels);
		Ok(self.extent.width() / (self.tile_size.0 as f64 * 2f64.powi(level as i32)))
	}

	/// Number of columns and rows at `level`.
	pub fn level_dims(&self, level: u8) -> Result<(u32, u32)> {
		let res = self.resolution(level)?;
		let rows = self.extent.height() / (res * self.tile_size.1 as f64);
		Ok((2u32.pow(level as u32), (rows - EDGE_TOLERANCE).ceil().max(1.0) as u32))
	}

	/// The region covered by one tile, clipped to the grid extent.
	pub fn tile_bbox(&self, coord: &TileCoord) -> Result<Bounds> {
		let (nx, ny) = self.level_dims(coord.level)?;
		ensure!(
			coord.x < nx && coord.y < ny,
			"{coord:?} outside the {nx}x{ny} grid at level {}",
			coord.level
		);
		let res = self.resolution(coord.level)?;
		let tile_w = res * self.tile_size.0 as f64;
		let tile_h = res * self.tile_size.1 as f64;
		let x_min = self.extent.x_min + coord.x as f64 * tile_w;
		let y_min = self.extent.y_min + coord.y as f64 * tile_h;
		Bounds::new(
			x_min,
			y_min,
			(x_min + tile_w).min(self.extent.x_max),
			(y_min + tile_h).min(self.extent.y_max),
		)
	}

	/// The inclusive range `(x_min, y_min, x_max, y_max)` of tiles touched by
	/// `bounds` at `level`. Edges that only graze a tile boundary do not pull
	/// in the neighboring tile.
	pub fn tile_range(&self, bounds: &Bounds, level: u8) -> Result<(u32, u32, u32, u32)> {
		let (nx, ny) = self.level_dims(level)?;
		let clipped = bounds.intersected(&self.extent)?;
		let res = self.resolution(level)?;
		let tile_w = res * self.tile_size.0 as f64;
		let tile_h = res * self.tile_size.1 as f64;

		let range = |lo: f64, hi: f64, origin: f64, size: f64, count: u32| -> (u32, u32) {
			let first = ((lo - origin) / size + EDGE_TOLERANCE).floor().max(0.0) as u32;
			let last = ((hi - origin) / size - EDGE_TOLERANCE).floor().max(0.0) as u32;
			(first.min(count - 1), last.max(first).min(count - 1))
		};
		let (x_min, x_max) = range(clipped.x_min, clipped.x_max, self.extent.x_min, tile_w, nx);
		let (y_min, y_max) = range(clipped.y_min, clipped.y_max, self.extent.y_min, tile_h, ny);
		Ok((x_min, y_min, x_max, y_max))
	}
}

impl Debug for TileGrid {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TileGrid")
			.field("srs", &self.srs)
			.field("extent", &self.extent)
			.field("tile_size", &self.tile_size)
			.field("levels", &self.levels)
			.finish()
	}
}
