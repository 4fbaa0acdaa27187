//! Groups adjacent tiles into meta tiles that the upstream service renders as
//! a single image.
//!
//! A meta tile is an aligned `M x M` block of tiles, clamped to the grid, so
//! blocks at the east and north edges may be smaller than `M x M`. The
//! [`MetaGrid`] maps between regions and the meta tiles they touch.

use crate::{Bounds, TileCoord, TileGrid};
use anyhow::{Result, ensure};
use itertools::iproduct;
use std::fmt::Debug;

/// A clamped rectangle of tiles at one level, aligned to the meta raster.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetaTile {
	pub level: u8,
	x_min: u32,
	y_min: u32,
	width: u32,
	height: u32,
}

impl MetaTile {
	pub fn x_min(&self) -> u32 {
		self.x_min
	}

	pub fn y_min(&self) -> u32 {
		self.y_min
	}

	pub fn x_max(&self) -> u32 {
		self.x_min + self.width - 1
	}

	pub fn y_max(&self) -> u32 {
		self.y_min + self.height - 1
	}

	pub fn tile_count(&self) -> u32 {
		self.width * self.height
	}

	/// All member tiles, northernmost row first.
	pub fn coords(&self) -> impl Iterator<Item = TileCoord> + '_ {
		iproduct!((self.y_min..=self.y_max()).rev(), self.x_min..=self.x_max())
			.map(|(y, x)| TileCoord { x, y, level: self.level })
	}
}

impl Debug for MetaTile {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(
			f,
			"MetaTile({}, [{},{}] {}x{})",
			self.level, self.x_min, self.y_min, self.width, self.height
		)
	}
}

pub struct MetaGrid {
	grid: TileGrid,
	meta_size: (u32, u32),
}

impl MetaGrid {
	pub fn new(grid: TileGrid, meta_size: (u32, u32)) -> Result<MetaGrid> {
		ensure!(meta_size.0 >= 1 && meta_size.1 >= 1, "meta size must not be zero");
		Ok(MetaGrid { grid, meta_size })
	}

	pub fn grid(&self) -> &TileGrid {
		&self.grid
	}

	/// The aligned meta tile containing `coord`.
	pub fn meta_tile(&self, coord: &TileCoord) -> Result<MetaTile> {
		let (nx, ny) = self.grid.level_dims(coord.level)?;
		ensure!(coord.x < nx && coord.y < ny, "{coord:?} outside the grid");
		Ok(self.clamped(coord.level, coord.x / self.meta_size.0, coord.y / self.meta_size.1, (nx, ny)))
	}

	/// All meta tiles at `level` whose footprint is touched by `bounds`,
	/// northernmost row first, plus the union of their bboxes and the number
	/// of tiles `(nx, ny)` they span.
	pub fn affected_level_tiles(&self, bounds: &Bounds, level: u8) -> Result<(Bounds, (u32, u32), Vec<MetaTile>)> {
		let (x_min, y_min, x_max, y_max) = self.grid.tile_range(bounds, level)?;
		let dims = self.grid.level_dims(level)?;
		let (mw, mh) = self.meta_size;

		let meta_tiles: Vec<MetaTile> = iproduct!((y_min / mh..=y_max / mh).rev(), x_min / mw..=x_max / mw)
			.map(|(my, mx)| self.clamped(level, mx, my, dims))
			.collect();

		let first = &meta_tiles[0];
		let last = &meta_tiles[meta_tiles.len() - 1];
		let aligned = self.meta_bbox(first)?.extended(&self.meta_bbox(last)?);
		let span = (
			last.x_max() - (x_min / mw) * mw + 1,
			first.y_max() - (y_min / mh) * mh + 1,
		);
		Ok((aligned, span, meta_tiles))
	}

	/// The region covered by a meta tile, clipped to the grid extent.
	pub fn meta_bbox(&self, meta: &MetaTile) -> Result<Bounds> {
		let south_west = self.grid.tile_bbox(&TileCoord {
			x: meta.x_min,
			y: meta.y_min,
			level: meta.level,
		})?;
		let north_east = self.grid.tile_bbox(&TileCoord {
			x: meta.x_max(),
			y: meta.y_max(),
			level: meta.level,
		})?;
		Ok(south_west.extended(&north_east))
	}

	fn clamped(&self, level: u8, mx: u32, my: u32, (nx, ny): (u32, u32)) -> MetaTile {
		let x_min = mx * self.meta_size.0;
		let y_min = my * self.meta_size.1;
		MetaTile {
			level,
			x_min,
			y_min,
			width: self.meta_size.0.min(nx - x_min),
			height: self.meta_size.1.min(ny - y_min),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	fn meta_grid() -> MetaGrid {
		MetaGrid::new(TileGrid::geodetic(10), (4, 4)).unwrap()
	}

	fn world() -> Bounds {
		Bounds::new(-180.0, -90.0, 180.0, 90.0).unwrap()
	}

	#[test]
	fn one_meta_tile_covers_low_levels() {
		let grid = meta_grid();
		for level in 0..=2 {
			let (aligned, _, metas) = grid.affected_level_tiles(&world(), level).unwrap();
			assert_eq!(aligned.as_tuple(), (-180.0, -90.0, 180.0, 90.0));
			assert_eq!(metas.len(), 1, "level {level}");
			assert_eq!(grid.meta_bbox(&metas[0]).unwrap(), aligned);
		}
	}

	#[test]
	fn clamps_meta_tiles_at_the_grid_edge() {
		let grid = meta_grid();
		// level 3 is 8x4 tiles: two meta columns, the second row-clamped to 4x4
		let (aligned, span, metas) = grid.affected_level_tiles(&world(), 3).unwrap();
		assert_eq!(aligned.as_tuple(), (-180.0, -90.0, 180.0, 90.0));
		assert_eq!(span, (8, 4));
		assert_eq!(
			format!("{metas:?}"),
			"[MetaTile(3, [0,0] 4x4), MetaTile(3, [4,0] 4x4)]"
		);
		assert_eq!(metas[0].tile_count(), 16);
	}

	#[test]
	fn splits_into_meta_quadrants() {
		let grid = meta_grid();
		// level 4 is 16x8 tiles: 4x2 meta tiles, northernmost row first
		let (_, span, metas) = grid.affected_level_tiles(&world(), 4).unwrap();
		assert_eq!(span, (16, 8));
		assert_eq!(
			metas.iter().map(|m| (m.x_min(), m.y_min())).collect::<Vec<_>>(),
			vec![(0, 4), (4, 4), (8, 4), (12, 4), (0, 0), (4, 0), (8, 0), (12, 0)]
		);
	}

	#[test]
	fn affected_tiles_of_a_sub_box() {
		let grid = meta_grid();
		let north_west = Bounds::new(-180.0, 0.0, -90.0, 90.0).unwrap();
		let (aligned, span, metas) = grid.affected_level_tiles(&north_west, 4).unwrap();
		// tiles x 0..=3, y 4..=7 form exactly one meta tile
		assert_eq!(metas.len(), 1);
		assert_eq!((metas[0].x_min(), metas[0].y_min()), (0, 4));
		assert_eq!(span, (4, 4));
		assert_eq!(aligned.as_tuple(), (-180.0, 0.0, -90.0, 90.0));
	}

	#[test]
	fn meta_tile_of_a_coord() {
		let grid = meta_grid();
		let meta = grid.meta_tile(&TileCoord::new(4, 13, 6).unwrap()).unwrap();
		assert_eq!((meta.x_min(), meta.y_min(), meta.x_max(), meta.y_max()), (12, 4, 15, 7));
		assert!(grid.meta_tile(&TileCoord::new(4, 16, 0).unwrap()).is_err());
	}

	#[test]
	fn coords_iterate_north_to_south() {
		let grid = MetaGrid::new(TileGrid::geodetic(10), (2, 2)).unwrap();
		let meta = grid.meta_tile(&TileCoord::new(2, 0, 0).unwrap()).unwrap();
		let coords: Vec<(u32, u32)> = meta.coords().map(|c| (c.x, c.y)).collect();
		assert_eq!(coords, vec![(0, 1), (1, 1), (0, 0), (1, 0)]);
	}
}
