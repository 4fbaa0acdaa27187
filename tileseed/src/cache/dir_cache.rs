//! A tile cache persisting tiles as `<directory>/<level>/<x>/<y>.<ext>`.
//!
//! Loading a batch first drops every coordinate that is already cached and
//! fresh enough. The stale remainder is grouped by meta tile; each group is
//! rendered by the upstream source as one image, cut into tiles and written
//! out atomically. Concurrent workers never write the same file because a
//! meta tile belongs to exactly one batch.

use crate::cache::TileSource;
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tileseed_core::{CacheError, MetaGrid, MetaTile, TileCache, TileCoord, TileGrid};

pub struct DirCache {
	name: String,
	meta_grid: MetaGrid,
	directory: PathBuf,
	extension: String,
	format: ImageFormat,
	source: Arc<dyn TileSource>,
}

impl DirCache {
	pub fn new(
		name: &str,
		grid: TileGrid,
		meta_size: (u32, u32),
		directory: &Path,
		extension: &str,
		source: Arc<dyn TileSource>,
	) -> anyhow::Result<DirCache> {
		let format = ImageFormat::from_extension(extension)
			.ok_or_else(|| anyhow::anyhow!("unsupported tile format {extension:?}"))?;
		Ok(DirCache {
			name: name.to_string(),
			meta_grid: MetaGrid::new(grid, meta_size)?,
			directory: directory.to_path_buf(),
			extension: extension.to_string(),
			format,
			source,
		})
	}

	pub fn tile_location(&self, coord: &TileCoord) -> PathBuf {
		self
			.directory
			.join(coord.level.to_string())
			.join(coord.x.to_string())
			.join(format!("{}.{}", coord.y, self.extension))
	}

	fn is_current(&self, coord: &TileCoord, remove_before: Option<SystemTime>) -> bool {
		let Ok(metadata) = self.tile_location(coord).metadata() else {
			return false;
		};
		match remove_before {
			None => true,
			Some(cutoff) => metadata.modified().map(|mtime| mtime >= cutoff).unwrap_or(false),
		}
	}

	async fn render_meta(&self, meta: &MetaTile) -> Result<(), CacheError> {
		let grid = self.meta_grid.grid();
		let bbox = self.meta_grid.meta_bbox(meta).map_err(fatal)?;
		let resolution = grid.resolution(meta.level).map_err(fatal)?;
		let width = (bbox.width() / resolution).round() as u32;
		let height = (bbox.height() / resolution).round() as u32;

		let body = self.source.fetch_map(&bbox, (width, height), grid.srs()).await?;
		let map = image::load_from_memory(&body)
			.map_err(|error| CacheError::SourceFatal(format!("undecodable map image: {error}")))?;
		if map.width() != width || map.height() != height {
			return Err(CacheError::SourceFatal(format!(
				"expected a {width}x{height} image, got {}x{}",
				map.width(),
				map.height()
			)));
		}

		for coord in meta.coords() {
			let tile_bbox = grid.tile_bbox(&coord).map_err(fatal)?;
			// image rows start at the northern edge of the meta bbox
			let offset_x = ((tile_bbox.x_min - bbox.x_min) / resolution).round() as u32;
			let offset_y = ((bbox.y_max - tile_bbox.y_max) / resolution).round() as u32;
			let tile_width = (tile_bbox.width() / resolution).round() as u32;
			let tile_height = (tile_bbox.height() / resolution).round() as u32;
			let tile = map.crop_imm(offset_x, offset_y, tile_width, tile_height);
			self.store(&coord, &tile)?;
		}
		Ok(())
	}

	fn store(&self, coord: &TileCoord, tile: &DynamicImage) -> Result<(), CacheError> {
		let mut encoded = Cursor::new(Vec::new());
		tile
			.write_to(&mut encoded, self.format)
			.map_err(|error| CacheError::SourceFatal(format!("could not encode {coord:?}: {error}")))?;

		let path = self.tile_location(coord);
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)?;
		}
		let staging = path.with_extension("tmp");
		fs::write(&staging, encoded.get_ref())?;
		fs::rename(&staging, &path)?;
		Ok(())
	}
}

fn fatal(error: anyhow::Error) -> CacheError {
	CacheError::SourceFatal(format!("{error:#}"))
}

#[async_trait]
impl TileCache for DirCache {
	fn name(&self) -> &str {
		&self.name
	}

	fn grid(&self) -> &TileGrid {
		self.meta_grid.grid()
	}

	fn level_location(&self, level: u8) -> Option<PathBuf> {
		Some(self.directory.join(level.to_string()))
	}

	async fn load_tile_coords(&self, coords: &[TileCoord], remove_before: Option<SystemTime>) -> Result<(), CacheError> {
		let stale: Vec<&TileCoord> = coords.iter().filter(|c| !self.is_current(c, remove_before)).collect();
		if stale.is_empty() {
			return Ok(());
		}

		let mut metas: Vec<MetaTile> = Vec::new();
		for coord in stale {
			let meta = self.meta_grid.meta_tile(coord).map_err(fatal)?;
			if !metas.contains(&meta) {
				metas.push(meta);
			}
		}
		for meta in &metas {
			self.render_meta(meta).await?;
		}
		Ok(())
	}
}
