//! Binds a layer's caches to one seed request and runs the traversal against
//! each of them.

use crate::cache::TileCache;
use crate::grid::MetaGrid;
use crate::progress::ProgressSink;
use crate::seed::backoff::BackoffPolicy;
use crate::seed::cleanup::{CleanupTask, cleanup_cache};
use crate::seed::pool::{PoolOptions, SeedPool};
use crate::seed::traversal::Traversal;
use crate::types::{Bounds, Srs};
use anyhow::{Context, Result, ensure};
use std::sync::Arc;
use std::time::SystemTime;

/// A source of a view layer; only sources backed by a cache are seedable.
pub struct Source {
	pub cache: Option<Arc<dyn TileCache>>,
}

/// The layer shapes a seed task can point at.
pub enum Layer {
	/// A plain layer with its own cache.
	Leaf(Arc<dyn TileCache>),
	/// A layer combining several sources, not all of them cached.
	View(Vec<Source>),
	/// A group of layers.
	Multi(Vec<Layer>),
}

impl Layer {
	/// Every cache reachable from this layer, in declaration order.
	pub fn caches(&self) -> Vec<Arc<dyn TileCache>> {
		match self {
			Layer::Leaf(cache) => vec![cache.clone()],
			Layer::View(sources) => sources.iter().filter_map(|s| s.cache.clone()).collect(),
			Layer::Multi(layers) => layers.iter().flat_map(|l| l.caches()).collect(),
		}
	}
}

#[derive(Debug, Clone)]
pub struct SeederOptions {
	/// Worker tasks per cache.
	pub workers: usize,
	/// Capacity of the work queue.
	pub queue_size: usize,
	/// Tiles per meta tile along x and y.
	pub meta_size: (u32, u32),
	pub dry_run: bool,
	pub backoff: BackoffPolicy,
}

impl Default for SeederOptions {
	fn default() -> Self {
		SeederOptions {
			workers: 2,
			queue_size: 16,
			meta_size: (4, 4),
			dry_run: false,
			backoff: BackoffPolicy::default(),
		}
	}
}

pub struct TileSeeder {
	caches: Vec<Arc<dyn TileCache>>,
	remove_before: Option<SystemTime>,
	progress: Arc<dyn ProgressSink>,
	options: SeederOptions,
}

impl TileSeeder {
	pub fn new(
		layer: &Layer,
		remove_before: Option<SystemTime>,
		progress: Arc<dyn ProgressSink>,
		options: SeederOptions,
	) -> Result<TileSeeder> {
		let caches = layer.caches();
		ensure!(!caches.is_empty(), "layer has no seedable caches");
		Ok(TileSeeder {
			caches,
			remove_before,
			progress,
			options,
		})
	}

	/// Seeds `bbox` over the inclusive level range into every bound cache.
	///
	/// Caches whose grid CRS is not listed in `cache_srs` are skipped (an
	/// empty filter matches everything). The bbox is reprojected into each
	/// cache's CRS when they differ; without a `bbox_srs` it is taken to be
	/// in the cache's CRS already. Caches run one after the other, each with
	/// its own worker pool.
	pub async fn seed_location(
		&self,
		bbox: Bounds,
		bbox_srs: Option<Srs>,
		levels: (u8, u8),
		cache_srs: &[Srs],
	) -> Result<()> {
		for cache in &self.caches {
			let grid = cache.grid();
			if !cache_srs.is_empty() && !cache_srs.contains(&grid.srs()) {
				continue;
			}

			let target = match bbox_srs {
				None => bbox,
				Some(srs) if srs == grid.srs() => bbox,
				Some(srs) => srs
					.transform_bbox_to(grid.srs(), &bbox)
					.with_context(|| format!("cannot seed {} from a {srs} bbox", cache.name()))?,
			};
			log::info!(
				"seeding {:?} levels {}..={} of cache {}",
				target,
				levels.0,
				levels.1,
				cache.name()
			);

			let meta_grid = MetaGrid::new(grid.clone(), self.options.meta_size)?;
			let traversal = Traversal::new(meta_grid, target, levels)
				.with_context(|| format!("cannot seed cache {}", cache.name()))?;
			let mut pool = SeedPool::new(
				cache.clone(),
				self.progress.clone(),
				PoolOptions {
					size: self.options.workers,
					queue_size: self.options.queue_size,
					dry_run: self.options.dry_run,
					remove_before: self.remove_before,
					backoff: self.options.backoff.clone(),
				},
			);
			let outcome = traversal.run(&mut pool, self.progress.as_ref()).await;
			let stopped = pool.stop().await;
			outcome?;
			stopped?;
		}
		Ok(())
	}

	/// Ages out every bound cache using the seeder's `remove_before` cutoff.
	/// Does nothing when no cutoff is configured.
	pub fn cleanup(&self) -> Result<()> {
		let Some(cutoff) = self.remove_before else {
			return Ok(());
		};
		let task = CleanupTask::remove_before(cutoff);
		for cache in &self.caches {
			cleanup_cache(cache.as_ref(), &task, self.options.dry_run, self.progress.as_ref())?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cache::CacheError;
	use crate::progress::NullProgress;
	use crate::types::TileCoord;
	use crate::TileGrid;
	use async_trait::async_trait;
	use std::path::PathBuf;
	use std::sync::Mutex;

	struct RecordingCache {
		name: String,
		grid: TileGrid,
		loaded: Mutex<Vec<TileCoord>>,
	}

	impl RecordingCache {
		fn new(name: &str, grid: TileGrid) -> Arc<RecordingCache> {
			Arc::new(RecordingCache {
				name: name.to_string(),
				grid,
				loaded: Mutex::new(vec![]),
			})
		}

		fn loaded(&self) -> Vec<TileCoord> {
			let mut coords = self.loaded.lock().unwrap().clone();
			coords.sort();
			coords.dedup();
			coords
		}
	}

	#[async_trait]
	impl TileCache for RecordingCache {
		fn name(&self) -> &str {
			&self.name
		}
		fn grid(&self) -> &TileGrid {
			&self.grid
		}
		fn level_location(&self, _level: u8) -> Option<PathBuf> {
			None
		}
		async fn load_tile_coords(
			&self,
			coords: &[TileCoord],
			_remove_before: Option<SystemTime>,
		) -> Result<(), CacheError> {
			self.loaded.lock().unwrap().extend_from_slice(coords);
			Ok(())
		}
	}

	fn world() -> Bounds {
		Bounds::new(-180.0, -90.0, 180.0, 90.0).unwrap()
	}

	#[test]
	fn layers_flatten_to_their_caches() {
		let a = RecordingCache::new("a", TileGrid::geodetic(4));
		let b = RecordingCache::new("b", TileGrid::web_mercator(4));
		let layer = Layer::Multi(vec![
			Layer::View(vec![
				Source { cache: Some(a.clone()) },
				Source { cache: None },
			]),
			Layer::Leaf(b.clone()),
		]);
		let names: Vec<String> = layer.caches().iter().map(|c| c.name().to_string()).collect();
		assert_eq!(names, vec!["a", "b"]);

		assert!(TileSeeder::new(&Layer::View(vec![Source { cache: None }]), None, Arc::new(NullProgress), SeederOptions::default()).is_err());
	}

	#[tokio::test]
	async fn seeds_only_caches_matching_the_srs_filter() {
		let geo = RecordingCache::new("geo", TileGrid::geodetic(4));
		let merc = RecordingCache::new("merc", TileGrid::web_mercator(4));
		let layer = Layer::Multi(vec![Layer::Leaf(geo.clone()), Layer::Leaf(merc.clone())]);
		let seeder = TileSeeder::new(&layer, None, Arc::new(NullProgress), SeederOptions::default()).unwrap();

		seeder
			.seed_location(world(), Some(Srs::WGS84), (0, 0), &[Srs::WGS84])
			.await
			.unwrap();
		assert_eq!(geo.loaded(), vec![TileCoord::new(0, 0, 0).unwrap()]);
		assert!(merc.loaded().is_empty());
	}

	#[tokio::test]
	async fn reprojects_the_bbox_into_the_cache_crs() {
		let merc = RecordingCache::new("merc", TileGrid::web_mercator(4));
		let seeder = TileSeeder::new(
			&Layer::Leaf(merc.clone()),
			None,
			Arc::new(NullProgress),
			SeederOptions {
				meta_size: (1, 1),
				..SeederOptions::default()
			},
		)
		.unwrap();

		// the north-eastern quadrant of the world, given in degrees
		let bbox = Bounds::new(0.0, 0.0, 180.0, 85.05).unwrap();
		seeder.seed_location(bbox, Some(Srs::WGS84), (1, 1), &[]).await.unwrap();
		assert_eq!(merc.loaded(), vec![TileCoord::new(1, 1, 1).unwrap()]);
	}

	#[tokio::test]
	async fn unsupported_transforms_abort_the_request() {
		let geo = RecordingCache::new("geo", TileGrid::geodetic(4));
		let seeder = TileSeeder::new(
			&Layer::Leaf(geo.clone()),
			None,
			Arc::new(NullProgress),
			SeederOptions::default(),
		)
		.unwrap();

		let bbox = Bounds::new(0.0, 0.0, 1000.0, 1000.0).unwrap();
		let error = seeder.seed_location(bbox, Some(Srs(25832)), (0, 0), &[]).await.unwrap_err();
		assert!(error.to_string().contains("cannot seed geo"));
		assert!(geo.loaded().is_empty());
	}

	#[tokio::test]
	async fn seeds_all_levels_of_the_range() {
		let geo = RecordingCache::new("geo", TileGrid::geodetic(4));
		let seeder = TileSeeder::new(
			&Layer::Leaf(geo.clone()),
			None,
			Arc::new(NullProgress),
			SeederOptions::default(),
		)
		.unwrap();

		seeder.seed_location(world(), Some(Srs::WGS84), (0, 2), &[]).await.unwrap();
		let loaded = geo.loaded();
		// 1 + 2 + 8 tiles over three levels
		assert_eq!(loaded.len(), 11);
		assert_eq!(loaded.iter().filter(|c| c.level == 2).count(), 8);
	}
}
