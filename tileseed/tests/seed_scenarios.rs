//! End-to-end seeding and cleanup scenarios over a real cache directory,
//! with a counting in-process map source instead of a live service.

use assert_fs::TempDir;
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tileseed::cache::{DirCache, TileSource};
use tileseed_core::{
	Bounds, CacheError, CleanupTask, Layer, NullProgress, SeederOptions, Srs, TileSeeder, cleanup_cache,
};

struct CountingSource {
	calls: Mutex<Vec<(Bounds, (u32, u32))>>,
}

impl CountingSource {
	fn new() -> Arc<CountingSource> {
		Arc::new(CountingSource {
			calls: Mutex::new(vec![]),
		})
	}

	fn calls(&self) -> Vec<(Bounds, (u32, u32))> {
		self.calls.lock().unwrap().clone()
	}
}

#[async_trait]
impl TileSource for CountingSource {
	async fn fetch_map(&self, bbox: &Bounds, size: (u32, u32), _srs: Srs) -> Result<Vec<u8>, CacheError> {
		self.calls.lock().unwrap().push((*bbox, size));
		let image = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(size.0, size.1, image::Rgba([20, 60, 20, 255])));
		let mut body = Cursor::new(Vec::new());
		image
			.write_to(&mut body, ImageFormat::Png)
			.map_err(|error| CacheError::SourceFatal(error.to_string()))?;
		Ok(body.into_inner())
	}
}

fn cache(dir: &TempDir, source: Arc<CountingSource>) -> Arc<DirCache> {
	Arc::new(DirCache::new("one", tileseed_core::TileGrid::geodetic(10), (4, 4), dir.path(), "png", source).unwrap())
}

fn seeder(cache: Arc<DirCache>, remove_before: Option<SystemTime>, dry_run: bool) -> TileSeeder {
	TileSeeder::new(
		&Layer::Leaf(cache),
		remove_before,
		Arc::new(NullProgress),
		SeederOptions {
			dry_run,
			..SeederOptions::default()
		},
	)
	.unwrap()
}

fn world() -> Bounds {
	Bounds::new(-180.0, -90.0, 180.0, 90.0).unwrap()
}

fn tile_path(dir: &TempDir, (x, y, level): (u32, u32, u8)) -> PathBuf {
	dir.path().join(format!("{level}/{x}/{y}.png"))
}

fn make_tile(dir: &TempDir, coord: (u32, u32, u8), age: Option<Duration>) -> PathBuf {
	let path = tile_path(dir, coord);
	std::fs::create_dir_all(path.parent().unwrap()).unwrap();
	let file = File::create(&path).unwrap();
	if let Some(age) = age {
		file.set_modified(SystemTime::now() - age).unwrap();
	}
	path
}

fn mtime(path: &Path) -> SystemTime {
	path.metadata().unwrap().modified().unwrap()
}

#[tokio::test]
async fn fresh_seed_renders_the_world_tile() {
	let dir = TempDir::new().unwrap();
	let source = CountingSource::new();
	let cache = cache(&dir, source.clone());

	seeder(cache, None, false)
		.seed_location(world(), Some(Srs::WGS84), (0, 0), &[])
		.await
		.unwrap();

	let calls = source.calls();
	assert_eq!(calls.len(), 1);
	assert_eq!(calls[0].0.as_tuple(), (-180.0, -90.0, 180.0, 90.0));
	assert_eq!(calls[0].1, (256, 128));
	assert!(tile_path(&dir, (0, 0, 0)).exists());
}

#[tokio::test]
async fn dry_run_touches_nothing() {
	let dir = TempDir::new().unwrap();
	let source = CountingSource::new();
	let cache = cache(&dir, source.clone());

	seeder(cache, None, true)
		.seed_location(world(), Some(Srs::WGS84), (0, 0), &[])
		.await
		.unwrap();

	assert!(source.calls().is_empty());
	assert!(!tile_path(&dir, (0, 0, 0)).exists());
}

#[tokio::test]
async fn reseeding_an_up_to_date_cache_is_a_no_op() {
	let dir = TempDir::new().unwrap();
	let source = CountingSource::new();
	let cache = cache(&dir, source.clone());
	let tile = make_tile(&dir, (0, 0, 0), None);
	let before = mtime(&tile);

	seeder(cache, None, false)
		.seed_location(world(), Some(Srs::WGS84), (0, 0), &[])
		.await
		.unwrap();

	assert!(source.calls().is_empty());
	assert!(tile.exists());
	assert_eq!(mtime(&tile), before);
}

#[tokio::test]
async fn remove_before_rebuilds_stale_tiles_and_expires_the_rest() {
	let dir = TempDir::new().unwrap();
	let source = CountingSource::new();
	let cache = cache(&dir, source.clone());

	// both tiles are 25 hours old; only the first is inside the seeded view
	let seeded = make_tile(&dir, (0, 0, 0), Some(Duration::from_secs(25 * 3600)));
	let leftover = make_tile(&dir, (0, 0, 1), Some(Duration::from_secs(25 * 3600)));
	let cutoff = SystemTime::now() - Duration::from_secs(24 * 3600);

	let seeder = seeder(cache, Some(cutoff), false);
	seeder
		.seed_location(world(), Some(Srs::WGS84), (0, 0), &[])
		.await
		.unwrap();
	seeder.cleanup().unwrap();

	assert_eq!(source.calls().len(), 1);
	assert!(seeded.exists());
	let age = SystemTime::now().duration_since(mtime(&seeded)).unwrap();
	assert!(age < Duration::from_secs(5), "rebuilt tile is {age:?} old");
	assert!(!leftover.exists());
}

#[tokio::test]
async fn cleanup_restricted_to_a_level() {
	let dir = TempDir::new().unwrap();
	let cache = cache(&dir, CountingSource::new());
	for level in 0..4 {
		make_tile(&dir, (0, 0, level), None);
	}

	let task = CleanupTask {
		keep_levels: Some(vec![2]),
		..CleanupTask::default()
	};
	cleanup_cache(cache.as_ref(), &task, false, &NullProgress).unwrap();

	for level in 0..4u8 {
		assert_eq!(tile_path(&dir, (0, 0, level)).exists(), level == 2, "level {level}");
	}
}

#[tokio::test]
async fn cleanup_restricted_to_a_coverage() {
	let dir = TempDir::new().unwrap();
	let cache = cache(&dir, CountingSource::new());
	let tiles = [(0, 0, 0), (1, 0, 1), (2, 0, 2), (2, 0, 3), (4, 0, 3)];
	for coord in tiles {
		make_tile(&dir, coord, None);
	}

	let task = CleanupTask {
		keep_coverage: Some(Bounds::new(0.0, -90.0, 90.0, 0.0).unwrap()),
		..CleanupTask::default()
	};
	cleanup_cache(cache.as_ref(), &task, false, &NullProgress).unwrap();

	let survivors: Vec<(u32, u32, u8)> = tiles
		.into_iter()
		.filter(|coord| tile_path(&dir, *coord).exists())
		.collect();
	assert_eq!(survivors, vec![(2, 0, 2), (4, 0, 3)]);
}
