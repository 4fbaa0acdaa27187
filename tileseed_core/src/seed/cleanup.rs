//! Removes cached tiles that a cleanup task no longer wants, walking the
//! level directories of a cache.
//!
//! A task can age out tiles (`remove_before`), restrict the cache to a set of
//! levels (`keep_levels`) or trim it to a region (`keep_coverage`). Files
//! outside a keep set are removed regardless of their age. Emptied
//! subdirectories are pruned; the level directories themselves stay.

use crate::cache::TileCache;
use crate::progress::ProgressSink;
use crate::types::{Bounds, TileCoord};
use anyhow::Result;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

#[derive(Debug, Clone, Default)]
pub struct CleanupTask {
	/// Remove files whose mtime precedes this cutoff.
	pub remove_before: Option<SystemTime>,
	/// When set, levels not listed here are dropped entirely.
	pub keep_levels: Option<Vec<u8>>,
	/// When set, tiles not fully inside this region (in the CRS of the
	/// cache grid) are dropped.
	pub keep_coverage: Option<Bounds>,
}

impl CleanupTask {
	pub fn remove_before(cutoff: SystemTime) -> CleanupTask {
		CleanupTask {
			remove_before: Some(cutoff),
			..CleanupTask::default()
		}
	}
}

/// Applies `task` to every level directory of `cache`. Errors on single
/// files are logged and do not stop the walk.
pub fn cleanup_cache(cache: &dyn TileCache, task: &CleanupTask, dry_run: bool, progress: &dyn ProgressSink) -> Result<()> {
	for level in 0..cache.grid().levels() {
		let Some(dir) = cache.level_location(level) else {
			continue;
		};
		if !dir.is_dir() {
			continue;
		}
		let drop_level = task.keep_levels.as_ref().is_some_and(|keep| !keep.contains(&level));
		progress.message(&format!("removing old files in {}", dir.display()));
		if let Err(error) = clean_dir(cache, &dir, &dir, level, drop_level, task, dry_run, progress) {
			log::warn!("cleanup of {} failed: {error:#}", dir.display());
		}
	}
	Ok(())
}

#[allow(clippy::too_many_arguments)]
fn clean_dir(
	cache: &dyn TileCache,
	level_root: &Path,
	dir: &Path,
	level: u8,
	drop_level: bool,
	task: &CleanupTask,
	dry_run: bool,
	progress: &dyn ProgressSink,
) -> Result<()> {
	for entry in fs::read_dir(dir)? {
		let entry = match entry {
			Ok(entry) => entry,
			Err(error) => {
				log::warn!("skipping unreadable entry in {}: {error}", dir.display());
				continue;
			}
		};
		let path = entry.path();
		if path.is_dir() {
			clean_dir(cache, level_root, &path, level, drop_level, task, dry_run, progress)?;
			if !dry_run && fs::read_dir(&path).map(|mut dir| dir.next().is_none()).unwrap_or(false) {
				if let Err(error) = fs::remove_dir(&path) {
					log::warn!("could not prune {}: {error}", path.display());
				}
			}
		} else if expired(cache, level_root, &path, level, drop_level, task) {
			if dry_run {
				progress.message(&format!("removing {}", path.display()));
			} else if let Err(error) = fs::remove_file(&path) {
				log::warn!("could not remove {}: {error}", path.display());
			}
		}
	}
	Ok(())
}

fn expired(cache: &dyn TileCache, level_root: &Path, path: &Path, level: u8, drop_level: bool, task: &CleanupTask) -> bool {
	if drop_level {
		return true;
	}
	if let Some(coverage) = &task.keep_coverage {
		match tile_of(level_root, path, level).and_then(|coord| cache.grid().tile_bbox(&coord).ok()) {
			Some(bbox) => {
				if !coverage.contains(&bbox) {
					return true;
				}
			}
			None => {
				log::warn!("not a tile, leaving {} alone", path.display());
				return false;
			}
		}
	}
	if let Some(cutoff) = task.remove_before {
		match path.metadata().and_then(|meta| meta.modified()) {
			Ok(mtime) => return mtime < cutoff,
			Err(error) => log::warn!("no mtime for {}: {error}", path.display()),
		}
	}
	false
}

/// Decodes `<level_root>/<x>/<y>.<ext>` back into a tile coordinate.
fn tile_of(level_root: &Path, path: &Path, level: u8) -> Option<TileCoord> {
	let rel = path.strip_prefix(level_root).ok()?;
	let mut parts = rel.components();
	let x = parts.next()?.as_os_str().to_str()?.parse().ok()?;
	let y = Path::new(parts.next()?.as_os_str()).file_stem()?.to_str()?.parse().ok()?;
	if parts.next().is_some() {
		return None;
	}
	TileCoord::new(level, x, y).ok()
}
