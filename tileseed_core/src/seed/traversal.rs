//! Recursive descent over the meta-tile pyramid of one cache.
//!
//! Each frame covers one meta tile of the parent level (the root frame covers
//! the seed region itself). A frame enumerates the meta tiles below it,
//! prunes the ones that do not reach into the seed region, recurses into the
//! rest and finally emits its own batch, so batches arrive deepest first and
//! the root batch arrives last. Once a frame is fully inside the seed region
//! the containment test is settled for the whole subtree and is never run
//! again below it.

use crate::grid::{BoxRelation, MetaGrid, MetaTile, box_relation};
use crate::progress::{ProgressSink, timestamp};
use crate::types::Bounds;
use anyhow::{Context, Result, ensure};
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicU64, Ordering};

/// One batch of meta tiles, labeled with the progress id of the traversal
/// frame that produced it.
#[derive(Debug, Clone)]
pub struct WorkItem {
	pub seed_id: String,
	pub meta_tiles: Vec<MetaTile>,
}

impl WorkItem {
	/// All tile coordinates of the batch.
	pub fn coords(&self) -> Vec<crate::TileCoord> {
		self.meta_tiles.iter().flat_map(|m| m.coords()).collect()
	}
}

/// Receives the work items a traversal produces. Submitting may suspend the
/// traversal, which is how a bounded queue applies backpressure.
#[async_trait]
pub trait WorkSink: Send {
	async fn submit(&mut self, item: WorkItem) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TraversalStats {
	pub work_items: u64,
	pub meta_tiles: u64,
	pub relation_calls: u64,
}

struct Counters {
	work_items: AtomicU64,
	meta_tiles: AtomicU64,
	relation_calls: AtomicU64,
}

pub struct Traversal {
	meta_grid: MetaGrid,
	target: Bounds,
	level_min: u8,
	level_max: u8,
	report_until: u8,
}

impl Traversal {
	/// Prepares a traversal of `meta_grid` over `target` for the inclusive
	/// level range `(level_min, level_max)`. The target is clipped to the
	/// grid extent and must touch it.
	pub fn new(meta_grid: MetaGrid, target: Bounds, (level_min, level_max): (u8, u8)) -> Result<Traversal> {
		ensure!(level_min <= level_max, "level range [{level_min}, {level_max}] is inverted");
		ensure!(
			level_max < meta_grid.grid().levels(),
			"level {level_max} exceeds the {}-level grid",
			meta_grid.grid().levels()
		);
		let target = target
			.intersected(meta_grid.grid().extent())
			.context("seed region does not touch the grid")?;
		let report_until = level_min + ((level_max - level_min + 1) as f64 * 0.7) as u8;
		Ok(Traversal {
			meta_grid,
			target,
			level_min,
			level_max,
			report_until,
		})
	}

	/// Walks the pyramid, pushing every batch into `sink`.
	pub async fn run(&self, sink: &mut dyn WorkSink, progress: &dyn ProgressSink) -> Result<TraversalStats> {
		let counters = Counters {
			work_items: AtomicU64::new(0),
			meta_tiles: AtomicU64::new(0),
			relation_calls: AtomicU64::new(0),
		};
		self
			.descend(self.target, self.level_min, String::new(), false, sink, progress, &counters)
			.await?;
		let stats = TraversalStats {
			work_items: counters.work_items.into_inner(),
			meta_tiles: counters.meta_tiles.into_inner(),
			relation_calls: counters.relation_calls.into_inner(),
		};
		log::debug!(
			"traversal done: {} work items, {} meta tiles, {} coverage checks",
			stats.work_items,
			stats.meta_tiles,
			stats.relation_calls
		);
		Ok(stats)
	}

	#[allow(clippy::too_many_arguments)]
	fn descend<'a>(
		&'a self,
		bounds: Bounds,
		level: u8,
		seed_id: String,
		full_intersect: bool,
		sink: &'a mut dyn WorkSink,
		progress: &'a dyn ProgressSink,
		counters: &'a Counters,
	) -> BoxFuture<'a, Result<()>> {
		async move {
			let (_aligned, _span, meta_tiles) = self.meta_grid.affected_level_tiles(&bounds, level)?;

			if level <= self.report_until {
				progress.message(&format!(
					"[{}] {:2} ({:.5}, {:.5}, {:.5}, {:.5}) full:{}",
					timestamp(),
					level,
					bounds.x_min,
					bounds.y_min,
					bounds.x_max,
					bounds.y_max,
					full_intersect
				));
			}

			// Meta tiles that do not reach into the seed region are dropped
			// from recursion and emission alike. Inside a fully covered frame
			// the answer is already known for every descendant.
			let mut kept: Vec<(MetaTile, Bounds, bool)> = Vec::with_capacity(meta_tiles.len());
			for meta in meta_tiles {
				let sub_bbox = self.meta_grid.meta_bbox(&meta)?;
				let relation = if full_intersect {
					BoxRelation::Contained
				} else {
					counters.relation_calls.fetch_add(1, Ordering::Relaxed);
					box_relation(&self.target, &sub_bbox)
				};
				match relation {
					BoxRelation::Disjoint => {}
					relation => kept.push((meta, sub_bbox, relation == BoxRelation::Contained)),
				}
			}

			if level < self.level_max {
				let total = kept.len();
				for (i, (_, sub_bbox, contained)) in kept.iter().enumerate() {
					let child_id = format!("{seed_id}{}", status_symbol(i, total));
					self
						.descend(*sub_bbox, level + 1, child_id, *contained, &mut *sink, progress, counters)
						.await?;
				}
			}

			counters.work_items.fetch_add(1, Ordering::Relaxed);
			counters.meta_tiles.fetch_add(kept.len() as u64, Ordering::Relaxed);
			sink
				.submit(WorkItem {
					seed_id,
					meta_tiles: kept.into_iter().map(|(meta, _, _)| meta).collect(),
				})
				.await
		}
		.boxed()
	}
}

/// The one-character progress marker for child `i` of `total` siblings,
/// ramping through `. o O 0` by quartile. An index past the end maps to the
/// overflow marker `X`.
pub fn status_symbol(i: usize, total: usize) -> char {
	const SYMBOLS: [char; 5] = [' ', '.', 'o', 'O', '0'];
	let i = i + 1;
	if i > total {
		'X'
	} else {
		SYMBOLS[(i as f64 / (total as f64 / 4.0)).ceil() as usize]
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::grid::MetaGrid;
	use crate::progress::{MemoryProgress, NullProgress};
	use crate::TileGrid;
	use pretty_assertions::assert_eq;

	#[derive(Default)]
	struct MemorySink {
		items: Vec<WorkItem>,
	}

	#[async_trait]
	impl WorkSink for MemorySink {
		async fn submit(&mut self, item: WorkItem) -> Result<()> {
			self.items.push(item);
			Ok(())
		}
	}

	fn single_tile_metas(levels: u8) -> MetaGrid {
		MetaGrid::new(TileGrid::geodetic(levels), (1, 1)).unwrap()
	}

	fn west() -> Bounds {
		Bounds::new(-180.0, -90.0, 0.0, 90.0).unwrap()
	}

	#[test]
	fn status_symbols() {
		assert_eq!(status_symbol(0, 1), '0');
		assert_eq!((0..5).map(|i| status_symbol(i, 4)).collect::<String>(), ".oO0X");
		assert_eq!(
			(0..11).map(|i| status_symbol(i, 10)).collect::<String>(),
			"..oooOO000X"
		);
	}

	#[tokio::test]
	async fn emits_post_order_with_progress_ids() {
		let traversal = Traversal::new(single_tile_metas(10), west(), (0, 2)).unwrap();
		let mut sink = MemorySink::default();
		let stats = traversal.run(&mut sink, &NullProgress).await.unwrap();

		let summary: Vec<(String, usize)> = sink
			.items
			.iter()
			.map(|item| (item.seed_id.clone(), item.meta_tiles.len()))
			.collect();
		// deepest batch first, root batch last
		assert_eq!(
			summary,
			vec![("00".to_string(), 4), ("0".to_string(), 1), (String::new(), 1)]
		);
		assert_eq!(
			stats,
			TraversalStats {
				work_items: 3,
				meta_tiles: 6,
				relation_calls: 3,
			}
		);
	}

	#[tokio::test]
	async fn prunes_subtrees_outside_the_target() {
		let traversal = Traversal::new(single_tile_metas(10), west(), (0, 2)).unwrap();
		let mut sink = MemorySink::default();
		traversal.run(&mut sink, &NullProgress).await.unwrap();

		// the eastern hemisphere only shares an edge with the target and
		// must not show up at any level
		for item in &sink.items {
			for meta in &item.meta_tiles {
				let bbox = traversal.meta_grid.meta_bbox(meta).unwrap();
				assert!(bbox.x_min < 0.0, "{meta:?} is outside the target");
			}
		}
		// the leaf level covers the whole western hemisphere exactly once
		let mut leaves: Vec<(u32, u32)> = sink.items[0].meta_tiles.iter().map(|m| (m.x_min(), m.y_min())).collect();
		leaves.sort_unstable();
		assert_eq!(leaves, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
	}

	#[tokio::test]
	async fn contained_frames_never_test_coverage_again() {
		let world = Bounds::new(-180.0, -90.0, 180.0, 90.0).unwrap();
		let traversal = Traversal::new(single_tile_metas(10), world, (0, 3)).unwrap();
		let mut sink = MemorySink::default();
		let stats = traversal.run(&mut sink, &NullProgress).await.unwrap();

		// the root's single child is contained, so the only coverage check
		// is the one that established that
		assert_eq!(stats.relation_calls, 1);
		assert_eq!(stats.work_items, 12); // 1 + 1 + 2 + 8 frames
		assert_eq!(stats.meta_tiles, 43);
		assert_eq!(sink.items.last().unwrap().seed_id, "");
	}

	#[tokio::test]
	async fn reports_progress_down_to_the_cutoff() {
		let meta_grid = MetaGrid::new(TileGrid::geodetic(10), (4, 4)).unwrap();
		let traversal = Traversal::new(meta_grid, west(), (0, 4)).unwrap();
		let mut sink = MemorySink::default();
		let progress = MemoryProgress::new();
		traversal.run(&mut sink, &progress).await.unwrap();

		// report_until = 0 + 0.7 * 5 = 3, so level 4 frames stay silent
		let lines = progress.lines();
		assert!(!lines.is_empty());
		for line in &lines {
			assert!(!line.contains(" 4 ("), "unexpected report {line:?}");
		}
		assert!(lines[0].contains("(-180.00000, -90.00000, 0.00000, 90.00000)"), "{:?}", lines[0]);
		assert!(lines[0].contains("full:false"));
	}

	#[tokio::test]
	async fn rejects_inverted_or_too_deep_ranges() {
		assert!(Traversal::new(single_tile_metas(4), west(), (2, 1)).is_err());
		assert!(Traversal::new(single_tile_metas(4), west(), (0, 4)).is_err());
		let apart = Bounds::new(500.0, 500.0, 600.0, 600.0).unwrap();
		assert!(Traversal::new(single_tile_metas(4), apart, (0, 2)).is_err());
	}
}
