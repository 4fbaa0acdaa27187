//! The bounded work queue and the workers draining it.
//!
//! One traversal produces batches, `size` workers consume them. The queue is
//! a bounded FIFO channel; a full queue suspends the producer, which keeps
//! the traversal from running ahead of the upstream service. Stopping is
//! cooperative: one shutdown marker per worker is enqueued after all real
//! work, so nothing in flight is lost.

use crate::cache::TileCache;
use crate::progress::{ProgressSink, timestamp};
use crate::seed::backoff::{BackoffPolicy, exp_backoff};
use crate::seed::traversal::{WorkItem, WorkSink};
use anyhow::{Context, Result, ensure};
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::lock::Mutex;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct PoolOptions {
	/// Number of worker tasks.
	pub size: usize,
	/// Capacity of the work queue.
	pub queue_size: usize,
	/// Report batches without touching the cache.
	pub dry_run: bool,
	/// Cached tiles older than this are rendered again.
	pub remove_before: Option<SystemTime>,
	pub backoff: BackoffPolicy,
}

impl Default for PoolOptions {
	fn default() -> Self {
		PoolOptions {
			size: 2,
			queue_size: 16,
			dry_run: false,
			remove_before: None,
			backoff: BackoffPolicy::default(),
		}
	}
}

enum QueueItem {
	Batch(WorkItem),
	Shutdown,
}

pub struct SeedPool {
	queue: mpsc::Sender<QueueItem>,
	workers: Vec<JoinHandle<Result<()>>>,
}

impl SeedPool {
	/// Spawns the worker tasks. The receiving end of the queue is owned by
	/// the workers alone, so once every worker has exited, submitting fails
	/// instead of filling a queue nobody reads.
	pub fn new(cache: Arc<dyn TileCache>, progress: Arc<dyn ProgressSink>, options: PoolOptions) -> SeedPool {
		let (queue, receiver) = mpsc::channel(options.queue_size);
		let receiver = Arc::new(Mutex::new(receiver));
		let workers = (0..options.size.max(1))
			.map(|_| {
				tokio::spawn(worker_loop(
					cache.clone(),
					receiver.clone(),
					progress.clone(),
					options.clone(),
				))
			})
			.collect();
		SeedPool { queue, workers }
	}

	/// Enqueues one batch, waiting while the queue is full.
	pub async fn submit(&mut self, item: WorkItem) -> Result<()> {
		self
			.queue
			.send(QueueItem::Batch(item))
			.await
			.context("all seed workers are gone")
	}

	/// Enqueues one shutdown marker per worker, then waits for all of them.
	/// Fails when any worker failed.
	pub async fn stop(mut self) -> Result<()> {
		for _ in 0..self.workers.len() {
			// delivery fails only when every worker already exited
			let _ = self.queue.send(QueueItem::Shutdown).await;
		}
		drop(self.queue);

		let mut failures = 0;
		for worker in self.workers {
			match worker.await {
				Ok(Ok(())) => {}
				Ok(Err(error)) => {
					log::error!("seed worker failed: {error:#}");
					failures += 1;
				}
				Err(error) => {
					log::error!("seed worker panicked: {error}");
					failures += 1;
				}
			}
		}
		ensure!(failures == 0, "{failures} seed worker(s) failed");
		Ok(())
	}
}

#[async_trait]
impl WorkSink for SeedPool {
	async fn submit(&mut self, item: WorkItem) -> Result<()> {
		SeedPool::submit(self, item).await
	}
}

async fn worker_loop(
	cache: Arc<dyn TileCache>,
	receiver: Arc<Mutex<mpsc::Receiver<QueueItem>>>,
	progress: Arc<dyn ProgressSink>,
	options: PoolOptions,
) -> Result<()> {
	loop {
		let next = { receiver.lock().await.next().await };
		let item = match next {
			Some(QueueItem::Batch(item)) => item,
			Some(QueueItem::Shutdown) | None => return Ok(()),
		};

		progress.message(&format!("[{}] {}", timestamp(), item.seed_id));
		if options.dry_run {
			continue;
		}

		let coords = item.coords();
		let load = || cache.load_tile_coords(&coords, options.remove_before);
		match exp_backoff(load, &options.backoff).await {
			Ok(()) => {}
			Err(error) if !error.is_recoverable() => {
				log::warn!("skipping batch {:?}: {error}", item.seed_id);
			}
			Err(error) => {
				return Err(error).with_context(|| {
					format!(
						"batch {:?} still failing after {} attempts",
						item.seed_id,
						options.backoff.max_repeat
					)
				});
			}
		}
	}
}
