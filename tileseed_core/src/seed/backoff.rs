//! Exponential backoff around a fallible async operation.

use crate::cache::CacheError;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BackoffPolicy {
	/// Maximum number of attempts, including the first one.
	pub max_repeat: u32,
	/// Sleep before the second attempt; doubles on every further attempt.
	pub start: Duration,
}

impl Default for BackoffPolicy {
	fn default() -> Self {
		BackoffPolicy {
			max_repeat: 10,
			start: Duration::from_secs(2),
		}
	}
}

/// Runs `f` until it succeeds, fails unrecoverably, or the attempt budget is
/// spent. Sleeps `start * 2^(n-1)` after the n-th recoverable failure and
/// returns the last error when giving up.
pub async fn exp_backoff<T, F, Fut>(mut f: F, policy: &BackoffPolicy) -> Result<T, CacheError>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, CacheError>>,
{
	let mut attempt = 0u32;
	loop {
		match f().await {
			Ok(value) => return Ok(value),
			Err(error) => {
				attempt += 1;
				if !error.is_recoverable() || attempt >= policy.max_repeat {
					return Err(error);
				}
				let wait = policy.start * 2u32.pow(attempt - 1);
				log::warn!("an error occurred, retry in {}s: {error}", wait.as_secs_f32());
				tokio::time::sleep(wait).await;
			}
		}
	}
}
