//! Retry logic shared by every network-facing operation.
//!
//! A [`RetryPolicy`] bundles the three knobs a retry loop needs: how many
//! attempts are allowed, how long to wait between them, and which errors are
//! worth retrying at all. By default only `ErrorClass::Transient` failures
//! are retried; parse and validation errors fail on the first attempt.

use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use solver_types::Classify;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry policy wrapping an exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
	backoff: ExponentialBackoff,
	/// Total attempts including the first; `None` retries until success.
	max_attempts: Option<u32>,
}

impl RetryPolicy {
	pub fn exponential(
		initial: Duration,
		max_interval: Duration,
		multiplier: f64,
		max_attempts: Option<u32>,
	) -> Self {
		let backoff = ExponentialBackoffBuilder::new()
			.with_initial_interval(initial)
			.with_max_interval(max_interval)
			.with_multiplier(multiplier)
			.with_randomization_factor(0.0)
			.with_max_elapsed_time(None)
			.build();

		Self {
			backoff,
			max_attempts,
		}
	}

	/// Same delay between every attempt.
	pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
		Self::exponential(delay, delay, 1.0, Some(max_attempts))
	}

	/// Three attempts, 200ms growing to 2s.
	pub fn rpc_default() -> Self {
		Self::exponential(
			Duration::from_millis(200),
			Duration::from_secs(2),
			2.0,
			Some(3),
		)
	}

	pub fn max_attempts(&self) -> Option<u32> {
		self.max_attempts
	}

	/// Runs `operation`, retrying failures whose class is retryable.
	pub async fn retry<T, E, F, Fut>(&self, name: &str, operation: F) -> Result<T, E>
	where
		E: Classify + Display,
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T, E>>,
	{
		self.retry_if(name, operation, |e: &E| e.class().is_retryable())
			.await
	}

	/// Runs `operation`, retrying failures accepted by `should_retry`.
	pub async fn retry_if<T, E, F, Fut, P>(
		&self,
		name: &str,
		mut operation: F,
		should_retry: P,
	) -> Result<T, E>
	where
		E: Display,
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T, E>>,
		P: Fn(&E) -> bool,
	{
		let mut backoff = self.backoff.clone();
		backoff.reset();
		let mut attempts: u32 = 0;

		loop {
			attempts += 1;
			let error = match operation().await {
				Ok(value) => return Ok(value),
				Err(e) => e,
			};

			if !should_retry(&error) {
				return Err(error);
			}

			if let Some(max) = self.max_attempts {
				if attempts >= max {
					warn!(
						operation = name,
						attempts,
						error = %error,
						"Giving up after exhausting retries"
					);
					return Err(error);
				}
			}

			// Elapsed time is unbounded, so the backoff always yields a delay.
			let delay = backoff
				.next_backoff()
				.unwrap_or(self.backoff.max_interval);
			warn!(
				operation = name,
				attempts,
				delay_ms = delay.as_millis() as u64,
				error = %error,
				"Retrying"
			);
			tokio::time::sleep(delay).await;
		}
	}
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self::rpc_default()
	}
}
