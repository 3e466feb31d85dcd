//! # Solver Discovery
//!
//! Event sources for the solver engine. Each source polls one external system
//! and pushes typed [`SolverEvent`]s into the engine's bounded channel:
//!
//! - [`AuctionEventDiscovery`]: matching-engine `AuctionUpdated` events, read
//!   from program logs
//! - [`SlotDiscovery`]: chain-time ticks
//! - [`VaaDiscovery`]: new VAAs from watched token-router emitters
//!
//! A full channel applies backpressure to the poller; a closed channel stops it.

use async_trait::async_trait;
use solver_chains::ChainError;
use solver_types::{Classify, ErrorClass, SolverEvent};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

pub mod implementations;

pub use implementations::solana::{AuctionEventDiscovery, SlotDiscovery};
pub use implementations::wormhole::VaaDiscovery;

#[derive(Debug, Error)]
pub enum DiscoveryError {
	#[error("Chain error: {0}")]
	Chain(#[from] ChainError),
	#[error("Already monitoring")]
	AlreadyMonitoring,
	#[error("Event channel closed")]
	ChannelClosed,
}

impl Classify for DiscoveryError {
	fn class(&self) -> ErrorClass {
		match self {
			Self::Chain(e) => e.class(),
			Self::AlreadyMonitoring | Self::ChannelClosed => ErrorClass::Fatal,
		}
	}
}

/// A source of solver events.
#[async_trait]
pub trait DiscoveryInterface: Send + Sync {
	/// Short name used in logs.
	fn name(&self) -> &'static str;

	/// Spawns the polling task.
	async fn start_monitoring(
		&self,
		sender: mpsc::Sender<SolverEvent>,
	) -> Result<(), DiscoveryError>;

	async fn stop_monitoring(&self) -> Result<(), DiscoveryError>;
}

/// Runs every configured source against one channel.
pub struct DiscoveryService {
	sources: Vec<Box<dyn DiscoveryInterface>>,
}

impl DiscoveryService {
	pub fn new(sources: Vec<Box<dyn DiscoveryInterface>>) -> Self {
		Self { sources }
	}

	pub async fn start_all(&self, sender: mpsc::Sender<SolverEvent>) -> Result<(), DiscoveryError> {
		for source in &self.sources {
			source.start_monitoring(sender.clone()).await?;
			info!(source = source.name(), "Discovery source started");
		}
		Ok(())
	}

	pub async fn stop_all(&self) -> Result<(), DiscoveryError> {
		for source in &self.sources {
			source.stop_monitoring().await?;
			info!(source = source.name(), "Discovery source stopped");
		}
		Ok(())
	}
}

/// Start/stop bookkeeping shared by the polling sources.
#[derive(Default)]
pub(crate) struct Monitor {
	running: AtomicBool,
	stop_signal: Mutex<Option<mpsc::Sender<()>>>,
}

impl Monitor {
	/// Spawns a loop that awaits `poll` every `interval` until stopped.
	///
	/// `poll` returning [`DiscoveryError::ChannelClosed`] ends the loop; any
	/// other error is logged and the next tick proceeds.
	pub(crate) async fn start<F, Fut>(
		&self,
		name: &'static str,
		interval: Duration,
		mut poll: F,
	) -> Result<(), DiscoveryError>
	where
		F: FnMut() -> Fut + Send + 'static,
		Fut: Future<Output = Result<(), DiscoveryError>> + Send + 'static,
	{
		if self.running.swap(true, Ordering::SeqCst) {
			return Err(DiscoveryError::AlreadyMonitoring);
		}

		let (stop_tx, mut stop_rx) = mpsc::channel(1);
		*self.stop_signal.lock().await = Some(stop_tx);

		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

			loop {
				tokio::select! {
					_ = ticker.tick() => {
						match poll().await {
							Ok(()) => {}
							Err(DiscoveryError::ChannelClosed) => {
								info!(source = name, "Event channel closed, stopping");
								break;
							}
							Err(e) => warn!(source = name, error = %e, "Poll failed"),
						}
					}
					_ = stop_rx.recv() => break,
				}
			}
		});

		Ok(())
	}

	pub(crate) async fn stop(&self) {
		if !self.running.swap(false, Ordering::SeqCst) {
			return;
		}
		if let Some(stop_tx) = self.stop_signal.lock().await.take() {
			let _ = stop_tx.send(()).await;
		}
	}
}

/// Forwards an event, mapping a dropped receiver to [`DiscoveryError::ChannelClosed`].
pub(crate) async fn emit(
	sender: &mpsc::Sender<SolverEvent>,
	event: SolverEvent,
) -> Result<(), DiscoveryError> {
	sender
		.send(event)
		.await
		.map_err(|_| DiscoveryError::ChannelClosed)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::AtomicU64;
	use std::sync::Arc;

	struct CountingSource {
		monitor: Monitor,
		polls: Arc<AtomicU64>,
	}

	#[async_trait]
	impl DiscoveryInterface for CountingSource {
		fn name(&self) -> &'static str {
			"counting"
		}

		async fn start_monitoring(
			&self,
			sender: mpsc::Sender<SolverEvent>,
		) -> Result<(), DiscoveryError> {
			let polls = self.polls.clone();
			self.monitor
				.start(self.name(), Duration::from_millis(5), move || {
					let polls = polls.clone();
					let sender = sender.clone();
					async move {
						let n = polls.fetch_add(1, Ordering::SeqCst);
						emit(&sender, SolverEvent::SlotTick(n)).await
					}
				})
				.await
		}

		async fn stop_monitoring(&self) -> Result<(), DiscoveryError> {
			self.monitor.stop().await;
			Ok(())
		}
	}

	#[tokio::test]
	async fn test_service_start_and_stop() {
		let polls = Arc::new(AtomicU64::new(0));
		let service = DiscoveryService::new(vec![Box::new(CountingSource {
			monitor: Monitor::default(),
			polls: polls.clone(),
		})]);

		let (tx, mut rx) = mpsc::channel(16);
		service.start_all(tx).await.unwrap();

		let first = rx.recv().await.unwrap();
		assert!(matches!(first, SolverEvent::SlotTick(0)));

		service.stop_all().await.unwrap();
	}

	#[tokio::test]
	async fn test_double_start_is_rejected() {
		let source = CountingSource {
			monitor: Monitor::default(),
			polls: Arc::new(AtomicU64::new(0)),
		};
		let (tx, _rx) = mpsc::channel(16);

		source.start_monitoring(tx.clone()).await.unwrap();
		assert!(matches!(
			source.start_monitoring(tx).await,
			Err(DiscoveryError::AlreadyMonitoring)
		));
		source.stop_monitoring().await.unwrap();
	}

	#[tokio::test]
	async fn test_closed_channel_stops_loop() {
		let polls = Arc::new(AtomicU64::new(0));
		let source = CountingSource {
			monitor: Monitor::default(),
			polls: polls.clone(),
		};
		let (tx, rx) = mpsc::channel(16);
		drop(rx);

		source.start_monitoring(tx).await.unwrap();
		tokio::time::sleep(Duration::from_millis(50)).await;

		// The first poll sees the closed channel and the loop exits.
		assert_eq!(polls.load(Ordering::SeqCst), 1);
	}
}
