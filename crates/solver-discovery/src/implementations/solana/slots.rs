//! Chain-time ticks.
//!
//! The engine's scheduler acts on exact slot equality, so every slot is
//! emitted while the poller keeps up. After a gap larger than the backfill
//! limit the ticker jumps straight to the current slot; the skipped slots are
//! never emitted.

use crate::{emit, DiscoveryError, DiscoveryInterface, Monitor};
use async_trait::async_trait;
use solver_chains::ChainClient;
use solver_types::SolverEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::warn;

/// Slots to emit given the last emitted slot and the current one.
fn slots_to_emit(last: Option<u64>, current: u64, max_backfill: u64) -> Vec<u64> {
	match last {
		None => vec![current],
		Some(last) if current <= last => Vec::new(),
		Some(last) if current - last <= max_backfill => (last + 1..=current).collect(),
		Some(last) => {
			warn!(
				last,
				current,
				skipped = current - last - 1,
				"Slot gap exceeds backfill limit, jumping ahead"
			);
			vec![current]
		}
	}
}

async fn poll_slot(
	chain: &dyn ChainClient,
	last: &mut Option<u64>,
	max_backfill: u64,
	sender: &mpsc::Sender<SolverEvent>,
) -> Result<usize, DiscoveryError> {
	let current = chain.get_slot().await?;
	let slots = slots_to_emit(*last, current, max_backfill);
	for slot in &slots {
		emit(sender, SolverEvent::SlotTick(*slot)).await?;
		*last = Some(*slot);
	}
	Ok(slots.len())
}

/// Emits [`SolverEvent::SlotTick`] as the cluster advances.
pub struct SlotDiscovery {
	chain: Arc<dyn ChainClient>,
	interval: Duration,
	max_backfill: u64,
	last: Arc<Mutex<Option<u64>>>,
	monitor: Monitor,
}

impl SlotDiscovery {
	pub fn new(chain: Arc<dyn ChainClient>, interval: Duration, max_backfill: u64) -> Self {
		Self {
			chain,
			interval,
			max_backfill,
			last: Arc::new(Mutex::new(None)),
			monitor: Monitor::default(),
		}
	}
}

#[async_trait]
impl DiscoveryInterface for SlotDiscovery {
	fn name(&self) -> &'static str {
		"slots"
	}

	async fn start_monitoring(
		&self,
		sender: mpsc::Sender<SolverEvent>,
	) -> Result<(), DiscoveryError> {
		let chain = self.chain.clone();
		let last = self.last.clone();
		let max_backfill = self.max_backfill;

		self.monitor
			.start(self.name(), self.interval, move || {
				let chain = chain.clone();
				let last = last.clone();
				let sender = sender.clone();
				async move {
					let mut last = last.lock().await;
					poll_slot(chain.as_ref(), &mut last, max_backfill, &sender)
						.await
						.map(|_| ())
				}
			})
			.await
	}

	async fn stop_monitoring(&self) -> Result<(), DiscoveryError> {
		self.monitor.stop().await;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::solana::tests::MockChain;

	#[test]
	fn test_slots_to_emit() {
		assert_eq!(slots_to_emit(None, 100, 8), vec![100]);
		assert_eq!(slots_to_emit(Some(100), 100, 8), Vec::<u64>::new());
		assert_eq!(slots_to_emit(Some(100), 99, 8), Vec::<u64>::new());
		assert_eq!(slots_to_emit(Some(100), 103, 8), vec![101, 102, 103]);
		assert_eq!(slots_to_emit(Some(100), 108, 8), (101..=108).collect::<Vec<_>>());
		assert_eq!(slots_to_emit(Some(100), 109, 8), vec![109]);
	}

	#[tokio::test]
	async fn test_poll_slot_backfills_then_jumps() {
		let chain = MockChain::default();
		chain.push_slots(&[100, 102, 150]);

		let (tx, mut rx) = mpsc::channel(16);
		let mut last = None;

		for _ in 0..3 {
			poll_slot(&chain, &mut last, 8, &tx).await.unwrap();
		}
		drop(tx);

		let mut ticks = Vec::new();
		while let Some(event) = rx.recv().await {
			if let SolverEvent::SlotTick(slot) = event {
				ticks.push(slot);
			}
		}
		assert_eq!(ticks, vec![100, 101, 102, 150]);
		assert_eq!(last, Some(150));
	}
}
