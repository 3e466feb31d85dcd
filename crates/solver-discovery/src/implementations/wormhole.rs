//! VAA discovery for watched token-router emitters.
//!
//! Each emitter keeps a high-water sequence. The first poll of an emitter
//! only records its newest sequence; afterwards every VAA above the mark is
//! parsed and emitted in sequence order. An emitter with no VAAs at the first
//! poll has no mark, so everything it publishes later is emitted, sequence 0
//! included.

use crate::{emit, DiscoveryError, DiscoveryInterface, Monitor};
use async_trait::async_trait;
use solver_chains::WormholeClient;
use solver_types::{ObservedVaa, SolverEvent, Vaa};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

type EmitterId = (u16, [u8; 32]);

/// Highest sequence seen per initialized emitter; `None` if it had none yet.
type HighWater = HashMap<EmitterId, Option<u64>>;

async fn poll_emitter(
	client: &dyn WormholeClient,
	emitter: &EmitterId,
	page_size: usize,
	high_water: &mut HighWater,
	sender: &mpsc::Sender<SolverEvent>,
) -> Result<usize, DiscoveryError> {
	let (chain, address) = emitter;
	let mut vaas = client.recent_vaas(*chain, address, page_size).await?;

	let Some(mark) = high_water.get(emitter).copied() else {
		let newest = vaas.iter().map(|vaa| vaa.sequence).max();
		debug!(chain, newest = ?newest, "VAA cursor initialized");
		high_water.insert(*emitter, newest);
		return Ok(0);
	};

	vaas.retain(|vaa| mark.map_or(true, |mark| vaa.sequence > mark));
	vaas.sort_by_key(|vaa| vaa.sequence);

	let mut emitted = 0;
	for signed in vaas {
		high_water.insert(*emitter, Some(signed.sequence));
		let vaa = match Vaa::parse(&signed.bytes) {
			Ok(vaa) => vaa,
			Err(e) => {
				warn!(chain, sequence = signed.sequence, error = %e, "Skipping malformed VAA");
				continue;
			}
		};
		debug!(chain, sequence = signed.sequence, "VAA observed");
		emit(
			sender,
			SolverEvent::VaaObserved(ObservedVaa {
				vaa,
				tx_hash: signed.tx_hash,
			}),
		)
		.await?;
		emitted += 1;
	}
	Ok(emitted)
}

/// Polls the guardian API for new VAAs from the configured emitters.
pub struct VaaDiscovery {
	client: Arc<dyn WormholeClient>,
	emitters: Vec<EmitterId>,
	interval: Duration,
	page_size: usize,
	high_water: Arc<Mutex<HighWater>>,
	monitor: Monitor,
}

impl VaaDiscovery {
	pub fn new(
		client: Arc<dyn WormholeClient>,
		emitters: Vec<(u16, [u8; 32])>,
		interval: Duration,
		page_size: usize,
	) -> Self {
		Self {
			client,
			emitters,
			interval,
			page_size: page_size.max(1),
			high_water: Arc::new(Mutex::new(HashMap::new())),
			monitor: Monitor::default(),
		}
	}
}

#[async_trait]
impl DiscoveryInterface for VaaDiscovery {
	fn name(&self) -> &'static str {
		"vaas"
	}

	async fn start_monitoring(
		&self,
		sender: mpsc::Sender<SolverEvent>,
	) -> Result<(), DiscoveryError> {
		let client = self.client.clone();
		let emitters = self.emitters.clone();
		let page_size = self.page_size;
		let high_water = self.high_water.clone();

		self.monitor
			.start(self.name(), self.interval, move || {
				let client = client.clone();
				let emitters = emitters.clone();
				let high_water = high_water.clone();
				let sender = sender.clone();
				async move {
					let mut high_water = high_water.lock().await;
					for emitter in &emitters {
						// One unreachable emitter must not starve the others.
						match poll_emitter(
							client.as_ref(),
							emitter,
							page_size,
							&mut high_water,
							&sender,
						)
						.await
						{
							Ok(_) => {}
							Err(DiscoveryError::ChannelClosed) => {
								return Err(DiscoveryError::ChannelClosed)
							}
							Err(e) => warn!(chain = emitter.0, error = %e, "VAA poll failed"),
						}
					}
					Ok(())
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
	use solver_chains::{ChainError, SignedVaa};
	use solver_types::VaaBody;
	use std::collections::VecDeque;

	#[derive(Default)]
	struct MockWormhole {
		pages: std::sync::Mutex<VecDeque<Vec<SignedVaa>>>,
	}

	#[async_trait]
	impl WormholeClient for MockWormhole {
		async fn get_vaa(
			&self,
			_: u16,
			_: &[u8; 32],
			_: u64,
		) -> Result<Option<SignedVaa>, ChainError> {
			Ok(None)
		}

		async fn recent_vaas(
			&self,
			_: u16,
			_: &[u8; 32],
			_: usize,
		) -> Result<Vec<SignedVaa>, ChainError> {
			self.pages
				.lock()
				.unwrap()
				.pop_front()
				.ok_or_else(|| ChainError::Network("unreachable".to_string()))
		}
	}

	fn signed(sequence: u64) -> SignedVaa {
		let vaa = Vaa {
			version: 1,
			guardian_set_index: 4,
			signatures: vec![],
			body: VaaBody {
				timestamp: 1_700_000_000,
				nonce: 0,
				emitter_chain: 6,
				emitter_address: [0xaa; 32],
				sequence,
				consistency_level: 1,
				payload: vec![11, 0, 1],
			},
		};
		SignedVaa {
			sequence,
			bytes: vaa.serialize(),
			tx_hash: Some(format!("0x{:064x}", sequence)),
		}
	}

	#[tokio::test]
	async fn test_emits_only_new_sequences_in_order() {
		let client = MockWormhole::default();
		client
			.pages
			.lock()
			.unwrap()
			.extend([vec![signed(10), signed(9)], vec![signed(13), signed(11), signed(12), signed(10)]]);

		let emitter = (6u16, [0xaa; 32]);
		let mut high_water = HashMap::new();
		let (tx, mut rx) = mpsc::channel(16);

		let first = poll_emitter(&client, &emitter, 50, &mut high_water, &tx)
			.await
			.unwrap();
		assert_eq!(first, 0);
		assert_eq!(high_water.get(&emitter), Some(&Some(10)));

		let second = poll_emitter(&client, &emitter, 50, &mut high_water, &tx)
			.await
			.unwrap();
		assert_eq!(second, 3);
		assert_eq!(high_water.get(&emitter), Some(&Some(13)));

		let mut sequences = Vec::new();
		while let Ok(SolverEvent::VaaObserved(observed)) = rx.try_recv() {
			assert!(observed.tx_hash.is_some());
			sequences.push(observed.vaa.body.sequence);
		}
		assert_eq!(sequences, vec![11, 12, 13]);
	}

	#[tokio::test]
	async fn test_malformed_vaa_is_skipped_but_advances_mark() {
		let client = MockWormhole::default();
		let mut broken = signed(21);
		broken.bytes.truncate(10);
		client
			.pages
			.lock()
			.unwrap()
			.extend([vec![signed(20)], vec![broken, signed(22)]]);

		let emitter = (6u16, [0xaa; 32]);
		let mut high_water = HashMap::new();
		let (tx, mut rx) = mpsc::channel(16);

		poll_emitter(&client, &emitter, 50, &mut high_water, &tx)
			.await
			.unwrap();
		let emitted = poll_emitter(&client, &emitter, 50, &mut high_water, &tx)
			.await
			.unwrap();

		assert_eq!(emitted, 1);
		assert_eq!(high_water.get(&emitter), Some(&Some(22)));
		match rx.try_recv().unwrap() {
			SolverEvent::VaaObserved(observed) => assert_eq!(observed.vaa.body.sequence, 22),
			other => panic!("unexpected event {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_first_vaa_of_quiet_emitter_is_emitted() {
		let client = MockWormhole::default();
		client
			.pages
			.lock()
			.unwrap()
			.extend([vec![], vec![signed(0)], vec![signed(1), signed(0)]]);

		let emitter = (6u16, [0xaa; 32]);
		let mut high_water = HashMap::new();
		let (tx, mut rx) = mpsc::channel(16);

		let first = poll_emitter(&client, &emitter, 50, &mut high_water, &tx)
			.await
			.unwrap();
		assert_eq!(first, 0);
		assert_eq!(high_water.get(&emitter), Some(&None));

		let second = poll_emitter(&client, &emitter, 50, &mut high_water, &tx)
			.await
			.unwrap();
		assert_eq!(second, 1);
		assert_eq!(high_water.get(&emitter), Some(&Some(0)));

		let third = poll_emitter(&client, &emitter, 50, &mut high_water, &tx)
			.await
			.unwrap();
		assert_eq!(third, 1);

		let mut sequences = Vec::new();
		while let Ok(SolverEvent::VaaObserved(observed)) = rx.try_recv() {
			sequences.push(observed.vaa.body.sequence);
		}
		assert_eq!(sequences, vec![0, 1]);
	}

	#[tokio::test]
	async fn test_unreachable_api_is_transient() {
		let client = MockWormhole::default();
		let emitter = (2u16, [0xbb; 32]);
		let mut high_water = HashMap::new();
		let (tx, _rx) = mpsc::channel(1);

		let result = poll_emitter(&client, &emitter, 50, &mut high_water, &tx).await;
		assert!(matches!(result, Err(DiscoveryError::Chain(ChainError::Network(_)))));
		assert!(high_water.is_empty());
	}
}
