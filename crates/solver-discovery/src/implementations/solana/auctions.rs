//! Matching-engine event discovery.
//!
//! Anchor programs emit events as `Program data: <base64>` log lines. The
//! poller walks the program's signature history forward from the newest
//! signature it has processed and decodes every `AuctionUpdated` it finds.

use crate::{emit, DiscoveryError, DiscoveryInterface, Monitor};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use solver_chains::ChainClient;
use solver_types::{AuctionUpdated, Pubkey, Signature, SolverEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

const PROGRAM_DATA_PREFIX: &str = "Program data: ";

/// Decodes every `AuctionUpdated` event in a transaction's logs.
///
/// Lines that are not events, or are other events, are skipped. A line that
/// carries the right discriminator but fails to decode is logged and dropped.
pub fn parse_auction_events(logs: &[String]) -> Vec<AuctionUpdated> {
	logs.iter()
		.filter_map(|line| line.strip_prefix(PROGRAM_DATA_PREFIX))
		.filter_map(|encoded| BASE64.decode(encoded.trim()).ok())
		.filter_map(|data| match AuctionUpdated::try_from_event_data(&data) {
			Ok(event) => event,
			Err(e) => {
				warn!(error = %e, "Malformed AuctionUpdated event");
				None
			}
		})
		.collect()
}

/// Position in the program's signature history.
#[derive(Debug, Default)]
struct SignatureCursor {
	initialized: bool,
	newest: Option<Signature>,
}

/// One polling round. Returns the number of events emitted.
///
/// The first round only records the newest signature: history from before
/// startup is not replayed. Signatures are then processed oldest first, and
/// the cursor only advances past transactions whose logs were read.
async fn poll_auction_events(
	chain: &dyn ChainClient,
	program: &Pubkey,
	page_size: usize,
	cursor: &mut SignatureCursor,
	sender: &mpsc::Sender<SolverEvent>,
) -> Result<usize, DiscoveryError> {
	let signatures = chain
		.get_signatures_for_address(program, cursor.newest.as_ref(), page_size)
		.await?;

	if !cursor.initialized {
		cursor.initialized = true;
		cursor.newest = signatures.first().map(|info| info.signature);
		debug!(newest = ?cursor.newest, "Auction event cursor initialized");
		return Ok(0);
	}

	if signatures.len() >= page_size {
		warn!(
			page_size,
			"Signature page is full; older auction events may have been missed"
		);
	}

	let mut emitted = 0;
	for info in signatures.iter().rev() {
		if !info.failed {
			let Some(logs) = chain.get_transaction_logs(&info.signature).await? else {
				debug!(signature = %info.signature, "Transaction not yet available");
				break;
			};
			for event in parse_auction_events(&logs) {
				debug!(
					auction = %event.auction,
					end_slot = event.end_slot,
					best_offer_token = %event.best_offer_token,
					"Auction updated"
				);
				emit(sender, SolverEvent::AuctionUpdated(event)).await?;
				emitted += 1;
			}
		}
		cursor.newest = Some(info.signature);
	}

	Ok(emitted)
}

/// Polls the matching engine for `AuctionUpdated` events.
pub struct AuctionEventDiscovery {
	chain: Arc<dyn ChainClient>,
	program: Pubkey,
	interval: Duration,
	page_size: usize,
	cursor: Arc<Mutex<SignatureCursor>>,
	monitor: Monitor,
}

impl AuctionEventDiscovery {
	pub fn new(
		chain: Arc<dyn ChainClient>,
		program: Pubkey,
		interval: Duration,
		page_size: usize,
	) -> Self {
		Self {
			chain,
			program,
			interval,
			page_size: page_size.max(1),
			cursor: Arc::new(Mutex::new(SignatureCursor::default())),
			monitor: Monitor::default(),
		}
	}
}

#[async_trait]
impl DiscoveryInterface for AuctionEventDiscovery {
	fn name(&self) -> &'static str {
		"auction-events"
	}

	async fn start_monitoring(
		&self,
		sender: mpsc::Sender<SolverEvent>,
	) -> Result<(), DiscoveryError> {
		let chain = self.chain.clone();
		let program = self.program;
		let page_size = self.page_size;
		let cursor = self.cursor.clone();

		self.monitor
			.start(self.name(), self.interval, move || {
				let chain = chain.clone();
				let cursor = cursor.clone();
				let sender = sender.clone();
				async move {
					let mut cursor = cursor.lock().await;
					poll_auction_events(chain.as_ref(), &program, page_size, &mut cursor, &sender)
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
	use solver_chains::SignatureInfo;
	use solver_types::{anchor_discriminator, MessageProtocol};

	fn event(end_slot: u64) -> AuctionUpdated {
		AuctionUpdated {
			config_id: 1,
			auction: Pubkey::new_from_array([7u8; 32]),
			vaa: Some(Pubkey::new_from_array([8u8; 32])),
			source_chain: 6,
			target_protocol: MessageProtocol::Cctp { domain: 3 },
			end_slot,
			best_offer_token: Pubkey::new_from_array([9u8; 32]),
			token_balance_before: 5_000_000,
			amount_in: 1_000_000,
			total_deposit: 1_100_000,
			max_offer_price_allowed: 980_000,
		}
	}

	fn event_line(event: &AuctionUpdated) -> String {
		let mut data = anchor_discriminator("event", AuctionUpdated::NAME).to_vec();
		data.extend(borsh::to_vec(event).unwrap());
		format!("{}{}", PROGRAM_DATA_PREFIX, BASE64.encode(data))
	}

	fn info(byte: u8, failed: bool) -> SignatureInfo {
		SignatureInfo {
			signature: Signature::from([byte; 64]),
			slot: u64::from(byte),
			failed,
		}
	}

	#[test]
	fn test_parse_auction_events_filters_lines() {
		let other_event = {
			let mut data = anchor_discriminator("event", "OrderExecuted").to_vec();
			data.extend([0u8; 16]);
			format!("{}{}", PROGRAM_DATA_PREFIX, BASE64.encode(data))
		};
		let logs = vec![
			"Program log: Instruction: ImproveOffer".to_string(),
			other_event,
			event_line(&event(120)),
			format!("{}not-base64", PROGRAM_DATA_PREFIX),
		];

		let events = parse_auction_events(&logs);
		assert_eq!(events, vec![event(120)]);
	}

	#[tokio::test]
	async fn test_first_poll_only_records_cursor() {
		let chain = MockChain::default();
		chain.push_signatures(vec![info(2, false), info(1, false)]);
		chain.set_logs(Signature::from([2u8; 64]), vec![event_line(&event(100))]);

		let (tx, mut rx) = mpsc::channel(8);
		let mut cursor = SignatureCursor::default();
		let program = Pubkey::new_from_array([1u8; 32]);

		let emitted = poll_auction_events(&chain, &program, 50, &mut cursor, &tx)
			.await
			.unwrap();

		assert_eq!(emitted, 0);
		assert_eq!(cursor.newest, Some(Signature::from([2u8; 64])));
		assert!(rx.try_recv().is_err());
	}

	#[tokio::test]
	async fn test_new_signatures_are_processed_oldest_first() {
		let chain = MockChain::default();
		chain.push_signatures(vec![]);
		chain.push_signatures(vec![info(4, false), info(3, true), info(2, false)]);
		chain.set_logs(Signature::from([2u8; 64]), vec![event_line(&event(100))]);
		chain.set_logs(Signature::from([3u8; 64]), vec![event_line(&event(999))]);
		chain.set_logs(Signature::from([4u8; 64]), vec![event_line(&event(105))]);

		let (tx, mut rx) = mpsc::channel(8);
		let mut cursor = SignatureCursor::default();
		let program = Pubkey::new_from_array([1u8; 32]);

		poll_auction_events(&chain, &program, 50, &mut cursor, &tx)
			.await
			.unwrap();
		let emitted = poll_auction_events(&chain, &program, 50, &mut cursor, &tx)
			.await
			.unwrap();

		// The failed transaction's logs are never read.
		assert_eq!(emitted, 2);
		let slots: Vec<u64> = [rx.recv().await.unwrap(), rx.recv().await.unwrap()]
			.into_iter()
			.map(|e| match e {
				SolverEvent::AuctionUpdated(update) => update.end_slot,
				other => panic!("unexpected event {:?}", other),
			})
			.collect();
		assert_eq!(slots, vec![100, 105]);
		assert_eq!(cursor.newest, Some(Signature::from([4u8; 64])));
	}

	#[tokio::test]
	async fn test_cursor_stops_at_unavailable_transaction() {
		let chain = MockChain::default();
		chain.push_signatures(vec![]);
		chain.push_signatures(vec![info(6, false), info(5, false)]);
		chain.set_logs(Signature::from([5u8; 64]), vec![event_line(&event(110))]);

		let (tx, _rx) = mpsc::channel(8);
		let mut cursor = SignatureCursor::default();
		let program = Pubkey::new_from_array([1u8; 32]);

		poll_auction_events(&chain, &program, 50, &mut cursor, &tx)
			.await
			.unwrap();
		let emitted = poll_auction_events(&chain, &program, 50, &mut cursor, &tx)
			.await
			.unwrap();

		assert_eq!(emitted, 1);
		assert_eq!(cursor.newest, Some(Signature::from([5u8; 64])));
	}
}
