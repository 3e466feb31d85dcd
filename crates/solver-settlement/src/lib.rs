//! Settlement correlation.
//!
//! A finalized VAA (the slow leg) proves that CCTP moved the funds for a
//! fast order. [`SettlementService::settle`] pairs it with its fast leg,
//! checks that the auction is ours and completed, locates the CCTP message
//! in the source transaction, waits for Circle's attestation and prepares
//! `prepare_order_response_cctp` + `settle_auction_complete`.
//!
//! Fetches are retried through [`RetryPolicy`]; parse and validation
//! failures abort the attempt immediately.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solver_chains::{ChainClient, ChainError, RetryPolicy, SourceChainRegistry, WormholeClient};
use solver_order::{MatchingEngineInstructions, OrderError, SettleOrder};
use solver_types::{
	keccak256, Auction, AuctionStatus, Classify, CodecError, ComputeBudget, ErrorClass,
	LayoutError, LiquidityLayerMessage, MessageLayout, ObservedVaa, PreparedTransaction, Pubkey,
	TransactionType, Vaa,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub mod implementations;
pub mod logs;

pub use implementations::iris::IrisClient;
pub use logs::find_cctp_message;

#[derive(Debug, Error)]
pub enum SettlementError {
	#[error("Chain error: {0}")]
	Chain(#[from] ChainError),
	#[error("Order error: {0}")]
	Order(#[from] OrderError),
	#[error("Message error: {0}")]
	Codec(#[from] CodecError),
	#[error("Account layout error: {0}")]
	Layout(#[from] LayoutError),
	#[error("Network error: {0}")]
	Network(String),
	#[error("Malformed data: {0}")]
	Malformed(String),
	#[error("{0} not available yet")]
	Pending(&'static str),
}

impl Classify for SettlementError {
	fn class(&self) -> ErrorClass {
		match self {
			Self::Chain(e) => e.class(),
			Self::Order(e) => e.class(),
			Self::Network(_) | Self::Pending(_) => ErrorClass::Transient,
			Self::Codec(_) | Self::Layout(_) | Self::Malformed(_) => ErrorClass::DataIntegrity,
		}
	}
}

/// Circle attestation service.
#[async_trait]
pub trait CircleClient: Send + Sync {
	/// Attestation for the CCTP message with this keccak256 hash; `None`
	/// until its status is `complete`.
	async fn get_attestation(
		&self,
		message_hash: &[u8; 32],
	) -> Result<Option<Vec<u8>>, SettlementError>;
}

/// Why a settlement attempt stopped without a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbandonReason {
	NoAuction,
	NotOurs { best_offer_token: Option<Pubkey> },
	NotCompleted,
	AlreadySettled,
	VaaNotPosted,
}

impl fmt::Display for AbandonReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::NoAuction => f.write_str("no auction for fast order"),
			Self::NotOurs { best_offer_token } => match best_offer_token {
				Some(token) => write!(f, "best offer held by {}", token),
				None => f.write_str("auction has no best offer"),
			},
			Self::NotCompleted => f.write_str("auction not completed"),
			Self::AlreadySettled => f.write_str("auction already settled"),
			Self::VaaNotPosted => f.write_str("vaa not posted"),
		}
	}
}

#[derive(Debug, Clone)]
pub enum SettlementOutcome {
	Ready(PreparedTransaction),
	Abandoned {
		auction: Option<Pubkey>,
		reason: AbandonReason,
	},
}

/// Identity, budgets and retry policies for settlement.
#[derive(Debug, Clone)]
pub struct SettlementSettings {
	pub payer: Pubkey,
	/// Receives the base fee.
	pub base_fee_token: Pubkey,
	pub own_offer_tokens: Vec<Pubkey>,
	/// Durable nonce used for settlement transactions.
	pub nonce_account: Option<Pubkey>,
	pub compute_budget: ComputeBudget,
	pub vaa_retry: RetryPolicy,
	pub attestation_retry: RetryPolicy,
	/// Waiting for VAAs to be posted on the destination chain.
	pub posted_retry: RetryPolicy,
	pub rpc_retry: RetryPolicy,
}

impl SettlementSettings {
	pub fn new(payer: Pubkey, base_fee_token: Pubkey, own_offer_tokens: Vec<Pubkey>) -> Self {
		Self {
			payer,
			base_fee_token,
			own_offer_tokens,
			nonce_account: None,
			compute_budget: ComputeBudget {
				unit_limit: 300_000,
				unit_price_micro_lamports: 0,
			},
			vaa_retry: RetryPolicy::exponential(
				Duration::from_millis(500),
				Duration::from_secs(30),
				2.0,
				Some(10),
			),
			attestation_retry: RetryPolicy::exponential(
				Duration::from_secs(1),
				Duration::from_secs(30),
				2.0,
				None,
			),
			posted_retry: RetryPolicy::exponential(
				Duration::from_secs(1),
				Duration::from_secs(10),
				2.0,
				Some(8),
			),
			rpc_retry: RetryPolicy::rpc_default(),
		}
	}
}

/// External services the correlator reads from.
#[derive(Clone)]
pub struct SettlementClients {
	pub chain: Arc<dyn ChainClient>,
	pub wormhole: Arc<dyn WormholeClient>,
	pub circle: Arc<dyn CircleClient>,
	pub sources: Arc<SourceChainRegistry>,
}

pub struct SettlementService {
	clients: SettlementClients,
	instructions: MatchingEngineInstructions,
	layout: MessageLayout,
	settings: SettlementSettings,
}

impl SettlementService {
	pub fn new(
		clients: SettlementClients,
		instructions: MatchingEngineInstructions,
		layout: MessageLayout,
		settings: SettlementSettings,
	) -> Self {
		Self {
			clients,
			instructions,
			layout,
			settings,
		}
	}

	async fn fetch_fast_vaa(
		&self,
		chain: u16,
		emitter: &[u8; 32],
		sequence: u64,
	) -> Result<Vaa, SettlementError> {
		let signed = self
			.clients
			.wormhole
			.get_vaa(chain, emitter, sequence)
			.await?
			.ok_or(SettlementError::Pending("fast VAA"))?;
		if signed.tx_hash.is_none() {
			return Err(SettlementError::Pending("fast VAA source transaction"));
		}
		Ok(Vaa::parse(&signed.bytes)?)
	}

	/// Source transaction of a VAA, once the guardian API has indexed it.
	async fn fetch_source_transaction(
		&self,
		chain: u16,
		emitter: &[u8; 32],
		sequence: u64,
	) -> Result<String, SettlementError> {
		self.clients
			.wormhole
			.get_vaa(chain, emitter, sequence)
			.await?
			.and_then(|signed| signed.tx_hash)
			.ok_or(SettlementError::Pending("finalized VAA source transaction"))
	}

	async fn fetch_auction(&self, address: &Pubkey) -> Result<Option<Auction>, SettlementError> {
		match self.clients.chain.get_account_data(address).await? {
			Some(data) => Ok(Some(Auction::try_from_account_data(&data)?)),
			None => Ok(None),
		}
	}

	async fn require_posted(&self, address: &Pubkey) -> Result<(), SettlementError> {
		match self.clients.chain.get_account_data(address).await? {
			Some(_) => Ok(()),
			None => Err(SettlementError::Pending("posted VAA")),
		}
	}

	async fn fetch_attestation(&self, message_hash: &[u8; 32]) -> Result<Vec<u8>, SettlementError> {
		self.clients
			.circle
			.get_attestation(message_hash)
			.await?
			.ok_or(SettlementError::Pending("CCTP attestation"))
	}

	/// Checks that the auction is completed with one of our tokens holding
	/// the best offer; `Err` carries the reason to abandon.
	fn check_settleable(&self, auction: Option<&Auction>) -> Result<Pubkey, AbandonReason> {
		let auction = auction.ok_or(AbandonReason::NoAuction)?;
		let best_offer_token = auction.best_offer_token();
		match best_offer_token {
			Some(token) if self.settings.own_offer_tokens.contains(&token) => {}
			_ => return Err(AbandonReason::NotOurs { best_offer_token }),
		}
		match auction.status {
			AuctionStatus::Completed { .. } => Ok(best_offer_token.unwrap_or_default()),
			AuctionStatus::Settled { .. } => Err(AbandonReason::AlreadySettled),
			AuctionStatus::NotStarted | AuctionStatus::Active => Err(AbandonReason::NotCompleted),
		}
	}

	fn abandon(auction: Option<Pubkey>, sequence: u64, reason: AbandonReason) -> SettlementOutcome {
		match &auction {
			Some(auction) => info!(%auction, sequence, reason = %reason, "Settlement abandoned"),
			None => info!(sequence, reason = %reason, "Settlement abandoned"),
		}
		SettlementOutcome::Abandoned { auction, reason }
	}

	/// Prepares the settlement of the auction behind a finalized VAA.
	pub async fn settle(&self, finalized: &ObservedVaa) -> Result<SettlementOutcome, SettlementError> {
		let vaa = &finalized.vaa;
		let source_chain = vaa.body.emitter_chain;
		let emitter = vaa.body.emitter_address;
		let sequence = vaa.body.sequence;

		let deposit = match self.layout.decode(&vaa.body.payload)? {
			LiquidityLayerMessage::CctpDeposit(deposit) if deposit.slow_order_response().is_some() => {
				deposit
			}
			_ => {
				return Err(SettlementError::Malformed(format!(
					"VAA {} is not a slow order response",
					sequence
				)))
			}
		};
		let tx_hash = match &finalized.tx_hash {
			Some(hash) => hash.clone(),
			None => {
				self.settings
					.vaa_retry
					.retry("fetch_source_transaction", || {
						self.fetch_source_transaction(source_chain, &emitter, sequence)
					})
					.await?
			}
		};

		// The fast leg is published right after the finalized one.
		let fast_sequence = sequence
			.checked_add(1)
			.ok_or_else(|| SettlementError::Malformed("Sequence overflow".to_string()))?;
		let fast = self
			.settings
			.vaa_retry
			.retry("fetch_fast_vaa", || {
				self.fetch_fast_vaa(source_chain, &emitter, fast_sequence)
			})
			.await?;
		let order = self
			.layout
			.decode(&fast.body.payload)?
			.as_fast_market_order()
			.cloned()
			.ok_or_else(|| {
				SettlementError::Malformed(format!("VAA {} is not a fast order", fast_sequence))
			})?;

		let auction = self.instructions.auction(&fast.digest())?;
		let state = self
			.settings
			.rpc_retry
			.retry("fetch_auction", || self.fetch_auction(&auction))
			.await?;
		if let Err(reason) = self.check_settleable(state.as_ref()) {
			return Ok(Self::abandon(Some(auction), sequence, reason));
		}
		debug!(%auction, sequence, "Auction completed with our offer, correlating");

		let source = self.clients.sources.get_required(source_chain)?;
		let logs = self
			.settings
			.rpc_retry
			.retry("fetch_source_logs", || source.get_transaction_logs(&tx_hash))
			.await?;
		let cctp_message = find_cctp_message(&logs, &emitter, sequence)?;
		let cctp_hash = keccak256(&cctp_message);
		debug!(%auction, cctp_hash = %hex::encode(cctp_hash), "Waiting for CCTP attestation");

		let cctp_attestation = self
			.settings
			.attestation_retry
			.retry("fetch_cctp_attestation", || self.fetch_attestation(&cctp_hash))
			.await?;

		let fast_vaa = self.instructions.posted_vaa(&fast.message_hash())?;
		let finalized_vaa = self.instructions.posted_vaa(&vaa.message_hash())?;
		for posted in [fast_vaa, finalized_vaa] {
			match self
				.settings
				.posted_retry
				.retry("wait_posted_vaa", || self.require_posted(&posted))
				.await
			{
				Ok(()) => {}
				Err(SettlementError::Pending(_)) => {
					return Ok(Self::abandon(Some(auction), sequence, AbandonReason::VaaNotPosted));
				}
				Err(e) => return Err(e),
			}
		}

		// Attestation polling may take minutes; check the auction again.
		let state = self
			.settings
			.rpc_retry
			.retry("fetch_auction", || self.fetch_auction(&auction))
			.await?;
		let best_offer_token = match self.check_settleable(state.as_ref()) {
			Ok(token) => token,
			Err(reason) => return Ok(Self::abandon(Some(auction), sequence, reason)),
		};

		let instructions = self.instructions.settle_auction_cctp(&SettleOrder {
			payer: self.settings.payer,
			auction,
			best_offer_token,
			base_fee_token: self.settings.base_fee_token,
			fast_vaa,
			fast_vaa_hash: fast.message_hash(),
			finalized_vaa,
			source_chain,
			target_chain: order.target_chain,
			source_domain: deposit.source_cctp_domain,
			cctp_nonce: deposit.cctp_nonce,
			burn_token: deposit.token_address,
			cctp_message,
			cctp_attestation,
		})?;

		info!(%auction, sequence, "Settlement prepared");
		Ok(SettlementOutcome::Ready(PreparedTransaction {
			tx_type: TransactionType::SettleAuction,
			auction,
			instructions,
			signers: vec![self.settings.payer],
			compute_budget: self.settings.compute_budget,
			nonce_account: self.settings.nonce_account,
			skip_preflight: false,
		}))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::primitives::{Address, U256};
	use solver_chains::{
		LatestBlockhash, SignatureInfo, SignatureStatus, SignedVaa, SourceChainClient, SourceLog,
	};
	use solver_order::CctpPrograms;
	use solver_types::{
		anchor_discriminator, AmountWidth, AuctionInfo, Blockhash, CctpDeposit, DepositPayload,
		FastMarketOrder, MessageProtocol, ProgramAddresses, Signature, SlowOrderResponse,
		Transaction, VaaBody,
	};
	use std::collections::HashMap;
	use std::sync::atomic::{AtomicU32, Ordering};
	use std::sync::Mutex;

	const LAYOUT: MessageLayout = MessageLayout {
		fast_fill_amount: AmountWidth::U64,
	};
	const PAYER: Pubkey = Pubkey::new_from_array([10u8; 32]);
	const OFFER_TOKEN: Pubkey = Pubkey::new_from_array([11u8; 32]);

	fn router() -> Address {
		Address::repeat_byte(0x11)
	}

	#[derive(Default)]
	struct MockChain {
		accounts: Mutex<HashMap<Pubkey, Vec<u8>>>,
	}

	impl MockChain {
		fn set(&self, address: Pubkey, data: Vec<u8>) {
			self.accounts.lock().unwrap().insert(address, data);
		}
	}

	#[async_trait]
	impl ChainClient for MockChain {
		async fn get_slot(&self) -> Result<u64, ChainError> {
			Ok(0)
		}

		async fn get_latest_blockhash(&self) -> Result<LatestBlockhash, ChainError> {
			Ok(LatestBlockhash {
				blockhash: Blockhash::new_from_array([0u8; 32]),
				last_valid_block_height: 0,
			})
		}

		async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, ChainError> {
			Ok(self.accounts.lock().unwrap().get(address).cloned())
		}

		async fn get_token_balance(&self, _: &Pubkey) -> Result<u64, ChainError> {
			Ok(0)
		}

		async fn send_transaction(
			&self,
			_: &Transaction,
			_: bool,
		) -> Result<Signature, ChainError> {
			Err(ChainError::InvalidInput("not used".to_string()))
		}

		async fn get_signature_status(
			&self,
			_: &Signature,
		) -> Result<Option<SignatureStatus>, ChainError> {
			Ok(None)
		}

		async fn get_signatures_for_address(
			&self,
			_: &Pubkey,
			_: Option<&Signature>,
			_: usize,
		) -> Result<Vec<SignatureInfo>, ChainError> {
			Ok(vec![])
		}

		async fn get_transaction_logs(
			&self,
			_: &Signature,
		) -> Result<Option<Vec<String>>, ChainError> {
			Ok(None)
		}

		async fn get_nonce_blockhash(&self, _: &Pubkey) -> Result<Blockhash, ChainError> {
			Err(ChainError::InvalidInput("not used".to_string()))
		}
	}

	/// Serves the fast VAA after `not_ready` empty answers, and the finalized
	/// VAA without its source transaction for `unindexed` answers.
	struct MockWormhole {
		fast: SignedVaa,
		not_ready: AtomicU32,
		finalized: SignedVaa,
		unindexed: AtomicU32,
		finalized_lookups: AtomicU32,
	}

	#[async_trait]
	impl WormholeClient for MockWormhole {
		async fn get_vaa(
			&self,
			_: u16,
			_: &[u8; 32],
			sequence: u64,
		) -> Result<Option<SignedVaa>, ChainError> {
			if sequence == self.finalized.sequence {
				self.finalized_lookups.fetch_add(1, Ordering::SeqCst);
				let mut finalized = self.finalized.clone();
				if self.unindexed.load(Ordering::SeqCst) > 0 {
					self.unindexed.fetch_sub(1, Ordering::SeqCst);
					finalized.tx_hash = None;
				}
				return Ok(Some(finalized));
			}
			if sequence != self.fast.sequence {
				return Ok(None);
			}
			if self.not_ready.load(Ordering::SeqCst) > 0 {
				self.not_ready.fetch_sub(1, Ordering::SeqCst);
				return Ok(None);
			}
			Ok(Some(self.fast.clone()))
		}

		async fn recent_vaas(
			&self,
			_: u16,
			_: &[u8; 32],
			_: usize,
		) -> Result<Vec<SignedVaa>, ChainError> {
			Ok(vec![])
		}
	}

	#[derive(Default)]
	struct MockCircle {
		calls: AtomicU32,
	}

	#[async_trait]
	impl CircleClient for MockCircle {
		async fn get_attestation(&self, _: &[u8; 32]) -> Result<Option<Vec<u8>>, SettlementError> {
			// Pending once, then complete.
			if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
				Ok(None)
			} else {
				Ok(Some(vec![0xaa; 130]))
			}
		}
	}

	struct MockSource {
		logs: Vec<SourceLog>,
	}

	#[async_trait]
	impl SourceChainClient for MockSource {
		fn chain(&self) -> u16 {
			2
		}

		async fn get_transaction_logs(&self, _: &str) -> Result<Vec<SourceLog>, ChainError> {
			Ok(self.logs.clone())
		}
	}

	fn vaa(sequence: u64, message: LiquidityLayerMessage) -> Vaa {
		Vaa {
			version: 1,
			guardian_set_index: 4,
			signatures: vec![],
			body: VaaBody {
				timestamp: 1_700_000_000,
				nonce: 0,
				emitter_chain: 2,
				emitter_address: router().into_word().0,
				sequence,
				consistency_level: 1,
				payload: LAYOUT.encode(&message).unwrap(),
			},
		}
	}

	fn finalized_vaa() -> ObservedVaa {
		ObservedVaa {
			vaa: vaa(
				41,
				LiquidityLayerMessage::CctpDeposit(CctpDeposit {
					token_address: [0x22; 32],
					amount: U256::from(1_000_000u64),
					source_cctp_domain: 0,
					destination_cctp_domain: 5,
					cctp_nonce: 12_345,
					burn_source: [0x33; 32],
					mint_recipient: [0x44; 32],
					payload: DepositPayload::SlowOrderResponse(SlowOrderResponse { base_fee: 500 }),
				}),
			),
			tx_hash: Some(format!("0x{}", "ab".repeat(32))),
		}
	}

	fn fast_vaa() -> Vaa {
		vaa(
			42,
			LiquidityLayerMessage::FastMarketOrder(FastMarketOrder {
				amount_in: 1_000_000,
				min_amount_out: 0,
				target_chain: 2,
				redeemer: [0u8; 32],
				sender: [0u8; 32],
				refund_address: [0u8; 32],
				max_fee: 990_000,
				init_auction_fee: 100,
				deadline: 0,
				redeemer_message: vec![],
			}),
		)
	}

	fn auction_account(status: AuctionStatus, best_offer_token: Pubkey) -> Vec<u8> {
		let auction = Auction {
			bump: 255,
			vaa_hash: [0u8; 32],
			vaa_timestamp: 0,
			target_protocol: MessageProtocol::Cctp { domain: 5 },
			status,
			prepared_by: Pubkey::default(),
			info: Some(AuctionInfo {
				config_id: 0,
				custody_token_bump: 254,
				vaa_sequence: 42,
				source_chain: 2,
				best_offer_token,
				initial_offer_token: best_offer_token,
				start_slot: 90,
				amount_in: 1_000_000,
				security_deposit: 0,
				offer_price: 989_800,
				redeemer_message_len: 0,
			}),
		};
		let mut data = anchor_discriminator("account", "Auction").to_vec();
		data.extend(borsh::to_vec(&auction).unwrap());
		data
	}

	fn instructions() -> MatchingEngineInstructions {
		MatchingEngineInstructions::new(
			ProgramAddresses {
				matching_engine: Pubkey::new_from_array([1u8; 32]),
				core_bridge: Pubkey::new_from_array([2u8; 32]),
			},
			CctpPrograms {
				token_messenger_minter: Pubkey::new_from_array([3u8; 32]),
				message_transmitter: Pubkey::new_from_array([4u8; 32]),
			},
			Pubkey::new_from_array([5u8; 32]),
		)
	}

	fn fast_policy(max_attempts: Option<u32>) -> RetryPolicy {
		RetryPolicy::exponential(
			Duration::from_millis(1),
			Duration::from_millis(2),
			2.0,
			max_attempts,
		)
	}

	struct Harness {
		chain: Arc<MockChain>,
		wormhole: Arc<MockWormhole>,
		circle: Arc<MockCircle>,
		service: SettlementService,
		auction: Pubkey,
	}

	fn harness(logs: Vec<SourceLog>) -> Harness {
		let fast = fast_vaa();
		let chain = Arc::new(MockChain::default());
		let circle = Arc::new(MockCircle::default());
		let mut sources = SourceChainRegistry::new();
		sources.register(Arc::new(MockSource { logs })).unwrap();

		let instructions = instructions();
		let auction = instructions.auction(&fast.digest()).unwrap();
		// Both legs posted.
		chain.set(
			instructions.posted_vaa(&fast.message_hash()).unwrap(),
			b"vaa".to_vec(),
		);
		chain.set(
			instructions
				.posted_vaa(&finalized_vaa().vaa.message_hash())
				.unwrap(),
			b"vaa".to_vec(),
		);

		let mut settings = SettlementSettings::new(PAYER, OFFER_TOKEN, vec![OFFER_TOKEN]);
		settings.nonce_account = Some(Pubkey::new_from_array([9u8; 32]));
		settings.vaa_retry = fast_policy(Some(5));
		settings.attestation_retry = fast_policy(None);
		settings.posted_retry = fast_policy(Some(2));
		settings.rpc_retry = fast_policy(Some(2));

		let wormhole = Arc::new(MockWormhole {
			fast: SignedVaa {
				sequence: 42,
				bytes: fast.serialize(),
				tx_hash: Some(format!("0x{}", "ab".repeat(32))),
			},
			not_ready: AtomicU32::new(2),
			finalized: SignedVaa {
				sequence: 41,
				bytes: finalized_vaa().vaa.serialize(),
				tx_hash: finalized_vaa().tx_hash,
			},
			unindexed: AtomicU32::new(0),
			finalized_lookups: AtomicU32::new(0),
		});

		let service = SettlementService::new(
			SettlementClients {
				chain: chain.clone(),
				wormhole: wormhole.clone(),
				circle: circle.clone(),
				sources: Arc::new(sources),
			},
			instructions,
			LAYOUT,
			settings,
		);

		Harness {
			chain,
			wormhole,
			circle,
			service,
			auction,
		}
	}

	fn source_logs() -> Vec<SourceLog> {
		vec![
			logs::tests::message_sent(b"cctp message"),
			logs::tests::published(router(), 41),
			logs::tests::published(router(), 42),
		]
	}

	#[tokio::test]
	async fn test_prepares_settlement_for_completed_auction() {
		let h = harness(source_logs());
		h.chain.set(
			h.auction,
			auction_account(
				AuctionStatus::Completed {
					slot: 120,
					execute_penalty: None,
				},
				OFFER_TOKEN,
			),
		);

		let outcome = h.service.settle(&finalized_vaa()).await.unwrap();
		match outcome {
			SettlementOutcome::Ready(tx) => {
				assert_eq!(tx.tx_type, TransactionType::SettleAuction);
				assert_eq!(tx.auction, h.auction);
				assert_eq!(tx.instructions.len(), 2);
				assert_eq!(tx.nonce_account, Some(Pubkey::new_from_array([9u8; 32])));
				assert!(!tx.skip_preflight);
			}
			other => panic!("expected settlement, got {:?}", other),
		}
		assert_eq!(h.circle.calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn test_source_transaction_is_fetched_when_missing() {
		let h = harness(source_logs());
		h.chain.set(
			h.auction,
			auction_account(
				AuctionStatus::Completed {
					slot: 120,
					execute_penalty: None,
				},
				OFFER_TOKEN,
			),
		);
		// Not indexed on the first lookup.
		h.wormhole.unindexed.store(1, Ordering::SeqCst);

		let mut observed = finalized_vaa();
		observed.tx_hash = None;

		let outcome = h.service.settle(&observed).await.unwrap();
		assert!(matches!(outcome, SettlementOutcome::Ready(_)));
		assert_eq!(h.wormhole.finalized_lookups.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn test_unindexed_source_transaction_stays_pending() {
		let h = harness(source_logs());
		h.wormhole.unindexed.store(u32::MAX, Ordering::SeqCst);

		let mut observed = finalized_vaa();
		observed.tx_hash = None;

		let err = h.service.settle(&observed).await.unwrap_err();
		assert!(matches!(err, SettlementError::Pending(_)));
		assert_eq!(err.class(), ErrorClass::Transient);
		// vaa_retry allows five attempts.
		assert_eq!(h.wormhole.finalized_lookups.load(Ordering::SeqCst), 5);
		assert_eq!(h.circle.calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn test_settled_auction_is_not_settled_twice() {
		let h = harness(source_logs());
		h.chain.set(
			h.auction,
			auction_account(
				AuctionStatus::Settled {
					fee: 500,
					total_penalty: None,
				},
				OFFER_TOKEN,
			),
		);

		for _ in 0..2 {
			let outcome = h.service.settle(&finalized_vaa()).await.unwrap();
			assert!(matches!(
				outcome,
				SettlementOutcome::Abandoned {
					reason: AbandonReason::AlreadySettled,
					..
				}
			));
		}
		// Abandoned before polling Circle.
		assert_eq!(h.circle.calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn test_abandons_when_auction_is_not_ours() {
		let h = harness(source_logs());
		let other = Pubkey::new_from_array([99u8; 32]);
		h.chain.set(
			h.auction,
			auction_account(
				AuctionStatus::Completed {
					slot: 120,
					execute_penalty: None,
				},
				other,
			),
		);

		let outcome = h.service.settle(&finalized_vaa()).await.unwrap();
		assert!(matches!(
			outcome,
			SettlementOutcome::Abandoned {
				reason: AbandonReason::NotOurs { best_offer_token: Some(token) },
				..
			} if token == other
		));
	}

	#[tokio::test]
	async fn test_abandons_without_auction_or_before_completion() {
		let h = harness(source_logs());
		let outcome = h.service.settle(&finalized_vaa()).await.unwrap();
		assert!(matches!(
			outcome,
			SettlementOutcome::Abandoned {
				reason: AbandonReason::NoAuction,
				..
			}
		));

		h.chain
			.set(h.auction, auction_account(AuctionStatus::Active, OFFER_TOKEN));
		let outcome = h.service.settle(&finalized_vaa()).await.unwrap();
		assert!(matches!(
			outcome,
			SettlementOutcome::Abandoned {
				reason: AbandonReason::NotCompleted,
				..
			}
		));
	}

	#[tokio::test]
	async fn test_missing_cctp_log_is_data_integrity() {
		let h = harness(vec![logs::tests::published(router(), 41)]);
		h.chain.set(
			h.auction,
			auction_account(
				AuctionStatus::Completed {
					slot: 120,
					execute_penalty: None,
				},
				OFFER_TOKEN,
			),
		);

		let err = h.service.settle(&finalized_vaa()).await.unwrap_err();
		assert_eq!(err.class(), ErrorClass::DataIntegrity);
	}

	#[tokio::test]
	async fn test_rejects_non_settlement_vaa() {
		let h = harness(source_logs());
		let observed = ObservedVaa {
			vaa: fast_vaa(),
			tx_hash: Some("0x01".to_string()),
		};

		let err = h.service.settle(&observed).await.unwrap_err();
		assert!(matches!(err, SettlementError::Malformed(_)));
		assert_eq!(err.class(), ErrorClass::DataIntegrity);
	}
}
