//! Offer decisions and matching-engine transactions.
//!
//! [`OrderService`] turns observed orders and auction updates into prepared
//! transactions. It gathers the on-chain context an [`OfferStrategy`] needs
//! (auction state, token balance), asks the strategy whether to offer, and
//! builds the instruction when it should.
//!
//! Economic skips are not errors: they come back as [`OfferOutcome::Skip`]
//! with the values that drove the decision, so callers can log and move on.

use serde::{Deserialize, Serialize};
use solver_chains::{ChainClient, ChainError, RetryPolicy, WormholeClient};
use solver_types::{
	security_deposit, Auction, AuctionStatus, AuctionUpdated, Classify, CodecError, ComputeBudget,
	ErrorClass, FastMarketOrder, LayoutError, MessageLayout, MessageProtocol, PostedVaa,
	PreparedTransaction, Pubkey, TransactionType, Vaa,
};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

pub mod implementations {
	pub mod matching_engine;
	pub mod strategies {
		pub mod fair_value;
	}
}

pub use implementations::matching_engine::{
	CctpPrograms, ExecuteOrder, ImproveOffer, InitialOffer, MatchingEngineInstructions,
	SettleOrder,
};
pub use implementations::strategies::fair_value::{
	fair_value, fair_value_with_edge, FairValueStrategy, PRECISION,
};

#[derive(Debug, Error)]
pub enum OrderError {
	#[error("Chain error: {0}")]
	Chain(#[from] ChainError),
	#[error("Account layout error: {0}")]
	Layout(#[from] LayoutError),
	#[error("Message error: {0}")]
	Codec(#[from] CodecError),
	#[error("Could not derive {0} address")]
	MissingAddress(&'static str),
	#[error("Unsupported target protocol: {0}")]
	UnsupportedProtocol(String),
	#[error("Invalid input: {0}")]
	InvalidInput(String),
	#[error("Waiting for {0}")]
	Pending(&'static str),
}

impl Classify for OrderError {
	fn class(&self) -> ErrorClass {
		match self {
			Self::Chain(e) => e.class(),
			Self::Layout(_) | Self::Codec(_) | Self::InvalidInput(_) => ErrorClass::DataIntegrity,
			Self::MissingAddress(_) | Self::UnsupportedProtocol(_) => ErrorClass::DataIntegrity,
			Self::Pending(_) => ErrorClass::Transient,
		}
	}
}

/// Which offer is being considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferKind {
	/// Start the auction.
	Initial,
	/// Beat the current best offer; offers are accepted through `end_slot`.
	Improve { end_slot: u64 },
}

/// Everything an [`OfferStrategy`] sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferContext {
	pub kind: OfferKind,
	pub source_chain: u16,
	pub amount_in: u64,
	/// Highest price the auction accepts: the order's max fee for an
	/// initial offer, the currently allowed price for an improvement.
	pub candidate_price: u64,
	pub security_deposit: u64,
	pub available_balance: u64,
	pub auction_started: bool,
	pub current_slot: u64,
}

/// Why no offer was made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
	NoPricing {
		source_chain: u16,
	},
	FeeTooLow {
		fair_value_with_edge: u64,
		candidate_price: u64,
	},
	AuctionAlreadyStarted,
	AuctionEnded {
		end_slot: u64,
		current_slot: u64,
	},
	InsufficientBalance {
		required: u64,
		available: u64,
	},
	/// The fast VAA has not been posted to the core bridge yet.
	VaaNotPosted,
}

impl fmt::Display for SkipReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::NoPricing { source_chain } => {
				write!(f, "no pricing for source chain {}", source_chain)
			}
			Self::FeeTooLow {
				fair_value_with_edge,
				candidate_price,
			} => write!(
				f,
				"fee too low: fair value with edge {} > {}",
				fair_value_with_edge, candidate_price
			),
			Self::AuctionAlreadyStarted => f.write_str("auction already started"),
			Self::AuctionEnded {
				end_slot,
				current_slot,
			} => write!(f, "auction ended at slot {} (now {})", end_slot, current_slot),
			Self::InsufficientBalance {
				required,
				available,
			} => write!(f, "insufficient balance: need {}, have {}", required, available),
			Self::VaaNotPosted => f.write_str("fast vaa not posted"),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfferDecision {
	Bid { offer_price: u64 },
	Skip(SkipReason),
}

/// Decides whether and at what price to offer.
pub trait OfferStrategy: Send + Sync {
	fn evaluate(&self, ctx: &OfferContext) -> OfferDecision;
}

#[derive(Debug, Clone)]
pub enum OfferOutcome {
	Bid {
		offer_price: u64,
		transaction: PreparedTransaction,
	},
	Skip(SkipReason),
}

/// Identity and budgets applied to every transaction the service prepares.
#[derive(Debug, Clone)]
pub struct OfferSettings {
	pub payer: Pubkey,
	pub offer_token: Pubkey,
	pub config_id: u32,
	pub security_deposit_base: u64,
	pub security_deposit_bps: u32,
	pub compute_budget: ComputeBudget,
	pub skip_preflight_bids: bool,
	/// Bounded wait for a fast VAA to be posted before an initial offer.
	pub posted_retry: RetryPolicy,
}

/// Guardian API lookups for auctions first seen through their events.
///
/// `AuctionUpdated` events of improvements carry no fast VAA account, so
/// it is recovered from the auction's source chain and sequence.
#[derive(Clone)]
pub struct VaaSource {
	pub wormhole: Arc<dyn WormholeClient>,
	/// Watched `(chain, emitter)` pairs.
	pub emitters: Vec<(u16, [u8; 32])>,
}

pub struct OrderService {
	chain: Arc<dyn ChainClient>,
	strategy: Box<dyn OfferStrategy>,
	instructions: MatchingEngineInstructions,
	layout: MessageLayout,
	settings: OfferSettings,
	vaa_source: Option<VaaSource>,
}

impl OrderService {
	pub fn new(
		chain: Arc<dyn ChainClient>,
		strategy: Box<dyn OfferStrategy>,
		instructions: MatchingEngineInstructions,
		layout: MessageLayout,
		settings: OfferSettings,
	) -> Self {
		Self {
			chain,
			strategy,
			instructions,
			layout,
			settings,
			vaa_source: None,
		}
	}

	pub fn with_vaa_source(mut self, source: VaaSource) -> Self {
		self.vaa_source = Some(source);
		self
	}

	pub fn instructions(&self) -> &MatchingEngineInstructions {
		&self.instructions
	}

	pub fn settings(&self) -> &OfferSettings {
		&self.settings
	}

	async fn fetch_auction(&self, address: &Pubkey) -> Result<Option<Auction>, OrderError> {
		match self.chain.get_account_data(address).await? {
			Some(data) => Ok(Some(Auction::try_from_account_data(&data)?)),
			None => Ok(None),
		}
	}

	async fn require_posted(&self, address: &Pubkey) -> Result<(), OrderError> {
		match self.chain.get_account_data(address).await? {
			Some(_) => Ok(()),
			None => Err(OrderError::Pending("posted fast VAA")),
		}
	}

	/// Posted-VAA account of an auction, found through the guardian API.
	///
	/// Tries every watched emitter of the source chain and keeps the VAA
	/// whose digest matches the auction.
	async fn resolve_fast_vaa(
		&self,
		auction: &Auction,
		source_chain: u16,
		sequence: u64,
	) -> Result<Pubkey, OrderError> {
		let source = self.vaa_source.as_ref().ok_or_else(|| {
			OrderError::InvalidInput("Fast VAA unknown and no guardian API configured".into())
		})?;

		for (_, emitter) in source.emitters.iter().filter(|(chain, _)| *chain == source_chain) {
			let Some(signed) = source.wormhole.get_vaa(source_chain, emitter, sequence).await? else {
				continue;
			};
			let vaa = Vaa::parse(&signed.bytes)?;
			if vaa.digest() == auction.vaa_hash {
				return self.instructions.posted_vaa(&vaa.message_hash());
			}
		}

		Err(OrderError::InvalidInput(format!(
			"No fast VAA for chain {} sequence {}",
			source_chain, sequence
		)))
	}

	fn bid_transaction(
		&self,
		tx_type: TransactionType,
		auction: Pubkey,
		instruction: solver_types::Instruction,
	) -> PreparedTransaction {
		PreparedTransaction {
			tx_type,
			auction,
			instructions: vec![instruction],
			signers: vec![self.settings.payer],
			compute_budget: self.settings.compute_budget,
			nonce_account: None,
			skip_preflight: self.settings.skip_preflight_bids,
		}
	}

	fn log_decision(auction: &Pubkey, kind: OfferKind, ctx: &OfferContext, decision: &OfferDecision) {
		match decision {
			OfferDecision::Bid { offer_price } => info!(
				auction = %auction,
				kind = ?kind,
				amount_in = ctx.amount_in,
				candidate_price = ctx.candidate_price,
				offer_price,
				"Placing offer"
			),
			OfferDecision::Skip(reason) => info!(
				auction = %auction,
				kind = ?kind,
				amount_in = ctx.amount_in,
				candidate_price = ctx.candidate_price,
				reason = %reason,
				"Skipping offer"
			),
		}
	}

	/// Considers starting the auction for a newly observed fast order.
	pub async fn consider_initial_offer(
		&self,
		vaa: &Vaa,
		order: &FastMarketOrder,
		current_slot: u64,
	) -> Result<OfferOutcome, OrderError> {
		let auction = self.instructions.auction(&vaa.digest())?;
		let fast_vaa = self.instructions.posted_vaa(&vaa.message_hash())?;

		let auction_started = match self.fetch_auction(&auction).await? {
			Some(state) => state.status != AuctionStatus::NotStarted,
			None => false,
		};
		if !auction_started {
			match self
				.settings
				.posted_retry
				.retry("wait_posted_fast_vaa", || self.require_posted(&fast_vaa))
				.await
			{
				Ok(()) => {}
				Err(OrderError::Pending(_)) => {
					info!(auction = %auction, reason = %SkipReason::VaaNotPosted, "Skipping offer");
					return Ok(OfferOutcome::Skip(SkipReason::VaaNotPosted));
				}
				Err(e) => return Err(e),
			}
		}

		let ctx = OfferContext {
			kind: OfferKind::Initial,
			source_chain: vaa.body.emitter_chain,
			amount_in: order.amount_in,
			candidate_price: order.max_fee,
			security_deposit: security_deposit(
				order.amount_in,
				self.settings.security_deposit_base,
				self.settings.security_deposit_bps,
			),
			available_balance: self
				.chain
				.get_token_balance(&self.settings.offer_token)
				.await?,
			auction_started,
			current_slot,
		};

		let decision = self.strategy.evaluate(&ctx);
		Self::log_decision(&auction, ctx.kind, &ctx, &decision);

		match decision {
			OfferDecision::Skip(reason) => Ok(OfferOutcome::Skip(reason)),
			OfferDecision::Bid { offer_price } => {
				let instruction = self.instructions.place_initial_offer_cctp(&InitialOffer {
					payer: self.settings.payer,
					offer_token: self.settings.offer_token,
					fast_vaa,
					vaa_digest: vaa.digest(),
					config_id: self.settings.config_id,
					source_chain: vaa.body.emitter_chain,
					target_chain: order.target_chain,
					offer_price,
				})?;
				Ok(OfferOutcome::Bid {
					offer_price,
					transaction: self.bid_transaction(
						TransactionType::PlaceInitialOffer,
						auction,
						instruction,
					),
				})
			}
		}
	}

	/// Considers beating another participant's best offer.
	pub async fn consider_improvement(
		&self,
		update: &AuctionUpdated,
		current_slot: u64,
	) -> Result<OfferOutcome, OrderError> {
		let kind = OfferKind::Improve {
			end_slot: update.end_slot,
		};
		let ctx = OfferContext {
			kind,
			source_chain: update.source_chain,
			amount_in: update.amount_in,
			candidate_price: update.max_offer_price_allowed,
			security_deposit: update.total_deposit.saturating_sub(update.amount_in),
			available_balance: self
				.chain
				.get_token_balance(&self.settings.offer_token)
				.await?,
			auction_started: true,
			current_slot,
		};

		let decision = self.strategy.evaluate(&ctx);
		Self::log_decision(&update.auction, kind, &ctx, &decision);

		match decision {
			OfferDecision::Skip(reason) => Ok(OfferOutcome::Skip(reason)),
			OfferDecision::Bid { offer_price } => {
				let instruction = self.instructions.improve_offer(&ImproveOffer {
					payer: self.settings.payer,
					auction: update.auction,
					config_id: update.config_id,
					best_offer_token: update.best_offer_token,
					offer_token: self.settings.offer_token,
					offer_price,
				})?;
				Ok(OfferOutcome::Bid {
					offer_price,
					transaction: self.bid_transaction(
						TransactionType::ImproveOffer,
						update.auction,
						instruction,
					),
				})
			}
		}
	}

	/// Builds `execute_fast_order_cctp` for an auction whose offer period ended.
	///
	/// Returns `None` when the auction is no longer active or its best offer
	/// is not one of `own_offer_tokens`. Without a known `fast_vaa` account
	/// the VAA is looked up through the configured [`VaaSource`].
	pub async fn prepare_execution(
		&self,
		auction: Pubkey,
		fast_vaa: Option<Pubkey>,
		own_offer_tokens: &[Pubkey],
	) -> Result<Option<PreparedTransaction>, OrderError> {
		let Some(state) = self.fetch_auction(&auction).await? else {
			debug!(auction = %auction, "Auction account missing, nothing to execute");
			return Ok(None);
		};
		let Some(info) = state.info.clone() else {
			return Ok(None);
		};
		if state.status != AuctionStatus::Active || !own_offer_tokens.contains(&info.best_offer_token)
		{
			debug!(auction = %auction, status = ?state.status, "Not executing");
			return Ok(None);
		}

		let destination_domain = match state.target_protocol {
			MessageProtocol::Cctp { domain } => domain,
			other => return Err(OrderError::UnsupportedProtocol(format!("{:?}", other))),
		};

		let fast_vaa = match fast_vaa {
			Some(address) => address,
			None => {
				self.resolve_fast_vaa(&state, info.source_chain, info.vaa_sequence)
					.await?
			}
		};

		let posted = self
			.chain
			.get_account_data(&fast_vaa)
			.await?
			.ok_or_else(|| OrderError::InvalidInput(format!("Fast VAA {} not found", fast_vaa)))?;
		let posted = PostedVaa::try_from_account_data(&posted)?;
		let order = self
			.layout
			.decode(&posted.payload)?
			.as_fast_market_order()
			.cloned()
			.ok_or_else(|| OrderError::InvalidInput("Posted VAA is not a fast order".into()))?;

		let instruction = self.instructions.execute_fast_order_cctp(&ExecuteOrder {
			payer: self.settings.payer,
			auction,
			fast_vaa,
			info,
			target_chain: order.target_chain,
			destination_domain,
			executor_token: self.settings.offer_token,
		})?;

		Ok(Some(PreparedTransaction {
			tx_type: TransactionType::ExecuteFastOrder,
			auction,
			instructions: vec![instruction],
			signers: vec![self.settings.payer],
			compute_budget: self.settings.compute_budget,
			nonce_account: None,
			skip_preflight: false,
		}))
	}
}
