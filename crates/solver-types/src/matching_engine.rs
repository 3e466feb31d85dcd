//! On-chain matching-engine layouts the solver observes and calls into.
//!
//! Accounts and events are Anchor-framed: an 8-byte discriminator
//! (`sha256("<namespace>:<Name>")[..8]`) followed by a borsh body.

use crate::pubkey::Pubkey;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const AUCTION_SEED_PREFIX: &[u8] = b"auction";
pub const AUCTION_CONFIG_SEED_PREFIX: &[u8] = b"auction-config";
pub const CUSTODIAN_SEED_PREFIX: &[u8] = b"emitter";
pub const POSTED_VAA_SEED_PREFIX: &[u8] = b"PostedVAA";

/// Denominator of `security_deposit_bps` and the other auction bps fields.
pub const FEE_PRECISION_MAX: u64 = 1_000_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
	#[error("Unexpected discriminator for {0}")]
	Discriminator(&'static str),
	#[error("Failed to decode {name}: {reason}")]
	Borsh { name: &'static str, reason: String },
}

pub fn anchor_discriminator(namespace: &str, name: &str) -> [u8; 8] {
	let hash = Sha256::digest(format!("{}:{}", namespace, name).as_bytes());
	let mut out = [0u8; 8];
	out.copy_from_slice(&hash[..8]);
	out
}

fn decode_framed<T: BorshDeserialize>(
	namespace: &str,
	name: &'static str,
	data: &[u8],
) -> Result<T, LayoutError> {
	if data.len() < 8 || data[..8] != anchor_discriminator(namespace, name) {
		return Err(LayoutError::Discriminator(name));
	}
	// Accounts may be over-allocated, so trailing bytes are tolerated.
	let mut body = &data[8..];
	T::deserialize(&mut body).map_err(|e| LayoutError::Borsh {
		name,
		reason: e.to_string(),
	})
}

#[derive(
	Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub enum MessageProtocol {
	None,
	Local { program_id: Pubkey },
	Cctp { domain: u32 },
}

/// Auction lifecycle as recorded on-chain.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub enum AuctionStatus {
	NotStarted,
	Active,
	Completed {
		slot: u64,
		execute_penalty: Option<u64>,
	},
	Settled {
		fee: u64,
		total_penalty: Option<u64>,
	},
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct AuctionInfo {
	pub config_id: u32,
	pub custody_token_bump: u8,
	pub vaa_sequence: u64,
	pub source_chain: u16,
	pub best_offer_token: Pubkey,
	pub initial_offer_token: Pubkey,
	pub start_slot: u64,
	pub amount_in: u64,
	pub security_deposit: u64,
	pub offer_price: u64,
	pub redeemer_message_len: u16,
}

impl AuctionInfo {
	/// Amount the best offer holder has locked in the auction.
	pub fn total_deposit(&self) -> u64 {
		self.amount_in.saturating_add(self.security_deposit)
	}
}

/// Auction account, keyed by the fast VAA digest.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Auction {
	pub bump: u8,
	pub vaa_hash: [u8; 32],
	pub vaa_timestamp: u32,
	pub target_protocol: MessageProtocol,
	pub status: AuctionStatus,
	pub prepared_by: Pubkey,
	pub info: Option<AuctionInfo>,
}

impl Auction {
	pub fn try_from_account_data(data: &[u8]) -> Result<Self, LayoutError> {
		decode_framed("account", "Auction", data)
	}

	pub fn best_offer_token(&self) -> Option<Pubkey> {
		self.info.as_ref().map(|info| info.best_offer_token)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct AuctionParameters {
	pub user_penalty_reward_bps: u32,
	pub initial_penalty_bps: u32,
	pub duration: u16,
	pub grace_period: u16,
	pub penalty_period: u16,
	pub min_offer_delta_bps: u32,
	pub security_deposit_base: u64,
	pub security_deposit_bps: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct AuctionConfig {
	pub id: u32,
	pub parameters: AuctionParameters,
}

impl AuctionConfig {
	pub fn try_from_account_data(data: &[u8]) -> Result<Self, LayoutError> {
		decode_framed("account", "AuctionConfig", data)
	}
}

/// Event emitted whenever an auction's best offer changes.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct AuctionUpdated {
	pub config_id: u32,
	pub auction: Pubkey,
	/// Posted fast VAA, absent once the order reference has been closed.
	pub vaa: Option<Pubkey>,
	pub source_chain: u16,
	pub target_protocol: MessageProtocol,
	/// Last slot at which offers are accepted.
	pub end_slot: u64,
	pub best_offer_token: Pubkey,
	pub token_balance_before: u64,
	pub amount_in: u64,
	pub total_deposit: u64,
	pub max_offer_price_allowed: u64,
}

impl AuctionUpdated {
	pub const NAME: &'static str = "AuctionUpdated";

	/// Decodes an Anchor event payload; `Ok(None)` when it is a different event.
	pub fn try_from_event_data(data: &[u8]) -> Result<Option<Self>, LayoutError> {
		if data.len() < 8 || data[..8] != anchor_discriminator("event", Self::NAME) {
			return Ok(None);
		}
		decode_framed("event", Self::NAME, data).map(Some)
	}
}

/// Collateral posted alongside an offer.
pub fn security_deposit(amount_in: u64, base: u64, bps: u32) -> u64 {
	let notional = u128::from(amount_in) * u128::from(bps) / u128::from(FEE_PRECISION_MAX);
	base.saturating_add(u64::try_from(notional).unwrap_or(u64::MAX))
}

/// Address derivations for the matching-engine and core-bridge programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramAddresses {
	pub matching_engine: Pubkey,
	pub core_bridge: Pubkey,
}

impl ProgramAddresses {
	pub fn auction(&self, vaa_digest: &[u8; 32]) -> Option<Pubkey> {
		Pubkey::try_find_program_address(&[AUCTION_SEED_PREFIX, vaa_digest], &self.matching_engine)
			.map(|(address, _)| address)
	}

	pub fn auction_config(&self, config_id: u32) -> Option<Pubkey> {
		Pubkey::try_find_program_address(
			&[AUCTION_CONFIG_SEED_PREFIX, &config_id.to_be_bytes()],
			&self.matching_engine,
		)
		.map(|(address, _)| address)
	}

	pub fn custodian(&self) -> Option<Pubkey> {
		Pubkey::try_find_program_address(&[CUSTODIAN_SEED_PREFIX], &self.matching_engine)
			.map(|(address, _)| address)
	}

	pub fn posted_vaa(&self, message_hash: &[u8; 32]) -> Option<Pubkey> {
		Pubkey::try_find_program_address(&[POSTED_VAA_SEED_PREFIX, message_hash], &self.core_bridge)
			.map(|(address, _)| address)
	}
}
