//! Configuration types for the solver.

use crate::serde_helpers::{
	base58, base58_option, base58_vec, deserialize_chain_id_map, serialize_chain_id_map,
};
use serde::{Deserialize, Serialize};
use solver_types::{AmountWidth, MessageLayout, ProgramAddresses, Pubkey};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Complete solver configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Solver identity and credentials
	pub solver: SolverSettings,
	/// Destination chain access
	pub solana: SolanaConfig,
	/// Protocol auction parameters
	pub auction: AuctionSettings,
	/// Per-source-chain pricing, keyed by Wormhole chain id
	#[serde(
		default,
		deserialize_with = "deserialize_chain_id_map",
		serialize_with = "serialize_chain_id_map"
	)]
	pub pricing: HashMap<u16, PricingConfig>,
	/// Transaction submission settings
	pub delivery: DeliveryConfig,
	/// Cross-chain attestation network
	pub wormhole: WormholeConfig,
	/// Stablecoin-bridge attestation service
	pub circle: CircleConfig,
	/// Source-chain RPC endpoints, keyed by Wormhole chain id
	#[serde(
		default,
		deserialize_with = "deserialize_chain_id_map",
		serialize_with = "serialize_chain_id_map"
	)]
	pub evm: HashMap<u16, EvmChainConfig>,
	/// Audit ledger backend
	#[serde(default)]
	pub storage: StorageConfig,
}

impl Config {
	pub fn message_layout(&self) -> Option<MessageLayout> {
		AmountWidth::from_bytes(self.auction.fast_fill_amount_bytes).map(MessageLayout::new)
	}

	pub fn program_addresses(&self) -> ProgramAddresses {
		ProgramAddresses {
			matching_engine: self.solana.matching_engine_program,
			core_bridge: self.solana.core_bridge_program,
		}
	}

	/// Offer token accounts the solver recognizes as its own.
	pub fn own_offer_tokens(&self) -> Vec<Pubkey> {
		let mut tokens = vec![self.solver.offer_token];
		for token in &self.solver.known_offer_tokens {
			if !tokens.contains(token) {
				tokens.push(*token);
			}
		}
		tokens
	}
}

/// Solver identity and credentials
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SolverSettings {
	/// Solver name/identifier
	pub name: String,
	/// Base58-encoded 64-byte ed25519 keypair
	pub keypair: String,
	/// Token account offers are paid from
	#[serde(with = "base58")]
	pub offer_token: Pubkey,
	/// Additional token accounts owned by this operator
	#[serde(default, with = "base58_vec")]
	pub known_offer_tokens: Vec<Pubkey>,
	/// Capacity of the bounded event channel
	#[serde(default = "default_event_channel_capacity")]
	pub event_channel_capacity: usize,
	/// Log level used when no override is given
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

/// Destination chain configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SolanaConfig {
	/// JSON-RPC endpoint URL
	pub rpc_url: String,
	/// Commitment used for reads
	#[serde(default = "default_commitment")]
	pub commitment: String,
	/// Poll interval for slots and program logs
	#[serde(default = "default_solana_poll_interval_ms")]
	pub poll_interval_ms: u64,
	/// Largest slot gap replayed tick-by-tick; larger gaps jump ahead
	#[serde(default = "default_max_tick_backfill")]
	pub max_tick_backfill: u64,
	/// Wait for a fast VAA to be posted before giving up on an initial offer
	#[serde(default = "default_posted_vaa_backoff")]
	pub posted_vaa_backoff: BackoffConfig,
	/// Matching-engine program id
	#[serde(with = "base58")]
	pub matching_engine_program: Pubkey,
	/// Wormhole core-bridge program id
	#[serde(with = "base58")]
	pub core_bridge_program: Pubkey,
	/// Durable nonce account used for settlements
	#[serde(default, with = "base58_option", skip_serializing_if = "Option::is_none")]
	pub nonce_account: Option<Pubkey>,
	/// Signatures fetched per program-log poll
	#[serde(default = "default_signature_page_size")]
	pub signature_page_size: usize,
	/// Settlement asset mint
	#[serde(default = "default_usdc_mint", with = "base58")]
	pub usdc_mint: Pubkey,
	/// CCTP token messenger minter program id
	#[serde(default = "default_token_messenger_minter_program", with = "base58")]
	pub token_messenger_minter_program: Pubkey,
	/// CCTP message transmitter program id
	#[serde(default = "default_message_transmitter_program", with = "base58")]
	pub message_transmitter_program: Pubkey,
}

impl SolanaConfig {
	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}
}

/// Protocol parameters the solver needs locally
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuctionSettings {
	/// Flat part of the security deposit
	pub security_deposit_base: u64,
	/// Notional multiplier, over 1,000,000
	pub security_deposit_bps: u32,
	/// Width of the fast-fill amount field (8 or 16)
	pub fast_fill_amount_bytes: u8,
	/// Auction config that new auctions are started under
	#[serde(default)]
	pub config_id: u32,
}

/// Pricing parameters, both fixed-point over 10,000
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct PricingConfig {
	/// Estimated settlement success probability
	pub probability: u64,
	/// Edge added on top of fair value
	pub edge_pct_of_fv: u64,
}

/// Transaction submission configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeliveryConfig {
	#[serde(default = "default_compute_unit_limit")]
	pub compute_unit_limit: u32,
	#[serde(default = "default_compute_unit_price")]
	pub compute_unit_price: u64,
	/// Attempts after the first one for stale-resource rejections
	#[serde(default = "default_max_retries")]
	pub max_retries: u32,
	#[serde(default = "default_retry_delay_ms")]
	pub retry_delay_ms: u64,
	/// Slots between background blockhash refreshes
	#[serde(default = "default_blockhash_refresh_slots")]
	pub blockhash_refresh_slots: u64,
	/// Submit bids without preflight, exactly once
	#[serde(default = "default_true")]
	pub skip_preflight_bids: bool,
	/// How long to wait for a submitted transaction to confirm
	#[serde(default = "default_confirm_timeout_secs")]
	pub confirm_timeout_secs: u64,
}

impl DeliveryConfig {
	pub fn retry_delay(&self) -> Duration {
		Duration::from_millis(self.retry_delay_ms)
	}

	pub fn confirm_timeout(&self) -> Duration {
		Duration::from_secs(self.confirm_timeout_secs)
	}
}

/// Exponential backoff parameters
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BackoffConfig {
	#[serde(default = "default_initial_backoff_ms")]
	pub initial_ms: u64,
	#[serde(default = "default_max_backoff_ms")]
	pub max_ms: u64,
	#[serde(default = "default_multiplier")]
	pub multiplier: f64,
	/// `None` retries until success
	#[serde(default)]
	pub max_attempts: Option<u32>,
}

impl BackoffConfig {
	pub fn initial(&self) -> Duration {
		Duration::from_millis(self.initial_ms)
	}

	pub fn max(&self) -> Duration {
		Duration::from_millis(self.max_ms)
	}
}

impl Default for BackoffConfig {
	fn default() -> Self {
		Self {
			initial_ms: default_initial_backoff_ms(),
			max_ms: default_max_backoff_ms(),
			multiplier: default_multiplier(),
			max_attempts: None,
		}
	}
}

/// A token-router emitter to watch
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct EmitterConfig {
	/// Wormhole chain id
	pub chain: u16,
	/// 32-byte emitter address, hex encoded
	pub address: String,
}

impl EmitterConfig {
	/// Decoded emitter address; `None` if it is not 32 bytes of hex.
	pub fn address_bytes(&self) -> Option<[u8; 32]> {
		let bytes = hex::decode(self.address.trim_start_matches("0x")).ok()?;
		bytes.try_into().ok()
	}
}

/// Wormhole API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WormholeConfig {
	pub api_url: String,
	#[serde(default)]
	pub emitters: Vec<EmitterConfig>,
	#[serde(default = "default_vaa_poll_interval_ms")]
	pub poll_interval_ms: u64,
	#[serde(default = "default_page_size")]
	pub page_size: u32,
	#[serde(default = "default_vaa_backoff")]
	pub backoff: BackoffConfig,
}

impl WormholeConfig {
	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}
}

/// Circle attestation API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CircleConfig {
	pub api_url: String,
	#[serde(default)]
	pub backoff: BackoffConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EvmChainConfig {
	pub rpc_url: String,
}

/// Audit ledger configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct StorageConfig {
	/// Storage backend: "memory" or "file"
	pub backend: String,
	/// Storage path for file backend
	pub path: Option<PathBuf>,
}

impl Default for StorageConfig {
	fn default() -> Self {
		Self {
			backend: "memory".to_string(),
			path: None,
		}
	}
}

fn default_signature_page_size() -> usize {
	100
}

fn default_usdc_mint() -> Pubkey {
	Pubkey::from_str_const("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v")
}

fn default_token_messenger_minter_program() -> Pubkey {
	Pubkey::from_str_const("CCTPiPYPc6AsJuwueEnWgSgucamXDZwBd53dQ11YiKX3")
}

fn default_message_transmitter_program() -> Pubkey {
	Pubkey::from_str_const("CCTPmbSD7gX1bxKPAmg77w8oFzNFpaQiQUWD43TKaecd")
}

fn default_event_channel_capacity() -> usize {
	1024
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_commitment() -> String {
	"confirmed".to_string()
}

fn default_solana_poll_interval_ms() -> u64 {
	400
}

fn default_max_tick_backfill() -> u64 {
	8
}

fn default_compute_unit_limit() -> u32 {
	250_000
}

fn default_compute_unit_price() -> u64 {
	10_000
}

fn default_max_retries() -> u32 {
	3
}

fn default_retry_delay_ms() -> u64 {
	500
}

fn default_blockhash_refresh_slots() -> u64 {
	25
}

fn default_true() -> bool {
	true
}

fn default_confirm_timeout_secs() -> u64 {
	30
}

fn default_initial_backoff_ms() -> u64 {
	500
}

fn default_max_backoff_ms() -> u64 {
	30_000
}

fn default_multiplier() -> f64 {
	2.0
}

fn default_vaa_poll_interval_ms() -> u64 {
	2_000
}

fn default_page_size() -> u32 {
	50
}

fn default_posted_vaa_backoff() -> BackoffConfig {
	BackoffConfig {
		initial_ms: 400,
		max_ms: 2_000,
		multiplier: default_multiplier(),
		max_attempts: Some(6),
	}
}

fn default_vaa_backoff() -> BackoffConfig {
	BackoffConfig {
		max_attempts: Some(10),
		..BackoffConfig::default()
	}
}
