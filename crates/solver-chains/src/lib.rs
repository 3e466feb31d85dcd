//! Chain access for the solver.
//!
//! Two boundaries live here:
//!
//! - [`ChainClient`]: the destination (Solana) cluster the matching engine runs
//!   on. Slots, blockhashes, account reads, transaction submission and program
//!   logs all go through it.
//! - [`SourceChainClient`]: read-only access to source (EVM) chains, used to
//!   pull the logs of the transaction that published a finalized message.
//! - [`WormholeClient`]: signed VAAs from the guardian network's API.
//!
//! # Modules
//!
//! - `registry`: source-chain clients indexed by Wormhole chain id
//! - `utils`: the shared [`RetryPolicy`] used by every network-facing call
//! - `implementations`: solana-client, Wormholescan and alloy-backed clients

use alloy::primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use solana_sdk::transaction::Transaction;
use solver_types::{Blockhash, Classify, ErrorClass, Pubkey, Signature};
use thiserror::Error;

pub mod implementations;
pub mod registry;
pub mod utils;

pub use implementations::evm::AlloySourceChain;
pub use implementations::solana::{parse_commitment, SolanaRpcClient};
pub use implementations::wormholescan::WormholescanClient;
pub use registry::SourceChainRegistry;
pub use utils::RetryPolicy;

#[derive(Debug, Error)]
pub enum ChainError {
	#[error("Network error: {0}")]
	Network(String),
	#[error("RPC error {code}: {message}")]
	Rpc { code: i64, message: String },
	#[error("Invalid response: {0}")]
	InvalidResponse(String),
	#[error("Invalid input: {0}")]
	InvalidInput(String),
	#[error("No client configured for chain {0}")]
	UnknownChain(u16),
}

/// Lowercased fragments of cluster rejections caused by a consumed or expired
/// blockhash or durable nonce.
const STALE_MARKERS: &[&str] = &[
	"blockhash not found",
	"blockhashnotfound",
	"already been processed",
	"alreadyprocessed",
	"specified nonce does not match stored nonce",
	"nonceunexpectedblockhashvalue",
	"stored nonce is still in recent_blockhashes",
	"nonceblockhashnotexpired",
];

impl ChainError {
	/// Whether the cluster rejected a transaction because its blockhash or
	/// nonce was stale or already consumed.
	pub fn is_stale_resource(&self) -> bool {
		match self {
			Self::Rpc { message, .. } => {
				let message = message.to_ascii_lowercase();
				STALE_MARKERS.iter().any(|marker| message.contains(marker))
			}
			_ => false,
		}
	}
}

impl Classify for ChainError {
	fn class(&self) -> ErrorClass {
		match self {
			Self::Network(_) | Self::Rpc { .. } => ErrorClass::Transient,
			Self::InvalidResponse(_) | Self::InvalidInput(_) => ErrorClass::DataIntegrity,
			Self::UnknownChain(_) => ErrorClass::Fatal,
		}
	}
}

/// A recent blockhash together with the height after which it expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestBlockhash {
	pub blockhash: Blockhash,
	pub last_valid_block_height: u64,
}

/// One entry of a signature listing for an address, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInfo {
	pub signature: Signature,
	pub slot: u64,
	pub failed: bool,
}

/// Cluster view of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureStatus {
	pub slot: u64,
	/// Reached at least `confirmed` commitment.
	pub confirmed: bool,
	pub err: Option<String>,
}

/// Destination chain operations the solver depends on.
#[async_trait]
pub trait ChainClient: Send + Sync {
	/// Current slot at the configured commitment.
	async fn get_slot(&self) -> Result<u64, ChainError>;

	async fn get_latest_blockhash(&self) -> Result<LatestBlockhash, ChainError>;

	/// Raw account data, `None` if the account does not exist.
	async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, ChainError>;

	/// Balance of an SPL token account in base units.
	async fn get_token_balance(&self, token_account: &Pubkey) -> Result<u64, ChainError>;

	/// Submits a signed transaction.
	async fn send_transaction(
		&self,
		transaction: &Transaction,
		skip_preflight: bool,
	) -> Result<Signature, ChainError>;

	async fn get_signature_status(
		&self,
		signature: &Signature,
	) -> Result<Option<SignatureStatus>, ChainError>;

	/// Signatures touching `address`, newest first, stopping at `until`.
	async fn get_signatures_for_address(
		&self,
		address: &Pubkey,
		until: Option<&Signature>,
		limit: usize,
	) -> Result<Vec<SignatureInfo>, ChainError>;

	/// Program log lines of a landed transaction, `None` if not found.
	async fn get_transaction_logs(
		&self,
		signature: &Signature,
	) -> Result<Option<Vec<String>>, ChainError>;

	/// Current value stored in an initialized durable nonce account.
	async fn get_nonce_blockhash(&self, nonce_account: &Pubkey) -> Result<Blockhash, ChainError>;
}

/// An EVM log in receipt order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLog {
	pub address: Address,
	pub topics: Vec<B256>,
	pub data: Bytes,
}

/// Read-only access to a source chain.
#[async_trait]
pub trait SourceChainClient: Send + Sync {
	/// Wormhole chain id this client serves.
	fn chain(&self) -> u16;

	/// Logs of a landed transaction, in emission order.
	async fn get_transaction_logs(&self, tx_hash: &str) -> Result<Vec<SourceLog>, ChainError>;
}

/// A signed VAA as served by the guardian network API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedVaa {
	pub sequence: u64,
	pub bytes: Vec<u8>,
	/// Source transaction that published the message, `0x`-prefixed.
	pub tx_hash: Option<String>,
}

/// Access to signed VAAs.
#[async_trait]
pub trait WormholeClient: Send + Sync {
	/// A VAA by id; `None` until the guardians have signed it.
	async fn get_vaa(
		&self,
		chain: u16,
		emitter: &[u8; 32],
		sequence: u64,
	) -> Result<Option<SignedVaa>, ChainError>;

	/// The most recent VAAs of an emitter, newest first.
	async fn recent_vaas(
		&self,
		chain: u16,
		emitter: &[u8; 32],
		limit: usize,
	) -> Result<Vec<SignedVaa>, ChainError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_stale_resource_detection() {
		let stale = ChainError::Rpc {
			code: -32002,
			message: "Transaction simulation failed: Blockhash not found".to_string(),
		};
		assert!(stale.is_stale_resource());

		let processed = ChainError::Rpc {
			code: -32002,
			message: "This transaction has already been processed".to_string(),
		};
		assert!(processed.is_stale_resource());

		let other = ChainError::Rpc {
			code: -32002,
			message: "custom program error: 0x1771".to_string(),
		};
		assert!(!other.is_stale_resource());
		assert!(!ChainError::Network("timeout".to_string()).is_stale_resource());
	}

	#[test]
	fn test_consumed_nonce_is_stale() {
		let advanced = ChainError::Rpc {
			code: -32002,
			message: "Transaction simulation failed: Error processing Instruction 0: \
			          specified nonce does not match stored nonce"
				.to_string(),
		};
		assert!(advanced.is_stale_resource());

		let same_slot = ChainError::Rpc {
			code: 0,
			message: "NonceBlockhashNotExpired".to_string(),
		};
		assert!(same_slot.is_stale_resource());
	}

	#[test]
	fn test_nonce_misconfiguration_is_not_stale() {
		// Retrying with a fresh nonce value cannot fix a wrong authority.
		let authority = ChainError::Rpc {
			code: -32002,
			message: "Transaction simulation failed: Error processing Instruction 0: \
			          Advance nonce account: Account 9xQe is not the nonce authority"
				.to_string(),
		};
		assert!(!authority.is_stale_resource());

		let uninitialized = ChainError::Rpc {
			code: -32002,
			message: "invalid account data for instruction: nonce account not initialized"
				.to_string(),
		};
		assert!(!uninitialized.is_stale_resource());
	}

	#[test]
	fn test_error_classes() {
		assert_eq!(
			ChainError::Network("reset".to_string()).class(),
			ErrorClass::Transient
		);
		assert_eq!(
			ChainError::InvalidResponse("bad".to_string()).class(),
			ErrorClass::DataIntegrity
		);
		assert_eq!(ChainError::UnknownChain(2).class(), ErrorClass::Fatal);
	}
}
