//! Transaction types shared by the order, settlement and delivery crates.
//!
//! A [`PreparedTransaction`] is built by the decision engine or the settlement
//! correlator and consumed by the delivery service, which attaches the
//! replay-protection reference, signs and submits it.

use crate::pubkey::Pubkey;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use solana_sdk::hash::Hash as Blockhash;
pub use solana_sdk::instruction::{AccountMeta, Instruction};
pub use solana_sdk::signature::Signature;
pub use solana_sdk::transaction::Transaction;

/// Compute limits and priority fee attached ahead of the instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeBudget {
	pub unit_limit: u32,
	pub unit_price_micro_lamports: u64,
}

/// What the transaction does, for logs and the audit ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
	PlaceInitialOffer,
	ImproveOffer,
	ExecuteFastOrder,
	SettleAuction,
}

impl fmt::Display for TransactionType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::PlaceInitialOffer => "place_initial_offer",
			Self::ImproveOffer => "improve_offer",
			Self::ExecuteFastOrder => "execute_fast_order",
			Self::SettleAuction => "settle_auction",
		};
		f.write_str(name)
	}
}

/// A signed-but-not-yet-built bundle of instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTransaction {
	pub tx_type: TransactionType,
	/// Auction the transaction acts on.
	pub auction: Pubkey,
	pub instructions: Vec<Instruction>,
	/// Required signers; the first one pays fees.
	pub signers: Vec<Pubkey>,
	pub compute_budget: ComputeBudget,
	/// Durable nonce account; `None` selects a cached recent blockhash.
	pub nonce_account: Option<Pubkey>,
	/// Submit once without simulation and never retry.
	pub skip_preflight: bool,
}

impl PreparedTransaction {
	pub fn payer(&self) -> Option<&Pubkey> {
		self.signers.first()
	}
}

/// Result of handing a prepared transaction to the delivery service.
///
/// Failures are reported here rather than swallowed; `signature` is set
/// whenever a transaction reached the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
	pub tx_type: TransactionType,
	pub auction: Pubkey,
	pub signature: Option<Signature>,
	pub success: bool,
	pub attempts: u32,
	pub error: Option<String>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_signature_and_blockhash_render_as_base58() {
		let signature = Signature::from([7u8; 64]);
		let text = signature.to_string();
		assert_eq!(text.parse::<Signature>().unwrap(), signature);

		let hash = Blockhash::new_from_array([5u8; 32]);
		assert_eq!(hash.to_string(), bs58::encode([5u8; 32]).into_string());
	}

	#[test]
	fn test_outcome_serializes_for_ledger() {
		let outcome = SubmissionOutcome {
			tx_type: TransactionType::SettleAuction,
			auction: Pubkey::new_from_array([1u8; 32]),
			signature: Some(Signature::from([2u8; 64])),
			success: true,
			attempts: 1,
			error: None,
		};
		let json = serde_json::to_string(&outcome).unwrap();
		let parsed: SubmissionOutcome = serde_json::from_str(&json).unwrap();
		assert_eq!(parsed, outcome);
	}

	#[test]
	fn test_payer_is_first_signer() {
		let tx = PreparedTransaction {
			tx_type: TransactionType::ImproveOffer,
			auction: Pubkey::new_from_array([1u8; 32]),
			instructions: vec![],
			signers: vec![Pubkey::new_from_array([2u8; 32]), Pubkey::new_from_array([3u8; 32])],
			compute_budget: ComputeBudget {
				unit_limit: 1,
				unit_price_micro_lamports: 1,
			},
			nonce_account: None,
			skip_preflight: true,
		};
		assert_eq!(tx.payer(), Some(&Pubkey::new_from_array([2u8; 32])));
		assert_eq!(tx.tx_type.to_string(), "improve_offer");
	}
}
