//! Legacy transaction assembly.
//!
//! Instruction order is fixed: `AdvanceNonceAccount` first when a durable
//! nonce is used, then the compute budget pair, then the payload. The fee
//! payer is always the first account key.

use solana_compute_budget_interface::ComputeBudgetInstruction;
use solana_sdk::message::Message;
use solana_sdk::transaction::Transaction;
use solver_types::{Blockhash, ComputeBudget, Instruction, Pubkey};

/// System-program `AdvanceNonceAccount` signed by `authority`.
pub fn advance_nonce(nonce_account: &Pubkey, authority: &Pubkey) -> Instruction {
	solana_system_interface::instruction::advance_nonce_account(nonce_account, authority)
}

/// Compute unit limit and price instructions placed ahead of the payload.
pub fn compute_budget(budget: &ComputeBudget) -> [Instruction; 2] {
	[
		ComputeBudgetInstruction::set_compute_unit_limit(budget.unit_limit),
		ComputeBudgetInstruction::set_compute_unit_price(budget.unit_price_micro_lamports),
	]
}

/// Compiles `instructions` into an unsigned transaction paid by `payer`.
pub fn unsigned_transaction(
	payer: &Pubkey,
	instructions: &[Instruction],
	recent_blockhash: &Blockhash,
) -> Transaction {
	let message = Message::new_with_blockhash(instructions, Some(payer), recent_blockhash);
	Transaction::new_unsigned(message)
}

#[cfg(test)]
mod tests {
	use super::*;
	use solver_types::{programs, AccountMeta};

	fn key(byte: u8) -> Pubkey {
		Pubkey::new_from_array([byte; 32])
	}

	#[test]
	fn test_payer_leads_and_keys_are_deduplicated() {
		let payer = key(1);
		let instruction = Instruction {
			program_id: key(9),
			accounts: vec![
				AccountMeta::new_readonly(key(3), false),
				AccountMeta::new(payer, true),
				AccountMeta::new(key(3), false),
			],
			data: vec![7],
		};

		let tx = unsigned_transaction(&payer, &[instruction], &Blockhash::new_from_array([7u8; 32]));

		assert_eq!(tx.message.account_keys[0], payer);
		assert_eq!(tx.message.header.num_required_signatures, 1);
		assert_eq!(tx.message.account_keys.len(), 3);
		assert_eq!(tx.message.recent_blockhash, Blockhash::new_from_array([7u8; 32]));
		assert_eq!(tx.signatures.len(), 1);
	}

	#[test]
	fn test_advance_nonce_targets_system_program() {
		let instruction = advance_nonce(&key(4), &key(5));
		assert_eq!(instruction.program_id, programs::SYSTEM_PROGRAM);
		assert_eq!(instruction.accounts[0].pubkey, key(4));
		assert!(instruction.accounts[0].is_writable);
		assert!(instruction
			.accounts
			.iter()
			.any(|meta| meta.pubkey == key(5) && meta.is_signer));
		assert_eq!(instruction.data, 4u32.to_le_bytes().to_vec());
	}

	#[test]
	fn test_compute_budget_pair() {
		let [limit, price] = compute_budget(&ComputeBudget {
			unit_limit: 300_000,
			unit_price_micro_lamports: 5_000,
		});
		assert_eq!(limit.program_id, programs::COMPUTE_BUDGET_PROGRAM);
		assert_eq!(price.program_id, programs::COMPUTE_BUDGET_PROGRAM);
		assert_eq!(limit.data[0], 2);
		assert_eq!(&limit.data[1..5], &300_000u32.to_le_bytes());
		assert_eq!(price.data[0], 3);
		assert_eq!(&price.data[1..9], &5_000u64.to_le_bytes());
	}
}
