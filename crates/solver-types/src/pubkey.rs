//! Solana account addresses and the well-known programs the solver touches.

pub use solana_sdk::pubkey::Pubkey;

/// Well-known native program and sysvar addresses.
pub mod programs {
	use super::Pubkey;

	pub const SYSTEM_PROGRAM: Pubkey = solana_sdk_ids::system_program::ID;
	pub const COMPUTE_BUDGET_PROGRAM: Pubkey = solana_sdk_ids::compute_budget::ID;
	pub const CLOCK_SYSVAR: Pubkey = solana_sdk_ids::sysvar::clock::ID;
	pub const RENT_SYSVAR: Pubkey = solana_sdk_ids::sysvar::rent::ID;

	pub const TOKEN_PROGRAM: Pubkey =
		Pubkey::from_str_const("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");

	pub const ASSOCIATED_TOKEN_PROGRAM: Pubkey =
		Pubkey::from_str_const("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

	/// Associated token account of `owner` for `mint`.
	pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Option<Pubkey> {
		Pubkey::try_find_program_address(
			&[owner.as_ref(), TOKEN_PROGRAM.as_ref(), mint.as_ref()],
			&ASSOCIATED_TOKEN_PROGRAM,
		)
		.map(|(address, _)| address)
	}
}
