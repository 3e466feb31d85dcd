//! Matching-engine instruction builders.
//!
//! Instruction data is the Anchor discriminator
//! (`sha256("global:<name>")[..8]`) followed by borsh-encoded arguments.
//! Account lists follow the program's account structs in declaration order.

use crate::OrderError;
use borsh::BorshSerialize;
use solver_types::{
	anchor_discriminator, programs, AccountMeta, AuctionInfo, Instruction, ProgramAddresses,
	Pubkey,
};

/// CCTP program ids on the destination cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CctpPrograms {
	pub token_messenger_minter: Pubkey,
	pub message_transmitter: Pubkey,
}

/// Inputs to `place_initial_offer_cctp`.
#[derive(Debug, Clone)]
pub struct InitialOffer {
	pub payer: Pubkey,
	pub offer_token: Pubkey,
	/// Posted fast VAA account.
	pub fast_vaa: Pubkey,
	pub vaa_digest: [u8; 32],
	pub config_id: u32,
	pub source_chain: u16,
	pub target_chain: u16,
	pub offer_price: u64,
}

/// Inputs to `improve_offer`.
#[derive(Debug, Clone)]
pub struct ImproveOffer {
	pub payer: Pubkey,
	pub auction: Pubkey,
	pub config_id: u32,
	pub best_offer_token: Pubkey,
	pub offer_token: Pubkey,
	pub offer_price: u64,
}

/// Inputs to `execute_fast_order_cctp`.
#[derive(Debug, Clone)]
pub struct ExecuteOrder {
	pub payer: Pubkey,
	pub auction: Pubkey,
	pub fast_vaa: Pubkey,
	pub info: AuctionInfo,
	pub target_chain: u16,
	pub destination_domain: u32,
	pub executor_token: Pubkey,
}

/// Inputs to `prepare_order_response_cctp` followed by `settle_auction_complete`.
#[derive(Debug, Clone)]
pub struct SettleOrder {
	pub payer: Pubkey,
	pub auction: Pubkey,
	pub best_offer_token: Pubkey,
	pub base_fee_token: Pubkey,
	pub fast_vaa: Pubkey,
	pub fast_vaa_hash: [u8; 32],
	pub finalized_vaa: Pubkey,
	pub source_chain: u16,
	pub target_chain: u16,
	pub source_domain: u32,
	pub cctp_nonce: u64,
	/// Burned token on the source domain, left-padded to 32 bytes.
	pub burn_token: [u8; 32],
	pub cctp_message: Vec<u8>,
	pub cctp_attestation: Vec<u8>,
}

#[derive(BorshSerialize)]
struct OfferPriceArgs {
	offer_price: u64,
}

#[derive(BorshSerialize)]
struct CctpMessageArgs {
	encoded_cctp_message: Vec<u8>,
	cctp_attestation: Vec<u8>,
}

fn instruction_data<A: BorshSerialize>(name: &str, args: &A) -> Result<Vec<u8>, OrderError> {
	let mut data = anchor_discriminator("global", name).to_vec();
	args.serialize(&mut data)
		.map_err(|e| OrderError::InvalidInput(format!("{}: {}", name, e)))?;
	Ok(data)
}

fn discriminator_only(name: &str) -> Vec<u8> {
	anchor_discriminator("global", name).to_vec()
}

fn pda(seeds: &[&[u8]], program: &Pubkey, what: &'static str) -> Result<Pubkey, OrderError> {
	Pubkey::try_find_program_address(seeds, program)
		.map(|(address, _)| address)
		.ok_or(OrderError::MissingAddress(what))
}

/// First nonce of the CCTP used-nonces page that contains `nonce`.
fn used_nonces_first(nonce: u64) -> u64 {
	const NONCES_PER_ACCOUNT: u64 = 6400;
	nonce.saturating_sub(1) / NONCES_PER_ACCOUNT * NONCES_PER_ACCOUNT + 1
}

/// Builds matching-engine instructions and derives the accounts they touch.
#[derive(Debug, Clone)]
pub struct MatchingEngineInstructions {
	programs: ProgramAddresses,
	cctp: CctpPrograms,
	usdc_mint: Pubkey,
}

impl MatchingEngineInstructions {
	pub fn new(programs: ProgramAddresses, cctp: CctpPrograms, usdc_mint: Pubkey) -> Self {
		Self {
			programs,
			cctp,
			usdc_mint,
		}
	}

	pub fn programs(&self) -> &ProgramAddresses {
		&self.programs
	}

	fn engine(&self) -> &Pubkey {
		&self.programs.matching_engine
	}

	pub fn auction(&self, vaa_digest: &[u8; 32]) -> Result<Pubkey, OrderError> {
		self.programs
			.auction(vaa_digest)
			.ok_or(OrderError::MissingAddress("auction"))
	}

	pub fn posted_vaa(&self, message_hash: &[u8; 32]) -> Result<Pubkey, OrderError> {
		self.programs
			.posted_vaa(message_hash)
			.ok_or(OrderError::MissingAddress("posted vaa"))
	}

	fn custodian(&self) -> Result<Pubkey, OrderError> {
		self.programs
			.custodian()
			.ok_or(OrderError::MissingAddress("custodian"))
	}

	fn auction_config(&self, config_id: u32) -> Result<Pubkey, OrderError> {
		self.programs
			.auction_config(config_id)
			.ok_or(OrderError::MissingAddress("auction config"))
	}

	fn router_endpoint(&self, chain: u16) -> Result<Pubkey, OrderError> {
		pda(&[b"endpoint", &chain.to_be_bytes()], self.engine(), "router endpoint")
	}

	fn auction_custody_token(&self, auction: &Pubkey) -> Result<Pubkey, OrderError> {
		pda(
			&[b"auction-custody", auction.as_ref()],
			self.engine(),
			"auction custody token",
		)
	}

	fn transfer_authority(&self, auction: &Pubkey, offer_price: u64) -> Result<Pubkey, OrderError> {
		pda(
			&[
				b"transfer-authority",
				auction.as_ref(),
				&offer_price.to_be_bytes(),
			],
			self.engine(),
			"transfer authority",
		)
	}

	/// Prepared order response account for a fast VAA.
	pub fn prepared_order_response(&self, fast_vaa_hash: &[u8; 32]) -> Result<Pubkey, OrderError> {
		pda(
			&[b"order-response", fast_vaa_hash],
			self.engine(),
			"prepared order response",
		)
	}

	/// Core-bridge accounts used when the matching engine publishes a message.
	fn wormhole_publish_accounts(&self, emitter: &Pubkey) -> Result<Vec<AccountMeta>, OrderError> {
		let core = &self.programs.core_bridge;
		Ok(vec![
			AccountMeta::new(pda(&[b"Bridge"], core, "core bridge config")?, false),
			AccountMeta::new(
				pda(&[b"Sequence", emitter.as_ref()], core, "emitter sequence")?,
				false,
			),
			AccountMeta::new(pda(&[b"fee_collector"], core, "fee collector")?, false),
			AccountMeta::new_readonly(*core, false),
		])
	}

	/// Token messenger minter accounts shared by burns and mints for a remote domain.
	fn token_messenger_accounts(&self, remote_domain: u32) -> Result<Vec<AccountMeta>, OrderError> {
		let tmm = &self.cctp.token_messenger_minter;
		let domain = remote_domain.to_string();
		Ok(vec![
			AccountMeta::new_readonly(pda(&[b"token_messenger"], tmm, "token messenger")?, false),
			AccountMeta::new_readonly(
				pda(
					&[b"remote_token_messenger", domain.as_bytes()],
					tmm,
					"remote token messenger",
				)?,
				false,
			),
			AccountMeta::new_readonly(pda(&[b"token_minter"], tmm, "token minter")?, false),
			AccountMeta::new(
				pda(&[b"local_token", self.usdc_mint.as_ref()], tmm, "local token")?,
				false,
			),
		])
	}

	pub fn place_initial_offer_cctp(&self, offer: &InitialOffer) -> Result<Instruction, OrderError> {
		let auction = self.auction(&offer.vaa_digest)?;
		let mut accounts = vec![
			AccountMeta::new(offer.payer, true),
			AccountMeta::new_readonly(self.transfer_authority(&auction, offer.offer_price)?, false),
			AccountMeta::new_readonly(self.custodian()?, false),
			AccountMeta::new_readonly(self.auction_config(offer.config_id)?, false),
			AccountMeta::new_readonly(offer.fast_vaa, false),
			AccountMeta::new_readonly(self.router_endpoint(offer.source_chain)?, false),
			AccountMeta::new_readonly(self.router_endpoint(offer.target_chain)?, false),
			AccountMeta::new(auction, false),
			AccountMeta::new(offer.offer_token, false),
			AccountMeta::new(self.auction_custody_token(&auction)?, false),
			AccountMeta::new_readonly(self.usdc_mint, false),
		];
		accounts.extend([
			AccountMeta::new_readonly(programs::SYSTEM_PROGRAM, false),
			AccountMeta::new_readonly(programs::TOKEN_PROGRAM, false),
		]);

		Ok(Instruction {
			program_id: *self.engine(),
			accounts,
			data: instruction_data(
				"place_initial_offer_cctp",
				&OfferPriceArgs {
					offer_price: offer.offer_price,
				},
			)?,
		})
	}

	pub fn improve_offer(&self, offer: &ImproveOffer) -> Result<Instruction, OrderError> {
		Ok(Instruction {
			program_id: *self.engine(),
			accounts: vec![
				AccountMeta::new(offer.payer, true),
				AccountMeta::new_readonly(
					self.transfer_authority(&offer.auction, offer.offer_price)?,
					false,
				),
				AccountMeta::new(self.auction_custody_token(&offer.auction)?, false),
				AccountMeta::new(offer.auction, false),
				AccountMeta::new_readonly(self.auction_config(offer.config_id)?, false),
				AccountMeta::new(offer.best_offer_token, false),
				AccountMeta::new(offer.offer_token, false),
				AccountMeta::new_readonly(programs::TOKEN_PROGRAM, false),
			],
			data: instruction_data(
				"improve_offer",
				&OfferPriceArgs {
					offer_price: offer.offer_price,
				},
			)?,
		})
	}

	pub fn execute_fast_order_cctp(&self, order: &ExecuteOrder) -> Result<Instruction, OrderError> {
		let custodian = self.custodian()?;
		let engine = self.engine();
		let tmm = &self.cctp.token_messenger_minter;
		let mt = &self.cctp.message_transmitter;

		let mut accounts = vec![
			AccountMeta::new(order.payer, true),
			AccountMeta::new(
				pda(&[b"core-msg", order.auction.as_ref()], engine, "core message")?,
				false,
			),
			AccountMeta::new(
				pda(&[b"cctp-msg", order.auction.as_ref()], engine, "cctp message")?,
				false,
			),
			AccountMeta::new_readonly(custodian, false),
			AccountMeta::new_readonly(order.fast_vaa, false),
			AccountMeta::new(self.auction_custody_token(&order.auction)?, false),
			AccountMeta::new(order.auction, false),
			AccountMeta::new_readonly(self.auction_config(order.info.config_id)?, false),
			AccountMeta::new(order.info.best_offer_token, false),
			AccountMeta::new(order.executor_token, false),
			AccountMeta::new(order.info.initial_offer_token, false),
			AccountMeta::new_readonly(self.router_endpoint(order.target_chain)?, false),
		];
		accounts.extend(self.wormhole_publish_accounts(&custodian)?);
		accounts.extend([
			AccountMeta::new(self.usdc_mint, false),
			AccountMeta::new_readonly(pda(&[b"sender_authority"], tmm, "sender authority")?, false),
			AccountMeta::new(
				pda(&[b"message_transmitter"], mt, "message transmitter config")?,
				false,
			),
		]);
		accounts.extend(self.token_messenger_accounts(order.destination_domain)?);
		accounts.extend([
			AccountMeta::new_readonly(pda(&[b"__event_authority"], tmm, "event authority")?, false),
			AccountMeta::new_readonly(*tmm, false),
			AccountMeta::new_readonly(*mt, false),
			AccountMeta::new_readonly(programs::SYSTEM_PROGRAM, false),
			AccountMeta::new_readonly(programs::TOKEN_PROGRAM, false),
			AccountMeta::new_readonly(programs::CLOCK_SYSVAR, false),
			AccountMeta::new_readonly(programs::RENT_SYSVAR, false),
		]);

		Ok(Instruction {
			program_id: *engine,
			accounts,
			data: discriminator_only("execute_fast_order_cctp"),
		})
	}

	/// `prepare_order_response_cctp` and `settle_auction_complete`, in that order.
	pub fn settle_auction_cctp(&self, order: &SettleOrder) -> Result<Vec<Instruction>, OrderError> {
		let custodian = self.custodian()?;
		let engine = self.engine();
		let tmm = &self.cctp.token_messenger_minter;
		let mt = &self.cctp.message_transmitter;
		let prepared = self.prepared_order_response(&order.fast_vaa_hash)?;
		let prepared_custody = pda(
			&[b"prepared-custody", prepared.as_ref()],
			engine,
			"prepared custody token",
		)?;
		let mint_recipient = programs::associated_token_address(&custodian, &self.usdc_mint)
			.ok_or(OrderError::MissingAddress("cctp mint recipient"))?;
		let domain = order.source_domain.to_string();
		let first_nonce = used_nonces_first(order.cctp_nonce).to_string();

		let mut prepare_accounts = vec![
			AccountMeta::new(order.payer, true),
			AccountMeta::new_readonly(custodian, false),
			AccountMeta::new_readonly(order.fast_vaa, false),
			AccountMeta::new_readonly(self.router_endpoint(order.source_chain)?, false),
			AccountMeta::new_readonly(self.router_endpoint(order.target_chain)?, false),
			AccountMeta::new_readonly(order.finalized_vaa, false),
			AccountMeta::new(prepared, false),
			AccountMeta::new(prepared_custody, false),
			AccountMeta::new(order.base_fee_token, false),
			AccountMeta::new_readonly(self.usdc_mint, false),
			AccountMeta::new(mint_recipient, false),
			AccountMeta::new_readonly(
				pda(
					&[b"message_transmitter_authority", tmm.as_ref()],
					mt,
					"message transmitter authority",
				)?,
				false,
			),
			AccountMeta::new_readonly(
				pda(&[b"message_transmitter"], mt, "message transmitter config")?,
				false,
			),
			AccountMeta::new(
				pda(
					&[b"used_nonces", domain.as_bytes(), first_nonce.as_bytes()],
					mt,
					"used nonces",
				)?,
				false,
			),
			AccountMeta::new_readonly(pda(&[b"__event_authority"], mt, "event authority")?, false),
		];
		prepare_accounts.extend(self.token_messenger_accounts(order.source_domain)?);
		prepare_accounts.extend([
			AccountMeta::new_readonly(
				pda(
					&[b"token_pair", domain.as_bytes(), &order.burn_token],
					tmm,
					"token pair",
				)?,
				false,
			),
			AccountMeta::new(
				pda(&[b"custody", self.usdc_mint.as_ref()], tmm, "custody token")?,
				false,
			),
			AccountMeta::new_readonly(pda(&[b"__event_authority"], tmm, "event authority")?, false),
			AccountMeta::new_readonly(*tmm, false),
			AccountMeta::new_readonly(*mt, false),
			AccountMeta::new_readonly(programs::TOKEN_PROGRAM, false),
			AccountMeta::new_readonly(programs::SYSTEM_PROGRAM, false),
		]);

		let prepare = Instruction {
			program_id: *engine,
			accounts: prepare_accounts,
			data: instruction_data(
				"prepare_order_response_cctp",
				&CctpMessageArgs {
					encoded_cctp_message: order.cctp_message.clone(),
					cctp_attestation: order.cctp_attestation.clone(),
				},
			)?,
		};

		let settle = Instruction {
			program_id: *engine,
			accounts: vec![
				AccountMeta::new(order.payer, true),
				AccountMeta::new(prepared, false),
				AccountMeta::new(prepared_custody, false),
				AccountMeta::new(order.auction, false),
				AccountMeta::new(order.best_offer_token, false),
				AccountMeta::new(order.base_fee_token, false),
				AccountMeta::new_readonly(programs::TOKEN_PROGRAM, false),
			],
			data: discriminator_only("settle_auction_complete"),
		};

		Ok(vec![prepare, settle])
	}
}
