// solver-delivery/src/lib.rs

//! Transaction resource manager.
//!
//! Turns a [`PreparedTransaction`] into a submitted, confirmed transaction.
//! Two replay-protection modes are supported:
//!
//! - **Cached blockhash**: a recent blockhash refreshed in the background on a
//!   slot cadence. Submission never waits on the refresh; a slightly stale
//!   value is accepted. Used for bids and execution.
//! - **Durable nonce**: the nonce account value is fetched right before
//!   submission and an `AdvanceNonceAccount` instruction is prepended. Used for
//!   settlement.
//!
//! Rejections caused by a stale or consumed blockhash/nonce are retried a
//! bounded number of times with a fixed delay. Skip-preflight submissions are
//! attempted exactly once. Every outcome is returned as a [`SubmissionOutcome`].

use solver_account::{AccountError, AccountService};
use solver_chains::{ChainClient, ChainError, RetryPolicy};
use solver_config::DeliveryConfig;
use solana_sdk::transaction::Transaction;
use solver_types::{
	Blockhash, Classify, ErrorClass, Instruction, PreparedTransaction, Pubkey, Signature,
	SubmissionOutcome,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub mod message;

use message::{advance_nonce, compute_budget, unsigned_transaction};

/// Interval between signature status polls.
const CONFIRMATION_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum DeliveryError {
	#[error("Chain error: {0}")]
	Chain(#[from] ChainError),
	#[error("Account error: {0}")]
	Account(#[from] AccountError),
	#[error("Signer {0} is not available")]
	MissingSigner(Pubkey),
	#[error("Transaction {signature} failed: {reason}")]
	TransactionFailed { signature: Signature, reason: String },
	#[error("Transaction {0} was not confirmed in time")]
	ConfirmationTimeout(Signature),
}

impl DeliveryError {
	fn is_stale_resource(&self) -> bool {
		matches!(self, Self::Chain(e) if e.is_stale_resource())
	}

	/// Signature of a transaction that reached the cluster, if any.
	fn signature(&self) -> Option<Signature> {
		match self {
			Self::TransactionFailed { signature, .. } | Self::ConfirmationTimeout(signature) => {
				Some(*signature)
			}
			_ => None,
		}
	}
}

impl Classify for DeliveryError {
	fn class(&self) -> ErrorClass {
		match self {
			Self::Chain(e) => e.class(),
			Self::Account(e) => e.class(),
			Self::MissingSigner(_) => ErrorClass::Fatal,
			Self::TransactionFailed { .. } => ErrorClass::EconomicSoft,
			Self::ConfirmationTimeout(_) => ErrorClass::Transient,
		}
	}
}

#[derive(Debug, Clone, Copy)]
struct CachedBlockhash {
	blockhash: Blockhash,
	slot: u64,
}

/// Transaction resource manager for the destination chain.
pub struct DeliveryService {
	chain: Arc<dyn ChainClient>,
	account: Arc<AccountService>,
	signer: Pubkey,
	config: DeliveryConfig,
	cached: Arc<RwLock<Option<CachedBlockhash>>>,
}

impl DeliveryService {
	pub async fn new(
		chain: Arc<dyn ChainClient>,
		account: Arc<AccountService>,
		config: DeliveryConfig,
	) -> Result<Self, DeliveryError> {
		let signer = account.get_pubkey().await?;
		Ok(Self {
			chain,
			account,
			signer,
			config,
			cached: Arc::new(RwLock::new(None)),
		})
	}

	/// The solver's signing key, which also pays fees.
	pub fn signer(&self) -> Pubkey {
		self.signer
	}

	/// Fetches a fresh blockhash into the cache.
	pub async fn refresh_blockhash(&self, slot: u64) -> Result<Blockhash, DeliveryError> {
		refresh_into(&self.chain, &self.cached, slot).await
	}

	/// Starts a background refresh and returns immediately.
	pub fn spawn_refresh(&self, slot: u64) {
		let chain = self.chain.clone();
		let cached = self.cached.clone();
		tokio::spawn(async move {
			if let Err(e) = refresh_into(&chain, &cached, slot).await {
				warn!(slot, error = %e, "Background blockhash refresh failed");
			}
		});
	}

	/// Slot at which the cached blockhash was fetched.
	pub async fn cached_blockhash_slot(&self) -> Option<u64> {
		self.cached.read().await.map(|c| c.slot)
	}

	/// Signs, submits and confirms `tx`.
	pub async fn submit(&self, tx: PreparedTransaction) -> SubmissionOutcome {
		let max_attempts = if tx.skip_preflight {
			1
		} else {
			self.config.max_retries.saturating_add(1)
		};
		let policy = RetryPolicy::fixed(self.config.retry_delay(), max_attempts);
		let attempts = AtomicU32::new(0);

		let result = policy
			.retry_if(
				&tx.tx_type.to_string(),
				|| {
					let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
					self.attempt(&tx, attempt > 1)
				},
				DeliveryError::is_stale_resource,
			)
			.await;

		let attempts = attempts.load(Ordering::SeqCst);
		match result {
			Ok(signature) => {
				info!(
					tx_type = %tx.tx_type,
					auction = %tx.auction,
					%signature,
					attempts,
					"Transaction confirmed"
				);
				SubmissionOutcome {
					tx_type: tx.tx_type,
					auction: tx.auction,
					signature: Some(signature),
					success: true,
					attempts,
					error: None,
				}
			}
			Err(e) => {
				warn!(
					tx_type = %tx.tx_type,
					auction = %tx.auction,
					attempts,
					error = %e,
					"Transaction submission failed"
				);
				SubmissionOutcome {
					tx_type: tx.tx_type,
					auction: tx.auction,
					signature: e.signature(),
					success: false,
					attempts,
					error: Some(e.to_string()),
				}
			}
		}
	}

	/// One build-sign-send-confirm pass.
	async fn attempt(
		&self,
		tx: &PreparedTransaction,
		is_retry: bool,
	) -> Result<Signature, DeliveryError> {
		for signer in &tx.signers {
			if *signer != self.signer {
				return Err(DeliveryError::MissingSigner(*signer));
			}
		}

		let (blockhash, mut instructions) = match &tx.nonce_account {
			Some(nonce_account) => {
				let nonce = self.chain.get_nonce_blockhash(nonce_account).await?;
				debug!(%nonce_account, %nonce, "Using durable nonce");
				(nonce, vec![advance_nonce(nonce_account, &self.signer)])
			}
			None => {
				let blockhash = if is_retry {
					self.refresh_blockhash(self.cached_blockhash_slot().await.unwrap_or(0))
						.await?
				} else {
					self.current_blockhash().await?
				};
				(blockhash, Vec::new())
			}
		};

		instructions.extend(compute_budget(&tx.compute_budget));
		instructions.extend(tx.instructions.iter().cloned());

		let transaction = self.sign(&instructions, blockhash).await?;
		let signature = self
			.chain
			.send_transaction(&transaction, tx.skip_preflight)
			.await?;
		debug!(tx_type = %tx.tx_type, %signature, "Transaction sent");

		self.wait_for_confirmation(signature).await?;
		Ok(signature)
	}

	async fn current_blockhash(&self) -> Result<Blockhash, DeliveryError> {
		if let Some(cached) = *self.cached.read().await {
			return Ok(cached.blockhash);
		}
		self.refresh_blockhash(0).await
	}

	async fn sign(
		&self,
		instructions: &[Instruction],
		blockhash: Blockhash,
	) -> Result<Transaction, DeliveryError> {
		let mut transaction = unsigned_transaction(&self.signer, instructions, &blockhash);

		// The solver key must be the only required signer.
		if let Some(other) = transaction
			.message
			.signer_keys()
			.into_iter()
			.find(|k| **k != self.signer)
		{
			return Err(DeliveryError::MissingSigner(*other));
		}

		let signature = self.account.sign(&transaction.message_data()).await?;
		transaction.signatures = vec![signature];
		Ok(transaction)
	}

	async fn wait_for_confirmation(&self, signature: Signature) -> Result<(), DeliveryError> {
		let deadline = tokio::time::Instant::now() + self.config.confirm_timeout();

		loop {
			if let Some(status) = self.chain.get_signature_status(&signature).await? {
				if let Some(reason) = status.err {
					return Err(DeliveryError::TransactionFailed { signature, reason });
				}
				if status.confirmed {
					return Ok(());
				}
			}

			if tokio::time::Instant::now() >= deadline {
				return Err(DeliveryError::ConfirmationTimeout(signature));
			}
			tokio::time::sleep(CONFIRMATION_POLL_INTERVAL).await;
		}
	}
}

async fn refresh_into(
	chain: &Arc<dyn ChainClient>,
	cached: &RwLock<Option<CachedBlockhash>>,
	slot: u64,
) -> Result<Blockhash, DeliveryError> {
	let latest = chain.get_latest_blockhash().await?;
	*cached.write().await = Some(CachedBlockhash {
		blockhash: latest.blockhash,
		slot,
	});
	debug!(slot, blockhash = %latest.blockhash, "Refreshed blockhash");
	Ok(latest.blockhash)
}
