//! Solana cluster client.
//!
//! Wraps the nonblocking `solana-client` RPC client. Read calls go through a
//! [`RetryPolicy`]; `sendTransaction` is attempted exactly once because the
//! delivery service owns submission retries.

use crate::utils::RetryPolicy;
use crate::{ChainClient, ChainError, LatestBlockhash, SignatureInfo, SignatureStatus};
use async_trait::async_trait;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_config::{RpcSendTransactionConfig, RpcTransactionConfig};
use solana_client::rpc_request::RpcError;
use solana_rpc_client_nonce_utils::nonblocking as nonce_utils;
use solana_commitment_config::{CommitmentConfig, CommitmentLevel};
use solana_sdk::transaction::Transaction;
use solver_types::{Blockhash, Pubkey, Signature};
use std::sync::Arc;
use tracing::trace;

/// Parses a configured commitment level (`processed`, `confirmed`, `finalized`).
pub fn parse_commitment(level: &str) -> Result<CommitmentConfig, ChainError> {
	let commitment = level
		.parse::<CommitmentLevel>()
		.map_err(|_| ChainError::InvalidInput(format!("Unknown commitment level: {}", level)))?;
	Ok(CommitmentConfig { commitment })
}

/// Maps a client failure onto the solver's error taxonomy.
///
/// Cluster rejections keep their message so stale blockhashes and nonces
/// can be recognised by the delivery service.
pub(crate) fn chain_error(method: &str, error: ClientError) -> ChainError {
	match error.kind() {
		ClientErrorKind::RpcError(RpcError::RpcResponseError { code, message, .. }) => {
			ChainError::Rpc {
				code: *code,
				message: message.clone(),
			}
		}
		// Rejected by the cluster without a JSON-RPC code.
		ClientErrorKind::TransactionError(e) => ChainError::Rpc {
			code: 0,
			message: e.to_string(),
		},
		ClientErrorKind::SerdeJson(e) => {
			ChainError::InvalidResponse(format!("{}: {}", method, e))
		}
		ClientErrorKind::RpcError(RpcError::ParseError(e)) => {
			ChainError::InvalidResponse(format!("{}: {}", method, e))
		}
		other => ChainError::Network(format!("{} request failed: {}", method, other)),
	}
}

/// RPC client for a Solana cluster.
#[derive(Clone)]
pub struct SolanaRpcClient {
	client: Arc<RpcClient>,
	commitment: CommitmentConfig,
	retry: RetryPolicy,
}

impl SolanaRpcClient {
	pub fn new(url: impl Into<String>, commitment: &str) -> Result<Self, ChainError> {
		let commitment = parse_commitment(commitment)?;
		Ok(Self {
			client: Arc::new(RpcClient::new_with_commitment(url.into(), commitment)),
			commitment,
			retry: RetryPolicy::rpc_default(),
		})
	}

	pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;
		self
	}

	async fn fetch_slot(&self) -> Result<u64, ChainError> {
		self.client
			.get_slot_with_commitment(self.commitment)
			.await
			.map_err(|e| chain_error("getSlot", e))
	}

	async fn fetch_latest_blockhash(&self) -> Result<LatestBlockhash, ChainError> {
		let (blockhash, last_valid_block_height) = self
			.client
			.get_latest_blockhash_with_commitment(self.commitment)
			.await
			.map_err(|e| chain_error("getLatestBlockhash", e))?;
		Ok(LatestBlockhash {
			blockhash,
			last_valid_block_height,
		})
	}

	async fn fetch_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, ChainError> {
		let response = self
			.client
			.get_account_with_commitment(address, self.commitment)
			.await
			.map_err(|e| chain_error("getAccountInfo", e))?;
		Ok(response.value.map(|account| account.data))
	}

	async fn fetch_token_balance(&self, token_account: &Pubkey) -> Result<u64, ChainError> {
		let response = self
			.client
			.get_token_account_balance_with_commitment(token_account, self.commitment)
			.await
			.map_err(|e| chain_error("getTokenAccountBalance", e))?;
		response.value.amount.parse().map_err(|e| {
			ChainError::InvalidResponse(format!("Token balance of {}: {}", token_account, e))
		})
	}

	async fn fetch_signature_status(
		&self,
		signature: &Signature,
	) -> Result<Option<SignatureStatus>, ChainError> {
		let response = self
			.client
			.get_signature_statuses(&[*signature])
			.await
			.map_err(|e| chain_error("getSignatureStatuses", e))?;

		Ok(response.value.into_iter().next().flatten().map(|status| {
			let confirmed = status.satisfies_commitment(CommitmentConfig::confirmed());
			SignatureStatus {
				slot: status.slot,
				confirmed,
				err: status.err.map(|e| e.to_string()),
			}
		}))
	}

	async fn fetch_signatures(
		&self,
		address: &Pubkey,
		until: Option<Signature>,
		limit: usize,
	) -> Result<Vec<SignatureInfo>, ChainError> {
		let config = GetConfirmedSignaturesForAddress2Config {
			before: None,
			until,
			limit: Some(limit),
			commitment: Some(self.commitment),
		};
		let entries = self
			.client
			.get_signatures_for_address_with_config(address, config)
			.await
			.map_err(|e| chain_error("getSignaturesForAddress", e))?;

		entries
			.into_iter()
			.map(|entry| {
				let signature = entry.signature.parse().map_err(|e| {
					ChainError::InvalidResponse(format!(
						"Invalid signature {}: {}",
						entry.signature, e
					))
				})?;
				Ok(SignatureInfo {
					signature,
					slot: entry.slot,
					failed: entry.err.is_some(),
				})
			})
			.collect()
	}

	async fn fetch_transaction_logs(
		&self,
		signature: &Signature,
	) -> Result<Option<Vec<String>>, ChainError> {
		let config = RpcTransactionConfig {
			encoding: None,
			commitment: Some(self.commitment),
			max_supported_transaction_version: Some(0),
		};
		let transaction = self
			.client
			.get_transaction_with_config(signature, config)
			.await
			.map_err(|e| chain_error("getTransaction", e))?;

		Ok(transaction
			.transaction
			.meta
			.map(|meta| Option::<Vec<String>>::from(meta.log_messages).unwrap_or_default()))
	}

	async fn fetch_nonce_blockhash(&self, nonce_account: &Pubkey) -> Result<Blockhash, ChainError> {
		let account =
			nonce_utils::get_account_with_commitment(&self.client, nonce_account, self.commitment)
				.await
				.map_err(|e| {
					ChainError::InvalidInput(format!("Nonce account {}: {}", nonce_account, e))
				})?;
		let data = nonce_utils::data_from_account(&account).map_err(|e| {
			ChainError::InvalidResponse(format!("Nonce account {}: {}", nonce_account, e))
		})?;
		Ok(data.blockhash())
	}
}

#[async_trait]
impl ChainClient for SolanaRpcClient {
	async fn get_slot(&self) -> Result<u64, ChainError> {
		self.retry.retry("getSlot", || self.fetch_slot()).await
	}

	async fn get_latest_blockhash(&self) -> Result<LatestBlockhash, ChainError> {
		self.retry
			.retry("getLatestBlockhash", || self.fetch_latest_blockhash())
			.await
	}

	async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, ChainError> {
		self.retry
			.retry("getAccountInfo", || self.fetch_account_data(address))
			.await
	}

	async fn get_token_balance(&self, token_account: &Pubkey) -> Result<u64, ChainError> {
		self.retry
			.retry("getTokenAccountBalance", || {
				self.fetch_token_balance(token_account)
			})
			.await
	}

	async fn send_transaction(
		&self,
		transaction: &Transaction,
		skip_preflight: bool,
	) -> Result<Signature, ChainError> {
		trace!(skip_preflight, "Sending transaction");
		let config = RpcSendTransactionConfig {
			skip_preflight,
			preflight_commitment: Some(self.commitment.commitment),
			max_retries: Some(0),
			..RpcSendTransactionConfig::default()
		};
		self.client
			.send_transaction_with_config(transaction, config)
			.await
			.map_err(|e| chain_error("sendTransaction", e))
	}

	async fn get_signature_status(
		&self,
		signature: &Signature,
	) -> Result<Option<SignatureStatus>, ChainError> {
		self.retry
			.retry("getSignatureStatuses", || {
				self.fetch_signature_status(signature)
			})
			.await
	}

	async fn get_signatures_for_address(
		&self,
		address: &Pubkey,
		until: Option<&Signature>,
		limit: usize,
	) -> Result<Vec<SignatureInfo>, ChainError> {
		let until = until.copied();
		self.retry
			.retry("getSignaturesForAddress", || {
				self.fetch_signatures(address, until, limit)
			})
			.await
	}

	async fn get_transaction_logs(
		&self,
		signature: &Signature,
	) -> Result<Option<Vec<String>>, ChainError> {
		self.retry
			.retry("getTransaction", || self.fetch_transaction_logs(signature))
			.await
	}

	async fn get_nonce_blockhash(&self, nonce_account: &Pubkey) -> Result<Blockhash, ChainError> {
		self.retry
			.retry("getNonceAccount", || self.fetch_nonce_blockhash(nonce_account))
			.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use solana_client::rpc_request::RpcResponseErrorData;

	fn rpc_failure(code: i64, message: &str) -> ClientError {
		ClientError::from(ClientErrorKind::RpcError(RpcError::RpcResponseError {
			code,
			message: message.to_string(),
			data: RpcResponseErrorData::Empty,
		}))
	}

	#[test]
	fn test_parse_commitment() {
		assert_eq!(
			parse_commitment("confirmed").unwrap(),
			CommitmentConfig::confirmed()
		);
		assert_eq!(
			parse_commitment("finalized").unwrap(),
			CommitmentConfig::finalized()
		);
		assert!(matches!(
			parse_commitment("soon"),
			Err(ChainError::InvalidInput(_))
		));
	}

	#[test]
	fn test_rejections_keep_their_message() {
		let error = chain_error(
			"sendTransaction",
			rpc_failure(-32002, "Transaction simulation failed: Blockhash not found"),
		);
		assert!(matches!(error, ChainError::Rpc { code: -32002, .. }));
		assert!(error.is_stale_resource());
	}

	#[test]
	fn test_transport_failures_are_network_errors() {
		let error = chain_error(
			"getSlot",
			ClientError::from(ClientErrorKind::Custom("connection reset".to_string())),
		);
		match error {
			ChainError::Network(message) => {
				assert!(message.starts_with("getSlot"));
				assert!(message.contains("connection reset"));
			}
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[test]
	fn test_new_rejects_unknown_commitment() {
		assert!(SolanaRpcClient::new("http://127.0.0.1:8899", "eventually").is_err());
		assert!(SolanaRpcClient::new("http://127.0.0.1:8899", "confirmed").is_ok());
	}
}
