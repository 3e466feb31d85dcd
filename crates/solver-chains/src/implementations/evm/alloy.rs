//! Alloy-based source-chain reader.

use crate::{ChainError, SourceChainClient, SourceLog};
use alloy::primitives::B256;
use alloy::providers::{Provider, RootProvider};
use async_trait::async_trait;
use tracing::debug;

/// Reads transaction receipts from an EVM chain over HTTP.
pub struct AlloySourceChain {
	/// Wormhole chain id, not the EVM chain id.
	chain: u16,
	provider: RootProvider,
}

impl AlloySourceChain {
	pub fn new(chain: u16, rpc_url: &str) -> Result<Self, ChainError> {
		let url = rpc_url
			.parse()
			.map_err(|e| ChainError::InvalidInput(format!("Invalid RPC URL {}: {}", rpc_url, e)))?;

		Ok(Self {
			chain,
			provider: RootProvider::new_http(url),
		})
	}
}

#[async_trait]
impl SourceChainClient for AlloySourceChain {
	fn chain(&self) -> u16 {
		self.chain
	}

	async fn get_transaction_logs(&self, tx_hash: &str) -> Result<Vec<SourceLog>, ChainError> {
		let hash: B256 = tx_hash
			.parse()
			.map_err(|e| ChainError::InvalidInput(format!("Invalid tx hash {}: {}", tx_hash, e)))?;

		let receipt = self
			.provider
			.get_transaction_receipt(hash)
			.await
			.map_err(|e| ChainError::Network(format!("Failed to fetch receipt: {}", e)))?
			.ok_or_else(|| {
				ChainError::Network(format!(
					"Receipt for {} not yet available on chain {}",
					tx_hash, self.chain
				))
			})?;

		let logs: Vec<SourceLog> = receipt
			.inner
			.logs()
			.iter()
			.map(|log| SourceLog {
				address: log.address(),
				topics: log.topics().to_vec(),
				data: log.data().data.clone(),
			})
			.collect();

		debug!(
			chain = self.chain,
			tx_hash,
			log_count = logs.len(),
			"Fetched source transaction logs"
		);
		Ok(logs)
	}
}
