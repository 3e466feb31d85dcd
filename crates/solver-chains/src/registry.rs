//! Registry of source-chain clients.
//!
//! The settlement path looks up the client for a finalized message's emitter
//! chain here. Clients are keyed by Wormhole chain id.

use crate::{AlloySourceChain, ChainError, SourceChainClient};
use std::{collections::HashMap, fmt, sync::Arc};
use tracing::info;

/// Source-chain clients indexed by Wormhole chain id.
pub struct SourceChainRegistry {
	clients: HashMap<u16, Arc<dyn SourceChainClient>>,
}

impl SourceChainRegistry {
	pub fn new() -> Self {
		Self {
			clients: HashMap::new(),
		}
	}

	/// Registers a client.
	///
	/// # Errors
	///
	/// Returns an error if a client for the same chain is already registered.
	pub fn register(&mut self, client: Arc<dyn SourceChainClient>) -> Result<(), ChainError> {
		let chain = client.chain();
		info!(chain, "Registering source chain client");

		if self.clients.contains_key(&chain) {
			return Err(ChainError::InvalidInput(format!(
				"Chain {} already registered",
				chain
			)));
		}

		self.clients.insert(chain, client);
		Ok(())
	}

	pub fn get(&self, chain: u16) -> Option<Arc<dyn SourceChainClient>> {
		self.clients.get(&chain).cloned()
	}

	/// Like [`get`](Self::get) but returns an error for unknown chains.
	pub fn get_required(&self, chain: u16) -> Result<Arc<dyn SourceChainClient>, ChainError> {
		self.get(chain).ok_or(ChainError::UnknownChain(chain))
	}

	/// Registered chain ids, in no particular order.
	pub fn chains(&self) -> Vec<u16> {
		self.clients.keys().copied().collect()
	}

	/// Builds alloy-backed clients for every configured endpoint.
	pub fn with_endpoints(endpoints: &HashMap<u16, String>) -> Result<Self, ChainError> {
		let mut registry = Self::new();
		for (chain, url) in endpoints {
			registry.register(Arc::new(AlloySourceChain::new(*chain, url)?))?;
		}
		Ok(registry)
	}
}

impl Default for SourceChainRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for SourceChainRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SourceChainRegistry")
			.field("chains", &self.clients.keys().collect::<Vec<_>>())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::SourceLog;
	use async_trait::async_trait;

	struct MockSourceChain {
		chain: u16,
	}

	#[async_trait]
	impl SourceChainClient for MockSourceChain {
		fn chain(&self) -> u16 {
			self.chain
		}

		async fn get_transaction_logs(&self, _: &str) -> Result<Vec<SourceLog>, ChainError> {
			Ok(vec![])
		}
	}

	#[test]
	fn test_registry_register_and_get() {
		let mut registry = SourceChainRegistry::new();
		registry
			.register(Arc::new(MockSourceChain { chain: 2 }))
			.unwrap();

		assert_eq!(registry.get(2).unwrap().chain(), 2);
		assert!(registry.get(6).is_none());
		assert!(matches!(
			registry.get_required(6),
			Err(ChainError::UnknownChain(6))
		));
	}

	#[test]
	fn test_registry_duplicate_registration() {
		let mut registry = SourceChainRegistry::new();
		registry
			.register(Arc::new(MockSourceChain { chain: 2 }))
			.unwrap();
		assert!(registry
			.register(Arc::new(MockSourceChain { chain: 2 }))
			.is_err());
	}

	#[test]
	fn test_with_endpoints() {
		let endpoints = HashMap::from([
			(2u16, "http://localhost:8545".to_string()),
			(6u16, "http://localhost:9650/ext/bc/C/rpc".to_string()),
		]);
		let registry = SourceChainRegistry::with_endpoints(&endpoints).unwrap();

		let mut chains = registry.chains();
		chains.sort();
		assert_eq!(chains, vec![2, 6]);
	}
}
