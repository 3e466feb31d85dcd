//! Sources backed by the Solana cluster.

mod auctions;
mod slots;

pub use auctions::{parse_auction_events, AuctionEventDiscovery};
pub use slots::SlotDiscovery;

#[cfg(test)]
pub(crate) mod tests {
	use async_trait::async_trait;
	use solver_chains::{
		ChainClient, ChainError, LatestBlockhash, SignatureInfo, SignatureStatus,
	};
	use solver_types::{Blockhash, Pubkey, Signature, Transaction};
	use std::collections::{HashMap, VecDeque};
	use std::sync::Mutex;

	/// Scripted cluster: each call pops the next page or slot.
	#[derive(Default)]
	pub(crate) struct MockChain {
		signature_pages: Mutex<VecDeque<Vec<SignatureInfo>>>,
		logs: Mutex<HashMap<Signature, Vec<String>>>,
		slots: Mutex<VecDeque<u64>>,
	}

	impl MockChain {
		pub(crate) fn push_signatures(&self, page: Vec<SignatureInfo>) {
			self.signature_pages.lock().unwrap().push_back(page);
		}

		pub(crate) fn set_logs(&self, signature: Signature, logs: Vec<String>) {
			self.logs.lock().unwrap().insert(signature, logs);
		}

		pub(crate) fn push_slots(&self, slots: &[u64]) {
			self.slots.lock().unwrap().extend(slots);
		}
	}

	#[async_trait]
	impl ChainClient for MockChain {
		async fn get_slot(&self) -> Result<u64, ChainError> {
			self.slots
				.lock()
				.unwrap()
				.pop_front()
				.ok_or_else(|| ChainError::Network("no slot scripted".to_string()))
		}

		async fn get_latest_blockhash(&self) -> Result<LatestBlockhash, ChainError> {
			Ok(LatestBlockhash {
				blockhash: Blockhash::new_from_array([1u8; 32]),
				last_valid_block_height: 0,
			})
		}

		async fn get_account_data(&self, _: &Pubkey) -> Result<Option<Vec<u8>>, ChainError> {
			Ok(None)
		}

		async fn get_token_balance(&self, _: &Pubkey) -> Result<u64, ChainError> {
			Ok(0)
		}

		async fn send_transaction(
			&self,
			_: &Transaction,
			_: bool,
		) -> Result<Signature, ChainError> {
			Err(ChainError::InvalidInput("read-only mock".to_string()))
		}

		async fn get_signature_status(
			&self,
			_: &Signature,
		) -> Result<Option<SignatureStatus>, ChainError> {
			Ok(None)
		}

		async fn get_signatures_for_address(
			&self,
			_: &Pubkey,
			_: Option<&Signature>,
			_: usize,
		) -> Result<Vec<SignatureInfo>, ChainError> {
			Ok(self
				.signature_pages
				.lock()
				.unwrap()
				.pop_front()
				.unwrap_or_default())
		}

		async fn get_transaction_logs(
			&self,
			signature: &Signature,
		) -> Result<Option<Vec<String>>, ChainError> {
			Ok(self.logs.lock().unwrap().get(signature).cloned())
		}

		async fn get_nonce_blockhash(&self, _: &Pubkey) -> Result<Blockhash, ChainError> {
			Err(ChainError::InvalidInput("read-only mock".to_string()))
		}
	}
}
