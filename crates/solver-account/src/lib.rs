use async_trait::async_trait;
use solver_types::{Classify, ErrorClass, Pubkey, Signature};
use thiserror::Error;

pub mod implementations;

pub use implementations::local::{create_account, LocalKeypair};

#[derive(Debug, Error)]
pub enum AccountError {
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	#[error("Invalid key: {0}")]
	InvalidKey(String),
}

impl Classify for AccountError {
	fn class(&self) -> ErrorClass {
		ErrorClass::Fatal
	}
}

/// Signer boundary: the only place key material is touched.
#[async_trait]
pub trait AccountInterface: Send + Sync {
	async fn pubkey(&self) -> Result<Pubkey, AccountError>;
	/// Signs a serialized transaction message.
	async fn sign_message(&self, message: &[u8]) -> Result<Signature, AccountError>;
}

pub struct AccountService {
	provider: Box<dyn AccountInterface>,
}

impl AccountService {
	pub fn new(provider: Box<dyn AccountInterface>) -> Self {
		Self { provider }
	}

	pub async fn get_pubkey(&self) -> Result<Pubkey, AccountError> {
		self.provider.pubkey().await
	}

	pub async fn sign(&self, message: &[u8]) -> Result<Signature, AccountError> {
		self.provider.sign_message(message).await
	}
}
