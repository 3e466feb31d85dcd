//! Local keypair signer.
//!
//! Holds a Solana keypair in memory, loaded from the base58 encoding of its
//! 64 secret-then-public bytes (the format Solana CLI keypairs print as).

use crate::{AccountError, AccountInterface};
use async_trait::async_trait;
use solana_sdk::signature::{Keypair, Signer};
use solver_types::{Pubkey, Signature};

pub struct LocalKeypair {
	keypair: Keypair,
}

impl LocalKeypair {
	/// Creates a keypair from its base58-encoded 64-byte form.
	pub fn from_base58(encoded: &str) -> Result<Self, AccountError> {
		let bytes = bs58::decode(encoded.trim())
			.into_vec()
			.map_err(|e| AccountError::InvalidKey(format!("Invalid base58: {}", e)))?;

		if bytes.len() != 64 {
			return Err(AccountError::InvalidKey(format!(
				"Keypair must be 64 bytes, got {}",
				bytes.len()
			)));
		}

		let keypair = Keypair::try_from(bytes.as_slice())
			.map_err(|e| AccountError::InvalidKey(format!("Invalid keypair: {}", e)))?;

		// The public half must belong to the secret half.
		if keypair.pubkey().as_ref() != &bytes[32..] {
			return Err(AccountError::InvalidKey(
				"public key does not match secret key".to_string(),
			));
		}

		Ok(Self { keypair })
	}

	pub fn from_secret(secret: [u8; 32]) -> Self {
		Self {
			keypair: Keypair::new_from_array(secret),
		}
	}

	pub fn pubkey(&self) -> Pubkey {
		self.keypair.pubkey()
	}

	pub fn to_base58(&self) -> String {
		self.keypair.to_base58_string()
	}
}

#[async_trait]
impl AccountInterface for LocalKeypair {
	async fn pubkey(&self) -> Result<Pubkey, AccountError> {
		Ok(LocalKeypair::pubkey(self))
	}

	async fn sign_message(&self, message: &[u8]) -> Result<Signature, AccountError> {
		self.keypair
			.try_sign_message(message)
			.map_err(|e| AccountError::SigningFailed(e.to_string()))
	}
}

/// Creates an account provider from the configured keypair string.
pub fn create_account(keypair: &str) -> Result<Box<dyn AccountInterface>, AccountError> {
	if keypair.trim().is_empty() {
		return Err(AccountError::InvalidKey("keypair is empty".to_string()));
	}
	Ok(Box::new(LocalKeypair::from_base58(keypair)?))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_sign_and_verify() {
		let keypair = LocalKeypair::from_secret([7u8; 32]);
		let message = b"solana message bytes";

		let signature = keypair.sign_message(message).await.unwrap();
		let pubkey = AccountInterface::pubkey(&keypair).await.unwrap();

		assert!(signature.verify(pubkey.as_ref(), message));
		assert!(!signature.verify(pubkey.as_ref(), b"other bytes"));
	}

	#[test]
	fn test_base58_round_trip() {
		let keypair = LocalKeypair::from_secret([42u8; 32]);
		let restored = LocalKeypair::from_base58(&keypair.to_base58()).unwrap();
		assert_eq!(restored.pubkey(), keypair.pubkey());
	}

	#[test]
	fn test_rejects_bad_keypairs() {
		assert!(LocalKeypair::from_base58("0OIl").is_err());
		assert!(LocalKeypair::from_base58(&bs58::encode([1u8; 32]).into_string()).is_err());

		// Public half does not belong to the secret half.
		let mut bytes = LocalKeypair::from_secret([3u8; 32]).keypair.to_bytes();
		bytes[40] ^= 0xff;
		assert!(LocalKeypair::from_base58(&bs58::encode(bytes).into_string()).is_err());

		assert!(create_account("  ").is_err());
	}
}
