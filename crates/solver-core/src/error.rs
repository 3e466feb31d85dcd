// solver-core/src/error.rs

use solver_account::AccountError;
use solver_chains::ChainError;
use solver_delivery::DeliveryError;
use solver_discovery::DiscoveryError;
use solver_storage::StorageError;
use solver_types::{Classify, ErrorClass};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
	#[error("Configuration error: {0}")]
	Configuration(String),

	#[error("Account error: {0}")]
	Account(#[from] AccountError),

	#[error("Chain error: {0}")]
	Chain(#[from] ChainError),

	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),

	#[error("Discovery error: {0}")]
	Discovery(#[from] DiscoveryError),

	#[error("Delivery error: {0}")]
	Delivery(#[from] DeliveryError),
}

impl Classify for CoreError {
	fn class(&self) -> ErrorClass {
		match self {
			Self::Chain(e) => e.class(),
			Self::Delivery(e) => e.class(),
			_ => ErrorClass::Fatal,
		}
	}
}
