//! Failure classification shared by every crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a failure should be treated by retry loops and the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
	/// RPC timeouts, attestations not yet ready, stale blockhash or nonce.
	Transient,
	/// Fee too low, insufficient balance, auction already started or ended.
	EconomicSoft,
	/// Malformed messages and layouts.
	DataIntegrity,
	/// Missing credentials or configuration.
	Fatal,
}

impl ErrorClass {
	pub fn is_retryable(self) -> bool {
		matches!(self, Self::Transient)
	}
}

impl fmt::Display for ErrorClass {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Transient => "transient",
			Self::EconomicSoft => "economic",
			Self::DataIntegrity => "data-integrity",
			Self::Fatal => "fatal",
		};
		f.write_str(name)
	}
}

/// Implemented by error types that can be classified.
pub trait Classify {
	fn class(&self) -> ErrorClass;
}
