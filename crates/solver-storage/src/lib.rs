//! Audit ledger storage for the solver.
//!
//! Every decision outcome (bid placed or skipped, execution, settlement) is
//! written here as JSON under a namespace, so outcomes can be inspected after
//! the fact. Backends are plain key-value stores.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use solver_types::{Classify, ErrorClass};
use std::path::Path;
use thiserror::Error;

pub mod implementations {
	pub mod file;
	pub mod memory;
}

use implementations::{file::FileStorage, memory::MemoryStorage};

/// Ledger namespaces.
pub mod namespaces {
	pub const BIDS: &str = "bids";
	pub const EXECUTIONS: &str = "executions";
	pub const SETTLEMENTS: &str = "settlements";
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	#[error("Not found")]
	NotFound,
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("Backend error: {0}")]
	Backend(String),
}

impl Classify for StorageError {
	fn class(&self) -> ErrorClass {
		match self {
			Self::NotFound | Self::Serialization(_) => ErrorClass::DataIntegrity,
			Self::Backend(_) => ErrorClass::Transient,
		}
	}
}

/// Low-level key-value interface implemented by every backend.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	async fn exists(&self, key: &str) -> Result<bool, StorageError>;
}

/// Typed JSON access on top of a backend.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	/// Stores a serializable value under `namespace:id`, replacing any previous one.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let key = format!("{}:{}", namespace, id);
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(&key, bytes).await
	}

	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let key = format!("{}:{}", namespace, id);
		let bytes = self.backend.get_bytes(&key).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&format!("{}:{}", namespace, id)).await
	}

	pub async fn remove(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
		let key = format!("{}:{}", namespace, id);
		self.backend.delete(&key).await
	}
}

/// Creates a backend by name: `"memory"` or `"file"` (which needs `path`).
pub fn create_storage(
	backend: &str,
	path: Option<&Path>,
) -> Result<Box<dyn StorageInterface>, StorageError> {
	match backend {
		"memory" => Ok(Box::new(MemoryStorage::new())),
		"file" => {
			let path = path.ok_or_else(|| {
				StorageError::Backend("file storage requires a path".to_string())
			})?;
			Ok(Box::new(FileStorage::new(path.to_path_buf())))
		}
		other => Err(StorageError::Backend(format!(
			"Unknown storage backend: {}",
			other
		))),
	}
}
