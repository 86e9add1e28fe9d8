//! Storage module for the radiology order system.
//!
//! This module provides the persistence collaborator used by the radiology
//! service: a low-level byte-oriented backend trait, a typed service on top
//! of it, and a [`Transaction`] unit of work that applies a group of writes
//! atomically or not at all.

use async_trait::async_trait;
use radiology_types::{ConfigSchema, ImplementationRegistry};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

mod transaction;

pub use transaction::Transaction;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
	/// A value read by a transaction changed before the transaction committed.
	#[error("Conflicting concurrent update of {0}")]
	Conflict(String),
	/// A unique key is already taken.
	#[error("Duplicate key: {0}")]
	Duplicate(String),
}

/// A group of writes applied atomically by [`StorageInterface::commit`].
#[derive(Debug, Default)]
pub struct WriteBatch {
	/// Values the writer based its decision on, keyed by storage key. `None`
	/// records that the key was absent.
	pub expectations: Vec<(String, Option<Vec<u8>>)>,
	/// Values to write.
	pub writes: Vec<(String, Vec<u8>)>,
}

/// Trait defining the low-level interface for storage backends.
///
/// Keys have the form `<namespace>:<id>`. Besides plain key-value access a
/// backend must be able to list the ids of a namespace, hand out
/// monotonically increasing ids and apply a [`WriteBatch`] atomically.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes under the given key.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Lists the ids stored within a namespace, in no particular order.
	async fn list_ids(&self, namespace: &str) -> Result<Vec<String>, StorageError>;

	/// Applies a batch of writes atomically.
	///
	/// Every expectation is checked against the current value while no other
	/// commit can interleave; a single mismatch rejects the whole batch with
	/// [`StorageError::Conflict`] and nothing is written.
	async fn commit(&self, batch: WriteBatch) -> Result<(), StorageError>;

	/// Returns the next value of the named sequence, starting at 1.
	async fn next_sequence(&self, name: &str) -> Result<u64, StorageError>;

	/// Ensures the named sequence never hands out a value at or below `floor`.
	async fn advance_sequence(&self, name: &str, floor: u64) -> Result<(), StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
///
/// Returns (name, factory) tuples used by the builder to resolve the
/// implementations named in the configuration.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Builds the storage key for a record.
pub(crate) fn storage_key(namespace: &str, id: &str) -> String {
	format!("{}:{}", namespace, id)
}

/// High-level storage service that provides typed operations.
///
/// Values are stored as JSON. Reads and single writes go straight to the
/// backend; anything that must be all-or-nothing goes through [`begin`].
///
/// [`begin`]: StorageService::begin
pub struct StorageService {
	/// The underlying storage backend implementation.
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	/// Opens a unit of work. Nothing it stages becomes visible until
	/// [`Transaction::commit`] succeeds.
	pub fn begin(&self) -> Transaction<'_> {
		Transaction::new(self.backend.as_ref())
	}

	/// Stores a serializable value, creating or overwriting it.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend
			.set_bytes(&storage_key(namespace, id), bytes)
			.await
	}

	/// Retrieves and deserializes a value, failing with
	/// [`StorageError::NotFound`] if it does not exist.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&storage_key(namespace, id)).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Retrieves a value, treating absence as `None`.
	pub async fn find<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<Option<T>, StorageError> {
		match self.retrieve(namespace, id).await {
			Ok(value) => Ok(Some(value)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	/// Checks if a value exists in storage.
	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&storage_key(namespace, id)).await
	}

	/// Loads every value of a namespace.
	///
	/// Entries removed between listing and loading are skipped.
	pub async fn list<T: DeserializeOwned>(&self, namespace: &str) -> Result<Vec<T>, StorageError> {
		let ids = self.backend.list_ids(namespace).await?;
		let mut values = Vec::with_capacity(ids.len());
		for id in ids {
			if let Some(value) = self.find(namespace, &id).await? {
				values.push(value);
			}
		}
		Ok(values)
	}
}
