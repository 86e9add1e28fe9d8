//! In-memory storage backend implementation.
//!
//! This module provides a memory-based implementation of the StorageInterface trait,
//! useful for testing and development scenarios where persistence is not required.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry, WriteBatch};
use async_trait::async_trait;
use radiology_types::{ConfigSchema, ImplementationRegistry, Schema, ValidationError};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct MemoryState {
	entries: HashMap<String, Vec<u8>>,
	sequences: HashMap<String, u64>,
}

/// In-memory storage implementation.
///
/// All entries and sequences live behind one read-write lock, so a commit
/// holding the write lock is atomic with respect to every reader.
pub struct MemoryStorage {
	state: RwLock<MemoryState>,
}

impl MemoryStorage {
	/// Creates a new MemoryStorage instance.
	pub fn new() -> Self {
		Self {
			state: RwLock::new(MemoryState::default()),
		}
	}
}

impl Default for MemoryStorage {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let state = self.state.read().await;
		state.entries.get(key).cloned().ok_or(StorageError::NotFound)
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let mut state = self.state.write().await;
		state.entries.insert(key.to_string(), value);
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let state = self.state.read().await;
		Ok(state.entries.contains_key(key))
	}

	async fn list_ids(&self, namespace: &str) -> Result<Vec<String>, StorageError> {
		let prefix = format!("{}:", namespace);
		let state = self.state.read().await;
		Ok(state
			.entries
			.keys()
			.filter_map(|key| key.strip_prefix(&prefix))
			.map(str::to_string)
			.collect())
	}

	async fn commit(&self, batch: WriteBatch) -> Result<(), StorageError> {
		let mut state = self.state.write().await;

		for (key, expected) in &batch.expectations {
			if state.entries.get(key) != expected.as_ref() {
				return Err(StorageError::Conflict(key.clone()));
			}
		}

		state.entries.extend(batch.writes);
		Ok(())
	}

	async fn next_sequence(&self, name: &str) -> Result<u64, StorageError> {
		let mut state = self.state.write().await;
		let current = state.sequences.entry(name.to_string()).or_insert(0);
		*current = current
			.checked_add(1)
			.ok_or_else(|| StorageError::Backend(format!("Sequence '{}' exhausted", name)))?;
		Ok(*current)
	}

	async fn advance_sequence(&self, name: &str, floor: u64) -> Result<(), StorageError> {
		let mut state = self.state.write().await;
		let current = state.sequences.entry(name.to_string()).or_insert(0);
		*current = (*current).max(floor);
		Ok(())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStorageSchema)
	}
}

/// Configuration schema for MemoryStorage.
pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// Memory storage takes no settings
		Schema::default().validate(config)
	}
}

/// Factory function to create a memory storage backend from configuration.
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	MemoryStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;
	Ok(Box::new(MemoryStorage::new()))
}

/// Registry for the memory storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
