//! Unit of work over a storage backend.

use crate::{storage_key, StorageError, StorageInterface, WriteBatch};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Stages writes and records what was read so they can be committed as one
/// atomic batch.
///
/// Reads see the transaction's own staged writes first. Every value read
/// from the backend becomes an expectation of the commit, so a transaction
/// that decided based on a value another writer has since changed fails with
/// [`StorageError::Conflict`] instead of overwriting it. Dropping a
/// transaction without committing discards everything it staged.
pub struct Transaction<'a> {
	backend: &'a dyn StorageInterface,
	observed: HashMap<String, Option<Vec<u8>>>,
	staged: BTreeMap<String, Vec<u8>>,
	finished: bool,
}

impl<'a> Transaction<'a> {
	pub(crate) fn new(backend: &'a dyn StorageInterface) -> Self {
		Self {
			backend,
			observed: HashMap::new(),
			staged: BTreeMap::new(),
			finished: false,
		}
	}

	async fn read_raw(&mut self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
		if let Some(bytes) = self.staged.get(key) {
			return Ok(Some(bytes.clone()));
		}
		if let Some(observed) = self.observed.get(key) {
			return Ok(observed.clone());
		}

		let value = match self.backend.get_bytes(key).await {
			Ok(bytes) => Some(bytes),
			Err(StorageError::NotFound) => None,
			Err(e) => return Err(e),
		};
		self.observed.insert(key.to_string(), value.clone());
		Ok(value)
	}

	/// Reads a value, treating absence as `None`.
	pub async fn retrieve<T: DeserializeOwned>(
		&mut self,
		namespace: &str,
		id: &str,
	) -> Result<Option<T>, StorageError> {
		self.read_raw(&storage_key(namespace, id))
			.await?
			.map(|bytes| {
				serde_json::from_slice(&bytes)
					.map_err(|e| StorageError::Serialization(e.to_string()))
			})
			.transpose()
	}

	/// Stages a value to be written on commit.
	pub fn store<T: Serialize>(
		&mut self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.staged.insert(storage_key(namespace, id), bytes);
		Ok(())
	}

	/// Fails with [`StorageError::Duplicate`] if the key is taken, and makes
	/// the commit fail if another writer takes it first.
	pub async fn ensure_absent(&mut self, namespace: &str, id: &str) -> Result<(), StorageError> {
		let key = storage_key(namespace, id);
		if self.read_raw(&key).await?.is_some() {
			return Err(StorageError::Duplicate(key));
		}
		Ok(())
	}

	/// Draws the next id from a sequence.
	///
	/// Sequences are not rolled back, so ids of abandoned transactions are
	/// never reused.
	pub async fn next_id(&self, sequence: &str) -> Result<u64, StorageError> {
		self.backend.next_sequence(sequence).await
	}

	/// Moves a sequence past an explicitly assigned id.
	pub async fn reserve_id(&self, sequence: &str, id: u64) -> Result<(), StorageError> {
		self.backend.advance_sequence(sequence, id).await
	}

	/// Number of writes staged so far.
	pub fn pending_writes(&self) -> usize {
		self.staged.len()
	}

	/// Applies all staged writes atomically.
	pub async fn commit(mut self) -> Result<(), StorageError> {
		self.finished = true;
		if self.staged.is_empty() {
			return Ok(());
		}

		let batch = WriteBatch {
			expectations: std::mem::take(&mut self.observed).into_iter().collect(),
			writes: std::mem::take(&mut self.staged).into_iter().collect(),
		};
		tracing::trace!(
			writes = batch.writes.len(),
			expectations = batch.expectations.len(),
			"Committing transaction"
		);
		self.backend.commit(batch).await
	}

	/// Discards all staged writes.
	pub fn rollback(mut self) {
		self.finished = true;
		tracing::debug!(writes = self.staged.len(), "Rolled back transaction");
	}
}

impl Drop for Transaction<'_> {
	fn drop(&mut self) {
		if !self.finished && !self.staged.is_empty() {
			tracing::debug!(
				writes = self.staged.len(),
				"Discarding uncommitted transaction"
			);
		}
	}
}
