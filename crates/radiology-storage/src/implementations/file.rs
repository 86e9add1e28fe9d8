//! File-based storage backend.
//!
//! Each key is stored as one JSON document at
//! `<storage_path>/<namespace>/<id>.json`; sequences are small text files
//! under `<storage_path>/_sequences`. Individual files are replaced by
//! writing a temp file and renaming it over the target.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry, WriteBatch};
use async_trait::async_trait;
use radiology_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};

const SEQUENCE_DIR: &str = "_sequences";
const DEFAULT_STORAGE_PATH: &str = "./data/radiology";

/// A batch entry written to its temp file but not yet renamed into place.
struct StagedWrite {
	temp_path: PathBuf,
	path: PathBuf,
	previous: Option<Vec<u8>>,
}

/// File-based storage implementation.
///
/// Commits take the write side of an in-process lock while they check
/// expectations and rename files into place, so readers in this process
/// never observe half of a batch. A rename failing midway restores the files
/// already replaced. Separate processes sharing one directory
/// are not coordinated.
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
	/// Serialises commits against reads.
	visibility: RwLock<()>,
	/// Serialises sequence updates.
	sequences: Mutex<()>,
}

impl FileStorage {
	/// Creates a new FileStorage instance rooted at the given directory.
	pub fn new(base_path: PathBuf) -> Self {
		Self {
			base_path,
			visibility: RwLock::new(()),
			sequences: Mutex::new(()),
		}
	}

	/// Converts a storage key to its file path.
	///
	/// Ids are used verbatim as file names. Ids that are empty or contain a
	/// path separator or NUL are rejected.
	fn get_file_path(&self, key: &str) -> Result<PathBuf, StorageError> {
		let (namespace, id) = key.split_once(':').unwrap_or(("_default", key));
		if id.is_empty() || id.contains(['/', '\\', '\0']) {
			return Err(StorageError::Backend(format!("Invalid storage key '{}'", key)));
		}
		Ok(self
			.base_path
			.join(namespace)
			.join(format!("{}.json", id)))
	}

	fn sequence_path(&self, name: &str) -> PathBuf {
		self.base_path.join(SEQUENCE_DIR).join(name)
	}

	async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
		match fs::read(path).await {
			Ok(data) => Ok(Some(data)),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	/// Writes data next to its target, returning the temp path to rename.
	async fn write_temp(path: &Path, data: &[u8]) -> Result<PathBuf, StorageError> {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, data)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		Ok(temp_path)
	}

	async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StorageError> {
		let temp_path = Self::write_temp(path, data).await?;
		fs::rename(&temp_path, path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}

	/// Renames staged temp files over their targets in order.
	///
	/// If a rename fails, targets already replaced get their previous
	/// content back and the remaining temp files are removed.
	async fn publish(staged: Vec<StagedWrite>) -> Result<(), StorageError> {
		for (index, write) in staged.iter().enumerate() {
			if let Err(e) = fs::rename(&write.temp_path, &write.path).await {
				for restore in staged[..index].iter().rev() {
					let restored = match &restore.previous {
						Some(data) => Self::write_atomic(&restore.path, data).await,
						None => fs::remove_file(&restore.path)
							.await
							.map_err(|e| StorageError::Backend(e.to_string())),
					};
					if let Err(restore_error) = restored {
						tracing::error!(
							path = %restore.path.display(),
							error = %restore_error,
							"Failed to restore file after partial commit"
						);
					}
				}
				for pending in &staged[index..] {
					let _ = fs::remove_file(&pending.temp_path).await;
				}
				return Err(StorageError::Backend(e.to_string()));
			}
		}
		Ok(())
	}

	async fn read_sequence(&self, name: &str) -> Result<u64, StorageError> {
		match Self::read_optional(&self.sequence_path(name)).await? {
			Some(bytes) => String::from_utf8_lossy(&bytes)
				.trim()
				.parse()
				.map_err(|e| StorageError::Backend(format!("Corrupt sequence '{}': {}", name, e))),
			None => Ok(0),
		}
	}

	async fn write_sequence(&self, name: &str, value: u64) -> Result<(), StorageError> {
		Self::write_atomic(&self.sequence_path(name), value.to_string().as_bytes()).await
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let _guard = self.visibility.read().await;
		Self::read_optional(&self.get_file_path(key)?)
			.await?
			.ok_or(StorageError::NotFound)
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let _guard = self.visibility.write().await;
		Self::write_atomic(&self.get_file_path(key)?, &value).await
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let _guard = self.visibility.read().await;
		fs::try_exists(self.get_file_path(key)?)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}

	async fn list_ids(&self, namespace: &str) -> Result<Vec<String>, StorageError> {
		let _guard = self.visibility.read().await;
		let mut entries = match fs::read_dir(self.base_path.join(namespace)).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let mut ids = Vec::new();
		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = entry.path();
			if path.extension() != Some(std::ffi::OsStr::new("json")) {
				continue;
			}
			if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
				ids.push(stem.to_string());
			}
		}
		Ok(ids)
	}

	async fn commit(&self, batch: WriteBatch) -> Result<(), StorageError> {
		let _guard = self.visibility.write().await;

		let mut current = HashMap::with_capacity(batch.expectations.len());
		for (key, expected) in &batch.expectations {
			let value = Self::read_optional(&self.get_file_path(key)?).await?;
			if value.as_ref() != expected.as_ref() {
				return Err(StorageError::Conflict(key.clone()));
			}
			current.insert(key.as_str(), value);
		}

		let mut targets = Vec::with_capacity(batch.writes.len());
		for (key, value) in &batch.writes {
			targets.push((key.as_str(), self.get_file_path(key)?, value));
		}

		// Nothing is renamed until every temp file is written.
		let mut staged = Vec::with_capacity(targets.len());
		let mut failure = None;
		for (key, path, value) in targets {
			let previous = match current.remove(key) {
				Some(previous) => previous,
				None => match Self::read_optional(&path).await {
					Ok(previous) => previous,
					Err(e) => {
						failure = Some(e);
						break;
					},
				},
			};
			match Self::write_temp(&path, value).await {
				Ok(temp_path) => staged.push(StagedWrite {
					temp_path,
					path,
					previous,
				}),
				Err(e) => {
					failure = Some(e);
					break;
				},
			}
		}
		if let Some(e) = failure {
			for write in &staged {
				let _ = fs::remove_file(&write.temp_path).await;
			}
			return Err(e);
		}

		Self::publish(staged).await
	}

	async fn next_sequence(&self, name: &str) -> Result<u64, StorageError> {
		let _guard = self.sequences.lock().await;
		let next = self
			.read_sequence(name)
			.await?
			.checked_add(1)
			.ok_or_else(|| StorageError::Backend(format!("Sequence '{}' exhausted", name)))?;
		self.write_sequence(name, next).await?;
		Ok(next)
	}

	async fn advance_sequence(&self, name: &str, floor: u64) -> Result<(), StorageError> {
		let _guard = self.sequences.lock().await;
		let current = self.read_sequence(name).await?;
		if floor > current {
			self.write_sequence(name, floor).await?;
		}
		Ok(())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("storage_path", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(path) if path.trim().is_empty() => {
							Err("storage_path cannot be empty".to_string())
						},
						_ => Ok(()),
					}
				}),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for file storage (default: "./data/radiology")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_STORAGE_PATH);

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
