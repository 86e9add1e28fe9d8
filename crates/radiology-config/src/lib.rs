//! Configuration module for the radiology order system.
//!
//! Loads the service configuration from TOML, resolving `${VAR}` and
//! `${VAR:-default}` references against the environment, and validates it
//! before anything is built from it.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

mod loader;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Longest UID root accepted, leaving room for a study id suffix within the
/// 64-character DICOM UID limit.
pub const MAX_UID_ROOT_LENGTH: usize = 44;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message, not the echoed input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the radiology service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this service instance.
	pub service: ServiceConfig,
	/// Study settings.
	#[serde(default)]
	pub study: StudyConfig,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
}

/// Identity of the service instance, used in logs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	pub id: String,
}

/// Settings applied to studies created on order placement.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StudyConfig {
	/// Organisation UID root under which study instance UIDs are issued as
	/// `<uid_root>.<study id>`. Without a root, UUID-derived `2.25` UIDs are
	/// used.
	#[serde(default)]
	pub uid_root: Option<String>,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut missing = None;
	let resolved = re.replace_all(input, |caps: &regex::Captures<'_>| {
		let var_name = &caps[1];
		match (std::env::var(var_name), caps.get(2)) {
			(Ok(value), _) => value,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				if missing.is_none() {
					missing = Some(var_name.to_string());
				}
				String::new()
			},
		}
	});

	match missing {
		Some(var_name) => Err(ConfigError::Validation(format!(
			"Environment variable '{}' not found",
			var_name
		))),
		None => Ok(resolved.into_owned()),
	}
}

/// Checks that a UID root is a dotted sequence of numeric components
/// without leading zeros.
fn validate_uid_root(root: &str) -> Result<(), ConfigError> {
	let re = Regex::new(r"^(0|[1-9][0-9]*)(\.(0|[1-9][0-9]*))*$")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	if !re.is_match(root) {
		return Err(ConfigError::Validation(format!(
			"study.uid_root '{}' is not a valid DICOM UID root",
			root
		)));
	}
	if root.len() > MAX_UID_ROOT_LENGTH {
		return Err(ConfigError::Validation(format!(
			"study.uid_root is {} characters long (max: {})",
			root.len(),
			MAX_UID_ROOT_LENGTH
		)));
	}
	Ok(())
}

impl Config {
	/// Loads configuration from a file, following include directives.
	///
	/// Each top-level section must be unique across all configuration files.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Validates the configuration:
	/// - the service id is not empty
	/// - the primary storage is one of the configured implementations
	/// - the study UID root, if any, is a valid DICOM UID root
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.trim().is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}

		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' is not configured in storage.implementations",
				self.storage.primary
			)));
		}

		if let Some(root) = &self.study.uid_root {
			validate_uid_root(root)?;
		}

		Ok(())
	}

	/// Configuration table of the primary storage implementation.
	pub fn primary_storage(&self) -> Option<&toml::Value> {
		self.storage.implementations.get(&self.storage.primary)
	}
}

/// Parses and validates a configuration document.
///
/// Environment variable references are resolved first.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
