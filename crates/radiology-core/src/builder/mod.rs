//! Builder pattern for constructing the radiology service.
//!
//! Resolves the storage implementations named in the configuration through
//! factory functions, selects the primary one and wires it together with the
//! configured study instance UID scheme.

use crate::{RadiologyService, StudyInstanceUidGenerator};
use radiology_config::Config;
use radiology_storage::{StorageError, StorageFactory, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during service construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for the pluggable components, keyed by implementation
/// name.
pub struct RadiologyFactories<SF> {
	pub storage_factories: HashMap<String, SF>,
}

impl RadiologyFactories<StorageFactory> {
	/// Factories for every storage implementation shipped with the workspace.
	pub fn registered() -> Self {
		Self {
			storage_factories: radiology_storage::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
		}
	}
}

/// Builder for constructing a [`RadiologyService`] from configuration.
pub struct RadiologyBuilder {
	config: Config,
}

impl RadiologyBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the service on the configured primary storage.
	pub fn build<SF>(self, factories: RadiologyFactories<SF>) -> Result<RadiologyService, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
	{
		let mut storage_impls = HashMap::new();
		for (name, config) in &self.config.storage.implementations {
			let Some(factory) = factories.storage_factories.get(name) else {
				tracing::warn!(
					component = "storage",
					implementation = %name,
					"No factory registered, skipping"
				);
				continue;
			};
			match factory(config) {
				Ok(implementation) => {
					storage_impls.insert(name.clone(), implementation);
					let is_primary = &self.config.storage.primary == name;
					tracing::info!(component = "storage", implementation = %name, enabled = %is_primary, "Loaded");
				},
				Err(e) => {
					tracing::error!(
						component = "storage",
						implementation = %name,
						error = %e,
						"Failed to create storage implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create storage implementation '{}': {}",
						name, e
					)));
				},
			}
		}

		if storage_impls.is_empty() {
			return Err(BuilderError::Config(
				"No valid storage implementations available".into(),
			));
		}

		let primary_storage = &self.config.storage.primary;
		let storage_backend = storage_impls.remove(primary_storage).ok_or_else(|| {
			BuilderError::MissingComponent(format!(
				"Primary storage '{}' has no registered factory",
				primary_storage
			))
		})?;
		let storage = Arc::new(StorageService::new(storage_backend));

		let uids = StudyInstanceUidGenerator::from_config(&self.config.study);
		tracing::info!(
			service_id = %self.config.service.id,
			storage = %primary_storage,
			uid_scheme = ?uids,
			"Built radiology service"
		);
		Ok(RadiologyService::new(storage, uids))
	}
}
