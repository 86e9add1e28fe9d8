//! Core of the radiology order system.
//!
//! Places radiology orders together with their studies, discontinues them,
//! and answers queries across orders, studies and observations. All
//! business-rule validation happens in [`RadiologyService`] before anything
//! is written; persistence is delegated to the repositories, which stage
//! their writes in a storage [`Transaction`](radiology_storage::Transaction)
//! so that every operation is applied as a whole or not at all.

use radiology_storage::StorageError;
use thiserror::Error;

/// Builder wiring configuration, storage backends and the service.
pub mod builder;
/// JSON datasets of pre-identified records.
pub mod dataset;
/// Order, study and observation persistence.
pub mod repositories;
/// Radiology service operations.
pub mod service;
/// Order lifecycle state machine.
pub mod state;
/// Study instance UID generation.
pub mod uid;

pub use builder::{BuilderError, RadiologyBuilder, RadiologyFactories};
pub use dataset::{Dataset, DatasetError};
pub use service::RadiologyService;
pub use uid::StudyInstanceUidGenerator;

/// Errors surfaced by radiology operations.
#[derive(Debug, Error)]
pub enum RadiologyError {
	/// A precondition on the arguments was violated. Raised before any write;
	/// the message identifies the violated precondition.
	#[error("{0}")]
	InvalidArgument(String),
	/// The storage backend failed.
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

impl RadiologyError {
	pub(crate) fn invalid_argument(message: &str) -> Self {
		Self::InvalidArgument(message.to_string())
	}
}
