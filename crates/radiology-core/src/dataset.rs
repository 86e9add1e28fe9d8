//! Datasets of pre-identified orders, studies and observations.
//!
//! A dataset is a JSON document with `orders`, `studies` and `observations`
//! arrays in the stored record format. It is imported through
//! [`RadiologyService::load_dataset`](crate::RadiologyService::load_dataset).

use radiology_storage::StorageError;
use radiology_types::{Observation, Order, Study};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while reading or importing a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Dataset parse error: {0}")]
	Parse(String),
	#[error("Invalid dataset: {0}")]
	Invalid(String),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
	#[serde(default)]
	pub orders: Vec<Order>,
	#[serde(default)]
	pub studies: Vec<Study>,
	#[serde(default)]
	pub observations: Vec<Observation>,
}

impl Dataset {
	pub fn from_json_str(json: &str) -> Result<Self, DatasetError> {
		serde_json::from_str(json).map_err(|e| DatasetError::Parse(e.to_string()))
	}

	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
		let content = tokio::fs::read_to_string(path).await?;
		Self::from_json_str(&content)
	}

	/// Total number of records in the dataset.
	pub fn len(&self) -> usize {
		self.orders.len() + self.studies.len() + self.observations.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use radiology_types::{OrderAction, OrderId, PerformedProcedureStepStatus, StudyId, Urgency};

	#[test]
	fn test_bundled_dataset_parses() {
		let dataset =
			Dataset::from_json_str(include_str!("../testdata/radiology_dataset.json")).unwrap();

		assert_eq!(dataset.orders.len(), 3);
		assert_eq!(dataset.studies.len(), 2);
		assert_eq!(dataset.observations.len(), 1);
		assert_eq!(dataset.len(), 6);

		let order = &dataset.orders[0];
		assert_eq!(order.id, Some(OrderId(2001)));
		assert_eq!(order.action, OrderAction::New);
		assert_eq!(order.urgency, Urgency::Routine);
		assert!(order.study.is_none());

		let study = &dataset.studies[0];
		assert_eq!(study.id, Some(StudyId(1)));
		assert_eq!(study.order_id, Some(OrderId(2001)));
		assert_eq!(
			study.performed_status,
			Some(PerformedProcedureStepStatus::InProgress)
		);
	}

	#[tokio::test]
	async fn test_from_file() {
		let dir = tempfile::TempDir::new().unwrap();
		let path = dir.path().join("dataset.json");
		tokio::fs::write(&path, include_str!("../testdata/radiology_dataset.json"))
			.await
			.unwrap();

		let dataset = Dataset::from_file(&path).await.unwrap();
		assert_eq!(dataset.len(), 6);

		let missing = Dataset::from_file(dir.path().join("missing.json")).await;
		assert!(matches!(missing, Err(DatasetError::Io(_))));
	}

	#[test]
	fn test_missing_sections_default_to_empty() {
		let dataset = Dataset::from_json_str("{}").unwrap();
		assert!(dataset.is_empty());

		let err = Dataset::from_json_str("{\"orders\": 1}").unwrap_err();
		assert!(matches!(err, DatasetError::Parse(_)));
	}
}
