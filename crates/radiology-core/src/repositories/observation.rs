//! Observations recorded against orders.

use super::assign_id;
use radiology_storage::{StorageError, StorageService, Transaction};
use radiology_types::{Observation, ObservationId, OrderId, StorageKey};
use std::sync::Arc;

pub struct ObservationRepository {
	storage: Arc<StorageService>,
}

impl ObservationRepository {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Returns the observations recorded for an order, sorted by id.
	pub async fn find_by_order_id(
		&self,
		order_id: OrderId,
	) -> Result<Vec<Observation>, StorageError> {
		let mut observations: Vec<Observation> = self
			.storage
			.list(StorageKey::Observations.as_str())
			.await?;
		observations.retain(|observation| observation.order_id == Some(order_id));
		observations.sort_by_key(|observation| observation.id);
		Ok(observations)
	}

	/// Stages an observation, assigning its id unless it already carries one.
	pub async fn insert(
		&self,
		tx: &mut Transaction<'_>,
		observation: &mut Observation,
	) -> Result<ObservationId, StorageError> {
		let namespace = StorageKey::Observations.as_str();
		let id = ObservationId(assign_id(tx, namespace, observation.id.map(|id| id.0)).await?);

		tx.ensure_absent(namespace, &id.to_string()).await?;
		observation.id = Some(id);
		tx.store(namespace, &id.to_string(), observation)?;
		Ok(id)
	}

	/// Records a single observation.
	pub async fn record(&self, mut observation: Observation) -> Result<Observation, StorageError> {
		let mut tx = self.storage.begin();
		let id = self.insert(&mut tx, &mut observation).await?;
		tx.commit().await?;
		tracing::debug!(observation_id = %id, order_id = ?observation.order_id, "Recorded observation");
		Ok(observation)
	}
}
