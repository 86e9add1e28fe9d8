//! Radiology order persistence.

use super::assign_id;
use chrono::{DateTime, Utc};
use radiology_storage::{StorageError, StorageService, Transaction};
use radiology_types::{Order, OrderAction, OrderId, PatientId, ProviderId, StorageKey};
use std::sync::Arc;

/// Stores orders under `orders:<id>`.
///
/// Orders are stored without their study; see
/// [`StudyRepository`](super::StudyRepository) for the link.
pub struct OrderRepository {
	storage: Arc<StorageService>,
}

impl OrderRepository {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	pub async fn find(&self, id: OrderId) -> Result<Option<Order>, StorageError> {
		self.storage
			.find(StorageKey::Orders.as_str(), &id.to_string())
			.await
	}

	/// Returns every order, sorted by id.
	pub async fn all(&self) -> Result<Vec<Order>, StorageError> {
		let mut orders: Vec<Order> = self.storage.list(StorageKey::Orders.as_str()).await?;
		orders.sort_by_key(|order| order.id);
		Ok(orders)
	}

	/// Returns the orders of any of the given patients, sorted by id.
	///
	/// An empty patient list places no restriction and returns every order.
	pub async fn find_by_patients(&self, patients: &[PatientId]) -> Result<Vec<Order>, StorageError> {
		let mut orders = self.all().await?;
		if !patients.is_empty() {
			orders.retain(|order| patients.contains(&order.patient));
		}
		Ok(orders)
	}

	/// Reads an order as part of `tx`.
	pub async fn find_in(
		&self,
		tx: &mut Transaction<'_>,
		id: OrderId,
	) -> Result<Option<Order>, StorageError> {
		tx.retrieve(StorageKey::Orders.as_str(), &id.to_string())
			.await
	}

	/// Stages a new order, assigning its id unless it already carries one.
	///
	/// Fails with [`StorageError::Duplicate`] if the id is taken.
	pub async fn insert(
		&self,
		tx: &mut Transaction<'_>,
		order: &mut Order,
	) -> Result<OrderId, StorageError> {
		let sequence = StorageKey::Orders.as_str();
		let id = OrderId(assign_id(tx, sequence, order.id.map(|id| id.0)).await?);

		tx.ensure_absent(sequence, &id.to_string()).await?;
		order.id = Some(id);
		tx.store(sequence, &id.to_string(), order)?;
		Ok(id)
	}

	/// Stages the order that discontinues `original`, effective at
	/// `effective_date`, with the reason recorded as its instructions.
	pub async fn insert_discontinuation(
		&self,
		tx: &mut Transaction<'_>,
		original: &Order,
		orderer: ProviderId,
		effective_date: DateTime<Utc>,
		reason: Option<&str>,
	) -> Result<Order, StorageError> {
		let mut discontinuation = Order::new(original.patient, orderer, original.concept);
		discontinuation.action = OrderAction::Discontinue;
		discontinuation.previous_order = original.id;
		discontinuation.urgency = original.urgency;
		discontinuation.instructions = reason.map(str::to_string);
		discontinuation.date_activated = Some(effective_date);

		self.insert(tx, &mut discontinuation).await?;
		Ok(discontinuation)
	}
}
