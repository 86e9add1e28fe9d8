//! Radiology service: order placement, discontinuation and queries.
//!
//! Every operation checks its arguments first and fails with
//! [`RadiologyError::InvalidArgument`] before touching storage. Mutating
//! operations run in one storage transaction each; a failure anywhere leaves
//! nothing behind.

use crate::dataset::{Dataset, DatasetError};
use crate::repositories::{ObservationRepository, OrderRepository, StudyRepository};
use crate::state::{OrderState, OrderStateError, OrderStateMachine};
use crate::{RadiologyError, StudyInstanceUidGenerator};
use chrono::{DateTime, Utc};
use radiology_storage::{StorageError, StorageService};
use radiology_types::{
	Observation, Order, OrderId, PatientId, PerformedProcedureStepStatus, ProviderId, Study,
	StudyId,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;

const ORDER_NOT_ACTIVE: &str = "order is not active";

/// Places, discontinues and looks up radiology orders and their studies.
pub struct RadiologyService {
	storage: Arc<StorageService>,
	orders: OrderRepository,
	studies: StudyRepository,
	observations: ObservationRepository,
	state_machine: OrderStateMachine,
	uids: StudyInstanceUidGenerator,
}

impl RadiologyService {
	pub fn new(storage: Arc<StorageService>, uids: StudyInstanceUidGenerator) -> Self {
		Self {
			orders: OrderRepository::new(storage.clone()),
			studies: StudyRepository::new(storage.clone()),
			observations: ObservationRepository::new(storage.clone()),
			state_machine: OrderStateMachine::new(),
			storage,
			uids,
		}
	}

	/// Places a new order together with its study.
	///
	/// Both receive ids from their sequences, the study is issued a study
	/// instance UID unless it carries one and is linked to the order, and both
	/// are written atomically. `date_activated` is set to now unless the
	/// caller provided it.
	#[instrument(skip_all, fields(patient = ?order.as_ref().map(|o| o.patient)))]
	pub async fn place_order(&self, order: Option<Order>) -> Result<Order, RadiologyError> {
		let mut order =
			order.ok_or_else(|| RadiologyError::invalid_argument("radiologyOrder is required"))?;
		if order.is_persisted() {
			return Err(RadiologyError::invalid_argument(
				"cannot edit an existing order",
			));
		}
		let mut study = order
			.study
			.take()
			.ok_or_else(|| RadiologyError::invalid_argument("radiologyOrder.study is required"))?;
		if study.modality.is_none() {
			return Err(RadiologyError::invalid_argument(
				"radiologyOrder.study.modality is required",
			));
		}
		study.id = None;

		if order.date_activated.is_none() {
			order.date_activated = Some(Utc::now());
		}

		let mut tx = self.storage.begin();
		let order_id = self.orders.insert(&mut tx, &mut order).await?;
		let study_id = self
			.studies
			.insert(&mut tx, &mut study, order_id, &self.uids)
			.await?;
		tx.commit().await?;

		tracing::info!(
			order_id = %order_id,
			study_id = %study_id,
			study_instance_uid = study.study_instance_uid.as_deref().unwrap_or_default(),
			modality = ?study.modality,
			"Placed radiology order"
		);
		order.study = Some(study);
		Ok(order)
	}

	/// Discontinues an active order.
	///
	/// Creates and returns the discontinuation order, placed by `provider`
	/// and effective at `effective_date`, with `reason` as its instructions.
	/// The original order is stopped at the same instant, both in storage
	/// and in the caller's `order`. Of several concurrent discontinuations of
	/// one order exactly one succeeds; the others fail as not active.
	#[instrument(skip_all, fields(order_id = ?order.as_ref().and_then(|o| o.id)))]
	pub async fn discontinue_order(
		&self,
		order: Option<&mut Order>,
		provider: Option<ProviderId>,
		effective_date: DateTime<Utc>,
		reason: Option<&str>,
	) -> Result<Order, RadiologyError> {
		let order =
			order.ok_or_else(|| RadiologyError::invalid_argument("radiologyOrder is required"))?;
		let order_id = order
			.id
			.ok_or_else(|| RadiologyError::invalid_argument("orderId is null"))?;
		if OrderState::of(order) != OrderState::Active {
			return Err(RadiologyError::invalid_argument(ORDER_NOT_ACTIVE));
		}
		let provider =
			provider.ok_or_else(|| RadiologyError::invalid_argument("provider is required"))?;

		let mut tx = self.storage.begin();
		let stopped = match self
			.state_machine
			.transition(&mut tx, order_id, OrderState::Discontinued, effective_date)
			.await
		{
			Ok(stopped) => stopped,
			Err(OrderStateError::InvalidTransition { .. }) => {
				tracing::warn!("Order was already discontinued");
				return Err(RadiologyError::invalid_argument(ORDER_NOT_ACTIVE));
			},
			Err(OrderStateError::OrderNotFound(_)) => {
				return Err(StorageError::NotFound.into());
			},
			Err(OrderStateError::Storage(e)) => return Err(e.into()),
		};

		let discontinuation = self
			.orders
			.insert_discontinuation(&mut tx, &stopped, provider, effective_date, reason)
			.await?;

		match tx.commit().await {
			Ok(()) => {},
			Err(StorageError::Conflict(key)) => {
				tracing::warn!(key = key.as_str(), "Concurrent update while discontinuing order");
				if let Some(current) = self.orders.find(order_id).await? {
					if !current.is_active() {
						order.date_stopped = current.date_stopped;
						return Err(RadiologyError::invalid_argument(ORDER_NOT_ACTIVE));
					}
				}
				return Err(StorageError::Conflict(key).into());
			},
			Err(e) => return Err(e.into()),
		}

		order.date_stopped = stopped.date_stopped;
		tracing::info!(
			discontinuation_id = ?discontinuation.id,
			orderer = %provider,
			effective_date = %effective_date,
			"Discontinued radiology order"
		);
		Ok(discontinuation)
	}

	/// Returns the order with its study, or `None` if it does not exist.
	pub async fn get_order_by_order_id(
		&self,
		order_id: Option<OrderId>,
	) -> Result<Option<Order>, RadiologyError> {
		let order_id =
			order_id.ok_or_else(|| RadiologyError::invalid_argument("orderId is required"))?;
		match self.orders.find(order_id).await? {
			Some(order) => Ok(Some(self.with_study(order).await?)),
			None => Ok(None),
		}
	}

	/// Returns the orders of a patient, sorted by id.
	pub async fn get_orders_by_patient(
		&self,
		patient: Option<PatientId>,
	) -> Result<Vec<Order>, RadiologyError> {
		let patient =
			patient.ok_or_else(|| RadiologyError::invalid_argument("patient is required"))?;
		self.orders_of(&[patient]).await
	}

	/// Returns the orders of any of the given patients, sorted by id.
	///
	/// An empty list returns every order.
	pub async fn get_orders_by_patients(
		&self,
		patients: Option<&[PatientId]>,
	) -> Result<Vec<Order>, RadiologyError> {
		let patients =
			patients.ok_or_else(|| RadiologyError::invalid_argument("patients is required"))?;
		self.orders_of(patients).await
	}

	async fn orders_of(&self, patients: &[PatientId]) -> Result<Vec<Order>, RadiologyError> {
		let found = self.orders.find_by_patients(patients).await?;
		let mut orders = Vec::with_capacity(found.len());
		for order in found {
			orders.push(self.with_study(order).await?);
		}
		tracing::debug!(patients = patients.len(), orders = orders.len(), "Found orders");
		Ok(orders)
	}

	async fn with_study(&self, mut order: Order) -> Result<Order, RadiologyError> {
		if let Some(id) = order.id {
			order.study = self.studies.find_by_order_id(id).await?;
		}
		Ok(order)
	}

	pub async fn get_study_by_study_id(
		&self,
		study_id: Option<StudyId>,
	) -> Result<Option<Study>, RadiologyError> {
		let study_id =
			study_id.ok_or_else(|| RadiologyError::invalid_argument("studyId is required"))?;
		Ok(self.studies.find(study_id).await?)
	}

	pub async fn get_study_by_order_id(
		&self,
		order_id: Option<OrderId>,
	) -> Result<Option<Study>, RadiologyError> {
		let order_id =
			order_id.ok_or_else(|| RadiologyError::invalid_argument("orderId is required"))?;
		Ok(self.studies.find_by_order_id(order_id).await?)
	}

	pub async fn get_study_by_study_instance_uid(
		&self,
		study_instance_uid: Option<&str>,
	) -> Result<Option<Study>, RadiologyError> {
		let uid = study_instance_uid
			.ok_or_else(|| RadiologyError::invalid_argument("studyInstanceUid is required"))?;
		Ok(self.studies.find_by_study_instance_uid(uid).await?)
	}

	/// Returns the studies of the given orders in the same sequence.
	///
	/// Orders without a study are skipped, so the result may be shorter than
	/// the input.
	pub async fn get_studies_by_orders(
		&self,
		orders: Option<&[Order]>,
	) -> Result<Vec<Study>, RadiologyError> {
		let orders =
			orders.ok_or_else(|| RadiologyError::invalid_argument("radiologyOrders are required"))?;

		let mut studies = Vec::with_capacity(orders.len());
		for order_id in orders.iter().filter_map(|order| order.id) {
			if let Some(study) = self.studies.find_by_order_id(order_id).await? {
				studies.push(study);
			}
		}
		tracing::debug!(orders = orders.len(), studies = studies.len(), "Found studies");
		Ok(studies)
	}

	pub async fn get_observations_by_order_id(
		&self,
		order_id: Option<OrderId>,
	) -> Result<Vec<Observation>, RadiologyError> {
		let order_id =
			order_id.ok_or_else(|| RadiologyError::invalid_argument("orderId is required"))?;
		Ok(self.observations.find_by_order_id(order_id).await?)
	}

	/// Sets the performed status of a study. Returns `None` if no study has
	/// the given instance UID.
	pub async fn update_study_performed_status(
		&self,
		study_instance_uid: Option<&str>,
		performed_status: Option<PerformedProcedureStepStatus>,
	) -> Result<Option<Study>, RadiologyError> {
		self.studies
			.update_performed_status(study_instance_uid, performed_status)
			.await
	}

	/// Imports a dataset in a single transaction.
	///
	/// Records keep their ids and the id sequences are moved past them. Every
	/// study must belong to an order of the dataset or one already stored.
	/// Returns the number of records imported.
	#[instrument(skip_all, fields(records = dataset.len()))]
	pub async fn load_dataset(&self, dataset: Dataset) -> Result<usize, DatasetError> {
		let records = dataset.len();
		let mut tx = self.storage.begin();

		let mut imported_orders = HashSet::new();
		for mut order in dataset.orders {
			order.study = None;
			imported_orders.insert(self.orders.insert(&mut tx, &mut order).await?);
		}

		for mut study in dataset.studies {
			let order_id = study.order_id.ok_or_else(|| {
				DatasetError::Invalid(format!("study {:?} has no order_id", study.id))
			})?;
			if !imported_orders.contains(&order_id)
				&& self.orders.find_in(&mut tx, order_id).await?.is_none()
			{
				return Err(DatasetError::Invalid(format!(
					"study {:?} references unknown order {}",
					study.id, order_id
				)));
			}
			self.studies
				.insert(&mut tx, &mut study, order_id, &self.uids)
				.await?;
		}

		for mut observation in dataset.observations {
			self.observations.insert(&mut tx, &mut observation).await?;
		}

		tx.commit().await?;
		tracing::info!(
			records,
			orders = imported_orders.len(),
			"Loaded dataset"
		);
		Ok(records)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;
	use radiology_storage::implementations::memory::MemoryStorage;
	use radiology_types::{
		ConceptId, Modality, MwlStatus, OrderAction, ScheduledProcedureStepStatus, Urgency,
	};

	const EXISTING_ORDER: OrderId = OrderId(2001);
	const ORDER_WITH_OBSERVATION: OrderId = OrderId(2002);
	const ORDER_WITHOUT_STUDY: OrderId = OrderId(2004);
	const NONEXISTING_ORDER: OrderId = OrderId(99999);
	const EXISTING_STUDY: StudyId = StudyId(1);
	const EXISTING_UID: &str = "1.2.826.0.1.3680043.8.2186.1.1";
	const NONEXISTING_UID: &str = "1.2.826.0.1.3680043.8.2186.1.9999";
	const PATIENT_WITHOUT_ORDERS: PatientId = PatientId(70011);
	const PATIENT_WITH_TWO_ORDERS: PatientId = PatientId(70021);
	const PATIENT_WITHOUT_STUDY: PatientId = PatientId(70022);
	const TOTAL_ORDERS: usize = 3;

	async fn seeded_service() -> RadiologyService {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let service = RadiologyService::new(
			storage,
			StudyInstanceUidGenerator::Root("1.2.826.0.1.3680043.8.2186.1".into()),
		);
		let dataset =
			Dataset::from_json_str(include_str!("../testdata/radiology_dataset.json")).unwrap();
		service.load_dataset(dataset).await.unwrap();
		service
	}

	fn unsaved_order() -> Order {
		let mut order = Order::new(PATIENT_WITHOUT_ORDERS, ProviderId(1), ConceptId(178));
		order.instructions = Some("CT ABDOMEN PANCREAS WITH IV CONTRAST".into());
		order.scheduled_date = Some(Utc.with_ymd_and_hms(2015, 2, 4, 14, 35, 0).unwrap());
		order.urgency = Urgency::OnScheduledDate;
		order.with_study(Study::new(Modality::Ct))
	}

	fn discontinue_date() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap()
	}

	fn message(err: RadiologyError) -> String {
		match err {
			RadiologyError::InvalidArgument(message) => message,
			other => panic!("expected invalid argument, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn test_place_order_assigns_ids_and_links_study() {
		let service = seeded_service().await;

		let order = service.place_order(Some(unsaved_order())).await.unwrap();

		let order_id = order.id.unwrap();
		assert!(order_id > ORDER_WITHOUT_STUDY);
		assert!(order.date_activated.is_some());
		assert!(order.is_active());
		let study = order.study.as_ref().unwrap();
		assert!(study.id.is_some());
		assert_eq!(study.order_id, Some(order_id));
		assert_eq!(study.modality, Some(Modality::Ct));
		assert_eq!(
			study.scheduled_status,
			Some(ScheduledProcedureStepStatus::Scheduled)
		);
		assert_eq!(study.mwl_status, MwlStatus::Default);
		assert_eq!(
			study.study_instance_uid,
			Some(format!("1.2.826.0.1.3680043.8.2186.1.{}", study.id.unwrap()))
		);
	}

	#[tokio::test]
	async fn test_placed_order_round_trips() {
		let service = seeded_service().await;
		let order = service.place_order(Some(unsaved_order())).await.unwrap();

		let loaded = service.get_order_by_order_id(order.id).await.unwrap();
		assert_eq!(loaded.as_ref(), Some(&order));

		let study = service.get_study_by_order_id(order.id).await.unwrap();
		assert_eq!(study, order.study);

		let by_uid = service
			.get_study_by_study_instance_uid(order.study.as_ref().unwrap().study_instance_uid.as_deref())
			.await
			.unwrap();
		assert_eq!(by_uid, order.study);
	}

	#[tokio::test]
	async fn test_place_order_validation() {
		let service = seeded_service().await;

		let err = service.place_order(None).await.unwrap_err();
		assert_eq!(message(err), "radiologyOrder is required");

		let mut without_study = unsaved_order();
		without_study.study = None;
		let err = service.place_order(Some(without_study)).await.unwrap_err();
		assert_eq!(message(err), "radiologyOrder.study is required");

		let mut without_modality = unsaved_order();
		if let Some(study) = without_modality.study.as_mut() {
			study.modality = None;
		}
		let err = service
			.place_order(Some(without_modality))
			.await
			.unwrap_err();
		assert_eq!(message(err), "radiologyOrder.study.modality is required");

		let all = service.get_orders_by_patients(Some(&[][..])).await.unwrap();
		assert_eq!(all.len(), TOTAL_ORDERS);
	}

	#[tokio::test]
	async fn test_place_order_rejects_existing_order() {
		let service = seeded_service().await;

		let placed = service.place_order(Some(unsaved_order())).await.unwrap();
		let err = service.place_order(Some(placed)).await.unwrap_err();
		assert_eq!(message(err), "cannot edit an existing order");

		let existing = service
			.get_order_by_order_id(Some(EXISTING_ORDER))
			.await
			.unwrap();
		let err = service.place_order(existing).await.unwrap_err();
		assert_eq!(message(err), "cannot edit an existing order");

		let mut unsaved_without_study = unsaved_order();
		unsaved_without_study.id = Some(EXISTING_ORDER);
		unsaved_without_study.study = None;
		let err = service
			.place_order(Some(unsaved_without_study))
			.await
			.unwrap_err();
		assert_eq!(message(err), "cannot edit an existing order");
	}

	#[tokio::test]
	async fn test_failed_placement_leaves_nothing_behind() {
		let service = seeded_service().await;

		let mut order = unsaved_order();
		if let Some(study) = order.study.as_mut() {
			study.study_instance_uid = Some(EXISTING_UID.into());
		}
		let result = service.place_order(Some(order)).await;
		assert!(matches!(
			result,
			Err(RadiologyError::Storage(StorageError::Duplicate(_)))
		));

		let orders = service
			.get_orders_by_patient(Some(PATIENT_WITHOUT_ORDERS))
			.await
			.unwrap();
		assert!(orders.is_empty());
		let all = service.get_orders_by_patients(Some(&[][..])).await.unwrap();
		assert_eq!(all.len(), TOTAL_ORDERS);
	}

	#[tokio::test]
	async fn test_discontinue_order() {
		let service = seeded_service().await;
		let mut order = service.place_order(Some(unsaved_order())).await.unwrap();
		let orderer = order.orderer;

		let discontinuation = service
			.discontinue_order(
				Some(&mut order),
				Some(orderer),
				discontinue_date(),
				Some("Wrong Procedure"),
			)
			.await
			.unwrap();

		assert!(!order.is_active());
		assert_eq!(order.date_stopped, Some(discontinue_date()));
		assert_eq!(discontinuation.action, OrderAction::Discontinue);
		assert_eq!(discontinuation.previous_order, order.id);
		assert_eq!(discontinuation.orderer, orderer);
		assert_eq!(discontinuation.patient, order.patient);
		assert_eq!(
			discontinuation.instructions.as_deref(),
			Some("Wrong Procedure")
		);
		assert_eq!(discontinuation.date_activated, Some(discontinue_date()));

		let persisted = service
			.get_order_by_order_id(order.id)
			.await
			.unwrap()
			.unwrap();
		assert!(!persisted.is_active());
		assert_eq!(persisted.study, order.study);

		let stored_discontinuation = service
			.get_order_by_order_id(discontinuation.id)
			.await
			.unwrap();
		assert_eq!(stored_discontinuation, Some(discontinuation));
	}

	#[tokio::test]
	async fn test_discontinuation_is_terminal() {
		let service = seeded_service().await;
		let mut order = service
			.get_order_by_order_id(Some(EXISTING_ORDER))
			.await
			.unwrap()
			.unwrap();

		let mut discontinuation = service
			.discontinue_order(Some(&mut order), Some(ProviderId(1)), discontinue_date(), None)
			.await
			.unwrap();

		let err = service
			.discontinue_order(Some(&mut order), Some(ProviderId(1)), discontinue_date(), None)
			.await
			.unwrap_err();
		assert_eq!(message(err), "order is not active");

		let err = service
			.discontinue_order(
				Some(&mut discontinuation),
				Some(ProviderId(1)),
				discontinue_date(),
				None,
			)
			.await
			.unwrap_err();
		assert_eq!(message(err), "order is not active");
	}

	#[tokio::test]
	async fn test_stale_copy_cannot_discontinue_twice() {
		let service = seeded_service().await;
		let mut first_copy = service
			.get_order_by_order_id(Some(EXISTING_ORDER))
			.await
			.unwrap()
			.unwrap();
		let mut stale_copy = first_copy.clone();

		service
			.discontinue_order(Some(&mut first_copy), Some(ProviderId(1)), discontinue_date(), None)
			.await
			.unwrap();

		assert!(stale_copy.is_active());
		let err = service
			.discontinue_order(Some(&mut stale_copy), Some(ProviderId(1)), discontinue_date(), None)
			.await
			.unwrap_err();
		assert_eq!(message(err), "order is not active");
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn test_concurrent_discontinuations_allow_one_winner() {
		let service = Arc::new(seeded_service().await);
		let order = service
			.get_order_by_order_id(Some(EXISTING_ORDER))
			.await
			.unwrap()
			.unwrap();

		let mut handles = Vec::new();
		for provider in 1..=8u64 {
			let service = service.clone();
			let mut copy = order.clone();
			handles.push(tokio::spawn(async move {
				service
					.discontinue_order(
						Some(&mut copy),
						Some(ProviderId(provider)),
						discontinue_date(),
						Some("Wrong Procedure"),
					)
					.await
			}));
		}

		let mut successes = 0;
		for handle in handles {
			match handle.await.unwrap() {
				Ok(_) => successes += 1,
				Err(err) => assert_eq!(message(err), "order is not active"),
			}
		}
		assert_eq!(successes, 1);

		let discontinuations = service
			.get_orders_by_patient(Some(PATIENT_WITH_TWO_ORDERS))
			.await
			.unwrap()
			.into_iter()
			.filter(|o| o.previous_order == Some(EXISTING_ORDER))
			.count();
		assert_eq!(discontinuations, 1);
	}

	#[tokio::test]
	async fn test_discontinue_order_validation() {
		let service = seeded_service().await;

		let err = service
			.discontinue_order(None, Some(ProviderId(1)), discontinue_date(), None)
			.await
			.unwrap_err();
		assert_eq!(message(err), "radiologyOrder is required");

		let mut unsaved = unsaved_order();
		let err = service
			.discontinue_order(Some(&mut unsaved), Some(ProviderId(1)), discontinue_date(), None)
			.await
			.unwrap_err();
		assert_eq!(message(err), "orderId is null");

		let mut existing = service
			.get_order_by_order_id(Some(EXISTING_ORDER))
			.await
			.unwrap()
			.unwrap();
		let err = service
			.discontinue_order(Some(&mut existing), None, discontinue_date(), None)
			.await
			.unwrap_err();
		assert_eq!(message(err), "provider is required");
		assert!(existing.is_active());
	}

	#[tokio::test]
	async fn test_get_order_by_order_id() {
		let service = seeded_service().await;

		let order = service
			.get_order_by_order_id(Some(EXISTING_ORDER))
			.await
			.unwrap()
			.unwrap();
		assert_eq!(order.id, Some(EXISTING_ORDER));
		assert_eq!(order.study.as_ref().and_then(|s| s.id), Some(EXISTING_STUDY));

		let without_study = service
			.get_order_by_order_id(Some(ORDER_WITHOUT_STUDY))
			.await
			.unwrap()
			.unwrap();
		assert!(without_study.study.is_none());

		assert!(service
			.get_order_by_order_id(Some(NONEXISTING_ORDER))
			.await
			.unwrap()
			.is_none());

		let err = service.get_order_by_order_id(None).await.unwrap_err();
		assert_eq!(message(err), "orderId is required");
	}

	#[tokio::test]
	async fn test_get_orders_by_patient() {
		let service = seeded_service().await;

		let orders = service
			.get_orders_by_patient(Some(PATIENT_WITH_TWO_ORDERS))
			.await
			.unwrap();
		let ids: Vec<_> = orders.iter().filter_map(|o| o.id).collect();
		assert_eq!(ids, vec![EXISTING_ORDER, ORDER_WITH_OBSERVATION]);

		let none = service
			.get_orders_by_patient(Some(PATIENT_WITHOUT_ORDERS))
			.await
			.unwrap();
		assert!(none.is_empty());

		let err = service.get_orders_by_patient(None).await.unwrap_err();
		assert_eq!(message(err), "patient is required");
	}

	#[tokio::test]
	async fn test_get_orders_by_patients() {
		let service = seeded_service().await;

		let all = service.get_orders_by_patients(Some(&[][..])).await.unwrap();
		assert_eq!(all.len(), TOTAL_ORDERS);

		let union = service
			.get_orders_by_patients(Some(&[
				PATIENT_WITH_TWO_ORDERS,
				PATIENT_WITHOUT_STUDY,
				PATIENT_WITH_TWO_ORDERS,
			][..]))
			.await
			.unwrap();
		let ids: Vec<_> = union.iter().filter_map(|o| o.id).collect();
		assert_eq!(
			ids,
			vec![EXISTING_ORDER, ORDER_WITH_OBSERVATION, ORDER_WITHOUT_STUDY]
		);

		let none = service
			.get_orders_by_patients(Some(&[PATIENT_WITHOUT_ORDERS][..]))
			.await
			.unwrap();
		assert!(none.is_empty());

		let err = service.get_orders_by_patients(None).await.unwrap_err();
		assert_eq!(message(err), "patients is required");
	}

	#[tokio::test]
	async fn test_get_study_lookups() {
		let service = seeded_service().await;

		let by_id = service
			.get_study_by_study_id(Some(EXISTING_STUDY))
			.await
			.unwrap()
			.unwrap();
		assert_eq!(by_id.study_instance_uid.as_deref(), Some(EXISTING_UID));
		assert_eq!(by_id.order_id, Some(EXISTING_ORDER));

		let by_order = service
			.get_study_by_order_id(Some(EXISTING_ORDER))
			.await
			.unwrap();
		let by_uid = service
			.get_study_by_study_instance_uid(Some(EXISTING_UID))
			.await
			.unwrap();
		assert_eq!(by_order.as_ref(), Some(&by_id));
		assert_eq!(by_uid.as_ref(), Some(&by_id));

		assert!(service
			.get_study_by_study_id(Some(StudyId(9999)))
			.await
			.unwrap()
			.is_none());
		assert!(service
			.get_study_by_order_id(Some(NONEXISTING_ORDER))
			.await
			.unwrap()
			.is_none());
		assert!(service
			.get_study_by_study_instance_uid(Some(NONEXISTING_UID))
			.await
			.unwrap()
			.is_none());

		let err = service.get_study_by_study_id(None).await.unwrap_err();
		assert_eq!(message(err), "studyId is required");
		let err = service.get_study_by_order_id(None).await.unwrap_err();
		assert_eq!(message(err), "orderId is required");
		let err = service
			.get_study_by_study_instance_uid(None)
			.await
			.unwrap_err();
		assert_eq!(message(err), "studyInstanceUid is required");
	}

	#[tokio::test]
	async fn test_get_studies_by_orders() {
		let service = seeded_service().await;

		let orders = service
			.get_orders_by_patient(Some(PATIENT_WITH_TWO_ORDERS))
			.await
			.unwrap();
		let studies = service.get_studies_by_orders(Some(orders.as_slice())).await.unwrap();
		assert_eq!(studies.len(), 2);
		for (study, order) in studies.iter().zip(&orders) {
			assert_eq!(study.order_id, order.id);
		}

		let reversed: Vec<Order> = orders.iter().rev().cloned().collect();
		let studies = service
			.get_studies_by_orders(Some(reversed.as_slice()))
			.await
			.unwrap();
		assert_eq!(studies[0].order_id, Some(ORDER_WITH_OBSERVATION));
		assert_eq!(studies[1].order_id, Some(EXISTING_ORDER));

		let mut mixed = orders.clone();
		mixed.extend(
			service
				.get_orders_by_patient(Some(PATIENT_WITHOUT_STUDY))
				.await
				.unwrap(),
		);
		mixed.push(unsaved_order());
		let studies = service.get_studies_by_orders(Some(mixed.as_slice())).await.unwrap();
		assert_eq!(studies.len(), 2);
		assert!(studies.len() < mixed.len());

		let empty = service.get_studies_by_orders(Some(&[][..])).await.unwrap();
		assert!(empty.is_empty());

		let err = service.get_studies_by_orders(None).await.unwrap_err();
		assert_eq!(message(err), "radiologyOrders are required");
	}

	#[tokio::test]
	async fn test_get_observations_by_order_id() {
		let service = seeded_service().await;

		let observations = service
			.get_observations_by_order_id(Some(ORDER_WITH_OBSERVATION))
			.await
			.unwrap();
		assert_eq!(observations.len(), 1);
		assert_eq!(observations[0].order_id, Some(ORDER_WITH_OBSERVATION));

		let none = service
			.get_observations_by_order_id(Some(EXISTING_ORDER))
			.await
			.unwrap();
		assert!(none.is_empty());

		let err = service.get_observations_by_order_id(None).await.unwrap_err();
		assert_eq!(message(err), "orderId is required");
	}

	#[tokio::test]
	async fn test_update_study_performed_status() {
		let service = seeded_service().await;

		let before = service
			.get_study_by_study_instance_uid(Some(EXISTING_UID))
			.await
			.unwrap()
			.unwrap();
		assert_ne!(
			before.performed_status,
			Some(PerformedProcedureStepStatus::Completed)
		);

		let updated = service
			.update_study_performed_status(
				Some(EXISTING_UID),
				Some(PerformedProcedureStepStatus::Completed),
			)
			.await
			.unwrap()
			.unwrap();
		assert_eq!(
			updated.performed_status,
			Some(PerformedProcedureStepStatus::Completed)
		);
		assert_eq!(updated.modality, before.modality);
		assert_eq!(updated.order_id, before.order_id);

		let order = service
			.get_order_by_order_id(Some(EXISTING_ORDER))
			.await
			.unwrap()
			.unwrap();
		assert!(order.is_active());
		assert_eq!(order.study, Some(updated));

		assert!(service
			.update_study_performed_status(
				Some(NONEXISTING_UID),
				Some(PerformedProcedureStepStatus::Completed)
			)
			.await
			.unwrap()
			.is_none());

		let err = service
			.update_study_performed_status(None, Some(PerformedProcedureStepStatus::Completed))
			.await
			.unwrap_err();
		assert_eq!(message(err), "studyInstanceUid is required");
		let err = service
			.update_study_performed_status(Some(EXISTING_UID), None)
			.await
			.unwrap_err();
		assert_eq!(message(err), "performedStatus is required");
	}

	#[tokio::test]
	async fn test_new_ids_follow_imported_ids() {
		let service = seeded_service().await;
		let order = service.place_order(Some(unsaved_order())).await.unwrap();

		assert_eq!(order.id, Some(OrderId(2005)));
		let study = order.study.unwrap();
		assert_eq!(study.id, Some(StudyId(3)));
		assert_eq!(
			study.study_instance_uid.as_deref(),
			Some("1.2.826.0.1.3680043.8.2186.1.3")
		);
	}

	#[tokio::test]
	async fn test_place_order_ignores_preset_study_id() {
		let service = seeded_service().await;

		let mut order = unsaved_order();
		if let Some(study) = order.study.as_mut() {
			study.id = Some(StudyId(u64::MAX));
		}
		let placed = service.place_order(Some(order)).await.unwrap();
		assert_eq!(placed.study.as_ref().and_then(|s| s.id), Some(StudyId(3)));
		assert!(service
			.get_study_by_study_id(Some(StudyId(u64::MAX)))
			.await
			.unwrap()
			.is_none());

		let next = service.place_order(Some(unsaved_order())).await.unwrap();
		assert_eq!(next.study.and_then(|s| s.id), Some(StudyId(4)));
	}

	#[tokio::test]
	async fn test_dataset_study_must_reference_an_order() {
		let service = seeded_service().await;

		let mut orphan = Study::new(Modality::Us);
		orphan.order_id = Some(NONEXISTING_ORDER);
		let dataset = Dataset {
			studies: vec![orphan],
			..Dataset::default()
		};
		let result = service.load_dataset(dataset).await;
		assert!(matches!(result, Err(DatasetError::Invalid(_))));

		let mut attached = Study::new(Modality::Us);
		attached.order_id = Some(ORDER_WITHOUT_STUDY);
		let dataset = Dataset {
			studies: vec![attached],
			..Dataset::default()
		};
		assert_eq!(service.load_dataset(dataset).await.unwrap(), 1);
		assert!(service
			.get_study_by_order_id(Some(ORDER_WITHOUT_STUDY))
			.await
			.unwrap()
			.is_some());
	}
}
