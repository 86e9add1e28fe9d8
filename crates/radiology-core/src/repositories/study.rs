//! Study persistence and lookup by alternate keys.

use super::assign_id;
use crate::{RadiologyError, StudyInstanceUidGenerator};
use radiology_storage::{StorageError, StorageService, Transaction};
use radiology_types::{OrderId, PerformedProcedureStepStatus, StorageKey, Study, StudyId};
use std::sync::Arc;

/// Stores studies under `studies:<id>` and maintains the unique indexes
/// `study_by_order:<order id>` and `study_by_uid:<study instance uid>`,
/// both mapping to the study id.
pub struct StudyRepository {
	storage: Arc<StorageService>,
}

impl StudyRepository {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	pub async fn find(&self, id: StudyId) -> Result<Option<Study>, StorageError> {
		self.storage
			.find(StorageKey::Studies.as_str(), &id.to_string())
			.await
	}

	pub async fn find_by_order_id(&self, order_id: OrderId) -> Result<Option<Study>, StorageError> {
		self.find_indexed(StorageKey::StudyByOrder, &order_id.to_string())
			.await
	}

	pub async fn find_by_study_instance_uid(
		&self,
		uid: &str,
	) -> Result<Option<Study>, StorageError> {
		self.find_indexed(StorageKey::StudyByUid, uid).await
	}

	async fn find_indexed(
		&self,
		index: StorageKey,
		key: &str,
	) -> Result<Option<Study>, StorageError> {
		match self.storage.find::<StudyId>(index.as_str(), key).await? {
			Some(id) => self.find(id).await,
			None => Ok(None),
		}
	}

	/// Stages a new study owned by `order_id`.
	///
	/// The study keeps an id or UID it already carries; otherwise the id is
	/// drawn from the sequence and the UID issued by `uids`. Fails with
	/// [`StorageError::Duplicate`] if the id or UID is taken or the order
	/// already has a study.
	pub async fn insert(
		&self,
		tx: &mut Transaction<'_>,
		study: &mut Study,
		order_id: OrderId,
		uids: &StudyInstanceUidGenerator,
	) -> Result<StudyId, StorageError> {
		let namespace = StorageKey::Studies.as_str();
		let id = StudyId(assign_id(tx, namespace, study.id.map(|id| id.0)).await?);
		let uid = match &study.study_instance_uid {
			Some(uid) => uid.clone(),
			None => uids.generate(id),
		};
		let order_key = order_id.to_string();

		tx.ensure_absent(namespace, &id.to_string()).await?;
		tx.ensure_absent(StorageKey::StudyByOrder.as_str(), &order_key)
			.await?;
		tx.ensure_absent(StorageKey::StudyByUid.as_str(), &uid)
			.await?;

		study.id = Some(id);
		study.order_id = Some(order_id);
		study.study_instance_uid = Some(uid.clone());

		tx.store(namespace, &id.to_string(), study)?;
		tx.store(StorageKey::StudyByOrder.as_str(), &order_key, &id)?;
		tx.store(StorageKey::StudyByUid.as_str(), &uid, &id)?;
		Ok(id)
	}

	/// Sets the performed status of the study with the given instance UID.
	///
	/// Only the performed status changes. Returns `None` if no study has
	/// that UID.
	pub async fn update_performed_status(
		&self,
		study_instance_uid: Option<&str>,
		performed_status: Option<PerformedProcedureStepStatus>,
	) -> Result<Option<Study>, RadiologyError> {
		let uid = study_instance_uid
			.ok_or_else(|| RadiologyError::invalid_argument("studyInstanceUid is required"))?;
		let status = performed_status
			.ok_or_else(|| RadiologyError::invalid_argument("performedStatus is required"))?;

		let mut tx = self.storage.begin();
		let Some(id) = tx
			.retrieve::<StudyId>(StorageKey::StudyByUid.as_str(), uid)
			.await?
		else {
			return Ok(None);
		};
		let Some(mut study) = tx
			.retrieve::<Study>(StorageKey::Studies.as_str(), &id.to_string())
			.await?
		else {
			return Ok(None);
		};

		let previous = study.performed_status.replace(status);
		tx.store(StorageKey::Studies.as_str(), &id.to_string(), &study)?;
		tx.commit().await?;

		tracing::info!(
			study_id = %id,
			study_instance_uid = %uid,
			previous = ?previous,
			performed_status = %status,
			"Updated performed status"
		);
		Ok(Some(study))
	}
}
