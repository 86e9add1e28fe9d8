//! Repositories over the storage service.
//!
//! Reads go straight to storage. Writes are staged in a caller-supplied
//! [`Transaction`](radiology_storage::Transaction) so that the service
//! decides what is committed together.

pub mod observation;
pub mod order;
pub mod study;

pub use observation::ObservationRepository;
pub use order::OrderRepository;
pub use study::StudyRepository;

use radiology_storage::{StorageError, Transaction};

/// Returns `requested` after moving the sequence past it, or the next value
/// of the sequence when no id was requested.
async fn assign_id(
	tx: &Transaction<'_>,
	sequence: &str,
	requested: Option<u64>,
) -> Result<u64, StorageError> {
	match requested {
		Some(id) => {
			tx.reserve_id(sequence, id).await?;
			Ok(id)
		},
		None => tx.next_id(sequence).await,
	}
}
