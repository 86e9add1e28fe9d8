//! Storage-related types for the radiology system.

use std::str::FromStr;

/// Storage namespaces for the different record collections.
///
/// Records are stored under `<namespace>:<id>`. The index namespaces map an
/// alternate key to the id of the record it identifies. Each record
/// namespace also names the id sequence used for that record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Radiology orders, keyed by order id.
	Orders,
	/// Studies, keyed by study id.
	Studies,
	/// Owning order id to study id.
	StudyByOrder,
	/// Study instance UID to study id.
	StudyByUid,
	/// Observations, keyed by observation id.
	Observations,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::Studies => "studies",
			StorageKey::StudyByOrder => "study_by_order",
			StorageKey::StudyByUid => "study_by_uid",
			StorageKey::Observations => "observations",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Orders,
			Self::Studies,
			Self::StudyByOrder,
			Self::StudyByUid,
			Self::Observations,
		]
		.into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all().find(|key| key.as_str() == s).ok_or(())
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_storage_key_round_trips_through_str() {
		for key in StorageKey::all() {
			assert_eq!(key.as_str().parse::<StorageKey>(), Ok(key));
		}
		assert!("quotes".parse::<StorageKey>().is_err());
	}
}
