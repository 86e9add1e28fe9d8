//! Typed references into the external patient, provider and concept
//! directories.
//!
//! The radiology core never resolves these itself; callers hand in ids that
//! were already validated against their directories.

/// Declares a numeric identifier newtype that serializes as a bare number.
macro_rules! numeric_id {
	($(#[$meta:meta])* $name:ident) => {
		$(#[$meta])*
		#[derive(
			Debug,
			Clone,
			Copy,
			PartialEq,
			Eq,
			Hash,
			PartialOrd,
			Ord,
			::serde::Serialize,
			::serde::Deserialize,
		)]
		#[serde(transparent)]
		pub struct $name(pub u64);

		impl ::std::fmt::Display for $name {
			fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl From<u64> for $name {
			fn from(value: u64) -> Self {
				Self(value)
			}
		}
	};
}

pub(crate) use numeric_id;

numeric_id!(
	/// Identifier of a patient in the patient directory.
	PatientId
);
numeric_id!(
	/// Identifier of a provider (orderer) in the provider directory.
	ProviderId
);
numeric_id!(
	/// Identifier of a coded concept, e.g. the procedure being ordered.
	ConceptId
);
