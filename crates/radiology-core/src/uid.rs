//! Study instance UIDs.

use radiology_config::StudyConfig;
use radiology_types::StudyId;
use uuid::Uuid;

/// Issues the study instance UID of a newly placed study.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StudyInstanceUidGenerator {
	/// `<root>.<study id>` under an organisation root.
	Root(String),
	/// `2.25.<uuid>`, the UUID-derived form for sites without a root.
	#[default]
	Uuid,
}

impl StudyInstanceUidGenerator {
	pub fn from_config(config: &StudyConfig) -> Self {
		match &config.uid_root {
			Some(root) => Self::Root(root.clone()),
			None => Self::Uuid,
		}
	}

	/// Returns the UID for the study with the given id.
	pub fn generate(&self, study_id: StudyId) -> String {
		match self {
			Self::Root(root) => format!("{}.{}", root, study_id),
			Self::Uuid => format!("2.25.{}", Uuid::new_v4().as_u128()),
		}
	}
}
