//! Study types for the imaging procedure linked to a radiology order.
//!
//! Status enumerations follow the DICOM modality worklist vocabulary so that
//! values can be exchanged with PACS and worklist providers unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::directory::numeric_id;
use crate::OrderId;

numeric_id!(
	/// Internal identifier assigned to a study when it is persisted.
	StudyId
);

/// Represents the imaging procedure carried out for exactly one order.
///
/// The owning order is referenced by id only; `order_id` is filled in when
/// the study is persisted as part of placing that order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Study {
	/// Identifier assigned on placement.
	#[serde(default)]
	pub id: Option<StudyId>,
	/// Globally unique study instance UID used to correlate with external
	/// systems. Generated on placement.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub study_instance_uid: Option<String>,
	/// Order owning this study.
	#[serde(default)]
	pub order_id: Option<OrderId>,
	/// Required before the owning order can be placed.
	#[serde(default)]
	pub modality: Option<Modality>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scheduled_status: Option<ScheduledProcedureStepStatus>,
	/// Unset until the procedure has started.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub performed_status: Option<PerformedProcedureStepStatus>,
	#[serde(default)]
	pub mwl_status: MwlStatus,
}

impl Study {
	/// Creates an unsaved, scheduled study for the given modality.
	pub fn new(modality: Modality) -> Self {
		Self {
			id: None,
			study_instance_uid: None,
			order_id: None,
			modality: Some(modality),
			scheduled_status: Some(ScheduledProcedureStepStatus::Scheduled),
			performed_status: None,
			mwl_status: MwlStatus::Default,
		}
	}
}

/// Imaging technique used to acquire the study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
	/// Computed radiography.
	Cr,
	/// Computed tomography.
	Ct,
	/// Digital radiography.
	Dx,
	/// Endoscopy.
	Es,
	/// Mammography.
	Mg,
	/// Magnetic resonance.
	Mr,
	/// Nuclear medicine.
	Nm,
	/// Other.
	Ot,
	/// Positron emission tomography.
	Pt,
	/// Radio fluoroscopy.
	Rf,
	/// Ultrasound.
	Us,
	/// X-ray angiography.
	Xa,
}

impl Modality {
	/// Returns the DICOM modality code.
	pub fn code(&self) -> &'static str {
		match self {
			Modality::Cr => "CR",
			Modality::Ct => "CT",
			Modality::Dx => "DX",
			Modality::Es => "ES",
			Modality::Mg => "MG",
			Modality::Mr => "MR",
			Modality::Nm => "NM",
			Modality::Ot => "OT",
			Modality::Pt => "PT",
			Modality::Rf => "RF",
			Modality::Us => "US",
			Modality::Xa => "XA",
		}
	}
}

impl fmt::Display for Modality {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.code())
	}
}

/// Scheduled procedure step status (DICOM 0040,0020).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduledProcedureStepStatus {
	Scheduled,
	Arrived,
	Ready,
	Started,
	Departed,
}

/// Performed procedure step status (DICOM 0040,0252).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PerformedProcedureStepStatus {
	InProgress,
	Discontinued,
	Completed,
}

impl fmt::Display for PerformedProcedureStepStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PerformedProcedureStepStatus::InProgress => write!(f, "IN PROGRESS"),
			PerformedProcedureStepStatus::Discontinued => write!(f, "DISCONTINUED"),
			PerformedProcedureStepStatus::Completed => write!(f, "COMPLETED"),
		}
	}
}

/// Synchronisation state of the study with the modality worklist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MwlStatus {
	/// Not yet sent to the worklist.
	#[default]
	Default,
	InSync,
	OutOfSync,
	SaveError,
	UpdateError,
	DiscontinueError,
}
