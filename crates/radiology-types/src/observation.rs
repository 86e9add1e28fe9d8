//! Observation records.
//!
//! Observations are clinical findings owned by the observation collaborator.
//! The radiology core only reads the ones linked to a given order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::directory::numeric_id;
use crate::{ConceptId, OrderId, PatientId};

numeric_id!(
	/// Identifier of an observation.
	ObservationId
);

/// A clinical finding, optionally recorded against an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
	#[serde(default)]
	pub id: Option<ObservationId>,
	/// Order the observation was recorded for, if any.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub order_id: Option<OrderId>,
	pub person: PatientId,
	pub concept: ConceptId,
	pub obs_datetime: DateTime<Utc>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value_text: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value_numeric: Option<f64>,
}
