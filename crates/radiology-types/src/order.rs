//! Radiology order types.
//!
//! An order is the clinical request for an imaging procedure. Orders are
//! immutable once placed; the only later change is being stopped by a
//! discontinuation order that points back at them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::directory::numeric_id;
use crate::{ConceptId, PatientId, ProviderId, Study};

numeric_id!(
	/// Internal identifier assigned to an order when it is persisted.
	OrderId
);

/// Represents a radiology order together with its placement state.
///
/// `id` is `None` until the order has been placed. The linked study travels
/// with the order in memory but is persisted as its own record and resolved
/// by order id when an order is read back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
	/// Identifier assigned on placement.
	#[serde(default)]
	pub id: Option<OrderId>,
	/// Patient the procedure is ordered for.
	pub patient: PatientId,
	/// Provider who placed (or discontinued) the order.
	pub orderer: ProviderId,
	/// Concept describing what is being ordered.
	pub concept: ConceptId,
	/// Free-text instructions. For discontinuation orders this holds the
	/// discontinuation reason.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub instructions: Option<String>,
	/// Date the procedure is scheduled for.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scheduled_date: Option<DateTime<Utc>>,
	#[serde(default)]
	pub urgency: Urgency,
	#[serde(default)]
	pub action: OrderAction,
	/// Order discontinued by this one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub previous_order: Option<OrderId>,
	/// When the order became effective.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub date_activated: Option<DateTime<Utc>>,
	/// When the order was stopped by a discontinuation.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub date_stopped: Option<DateTime<Utc>>,
	/// Study linked to this order. Never persisted inline.
	#[serde(skip)]
	pub study: Option<Study>,
}

impl Order {
	/// Creates an unsaved routine order with no study attached.
	pub fn new(patient: PatientId, orderer: ProviderId, concept: ConceptId) -> Self {
		Self {
			id: None,
			patient,
			orderer,
			concept,
			instructions: None,
			scheduled_date: None,
			urgency: Urgency::default(),
			action: OrderAction::default(),
			previous_order: None,
			date_activated: None,
			date_stopped: None,
			study: None,
		}
	}

	/// Attaches the study to be placed together with this order.
	pub fn with_study(mut self, study: Study) -> Self {
		self.study = Some(study);
		self
	}

	/// Returns true once the order has been assigned an id.
	pub fn is_persisted(&self) -> bool {
		self.id.is_some()
	}

	/// Returns true while the order is in effect.
	///
	/// Discontinuation orders are never active themselves; new orders are
	/// active until stopped.
	pub fn is_active(&self) -> bool {
		match self.action {
			OrderAction::New => self.date_stopped.is_none(),
			OrderAction::Discontinue => false,
		}
	}
}

/// How urgently an order should be carried out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Urgency {
	#[default]
	Routine,
	Stat,
	/// Carry out on the order's scheduled date.
	OnScheduledDate,
}

/// What an order does to the order history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderAction {
	/// Requests a new procedure.
	#[default]
	New,
	/// Stops the order referenced by `previous_order`.
	Discontinue,
}

impl fmt::Display for OrderAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OrderAction::New => write!(f, "NEW"),
			OrderAction::Discontinue => write!(f, "DISCONTINUE"),
		}
	}
}
