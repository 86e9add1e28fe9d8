//! Order state machine implementation.
//!
//! A new order is Active from placement until it is discontinued. Once
//! Discontinued it stays there: the only transition is Active -> Discontinued.

use chrono::{DateTime, Utc};
use radiology_storage::{StorageError, Transaction};
use radiology_types::{Order, OrderId, StorageKey};
use std::fmt;
use thiserror::Error;

/// Errors that can occur during order state management.
#[derive(Debug, Error)]
pub enum OrderStateError {
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
	#[error("Invalid state transition from {from} to {to}")]
	InvalidTransition { from: OrderState, to: OrderState },
	#[error("Order not found: {0}")]
	OrderNotFound(OrderId),
}

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderState {
	/// In effect.
	Active,
	/// Stopped by a discontinuation. Discontinuation orders themselves are
	/// never in effect and are reported here as well.
	Discontinued,
}

impl OrderState {
	/// Derives the state of an order from its action and stop date.
	pub fn of(order: &Order) -> Self {
		if order.is_active() {
			OrderState::Active
		} else {
			OrderState::Discontinued
		}
	}
}

impl fmt::Display for OrderState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OrderState::Active => write!(f, "Active"),
			OrderState::Discontinued => write!(f, "Discontinued"),
		}
	}
}

/// Applies order state transitions inside a storage transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderStateMachine;

impl OrderStateMachine {
	pub fn new() -> Self {
		Self
	}

	/// Transitions the persisted order to `to` at instant `at` and stages the
	/// change in `tx`.
	///
	/// The order is read through the transaction, so the commit fails with a
	/// conflict if another writer changes it first.
	pub async fn transition(
		&self,
		tx: &mut Transaction<'_>,
		order_id: OrderId,
		to: OrderState,
		at: DateTime<Utc>,
	) -> Result<Order, OrderStateError> {
		let mut order: Order = tx
			.retrieve(StorageKey::Orders.as_str(), &order_id.to_string())
			.await?
			.ok_or(OrderStateError::OrderNotFound(order_id))?;

		let from = OrderState::of(&order);
		if !Self::is_valid_transition(from, to) {
			return Err(OrderStateError::InvalidTransition { from, to });
		}

		match to {
			OrderState::Discontinued => order.date_stopped = Some(at),
			OrderState::Active => order.date_stopped = None,
		}

		tx.store(StorageKey::Orders.as_str(), &order_id.to_string(), &order)?;
		Ok(order)
	}

	/// Checks if a state transition is valid
	fn is_valid_transition(from: OrderState, to: OrderState) -> bool {
		matches!((from, to), (OrderState::Active, OrderState::Discontinued))
	}
}
