//! State management for radiology orders.
//!
//! Order state is derived from the persisted record rather than stored as a
//! field, and only changes through the transitions checked here.

pub mod order;

pub use order::{OrderState, OrderStateError, OrderStateMachine};
