//! Common types module for the radiology order system.
//!
//! This module defines the records and enumerations shared by the storage,
//! configuration and service crates: radiology orders, their linked studies,
//! observations recorded against orders, and the configuration validation
//! primitives used by pluggable implementations.

/// Identifiers of external directory entries (patients, providers, concepts).
pub mod directory;
/// Observation records linked to orders.
pub mod observation;
/// Radiology order records and their action/urgency enumerations.
pub mod order;
/// Registry trait for named, self-registering implementations.
pub mod registry;
/// Storage namespaces used to persist records.
pub mod storage;
/// Study records and their DICOM-derived status enumerations.
pub mod study;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use directory::*;
pub use observation::*;
pub use order::*;
pub use registry::*;
pub use storage::*;
pub use study::*;
pub use validation::*;
