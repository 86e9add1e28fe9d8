//! Registry trait for self-registering implementations.

/// Base trait for implementation registries.
///
/// Every pluggable backend module exposes a `Registry` type implementing this
/// trait, tying the name used under `[storage.implementations.<name>]` in the
/// configuration to the factory that builds it.
pub trait ImplementationRegistry {
	/// Name of the implementation in configuration files, e.g. "memory".
	const NAME: &'static str;

	/// Factory function type provided by the implementation.
	type Factory;

	/// Returns the factory function for this implementation.
	fn factory() -> Self::Factory;
}
