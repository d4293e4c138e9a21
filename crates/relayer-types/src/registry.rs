//! Registry trait for self-registering implementations.
//!
//! This module provides the base trait that all relayer component implementations
//! must implement to register themselves with their configuration name and
//! factory function.

/// Base trait for implementation registries.
///
/// Each pluggable component (Storage, Watcher, Chain worker, ...) must provide
/// a Registry struct that implements this trait. This ensures that every implementation
/// declares its configuration name and provides a factory function.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation.
	///
	/// This should match the key used in the TOML configuration, for example:
	/// - "evm" for chain.implementations.evm
	/// - "memory" for storage.implementations.memory
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	///
	/// Each module defines its own factory type, for example:
	/// - DiscoveryFactory for discovery implementations
	/// - StorageFactory for storage implementations
	type Factory;

	/// Get the factory function for this implementation.
	///
	/// Returns the factory function that can create instances of this implementation
	/// when provided with the appropriate configuration.
	fn factory() -> Self::Factory;
}
