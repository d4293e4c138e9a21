//! Chain watcher contract (§6 Watcher, chain-event ingress).
//!
//! A Watcher is the core's window onto chain state it did not itself
//! submit: it reports whether a previously-broadcast transaction mined or
//! reverted, and whether the guardian set changed underneath a running
//! chain. The status-updater loop polls the former; the retry loop and
//! periodic guardian-set refresh use the latter. Everything about *how*
//! that happens — RPC client, polling cadence, event subscriptions — is
//! out of core scope (§1) and lives entirely behind this trait.

use async_trait::async_trait;
use relayer_types::{Address, ConfigSchema, ImplementationRegistry, TransactionStatus};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod polling;
	}
}

/// Errors a Watcher can report.
#[derive(Debug, Error)]
pub enum WatcherError {
	/// The chain RPC call failed or timed out.
	#[error("chain RPC error: {0}")]
	Rpc(String),
	/// The requested transaction hash was malformed.
	#[error("invalid transaction hash: {0}")]
	InvalidHash(String),
	/// Configuration for the implementation was invalid.
	#[error("configuration error: {0}")]
	Configuration(String),
}

/// Chain-event ingress consumed by the core's status-updater and retry
/// loops (§6).
#[async_trait]
pub trait Watcher: Send + Sync {
	/// The chain tag this Watcher observes.
	fn chain_name(&self) -> &str;

	/// Reports the current on-chain status of a previously-broadcast
	/// transaction (§4.4). Returns [`TransactionStatus::NotFound`] when the
	/// hash is not known to the node, mined-success/mined-revert
	/// otherwise.
	async fn transaction_status(&self, tx_hash: &str) -> Result<TransactionStatus, WatcherError>;

	/// Compares the guardian set currently on-chain against `known_owners`
	/// (as last observed by the core), returning `Some(new_set)` only when
	/// it has changed. `known_owners` order is not significant; comparison
	/// is set-based.
	async fn owner_set_changed(&self, known_owners: &[Address]) -> Result<Option<Vec<Address>>, WatcherError>;

	/// Returns the configuration schema for this implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Factory function type for Watcher implementations.
pub type WatcherFactory =
	fn(chain_name: String, config: &toml::Value) -> Result<Box<dyn Watcher>, WatcherError>;

/// Registry trait for Watcher implementations.
pub trait WatcherRegistry: ImplementationRegistry<Factory = WatcherFactory> {}

/// All registered Watcher implementations, keyed by config name.
pub fn get_all_implementations() -> Vec<(&'static str, WatcherFactory)> {
	use implementations::evm::polling;

	vec![(polling::Registry::NAME, polling::Registry::factory())]
}

/// Builds a Watcher for `implementation` (e.g. `"evm"`), dispatching to the
/// matching implementation's factory.
pub fn build_watcher(
	implementation: &str,
	chain_name: String,
	config: &toml::Value,
) -> Result<Box<dyn Watcher>, WatcherError> {
	get_all_implementations()
		.into_iter()
		.find(|(name, _)| *name == implementation)
		.ok_or_else(|| WatcherError::Configuration(format!("unknown watcher implementation: {implementation}")))
		.and_then(|(_, factory)| factory(chain_name, config))
}
