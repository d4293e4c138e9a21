//! Configuration builder for creating test and development configurations.
//!
//! This module provides utilities for constructing Config instances with
//! sensible defaults, particularly useful for testing scenarios.

use crate::{ChainWorkerConfig, Config, MatchingConfig, NodeConfig, PeerBusConfig, StorageConfig};
use relayer_types::SecretString;
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
///
/// Provides an easy way to create test configurations with sensible
/// defaults so tests don't each hand-roll a full TOML document.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	leader: bool,
	max_fail_allowed: i64,
	worker_address: String,
	private_key: String,
	chains: HashMap<String, ChainWorkerConfig>,
	storage_primary: String,
	storage_cleanup_interval_seconds: u64,
	peer_bus_implementation: String,
	consensus_timeout_seconds: u64,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Creates a new `ConfigBuilder` with default values suitable for testing.
	pub fn new() -> Self {
		Self {
			leader: false,
			max_fail_allowed: 3,
			worker_address: "0x1234567890123456789012345678901234567890".to_string(),
			private_key: "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80".to_string(),
			chains: HashMap::new(),
			storage_primary: "memory".to_string(),
			storage_cleanup_interval_seconds: 60,
			peer_bus_implementation: "direct".to_string(),
			consensus_timeout_seconds: 5,
		}
	}

	/// Sets `matching.max_fail_allowed`.
	pub fn max_fail_allowed(mut self, value: i64) -> Self {
		self.max_fail_allowed = value;
		self
	}

	/// Adds a chain with the given name and implementation key.
	pub fn with_chain(mut self, chain: impl Into<String>, implementation: impl Into<String>) -> Self {
		self.chains.insert(
			chain.into(),
			ChainWorkerConfig {
				implementation: implementation.into(),
				match_period_seconds: 30,
				retry_period_seconds: 20,
				status_period_seconds: 15,
				status_grace_seconds: 60,
				config: toml::Value::Table(toml::map::Map::new()),
			},
		);
		self
	}

	/// Sets the consensus round deadline used by the match loop.
	pub fn consensus_timeout_seconds(mut self, value: u64) -> Self {
		self.consensus_timeout_seconds = value;
		self
	}

	/// Builds the `Config` with the configured values.
	pub fn build(self) -> Config {
		Config {
			matching: MatchingConfig {
				leader: self.leader,
				max_fail_allowed: self.max_fail_allowed,
			},
			node: NodeConfig {
				worker_address: self.worker_address,
				private_key: SecretString::from(self.private_key.as_str()),
			},
			chains: self.chains,
			storage: StorageConfig {
				primary: self.storage_primary,
				implementations: HashMap::from([(
					"memory".to_string(),
					toml::Value::Table(toml::map::Map::new()),
				)]),
				cleanup_interval_seconds: self.storage_cleanup_interval_seconds,
			},
			peer_bus: PeerBusConfig {
				implementation: self.peer_bus_implementation,
				config: toml::Value::Table(toml::map::Map::new()),
				consensus_timeout_seconds: self.consensus_timeout_seconds,
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn builder_produces_a_valid_config() {
		let config = ConfigBuilder::new().with_chain("ethereum", "evm").build();
		assert_eq!(config.matching.max_fail_allowed, 3);
		assert!(config.chains.contains_key("ethereum"));
	}
}
