//! Configuration module for the relayer.
//!
//! Provides structures and utilities for loading relayer configuration from
//! TOML, with environment-variable interpolation and validation to ensure
//! all required configuration values are properly set before the service
//! starts (§6, §7 Startup errors are fatal).

pub mod builders;
pub mod loader;

use relayer_types::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

pub use loader::ConfigLoader;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		ConfigError::Parse(err.message().to_string())
	}
}

/// Top-level configuration for a relayer instance (§6).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Matching policy shared by every chain.
	pub matching: MatchingConfig,
	/// This node's identity for signing settlement digests.
	pub node: NodeConfig,
	/// Per-chain worker/watcher wiring, keyed by chain name.
	pub chains: HashMap<String, ChainWorkerConfig>,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Configuration for the peer bus transport.
	pub peer_bus: PeerBusConfig,
}

/// Matching policy (§6, §9 — `leader` is carried but currently inert).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatchingConfig {
	/// Reserved; does not gate any core action in this spec (§9).
	#[serde(default)]
	pub leader: bool,
	/// Soft cap on `FailCount`; exceeding it moves an order to `Blocked`
	/// (invariant 3).
	pub max_fail_allowed: i64,
}

/// This node's signing identity (§6 Node identity).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeConfig {
	/// This node's guardian address.
	pub worker_address: String,
	/// Private key used to sign settlement digests. Never logged.
	pub private_key: SecretString,
}

/// Per-chain configuration wiring a Worker and Watcher implementation plus
/// this chain's loop periods. Implementation-specific fields are opaque to
/// the core and handed to the chosen factory unparsed (§1 — chain-specific
/// construction and RPC are out of scope for the core).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainWorkerConfig {
	/// Which Worker/Watcher implementation to construct, e.g. `"evm"`.
	pub implementation: String,
	/// Match-and-propose tick period in seconds. Defaults to 30 (§4.2).
	#[serde(default = "default_match_period_seconds")]
	pub match_period_seconds: u64,
	/// Retry/reconciliation tick period in seconds. Defaults to 20 (§4.3).
	#[serde(default = "default_retry_period_seconds")]
	pub retry_period_seconds: u64,
	/// Status-updater tick period in seconds. Defaults to 15 (§4.4).
	#[serde(default = "default_status_period_seconds")]
	pub status_period_seconds: u64,
	/// Grace period before a pending transaction is reported `NotFound`.
	#[serde(default = "default_status_grace_seconds")]
	pub status_grace_seconds: u64,
	/// Implementation-specific configuration (RPC endpoint, contract
	/// addresses, confirmations, ...), stored as raw TOML.
	pub config: toml::Value,
}

fn default_match_period_seconds() -> u64 {
	30
}

fn default_retry_period_seconds() -> u64 {
	20
}

fn default_status_period_seconds() -> u64 {
	15
}

fn default_status_grace_seconds() -> u64 {
	60
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Interval in seconds for cleaning up expired storage entries.
	#[serde(default = "default_cleanup_interval_seconds")]
	pub cleanup_interval_seconds: u64,
}

fn default_cleanup_interval_seconds() -> u64 {
	3600
}

/// Configuration for the peer bus transport (gossip plumbing is out of
/// scope for the core, §1 — only the duplex channel contract matters here).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PeerBusConfig {
	/// Which transport implementation to construct, e.g. `"direct"`.
	pub implementation: String,
	/// Implementation-specific configuration.
	pub config: toml::Value,
	/// Deadline for a single consensus round before it's abandoned (§4.2
	/// step 5, §5 Timeouts). Defaults to 30s.
	#[serde(default = "default_consensus_timeout_seconds")]
	pub consensus_timeout_seconds: u64,
}

fn default_consensus_timeout_seconds() -> u64 {
	30
}

/// Resolves environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of the environment variable
/// `VAR_NAME`. Supports default values with `${VAR_NAME:-default_value}`.
///
/// Input strings are limited to 1MB to bound the cost of the regex scan.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let full_match = cap.get(0).unwrap();
		let var_name = cap.get(1).unwrap().as_str();
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => {
				if let Some(default) = default_value {
					default.to_string()
				} else {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name
					)));
				}
			}
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

impl Config {
	/// Loads configuration from a file at the specified path.
	///
	/// Reads the file, resolves environment variables, parses it as TOML
	/// and validates the result before returning it.
	///
	/// Environment variables can be referenced using:
	/// - `${VAR_NAME}` - Required environment variable
	/// - `${VAR_NAME:-default}` - With default value if not set
	pub fn from_file(path: &str) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path)?;
		let resolved = resolve_env_vars(&content)?;
		resolved.parse()
	}

	/// Loads configuration from a file with async environment variable
	/// resolution. Async-ready for future resolvers (e.g. a KMS-backed
	/// secret store) without changing the call site.
	pub async fn from_file_async(path: &str) -> Result<Self, ConfigError> {
		Self::from_file(path)
	}

	/// Validates the configuration, checking every section required for the
	/// service to start (§7 Startup errors are fatal).
	fn validate(&self) -> Result<(), ConfigError> {
		if self.matching.max_fail_allowed < 0 {
			return Err(ConfigError::Validation(
				"matching.max_fail_allowed cannot be negative".into(),
			));
		}

		if self.node.worker_address.is_empty() {
			return Err(ConfigError::Validation(
				"node.worker_address cannot be empty".into(),
			));
		}
		if self.node.private_key.is_empty() {
			return Err(ConfigError::Validation(
				"node.private_key cannot be empty".into(),
			));
		}

		if self.chains.is_empty() {
			return Err(ConfigError::Validation(
				"at least one chain must be configured".into(),
			));
		}
		for (chain, cfg) in &self.chains {
			if cfg.implementation.is_empty() {
				return Err(ConfigError::Validation(format!(
					"chains.{} must set an implementation",
					chain
				)));
			}
			if cfg.match_period_seconds == 0
				|| cfg.retry_period_seconds == 0
				|| cfg.status_period_seconds == 0
			{
				return Err(ConfigError::Validation(format!(
					"chains.{} loop periods must be greater than 0",
					chain
				)));
			}
		}

		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"at least one storage implementation must be configured".into(),
			));
		}
		if self.storage.primary.is_empty() {
			return Err(ConfigError::Validation(
				"storage.primary cannot be empty".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}
		if self.storage.cleanup_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"storage.cleanup_interval_seconds must be greater than 0".into(),
			));
		}

		if self.peer_bus.implementation.is_empty() {
			return Err(ConfigError::Validation(
				"peer_bus.implementation cannot be empty".into(),
			));
		}
		if self.peer_bus.consensus_timeout_seconds == 0 {
			return Err(ConfigError::Validation(
				"peer_bus.consensus_timeout_seconds must be greater than 0".into(),
			));
		}

		Ok(())
	}
}

/// Parses configuration from a TOML string, resolving environment variables
/// and validating the result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_toml() -> &'static str {
		r#"
[matching]
leader = true
max_fail_allowed = 3

[node]
worker_address = "0x1234567890123456789012345678901234567890"
private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"

[chains.ethereum]
implementation = "evm"
[chains.ethereum.config]
rpc_url = "http://localhost:8545"

[storage]
primary = "memory"
[storage.implementations.memory]

[peer_bus]
implementation = "direct"
[peer_bus.config]
"#
	}

	#[test]
	fn test_parses_minimal_config() {
		let config: Config = sample_toml().parse().unwrap();
		assert_eq!(config.matching.max_fail_allowed, 3);
		assert!(config.chains.contains_key("ethereum"));
	}

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("TEST_HOST", "localhost");
		std::env::set_var("TEST_PORT", "5432");

		let input = "host = \"${TEST_HOST}:${TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "host = \"localhost:5432\"");

		std::env::remove_var("TEST_HOST");
		std::env::remove_var("TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${MISSING_VAR:-default_value}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"default_value\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let input = "value = \"${MISSING_VAR}\"";
		let result = resolve_env_vars(input);
		assert!(result.is_err());
		assert!(result.unwrap_err().to_string().contains("MISSING_VAR"));
	}

	#[test]
	fn test_config_with_env_vars() {
		std::env::set_var("TEST_WORKER_ADDRESS", "0x1234567890123456789012345678901234567890");

		let config_str = sample_toml().replace(
			"0x1234567890123456789012345678901234567890",
			"${TEST_WORKER_ADDRESS}",
		);
		let config: Config = config_str.parse().unwrap();
		assert_eq!(
			config.node.worker_address,
			"0x1234567890123456789012345678901234567890"
		);

		std::env::remove_var("TEST_WORKER_ADDRESS");
	}

	#[test]
	fn test_rejects_empty_chains() {
		let bad = sample_toml().replace("[chains.ethereum]", "[chains_disabled.ethereum]");
		let result: Result<Config, _> = bad.parse();
		assert!(result.is_err());
	}
}
