//! Polling EVM Watcher.
//!
//! Mirrors the teacher's `solver-discovery` onchain/offchain split in
//! spirit (chain-event ingress kept behind a narrow trait, concrete
//! implementation swappable) but collapsed to a single polling
//! implementation: the core only needs point-in-time answers to "did this
//! tx mine?" and "did the owner set change?", not a push subscription.

use crate::{Watcher, WatcherError};
use alloy_primitives::Address;
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::{sol, SolCall};
use alloy_transport_http::Http;
use async_trait::async_trait;
use relayer_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, TransactionStatus, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

sol! {
	function getOwners() external view returns (address[] memory);
}

type HttpProvider = Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>;

/// Configuration for the `evm` Watcher implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvmWatcherConfig {
	/// JSON-RPC endpoint for this chain.
	pub rpc_url: String,
	/// Address of the Gnosis Safe settlement contract whose owner set this
	/// Watcher polls for changes.
	pub safe_address: Address,
}

/// Polling implementation of [`Watcher`] against a plain JSON-RPC endpoint.
pub struct EvmWatcher {
	chain_name: String,
	config: EvmWatcherConfig,
	provider: HttpProvider,
}

impl EvmWatcher {
	pub fn new(chain_name: String, config: EvmWatcherConfig) -> Result<Self, WatcherError> {
		let url = config
			.rpc_url
			.parse()
			.map_err(|e| WatcherError::Configuration(format!("invalid rpc_url: {e}")))?;
		let provider = ProviderBuilder::new().on_http(url);
		Ok(Self {
			chain_name,
			config,
			provider: Arc::new(provider),
		})
	}
}

#[async_trait]
impl Watcher for EvmWatcher {
	fn chain_name(&self) -> &str {
		&self.chain_name
	}

	async fn transaction_status(&self, tx_hash: &str) -> Result<TransactionStatus, WatcherError> {
		let hash = alloy_primitives::B256::from_str(tx_hash)
			.map_err(|e| WatcherError::InvalidHash(e.to_string()))?;
		let receipt = self
			.provider
			.get_transaction_receipt(hash)
			.await
			.map_err(|e| WatcherError::Rpc(e.to_string()))?;
		Ok(match receipt {
			None => TransactionStatus::NotFound,
			Some(r) if r.status() => TransactionStatus::Success,
			Some(_) => TransactionStatus::Failed,
		})
	}

	async fn owner_set_changed(&self, known_owners: &[Address]) -> Result<Option<Vec<Address>>, WatcherError> {
		let call = getOwnersCall {};
		let tx = TransactionRequest::default()
			.to(self.config.safe_address)
			.input(call.abi_encode().into());
		let result = self
			.provider
			.call(&tx)
			.await
			.map_err(|e| WatcherError::Rpc(e.to_string()))?;
		let decoded = getOwnersCall::abi_decode_returns(&result, true)
			.map_err(|e| WatcherError::Rpc(format!("decode error: {e}")))?;
		let current: BTreeSet<Address> = decoded._0.into_iter().collect();
		let known: BTreeSet<Address> = known_owners.iter().copied().collect();
		if current == known {
			Ok(None)
		} else {
			Ok(Some(current.into_iter().collect()))
		}
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(EvmWatcherSchema)
	}
}

/// Configuration schema for [`EvmWatcher`].
pub struct EvmWatcherSchema;

impl ConfigSchema for EvmWatcherSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("rpc_url", FieldType::String),
				Field::new("safe_address", FieldType::String),
			],
			vec![],
		);
		schema.validate(config)
	}
}

/// Builds an [`EvmWatcher`] from raw per-chain TOML configuration.
pub fn create_watcher(chain_name: String, config: &toml::Value) -> Result<Box<dyn Watcher>, WatcherError> {
	EvmWatcherSchema.validate(config).map_err(|e| WatcherError::Configuration(e.to_string()))?;
	let parsed: EvmWatcherConfig = config
		.clone()
		.try_into()
		.map_err(|e| WatcherError::Configuration(format!("invalid evm watcher config: {e}")))?;
	Ok(Box::new(EvmWatcher::new(chain_name, parsed)?))
}

/// Registry for the `evm` Watcher implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "evm";
	type Factory = crate::WatcherFactory;

	fn factory() -> Self::Factory {
		create_watcher
	}
}

impl crate::WatcherRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn owner_set_comparison_is_order_independent() {
		let a = Address::from([1u8; 20]);
		let b = Address::from([2u8; 20]);
		let current: BTreeSet<Address> = [a, b].into_iter().collect();
		let known: BTreeSet<Address> = [b, a].into_iter().collect();
		assert_eq!(current, known);
	}

	#[test]
	fn rejects_config_missing_safe_address() {
		let toml_value: toml::Value = toml::from_str(
			r#"
            rpc_url = "http://localhost:8545"
            "#,
		)
		.unwrap();
		assert!(EvmWatcherSchema.validate(&toml_value).is_err());
	}
}
