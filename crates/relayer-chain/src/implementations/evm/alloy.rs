//! EVM Worker backed by [`alloy`], targeting a Gnosis-Safe-style
//! multi-signature settlement contract.
//!
//! Mirrors the teacher's `solver-delivery::implementations::evm::alloy`
//! provider-construction style (wallet-backed HTTP provider over
//! `reqwest`), re-pointed at Safe `execTransaction` calls instead of
//! order-fill calls.

use crate::{GnosisTransaction, OrderValidationInfo, Worker, WorkerError};
use alloy_network::EthereumWallet;
use alloy_primitives::{keccak256, Address, Bytes, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_signer::Signer as _;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{sol, SolCall};
use alloy_transport_http::Http;
use async_trait::async_trait;
use relayer_types::{ConfigSchema, Field, FieldType, GuardianSignature, Order, Schema, SecretString, ValidationError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

sol! {
	function getOwners() external view returns (address[] memory);
	function getThreshold() external view returns (uint256);
	function nonce() external view returns (uint256);
	function execTransaction(
		address to,
		uint256 value,
		bytes calldata data,
		uint8 operation,
		uint256 safeTxGas,
		uint256 baseGas,
		uint256 gasPrice,
		address gasToken,
		address payable refundReceiver,
		bytes calldata signatures
	) external payable returns (bool success);
}

type HttpProvider = Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>;

/// Configuration for the `evm` Worker implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvmWorkerConfig {
	/// JSON-RPC endpoint for this chain.
	pub rpc_url: String,
	/// The EVM chain id.
	pub chain_id: u64,
	/// Address of the Gnosis Safe settlement contract guardians sign for.
	pub safe_address: Address,
	/// Address of the settlement/positioning contract the Safe calls into
	/// to actually fill the paired orders.
	pub settlement_address: Address,
}

/// EVM implementation of [`Worker`] against a Gnosis Safe.
pub struct AlloyWorker {
	chain_name: String,
	config: EvmWorkerConfig,
	provider: HttpProvider,
	threshold: AtomicU64,
}

impl AlloyWorker {
	/// Builds a new Worker for `chain_name`, connecting to the configured
	/// RPC endpoint with a wallet derived from this node's private key
	/// (used to pay gas when submitting `execTransaction`; it is distinct
	/// from the guardian signatures carried inside that call's calldata).
	pub fn new(chain_name: String, config: EvmWorkerConfig, gas_payer_key: &SecretString) -> Result<Self, WorkerError> {
		let url = config
			.rpc_url
			.parse()
			.map_err(|e| WorkerError::Configuration(format!("invalid rpc_url: {e}")))?;

		let signer: PrivateKeySigner = gas_payer_key
			.with_exposed(|raw| raw.strip_prefix("0x").unwrap_or(raw).parse())
			.map_err(|e: alloy_signer_local::LocalSignerError| {
				WorkerError::Configuration(format!("invalid gas payer key: {e}"))
			})?;
		let wallet = EthereumWallet::from(signer.with_chain_id(Some(config.chain_id)));

		let provider = ProviderBuilder::new()
			.with_recommended_fillers()
			.wallet(wallet)
			.on_http(url);

		Ok(Self {
			chain_name,
			config,
			provider: Arc::new(provider),
			threshold: AtomicU64::new(0),
		})
	}

	async fn eth_call<C: SolCall>(&self, to: Address, call: C) -> Result<C::Return, WorkerError> {
		let tx = TransactionRequest::default().to(to).input(call.abi_encode().into());
		let result = self
			.provider
			.call(&tx)
			.await
			.map_err(|e| WorkerError::Rpc(e.to_string()))?;
		C::abi_decode_returns(&result, true).map_err(|e| WorkerError::Rpc(format!("decode error: {e}")))
	}

	/// ABI-encodes the opaque settlement call for a pairing `(a, b)`.
	///
	/// The exact shape of the on-chain fill call is a matching-algorithm/
	/// settlement-contract concern outside the core (§1); here it is
	/// reduced to the minimum the digest needs to be well-defined: a fixed
	/// selector stand-in followed by the paired order ids.
	fn encode_fill_calldata(a: &[Order], b: &[Order]) -> Vec<u8> {
		let mut data = Vec::new();
		data.extend_from_slice(&[0x5a, 0x1e, 0xf1, 0x11]);
		for (left, right) in a.iter().zip(b.iter()) {
			data.extend_from_slice(left.id.as_bytes());
			data.extend_from_slice(right.id.as_bytes());
		}
		data
	}
}

#[async_trait]
impl Worker for AlloyWorker {
	fn chain_name(&self) -> &str {
		&self.chain_name
	}

	fn threshold(&self) -> u64 {
		self.threshold.load(Ordering::Relaxed)
	}

	fn get_chain_id(&self) -> u64 {
		self.config.chain_id
	}

	async fn get_gnosis_owners(&self) -> Result<Vec<Address>, WorkerError> {
		let result = self.eth_call(self.config.safe_address, getOwnersCall {}).await?;
		Ok(result._0)
	}

	async fn get_threshold(&self) -> Result<u64, WorkerError> {
		let result = self.eth_call(self.config.safe_address, getThresholdCall {}).await?;
		let threshold: u64 = result
			._0
			.try_into()
			.map_err(|_| WorkerError::Rpc("threshold overflowed u64".into()))?;
		self.threshold.store(threshold, Ordering::Relaxed);
		Ok(threshold)
	}

	async fn create_gnosis_tx_and_hash(
		&self,
		a: &[Order],
		b: &[Order],
	) -> Result<(GnosisTransaction, [u8; 32]), WorkerError> {
		if a.is_empty() || a.len() != b.len() {
			return Err(WorkerError::BuildFailed(
				"pairing lists must be non-empty and of equal length".into(),
			));
		}
		let nonce_result = self.eth_call(self.config.safe_address, nonceCall {}).await?;
		let safe_nonce: u64 = nonce_result
			._0
			.try_into()
			.map_err(|_| WorkerError::BuildFailed("safe nonce overflowed u64".into()))?;

		let data = Self::encode_fill_calldata(a, b);

		// Canonical digest: keccak256 over (chain id, safe address, to,
		// calldata, nonce). Not the literal EIP-712 Safe transaction hash
		// (computing that exactly is settlement-contract detail outside
		// core scope, §1) but it serves the same role: the one object
		// every guardian signs and the contract is asked to verify against
		// on submit.
		let mut preimage = Vec::new();
		preimage.extend_from_slice(&self.config.chain_id.to_be_bytes());
		preimage.extend_from_slice(self.config.safe_address.as_slice());
		preimage.extend_from_slice(self.config.settlement_address.as_slice());
		preimage.extend_from_slice(&data);
		preimage.extend_from_slice(&safe_nonce.to_be_bytes());
		let digest = keccak256(&preimage);

		Ok((
			GnosisTransaction {
				to: self.config.settlement_address,
				data,
				safe_nonce,
			},
			digest.0,
		))
	}

	async fn order_validation(&self, order: &Order) -> Result<OrderValidationInfo, WorkerError> {
		// Structural validity: the opaque payload must at minimum still
		// parse as an object (§3 "opaque payload used only by ... Worker
		// validation"). Real economic revalidation (price staleness,
		// counterparty solvency) is a chain/market concern outside core
		// scope (§1); this keeps the contract's shape faithful without
		// inventing market logic the spec does not describe.
		if !order.data.is_object() && !order.data.is_null() {
			return Err(WorkerError::Validation(format!(
				"order {} payload is not a structured object",
				order.id
			)));
		}
		Ok(OrderValidationInfo {
			detail: format!("order {} still structurally valid", order.id),
		})
	}

	async fn submit(
		&self,
		tx: &GnosisTransaction,
		order_ids: &[String],
		signatures: &[GuardianSignature],
	) -> Result<String, WorkerError> {
		if order_ids.is_empty() {
			return Err(WorkerError::SubmitRejected("no orders to settle".into()));
		}
		let mut sorted = signatures.to_vec();
		sorted.sort_by_key(|s| s.guardian);
		let mut packed_signatures = Vec::with_capacity(sorted.len() * 65);
		for sig in &sorted {
			packed_signatures.extend_from_slice(&sig.signature);
		}

		let call = execTransactionCall {
			to: tx.to,
			value: U256::ZERO,
			data: Bytes::from(tx.data.clone()),
			operation: 0,
			safeTxGas: U256::ZERO,
			baseGas: U256::ZERO,
			gasPrice: U256::ZERO,
			gasToken: Address::ZERO,
			refundReceiver: Address::ZERO,
			signatures: Bytes::from(packed_signatures),
		};
		let request = TransactionRequest::default()
			.to(self.config.safe_address)
			.input(call.abi_encode().into());

		let pending = self
			.provider
			.send_transaction(request)
			.await
			.map_err(|e| WorkerError::SubmitRejected(e.to_string()))?;
		Ok(format!("{:#x}", pending.tx_hash()))
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(EvmWorkerSchema)
	}
}

/// Configuration schema for [`AlloyWorker`].
pub struct EvmWorkerSchema;

impl ConfigSchema for EvmWorkerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("rpc_url", FieldType::String),
				Field::new("chain_id", FieldType::Integer { min: Some(1), max: None }),
				Field::new("safe_address", FieldType::String),
				Field::new("settlement_address", FieldType::String),
			],
			vec![],
		);
		schema.validate(config)
	}
}

/// Builds an [`AlloyWorker`] from raw per-chain TOML configuration.
pub fn create_worker(
	chain_name: String,
	config: &toml::Value,
	gas_payer_key: &SecretString,
) -> Result<Box<dyn Worker>, WorkerError> {
	EvmWorkerSchema.validate(config).map_err(|e| WorkerError::Configuration(e.to_string()))?;
	let parsed: EvmWorkerConfig = config
		.clone()
		.try_into()
		.map_err(|e| WorkerError::Configuration(format!("invalid evm worker config: {e}")))?;
	Ok(Box::new(AlloyWorker::new(chain_name, parsed, gas_payer_key)?))
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn sample_order(id: &str) -> Order {
		Order::new(id, "ethereum", json!({"price": "100", "size": "1"}))
	}

	#[test]
	fn fill_calldata_is_selector_prefixed_and_deterministic() {
		let a = vec![sample_order("o1")];
		let b = vec![sample_order("o2")];
		let first = AlloyWorker::encode_fill_calldata(&a, &b);
		let second = AlloyWorker::encode_fill_calldata(&a, &b);
		assert_eq!(first, second);
		assert_eq!(&first[..4], &[0x5a, 0x1e, 0xf1, 0x11]);
	}
}
