//! Chain-specific Worker contract (§6 Worker, consumed by the core).
//!
//! A Worker is the only seam through which the core touches a specific
//! chain: it builds the settlement payload and its canonical digest, knows
//! the guardian set and threshold, validates orders before a retry, and
//! broadcasts the final multi-signed transaction. Everything about *how*
//! that happens — RPC client, contract ABI, gas handling — is out of core
//! scope (§1) and lives entirely behind this trait.

use async_trait::async_trait;
use relayer_types::{Address, ConfigSchema, GuardianSignature, Order, SecretString};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}

/// Errors a Worker can report. Maps onto the error taxonomy in §7:
/// `Validation` and `Rpc` are transient/validation classes the retry loop
/// and match loop already know how to handle; `Configuration` is a
/// startup-class error (§7 class 6).
#[derive(Debug, Error)]
pub enum WorkerError {
	/// The chain RPC call failed or timed out.
	#[error("chain RPC error: {0}")]
	Rpc(String),
	/// An order failed `order_validation`.
	#[error("order validation failed: {0}")]
	Validation(String),
	/// Building the settlement payload or its digest failed.
	#[error("failed to build settlement transaction: {0}")]
	BuildFailed(String),
	/// The chain rejected the submitted transaction outright.
	#[error("submission rejected: {0}")]
	SubmitRejected(String),
	/// Configuration for the implementation was invalid.
	#[error("configuration error: {0}")]
	Configuration(String),
}

/// The settlement payload built for a pairing `(A[], B[])`, plus the
/// canonical digest guardians sign (§4.2 steps 3-4).
#[derive(Debug, Clone)]
pub struct GnosisTransaction {
	/// Target contract (the multi-sig settlement contract) this call hits.
	pub to: Address,
	/// ABI-encoded settlement calldata for the `(A, B)` pairing.
	pub data: Vec<u8>,
	/// The Safe nonce this transaction was built against.
	pub safe_nonce: u64,
}

/// Result of validating an order against current chain state (§4.3, §6
/// `OrderValidation`). Carries enough information for the retry loop to
/// log why a validation passed or failed; the core itself only branches
/// on `Ok`/`Err`.
#[derive(Debug, Clone)]
pub struct OrderValidationInfo {
	/// Human-readable detail, useful for logs.
	pub detail: String,
}

/// Chain-specific adapter consumed by the core's three loops (§6).
#[async_trait]
pub trait Worker: Send + Sync {
	/// The chain tag this Worker operates on.
	fn chain_name(&self) -> &str;

	/// The quorum size required to submit a settlement, as last fetched
	/// from the chain via [`Worker::get_threshold`].
	fn threshold(&self) -> u64;

	/// The EVM chain id this Worker submits to.
	fn get_chain_id(&self) -> u64;

	/// Fetches the current multi-sig owner set (the guardian set) from the
	/// settlement contract.
	async fn get_gnosis_owners(&self) -> Result<Vec<Address>, WorkerError>;

	/// Fetches the current signature threshold from the settlement
	/// contract.
	async fn get_threshold(&self) -> Result<u64, WorkerError>;

	/// Builds the on-chain settlement payload and its canonical digest for
	/// a pairing `(a, b)` where `a[i]` settles against `b[i]` (§4.2 step 3).
	async fn create_gnosis_tx_and_hash(
		&self,
		a: &[Order],
		b: &[Order],
	) -> Result<(GnosisTransaction, [u8; 32]), WorkerError>;

	/// Revalidates a single order against current chain/market state
	/// (§4.3). `Err` means the order is no longer valid and should be
	/// blocked; `Ok` means it is still valid and eligible to be requeued.
	async fn order_validation(&self, order: &Order) -> Result<OrderValidationInfo, WorkerError>;

	/// Broadcasts `tx` wrapped with the collected guardian signatures,
	/// returning the resulting transaction hash (§4.2 step 6).
	async fn submit(
		&self,
		tx: &GnosisTransaction,
		order_ids: &[String],
		signatures: &[GuardianSignature],
	) -> Result<String, WorkerError>;

	/// Returns the configuration schema for this implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Factory function type for Worker implementations.
///
/// Unlike the other pluggable crates, a Worker factory also needs the
/// node's own signing key (to pay gas when submitting a settlement
/// transaction, distinct from the guardian signatures it carries), so it
/// does not fit the zero-argument [`relayer_types::ImplementationRegistry`]
/// shape used elsewhere; [`build_worker`] below plays that role instead.
pub type WorkerFactory = fn(
	chain_name: String,
	config: &toml::Value,
	gas_payer_key: &SecretString,
) -> Result<Box<dyn Worker>, WorkerError>;

/// Builds a Worker for `implementation` (e.g. `"evm"`), dispatching to the
/// matching implementation's factory.
pub fn build_worker(
	implementation: &str,
	chain_name: String,
	config: &toml::Value,
	gas_payer_key: &SecretString,
) -> Result<Box<dyn Worker>, WorkerError> {
	match implementation {
		"evm" => implementations::evm::alloy::create_worker(chain_name, config, gas_payer_key),
		other => Err(WorkerError::Configuration(format!(
			"unknown worker implementation: {other}"
		))),
	}
}
