//! Signing identity for a relayer node (§6 Worker `PrivateKey`).
//!
//! The core only ever needs one operation from a node's key material:
//! produce a recoverable secp256k1 signature over a 32-byte settlement
//! digest, plus the address that signature recovers to. This crate keeps
//! that surface pluggable (local key today, a remote signer or HSM later)
//! behind the same factory/registry pattern used throughout the workspace.

use async_trait::async_trait;
use relayer_types::{Address, ConfigSchema, ImplementationRegistry, SecretString};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod local;
}

/// Errors that can occur while signing or deriving an address.
#[derive(Debug, Error)]
pub enum AccountError {
	/// The signing operation itself failed.
	#[error("signing failed: {0}")]
	SigningFailed(String),
	/// The configured key material could not be parsed.
	#[error("invalid key: {0}")]
	InvalidKey(String),
	/// Configuration for the implementation was invalid.
	#[error("configuration error: {0}")]
	Configuration(String),
}

/// Trait implemented by every signer backend.
#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// Returns the configuration schema for this implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// The guardian address this signer signs on behalf of.
	fn address(&self) -> Address;

	/// Signs a 32-byte digest, returning a 65-byte recoverable secp256k1
	/// signature in the standard `(r, s, v)` layout (§6).
	async fn sign_digest(&self, digest: &[u8; 32]) -> Result<[u8; 65], AccountError>;
}

/// Factory function type for account implementations.
pub type AccountFactory = fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>;

/// Registry trait for account implementations.
pub trait AccountRegistry: ImplementationRegistry<Factory = AccountFactory> {}

/// All registered account implementations, keyed by config name.
pub fn get_all_implementations() -> Vec<(&'static str, AccountFactory)> {
	use implementations::local;

	vec![(local::Registry::NAME, local::Registry::factory())]
}

/// High-level signing service wrapping a pluggable [`AccountInterface`].
pub struct AccountService {
	implementation: Box<dyn AccountInterface>,
}

impl AccountService {
	/// Builds a directly-keyed account service without going through the
	/// factory registry. Convenient for tests and for constructing the
	/// node's own signing identity straight from `NodeConfig`.
	pub fn from_private_key(private_key: &SecretString) -> Result<Self, AccountError> {
		let implementation = implementations::local::LocalSigner::from_private_key(private_key)?;
		Ok(Self {
			implementation: Box::new(implementation),
		})
	}

	/// Wraps an already-constructed implementation, e.g. one produced by a
	/// registry factory.
	pub fn new(implementation: Box<dyn AccountInterface>) -> Self {
		Self { implementation }
	}

	/// This node's guardian address.
	pub fn address(&self) -> Address {
		self.implementation.address()
	}

	/// Signs a settlement digest with this node's key (§4.2 step 4).
	pub async fn sign_digest(&self, digest: &[u8; 32]) -> Result<[u8; 65], AccountError> {
		self.implementation.sign_digest(digest).await
	}
}
