//! Local secp256k1 signer implementation.
//!
//! Keeps a node's private key in memory (wrapped in [`SecretString`]) and
//! signs settlement digests directly, mirroring the teacher's
//! `solver-account` local-key implementation but narrowed to the single
//! digest-signing operation the core needs.

use crate::{AccountError, AccountInterface};
use alloy_primitives::B256;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use relayer_types::{Address, ConfigSchema, ImplementationRegistry, SecretString, Schema, ValidationError};
use serde::{Deserialize, Serialize};

/// Signer backed by an in-memory secp256k1 private key.
pub struct LocalSigner {
	inner: PrivateKeySigner,
}

impl LocalSigner {
	/// Parses a `0x`-prefixed (or bare) hex private key and builds a signer.
	pub fn from_private_key(private_key: &SecretString) -> Result<Self, AccountError> {
		let inner = private_key.with_exposed(|raw| -> Result<PrivateKeySigner, AccountError> {
			let trimmed = raw.strip_prefix("0x").unwrap_or(raw);
			let bytes = hex::decode(trimmed).map_err(|e| AccountError::InvalidKey(e.to_string()))?;
			PrivateKeySigner::from_slice(&bytes).map_err(|e| AccountError::InvalidKey(e.to_string()))
		})?;
		Ok(Self { inner })
	}
}

#[async_trait]
impl AccountInterface for LocalSigner {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LocalSignerSchema)
	}

	fn address(&self) -> Address {
		self.inner.address()
	}

	async fn sign_digest(&self, digest: &[u8; 32]) -> Result<[u8; 65], AccountError> {
		let signature = self
			.inner
			.sign_hash(&B256::from(*digest))
			.await
			.map_err(|e| AccountError::SigningFailed(e.to_string()))?;
		Ok(signature.as_bytes())
	}
}

/// Configuration accepted by the `local` account implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalSignerConfig {
	/// `0x`-prefixed secp256k1 private key.
	pub private_key: SecretString,
}

/// Configuration schema for [`LocalSigner`].
pub struct LocalSignerSchema;

impl ConfigSchema for LocalSignerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![relayer_types::Field::new("private_key", relayer_types::FieldType::String)],
			vec![],
		);
		schema.validate(config)
	}
}

/// Factory function constructing a [`LocalSigner`] from TOML configuration.
pub fn create_account(config: &toml::Value) -> Result<Box<dyn AccountInterface>, AccountError> {
	LocalSignerSchema.validate(config).map_err(|e| AccountError::Configuration(e.to_string()))?;
	let parsed: LocalSignerConfig = config
		.clone()
		.try_into()
		.map_err(|e| AccountError::Configuration(format!("invalid local signer config: {e}")))?;
	Ok(Box::new(LocalSigner::from_private_key(&parsed.private_key)?))
}

/// Registry for the `local` account implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = crate::AccountFactory;

	fn factory() -> Self::Factory {
		create_account
	}
}

impl crate::AccountRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff8";

	#[tokio::test]
	async fn signs_and_recovers_to_the_same_address() {
		let signer = LocalSigner::from_private_key(&SecretString::from(TEST_KEY)).unwrap();
		let digest = [7u8; 32];
		let sig_bytes = signer.sign_digest(&digest).await.unwrap();

		let signature = alloy_primitives::Signature::try_from(sig_bytes.as_slice()).unwrap();
		let recovered = signature.recover_address_from_prehash(&B256::from(digest)).unwrap();
		assert_eq!(recovered, signer.address());
	}

	#[test]
	fn rejects_malformed_key() {
		let result = LocalSigner::from_private_key(&SecretString::from("not-hex"));
		assert!(result.is_err());
	}
}
