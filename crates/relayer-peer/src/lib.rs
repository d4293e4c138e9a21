//! Peer Bus contract (§4.6): the cross-node consensus transport the match
//! loop uses to collect a quorum of guardian signatures over a settlement
//! digest.
//!
//! The core treats the bus as a lossy, authenticated duplex channel: a
//! receive stream of signed gossip messages and a send sink, with no
//! delivery-order guarantee. A guardian's address is recoverable from its
//! signature; membership in the chain's guardian set is checked by the
//! caller (`relayer_core::consensus`), not by the bus itself, since the
//! bus has no notion of which Worker/chain owns which guardian set.

use alloy_primitives::B256;
use async_trait::async_trait;
use relayer_types::{Address, ConfigSchema, Digest, GossipMessage, ImplementationRegistry, SignatureBytes};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod direct;
}

/// Errors the peer bus can report.
#[derive(Debug, Error)]
pub enum PeerBusError {
	/// The bus could not accept a message for broadcast (e.g. closed).
	#[error("broadcast failed: {0}")]
	SendFailed(String),
	/// A gossip message's signature did not recover to a valid address.
	#[error("invalid signature: {0}")]
	InvalidSignature(String),
	/// Configuration for the implementation was invalid.
	#[error("configuration error: {0}")]
	Configuration(String),
}

/// One half of the duplex channel: an inbound stream of gossip messages
/// from peers. Each [`PeerBus::subscribe`] call hands out an independent
/// receiver so multiple concurrent consensus rounds (one per chain) don't
/// steal each other's messages.
#[async_trait]
pub trait PeerBusReceiver: Send {
	/// Awaits the next inbound gossip message. Returns `None` once the bus
	/// has shut down and no further messages will arrive.
	async fn recv(&mut self) -> Option<GossipMessage>;
}

/// Cross-node gossip transport consumed by the match loop's consensus step
/// (§4.2 step 5, §6).
#[async_trait]
pub trait PeerBus: Send + Sync {
	/// Broadcasts a gossip message to every connected peer.
	async fn broadcast(&self, message: GossipMessage) -> Result<(), PeerBusError>;

	/// Subscribes to the inbound stream of gossip messages.
	fn subscribe(&self) -> Box<dyn PeerBusReceiver>;

	/// Returns the configuration schema for this implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Recovers the guardian address that produced `signature` over `digest`
/// (§6 "the signature is over the digest using the standard secp256k1
/// recoverable format").
pub fn recover_guardian(digest: &Digest, signature: &SignatureBytes) -> Result<Address, PeerBusError> {
	let sig = alloy_primitives::Signature::try_from(signature.as_slice())
		.map_err(|e| PeerBusError::InvalidSignature(e.to_string()))?;
	sig.recover_address_from_prehash(&B256::from(*digest))
		.map_err(|e| PeerBusError::InvalidSignature(e.to_string()))
}

/// Factory function type for peer bus implementations.
pub type PeerBusFactory = fn(&toml::Value) -> Result<Box<dyn PeerBus>, PeerBusError>;

/// Registry trait for peer bus implementations.
pub trait PeerBusRegistry: ImplementationRegistry<Factory = PeerBusFactory> {}

/// All registered peer bus implementations, keyed by config name.
pub fn get_all_implementations() -> Vec<(&'static str, PeerBusFactory)> {
	use implementations::direct;

	vec![(direct::Registry::NAME, direct::Registry::factory())]
}

/// Builds a [`PeerBus`] for `implementation` (e.g. `"direct"`), dispatching
/// to the matching implementation's factory.
pub fn build_peer_bus(implementation: &str, config: &toml::Value) -> Result<Box<dyn PeerBus>, PeerBusError> {
	get_all_implementations()
		.into_iter()
		.find(|(name, _)| *name == implementation)
		.ok_or_else(|| PeerBusError::Configuration(format!("unknown peer bus implementation: {implementation}")))
		.and_then(|(_, factory)| factory(config))
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_signer::Signer as _;
	use alloy_signer_local::PrivateKeySigner;

	#[tokio::test]
	async fn recover_guardian_matches_the_signer_address() {
		let signer = PrivateKeySigner::random();
		let digest: Digest = [9u8; 32];
		let signature = signer.sign_hash(&B256::from(digest)).await.unwrap();
		let recovered = recover_guardian(&digest, &signature.as_bytes()).unwrap();
		assert_eq!(recovered, signer.address());
	}

	#[test]
	fn recover_guardian_rejects_malformed_signature() {
		let digest: Digest = [1u8; 32];
		let bad = [0u8; 65];
		assert!(recover_guardian(&digest, &bad).is_err());
	}
}
