//! Signature collection over the Peer Bus (§4.2 step 5, §9 "Consensus
//! collection").
//!
//! A [`SignatureAggregator`] is short-lived: bound to one digest for one
//! match-loop tick, it dedupes incoming gossip by recovered guardian
//! address, rejects anything that doesn't recover cleanly or isn't in the
//! Worker-provided guardian set, and completes as soon as either the
//! threshold is met or the deadline passes.

use std::collections::HashMap;
use std::time::Duration;

use relayer_peer::{recover_guardian, PeerBus};
use relayer_types::{Address, Digest, GuardianSignature};

use crate::error::LoopError;

/// Collects guardian signatures over `digest` until `threshold` distinct,
/// verified guardians have signed or `timeout` elapses.
///
/// `local` is always accepted first regardless of gossip traffic; the
/// node's own signature is never in doubt. `guardian_set` is the
/// authoritative membership list for this round (§6 "membership in the
/// chain's guardian set is checked by the caller").
pub async fn collect(
	peer_bus: &dyn PeerBus,
	chain: &str,
	digest: Digest,
	local: GuardianSignature,
	guardian_set: &[Address],
	threshold: u64,
	timeout: Duration,
) -> Result<Vec<GuardianSignature>, LoopError> {
	let mut collected: HashMap<Address, GuardianSignature> = HashMap::new();

	if guardian_set.contains(&local.guardian) {
		collected.insert(local.guardian, local);
	}

	if collected.len() as u64 >= threshold {
		return Ok(collected.into_values().collect());
	}

	let mut receiver = peer_bus.subscribe();
	let deadline = tokio::time::Instant::now() + timeout;

	loop {
		let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
		if remaining.is_zero() {
			break;
		}

		match tokio::time::timeout(remaining, receiver.recv()).await {
			Ok(Some(message)) => {
				if message.chain != chain || message.digest != digest {
					// Gossip for a different round; not an error, just noise.
					continue;
				}
				let recovered = match recover_guardian(&message.digest, &message.signature) {
					Ok(addr) => addr,
					Err(_) => continue, // malformed signature: silently dropped
				};
				if recovered != message.guardian {
					// Claimed guardian doesn't match the recovered signer; reject.
					continue;
				}
				if !guardian_set.contains(&recovered) {
					continue; // not a member of this chain's guardian set
				}
				collected.entry(recovered).or_insert(GuardianSignature {
					guardian: recovered,
					signature: message.signature,
				});
				if collected.len() as u64 >= threshold {
					break;
				}
			},
			Ok(None) => break, // bus shut down; nothing further will arrive
			Err(_) => break,   // deadline elapsed
		}
	}

	if collected.len() as u64 >= threshold {
		Ok(collected.into_values().collect())
	} else {
		Err(LoopError::Consensus(format!(
			"only {} of {threshold} required guardian signatures collected before the deadline",
			collected.len()
		)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use relayer_peer::{PeerBusError, PeerBusReceiver};
	use relayer_types::{ConfigSchema, GossipMessage};
	use tokio::sync::broadcast;

	struct FakeBus {
		sender: broadcast::Sender<GossipMessage>,
	}

	struct FakeReceiver {
		inner: broadcast::Receiver<GossipMessage>,
	}

	#[async_trait]
	impl PeerBusReceiver for FakeReceiver {
		async fn recv(&mut self) -> Option<GossipMessage> {
			self.inner.recv().await.ok()
		}
	}

	#[async_trait]
	impl PeerBus for FakeBus {
		async fn broadcast(&self, message: GossipMessage) -> Result<(), PeerBusError> {
			let _ = self.sender.send(message);
			Ok(())
		}

		fn subscribe(&self) -> Box<dyn PeerBusReceiver> {
			Box::new(FakeReceiver { inner: self.sender.subscribe() })
		}

		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			unimplemented!("not exercised by these tests")
		}
	}

	fn local_signature() -> (GuardianSignature, relayer_types::Address) {
		let guardian = relayer_types::Address::from([1u8; 20]);
		(GuardianSignature { guardian, signature: [1u8; 65] }, guardian)
	}

	#[tokio::test]
	async fn local_signature_alone_can_meet_a_threshold_of_one() {
		let bus = FakeBus { sender: broadcast::channel(16).0 };
		let (local, guardian) = local_signature();
		let result = collect(&bus, "ethereum", [0u8; 32], local, &[guardian], 1, Duration::from_millis(50))
			.await
			.unwrap();
		assert_eq!(result.len(), 1);
	}

	#[tokio::test]
	async fn unknown_guardian_is_rejected_even_with_valid_signature() {
		use alloy_signer::Signer as _;
		use alloy_signer_local::PrivateKeySigner;

		let bus = FakeBus { sender: broadcast::channel(16).0 };
		let (local, local_guardian) = local_signature();
		let digest = [7u8; 32];

		let outsider = PrivateKeySigner::random();
		let sig = outsider.sign_hash(&alloy_primitives::B256::from(digest)).await.unwrap();
		bus.broadcast(GossipMessage {
			chain: "ethereum".into(),
			digest,
			guardian: outsider.address(),
			signature: sig.as_bytes(),
		})
		.await
		.unwrap();

		let result = collect(
			&bus,
			"ethereum",
			digest,
			local,
			&[local_guardian], // outsider is not in the guardian set
			2,
			Duration::from_millis(100),
		)
		.await;
		assert!(result.is_err());
	}

	#[tokio::test]
	async fn duplicate_votes_from_the_same_guardian_do_not_double_count() {
		use alloy_signer::Signer as _;
		use alloy_signer_local::PrivateKeySigner;

		let bus = FakeBus { sender: broadcast::channel(16).0 };
		let (local, local_guardian) = local_signature();
		let digest = [3u8; 32];

		let peer = PrivateKeySigner::random();
		let sig = peer.sign_hash(&alloy_primitives::B256::from(digest)).await.unwrap();
		let gossip = GossipMessage {
			chain: "ethereum".into(),
			digest,
			guardian: peer.address(),
			signature: sig.as_bytes(),
		};
		bus.broadcast(gossip.clone()).await.unwrap();
		bus.broadcast(gossip).await.unwrap();

		let result = collect(
			&bus,
			"ethereum",
			digest,
			local,
			&[local_guardian, peer.address()],
			3, // can never be met: only 2 distinct guardians ever vote
			Duration::from_millis(100),
		)
		.await;
		assert!(result.is_err());
	}
}
