//! Direct, in-process peer bus implementation.
//!
//! Mirrors the teacher's `solver-settlement::implementations::direct` shape:
//! a same-process stand-in for a transport the core treats as external and
//! out of scope (§1 "the P2P gossip transport itself"). Every broadcast
//! fans out to every subscriber over a `tokio::sync::broadcast` channel;
//! sufficient to drive the core end-to-end in tests and single-node runs
//! where the actual gossip network is supplied separately.

use crate::{PeerBus, PeerBusError, PeerBusReceiver};
use async_trait::async_trait;
use relayer_types::{ConfigSchema, GossipMessage, ImplementationRegistry, Schema, ValidationError};
use tokio::sync::broadcast;

/// Default channel capacity: generous enough that a slow subscriber during
/// one consensus round doesn't lag behind and miss messages for the next.
const DEFAULT_CAPACITY: usize = 256;

/// In-process broadcast bus. Every [`DirectPeerBus::subscribe`] call
/// returns an independent receiver backed by the same `tokio::broadcast`
/// channel, so a message broadcast once reaches every current subscriber.
pub struct DirectPeerBus {
	sender: broadcast::Sender<GossipMessage>,
}

impl DirectPeerBus {
	/// Builds a new bus with the given channel capacity.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}
}

impl Default for DirectPeerBus {
	fn default() -> Self {
		Self::new(DEFAULT_CAPACITY)
	}
}

#[async_trait]
impl PeerBus for DirectPeerBus {
	async fn broadcast(&self, message: GossipMessage) -> Result<(), PeerBusError> {
		// No active subscribers is not an error: a message broadcast before
		// any consensus round has started is simply dropped, the same as a
		// lossy network would drop it (§4.6 "the core treats the bus as
		// lossy").
		let _ = self.sender.send(message);
		Ok(())
	}

	fn subscribe(&self) -> Box<dyn PeerBusReceiver> {
		Box::new(DirectReceiver {
			inner: self.sender.subscribe(),
		})
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(DirectPeerBusSchema)
	}
}

/// Receiver half, wrapping `tokio::sync::broadcast::Receiver`.
struct DirectReceiver {
	inner: broadcast::Receiver<GossipMessage>,
}

#[async_trait]
impl PeerBusReceiver for DirectReceiver {
	async fn recv(&mut self) -> Option<GossipMessage> {
		loop {
			match self.inner.recv().await {
				Ok(message) => return Some(message),
				// A slow subscriber that missed messages just keeps going;
				// losing a duplicate guardian vote is harmless (§4.6
				// "duplicate suppression is by (digest, guardian)").
				Err(broadcast::error::RecvError::Lagged(_)) => continue,
				Err(broadcast::error::RecvError::Closed) => return None,
			}
		}
	}
}

/// Configuration for the `direct` peer bus implementation.
pub struct DirectPeerBusSchema;

impl ConfigSchema for DirectPeerBusSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![relayer_types::Field::new(
				"capacity",
				relayer_types::FieldType::Integer { min: Some(1), max: None },
			)],
		);
		schema.validate(config)
	}
}

/// Builds a [`DirectPeerBus`] from raw TOML configuration.
pub fn create_peer_bus(config: &toml::Value) -> Result<Box<dyn PeerBus>, PeerBusError> {
	DirectPeerBusSchema.validate(config).map_err(|e| PeerBusError::Configuration(e.to_string()))?;
	let capacity = config
		.get("capacity")
		.and_then(|v| v.as_integer())
		.map(|v| v as usize)
		.unwrap_or(DEFAULT_CAPACITY);
	Ok(Box::new(DirectPeerBus::new(capacity)))
}

/// Registry for the `direct` peer bus implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "direct";
	type Factory = crate::PeerBusFactory;

	fn factory() -> Self::Factory {
		create_peer_bus
	}
}

impl crate::PeerBusRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	fn message(guardian: [u8; 20]) -> GossipMessage {
		GossipMessage {
			chain: "ethereum".into(),
			digest: [1u8; 32],
			guardian: guardian.into(),
			signature: [0u8; 65],
		}
	}

	#[tokio::test]
	async fn broadcast_reaches_every_subscriber() {
		let bus = DirectPeerBus::new(16);
		let mut sub_a = bus.subscribe();
		let mut sub_b = bus.subscribe();

		bus.broadcast(message([1u8; 20])).await.unwrap();

		assert!(sub_a.recv().await.is_some());
		assert!(sub_b.recv().await.is_some());
	}

	#[tokio::test]
	async fn broadcast_with_no_subscribers_is_not_an_error() {
		let bus = DirectPeerBus::new(16);
		assert!(bus.broadcast(message([2u8; 20])).await.is_ok());
	}

	#[tokio::test]
	async fn subscribers_only_see_messages_sent_after_they_subscribed() {
		let bus = DirectPeerBus::new(16);
		bus.broadcast(message([3u8; 20])).await.unwrap();
		let mut late_subscriber = bus.subscribe();

		bus.broadcast(message([4u8; 20])).await.unwrap();
		let received = late_subscriber.recv().await.unwrap();
		assert_eq!(received.guardian, alloy_primitives::Address::from([4u8; 20]));
	}
}
