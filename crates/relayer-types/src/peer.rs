//! Peer bus gossip envelope (§4.6, §6).

use serde::{Deserialize, Serialize};

use crate::chain::{Address, ChainName, Digest, SignatureBytes};

/// A signed gossip message carrying one guardian's vote on a settlement
/// digest.
///
/// The core treats the bus as lossy but authenticated: `guardian` is
/// recoverable from `signature` over `digest` and must appear in the
/// Worker-provided guardian set for `chain`. Delivery order is not
/// guaranteed; duplicate suppression is by `(digest, guardian)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GossipMessage {
	/// The chain this settlement targets.
	pub chain: ChainName,
	/// The canonical hash of the proposed settlement transaction.
	pub digest: Digest,
	/// The signer's address, as claimed by the message (unverified until
	/// recovered from `signature`).
	pub guardian: Address,
	/// Secp256k1 recoverable signature over `digest`.
	pub signature: SignatureBytes,
}

/// A guardian signature that has passed recovery and guardian-set checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardianSignature {
	pub guardian: Address,
	pub signature: SignatureBytes,
}
