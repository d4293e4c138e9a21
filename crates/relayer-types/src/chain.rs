//! Chain-scoped primitives shared by workers, watchers and the peer bus.

pub use alloy_primitives::Address;

/// A chain's string tag, e.g. `"ethereum"` or `"polygon"` (§3).
pub type ChainName = String;

/// The canonical hash of a proposed settlement transaction (§6): the object
/// guardians sign and the peer bus routes signature shares by.
pub type Digest = [u8; 32];

/// A guardian's recoverable secp256k1 signature over a [`Digest`], 65 bytes
/// `(r, s, v)` in the standard Ethereum layout.
pub type SignatureBytes = [u8; 65];
