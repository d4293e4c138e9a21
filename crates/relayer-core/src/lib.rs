//! The per-chain coordination engine: the three concurrent control loops
//! (match-and-propose, retry/reconciliation, status-updater), the order and
//! transaction state machines they drive, and the consensus step that
//! gates every settlement on a guardian quorum (§1, §4).
//!
//! Everything chain-specific (RPC, contract ABI, gas) lives behind the
//! [`relayer_chain::Worker`] and [`relayer_watcher::Watcher`] traits this
//! crate consumes; everything about *how* orders get paired lives behind
//! [`relayer_match::MatchingAlgorithm`]; everything about the gossip
//! transport lives behind [`relayer_peer::PeerBus`]. This crate only owns
//! the control flow that ties them together.

pub mod consensus;
pub mod error;
pub mod loops;
pub mod service;
pub mod state;

pub use error::LoopError;
pub use service::{ChainHandle, RelayerService};
