//! Error taxonomy for the core's loops (§7).
//!
//! Every fallible operation a loop performs collapses into one of these
//! five classes. The first four are recoverable: a loop logs the error and
//! tries again on its next tick. [`LoopError::Corruption`] is not — it
//! means an invariant the state machine depends on no longer holds, and
//! the loop that observed it exits rather than keep operating on data it
//! can't trust. Startup-class errors (§7 class 6) are not part of this
//! enum; they surface as plain `Result` from the binary's construction
//! code and abort the process before any loop starts.

use thiserror::Error;

/// An error surfaced by one tick of a core loop.
#[derive(Debug, Error)]
pub enum LoopError {
	/// A database, RPC, or peer-bus call failed in a way that's likely to
	/// succeed if retried (§7 class 1).
	#[error("transient error: {0}")]
	Transient(String),
	/// An order failed validation against current chain/market state (§7
	/// class 2).
	#[error("validation error: {0}")]
	Validation(String),
	/// A consensus round did not collect enough guardian signatures before
	/// its deadline (§7 class 3).
	#[error("consensus error: {0}")]
	Consensus(String),
	/// The chain rejected a submitted transaction outright (§7 class 4).
	#[error("submit error: {0}")]
	Submit(String),
	/// An invariant the state machine relies on no longer holds (§7 class
	/// 5). Fatal for the loop that observed it.
	#[error("state corruption: {0}")]
	Corruption(String),
}

impl LoopError {
	/// Corruption is the only class a loop can't recover from by retrying.
	pub fn is_fatal(&self) -> bool {
		matches!(self, LoopError::Corruption(_))
	}
}

impl From<relayer_storage::DatabaseError> for LoopError {
	fn from(err: relayer_storage::DatabaseError) -> Self {
		match err {
			relayer_storage::DatabaseError::NotFound(msg) => {
				LoopError::Corruption(format!("referenced record missing: {msg}"))
			},
			relayer_storage::DatabaseError::Storage(inner) => LoopError::Transient(inner.to_string()),
		}
	}
}

impl From<relayer_chain::WorkerError> for LoopError {
	fn from(err: relayer_chain::WorkerError) -> Self {
		use relayer_chain::WorkerError::*;
		match err {
			Rpc(msg) => LoopError::Transient(msg),
			Validation(msg) => LoopError::Validation(msg),
			BuildFailed(msg) => LoopError::Submit(msg),
			SubmitRejected(msg) => LoopError::Submit(msg),
			Configuration(msg) => LoopError::Corruption(msg),
		}
	}
}

impl From<relayer_watcher::WatcherError> for LoopError {
	fn from(err: relayer_watcher::WatcherError) -> Self {
		use relayer_watcher::WatcherError::*;
		match err {
			Rpc(msg) => LoopError::Transient(msg),
			InvalidHash(msg) => LoopError::Corruption(msg),
			Configuration(msg) => LoopError::Corruption(msg),
		}
	}
}

impl From<relayer_match::MatchError> for LoopError {
	fn from(err: relayer_match::MatchError) -> Self {
		match err {
			relayer_match::MatchError::MalformedPayload(msg) => LoopError::Validation(msg),
			relayer_match::MatchError::Configuration(msg) => LoopError::Corruption(msg),
		}
	}
}

impl From<relayer_peer::PeerBusError> for LoopError {
	fn from(err: relayer_peer::PeerBusError) -> Self {
		match err {
			relayer_peer::PeerBusError::SendFailed(msg) => LoopError::Transient(msg),
			relayer_peer::PeerBusError::InvalidSignature(msg) => LoopError::Consensus(msg),
			relayer_peer::PeerBusError::Configuration(msg) => LoopError::Corruption(msg),
		}
	}
}

impl From<relayer_account::AccountError> for LoopError {
	fn from(err: relayer_account::AccountError) -> Self {
		match err {
			relayer_account::AccountError::SigningFailed(msg) => LoopError::Submit(msg),
			relayer_account::AccountError::InvalidKey(msg) => LoopError::Corruption(msg),
			relayer_account::AccountError::Configuration(msg) => LoopError::Corruption(msg),
		}
	}
}

impl From<crate::state::TransitionError> for LoopError {
	fn from(err: crate::state::TransitionError) -> Self {
		LoopError::Corruption(err.to_string())
	}
}
