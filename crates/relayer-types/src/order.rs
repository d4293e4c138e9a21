//! Order record and its `MatchedStatus` lifecycle (§3, §4.2).

use serde::{Deserialize, Serialize};

/// Status of an order as it moves through matching, consensus and settlement.
///
/// See the state machine table in §4.2: transitions are validated by
/// `relayer_core::state::order` rather than by this type itself, which is
/// kept a plain data enum so it can be freely stored and compared.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MatchedStatus {
	/// Freshly ingested, not yet claimed by the match loop.
	Init,
	/// Claimed by the match loop in step 1 of a tick; eligible for pairing.
	MatchedInit,
	/// A settlement transaction covering this order has been broadcast.
	SentPending,
	/// Build/sign/submit failed, or the covering transaction reverted.
	SentFailed,
	/// The retry loop revalidated a `SentFailed` order and it is still valid.
	FailedConfirmed,
	/// Permanently excluded from matching (failed validation, or `FailCount`
	/// exceeded `max_fail_allowed`).
	Blocked,
	/// The covering transaction was observed successful on-chain. Terminal.
	FillComplete,
}

impl MatchedStatus {
	/// Terminal statuses are never revisited by any loop (invariant 2).
	pub fn is_terminal(&self) -> bool {
		matches!(self, MatchedStatus::Blocked | MatchedStatus::FillComplete)
	}
}

/// Represents an intent to trade on a specific chain (§3).
///
/// Created by an external ingestion path in [`MatchedStatus::Init`]; mutated
/// only by the match, retry and status-updater loops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
	/// Opaque, globally unique identifier.
	pub id: String,
	/// The chain this order targets.
	pub chain: String,
	/// Current position in the `MatchedStatus` state machine.
	pub status: MatchedStatus,
	/// Monotonic count of failed settlement attempts (invariant 3).
	pub fail_count: i64,
	/// Opaque payload (price, size, side, counterparty constraints), used only
	/// by the external matching algorithm and by `Worker::order_validation`.
	pub data: serde_json::Value,
	/// Timestamp the order was ingested.
	pub created_at: u64,
	/// Timestamp of the last status transition.
	pub updated_at: u64,
}

impl Order {
	/// Builds a fresh order in [`MatchedStatus::Init`].
	pub fn new(id: impl Into<String>, chain: impl Into<String>, data: serde_json::Value) -> Self {
		let now = crate::utils::current_timestamp();
		Self {
			id: id.into(),
			chain: chain.into(),
			status: MatchedStatus::Init,
			fail_count: 0,
			data,
			created_at: now,
			updated_at: now,
		}
	}
}
