//! On-chain settlement attempt record and its `TransactionStatus` lifecycle
//! (§3, §4.4).

use serde::{Deserialize, Serialize};

/// Status of a settlement transaction as observed on-chain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TransactionStatus {
	/// Broadcast, outcome not yet known.
	Pending,
	/// Mined and succeeded. Terminal.
	Success,
	/// Mined and reverted.
	Failed,
	/// Not found by the chain past the status-updater's grace period.
	NotFound,
	/// The retry loop reconciled a `Failed` log. Terminal.
	FailedConfirmed,
	/// Reserved: a later nonce was confirmed to have superseded this one.
	/// See the open question in design note §9 — no loop currently produces
	/// this status. Terminal.
	Lost,
}

impl TransactionStatus {
	/// Terminal statuses are never revisited by any loop.
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			TransactionStatus::Success | TransactionStatus::FailedConfirmed | TransactionStatus::Lost
		)
	}
}

/// A record of an on-chain settlement attempt (§3).
///
/// Created when a Worker broadcasts a transaction; mutated by the
/// status-updater and retry loops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionLog {
	/// Monotonic id, scoped per chain (invariant 4).
	pub id: u64,
	/// The chain this settlement was submitted to.
	pub chain: String,
	/// Broadcast transaction hash.
	pub tx_hash: String,
	/// Transaction nonce used for broadcast.
	pub nonce: u64,
	/// Orders this settlement covers. Never empty, never mutated after
	/// creation (invariant 5).
	pub order_ids: Vec<String>,
	/// Current position in the `TransactionStatus` state machine.
	pub status: TransactionStatus,
	/// Unix seconds this record was created. Stamped by
	/// `Database::create_transaction_log`, not by the caller.
	pub created_at: u64,
}

impl TransactionLog {
	/// Builds a fresh, unpersisted log in [`TransactionStatus::Pending`].
	///
	/// `id` and `created_at` are assigned by the database contract on
	/// creation (§4.5); callers pass placeholders that get overwritten.
	pub fn new(chain: impl Into<String>, tx_hash: impl Into<String>, nonce: u64, order_ids: Vec<String>) -> Self {
		debug_assert!(!order_ids.is_empty(), "a transaction log must cover at least one order");
		Self {
			id: 0,
			chain: chain.into(),
			tx_hash: tx_hash.into(),
			nonce,
			order_ids,
			status: TransactionStatus::Pending,
			created_at: 0,
		}
	}
}
