//! Storage-related types for the relayer.

/// Storage keys for the two persisted collections (§4.5, §6).
///
/// This enum provides type safety for storage operations by replacing
/// string literals with strongly typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Key for the `orders` collection.
	Orders,
	/// Key for the `transaction_logs` collection.
	TransactionLogs,
	/// Key for the per-chain monotonic transaction log id counter.
	TxnLogSequence,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::TransactionLogs => "transaction_logs",
			StorageKey::TxnLogSequence => "txn_log_sequence",
		}
	}

	/// All storage key variants, used to build per-key TTL configuration.
	pub fn all() -> &'static [StorageKey] {
		&[
			StorageKey::Orders,
			StorageKey::TransactionLogs,
			StorageKey::TxnLogSequence,
		]
	}
}

impl std::str::FromStr for StorageKey {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"orders" => Ok(StorageKey::Orders),
			"transaction_logs" => Ok(StorageKey::TransactionLogs),
			"txn_log_sequence" => Ok(StorageKey::TxnLogSequence),
			other => Err(format!("unknown storage key: {}", other)),
		}
	}
}
