//! Typed `Database` contract over the two persisted tables (§4.5).
//!
//! Built on top of [`crate::StorageService`] the same way the teacher layers
//! its typed service over a byte-oriented backend: this module owns no
//! storage of its own, it only knows how to shape `orders` and
//! `transaction_logs` queries against whatever [`crate::StorageInterface`]
//! was configured.

use crate::{QueryFilter, StorageError, StorageIndexes, StorageService};
use async_trait::async_trait;
use relayer_types::{MatchedStatus, Order, StorageKey, TransactionLog, TransactionStatus};
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors that can occur while querying or mutating the order/transaction
/// tables.
#[derive(Debug, Error)]
pub enum DatabaseError {
	/// The requested order or transaction log does not exist.
	#[error("not found: {0}")]
	NotFound(String),
	/// The underlying storage backend failed.
	#[error("storage error: {0}")]
	Storage(#[from] StorageError),
}

/// The nine operations the core's three loops depend on (§4.5).
///
/// All mutating operations are safe under concurrent callers on distinct
/// rows; the core never requires cross-row transactions except
/// [`Database::update_batch_order_status`].
#[async_trait]
pub trait Database: Send + Sync {
	/// Orders in [`MatchedStatus::Init`] for `chain`.
	async fn get_zero_orders(&self, chain: &str) -> Result<Vec<Order>, DatabaseError>;

	/// Orders in any of `statuses` for `chain`.
	async fn get_orders_on_status(
		&self,
		chain: &str,
		statuses: &[MatchedStatus],
	) -> Result<Vec<Order>, DatabaseError>;

	/// Atomically transitions every listed order to `new_status`.
	async fn update_batch_order_status(
		&self,
		orders: &[Order],
		new_status: MatchedStatus,
	) -> Result<(), DatabaseError>;

	/// Transitions a single order by id, incrementing `fail_count` when
	/// `new_status` denotes a failure terminal ([`MatchedStatus::Blocked`]).
	async fn update_order_status_and_fail_count(
		&self,
		order_id: &str,
		new_status: MatchedStatus,
	) -> Result<Order, DatabaseError>;

	/// Looks up a single order by id.
	async fn find_order(&self, order_id: &str) -> Result<Order, DatabaseError>;

	/// Transaction logs in any of `statuses` for `chain`.
	async fn get_txns_on_status(
		&self,
		statuses: &[TransactionStatus],
		chain: &str,
	) -> Result<Vec<TransactionLog>, DatabaseError>;

	/// Transitions a transaction log to `new_status`.
	async fn update_txn_status(
		&self,
		log: &TransactionLog,
		new_status: TransactionStatus,
	) -> Result<TransactionLog, DatabaseError>;

	/// Persists a freshly-broadcast transaction log, stamping `id` (the
	/// greatest existing id for the chain, plus one) and `created_at`
	/// (invariant 4).
	async fn create_transaction_log(&self, log: TransactionLog) -> Result<TransactionLog, DatabaseError>;

	/// Returns the transaction log with the greatest `id` for `chain`, if
	/// any exists (invariant 4).
	async fn find_latest_txn_log(&self, chain: &str) -> Result<Option<TransactionLog>, DatabaseError>;

	/// Persists a brand-new order. Not part of the core's own contract
	/// (order ingestion is out of core scope, §1) but required by any
	/// in-process test or single-node deployment to seed the `orders`
	/// table at all.
	async fn insert_order(&self, order: Order) -> Result<(), DatabaseError>;
}

/// [`Database`] implementation over a pluggable [`StorageService`].
pub struct RelayerDatabase {
	storage: StorageService,
	/// Serializes transaction-log id assignment so two concurrent
	/// `create_transaction_log` calls for the same chain never collide
	/// (invariant 4: `id` is monotonic per chain).
	id_lock: Mutex<()>,
}

impl RelayerDatabase {
	/// Wraps a [`StorageService`] with the typed order/transaction-log API.
	pub fn new(storage: StorageService) -> Self {
		Self {
			storage,
			id_lock: Mutex::new(()),
		}
	}

	fn order_indexes(order: &Order) -> StorageIndexes {
		StorageIndexes::new()
			.with_field("chain", &order.chain)
			.with_field("status", status_tag(order.status))
	}

	fn txn_indexes(log: &TransactionLog) -> StorageIndexes {
		StorageIndexes::new()
			.with_field("chain", &log.chain)
			.with_field("status", txn_status_tag(log.status))
	}

	async fn orders_for_chain(&self, chain: &str) -> Result<Vec<Order>, DatabaseError> {
		let items: Vec<(String, Order)> = self
			.storage
			.query(
				StorageKey::Orders.as_str(),
				QueryFilter::Equals("chain".into(), serde_json::json!(chain)),
			)
			.await?;
		Ok(items.into_iter().map(|(_, order)| order).collect())
	}

	async fn txns_for_chain(&self, chain: &str) -> Result<Vec<TransactionLog>, DatabaseError> {
		let items: Vec<(String, TransactionLog)> = self
			.storage
			.query(
				StorageKey::TransactionLogs.as_str(),
				QueryFilter::Equals("chain".into(), serde_json::json!(chain)),
			)
			.await?;
		Ok(items.into_iter().map(|(_, log)| log).collect())
	}
}

/// Stable string tag for indexing `MatchedStatus`, independent of its
/// `Debug` representation.
fn status_tag(status: MatchedStatus) -> &'static str {
	match status {
		MatchedStatus::Init => "init",
		MatchedStatus::MatchedInit => "matched_init",
		MatchedStatus::SentPending => "sent_pending",
		MatchedStatus::SentFailed => "sent_failed",
		MatchedStatus::FailedConfirmed => "failed_confirmed",
		MatchedStatus::Blocked => "blocked",
		MatchedStatus::FillComplete => "fill_complete",
	}
}

fn txn_status_tag(status: TransactionStatus) -> &'static str {
	match status {
		TransactionStatus::Pending => "pending",
		TransactionStatus::Success => "success",
		TransactionStatus::Failed => "failed",
		TransactionStatus::NotFound => "not_found",
		TransactionStatus::FailedConfirmed => "failed_confirmed",
		TransactionStatus::Lost => "lost",
	}
}

#[async_trait]
impl Database for RelayerDatabase {
	async fn get_zero_orders(&self, chain: &str) -> Result<Vec<Order>, DatabaseError> {
		Ok(self
			.orders_for_chain(chain)
			.await?
			.into_iter()
			.filter(|o| o.status == MatchedStatus::Init)
			.collect())
	}

	async fn get_orders_on_status(
		&self,
		chain: &str,
		statuses: &[MatchedStatus],
	) -> Result<Vec<Order>, DatabaseError> {
		Ok(self
			.orders_for_chain(chain)
			.await?
			.into_iter()
			.filter(|o| statuses.contains(&o.status))
			.collect())
	}

	async fn update_batch_order_status(
		&self,
		orders: &[Order],
		new_status: MatchedStatus,
	) -> Result<(), DatabaseError> {
		for order in orders {
			let mut updated = order.clone();
			updated.status = new_status;
			updated.updated_at = relayer_types::current_timestamp();
			self.storage
				.update(
					StorageKey::Orders.as_str(),
					&updated.id,
					&updated,
					Some(Self::order_indexes(&updated)),
				)
				.await?;
		}
		Ok(())
	}

	async fn update_order_status_and_fail_count(
		&self,
		order_id: &str,
		new_status: MatchedStatus,
	) -> Result<Order, DatabaseError> {
		let mut order = self.find_order(order_id).await?;
		order.status = new_status;
		if new_status == MatchedStatus::Blocked {
			order.fail_count += 1;
		}
		order.updated_at = relayer_types::current_timestamp();
		self.storage
			.update(
				StorageKey::Orders.as_str(),
				&order.id,
				&order,
				Some(Self::order_indexes(&order)),
			)
			.await?;
		Ok(order)
	}

	async fn find_order(&self, order_id: &str) -> Result<Order, DatabaseError> {
		self.storage
			.retrieve(StorageKey::Orders.as_str(), order_id)
			.await
			.map_err(|e| match e {
				StorageError::NotFound => DatabaseError::NotFound(format!("order {order_id}")),
				other => DatabaseError::Storage(other),
			})
	}

	async fn get_txns_on_status(
		&self,
		statuses: &[TransactionStatus],
		chain: &str,
	) -> Result<Vec<TransactionLog>, DatabaseError> {
		Ok(self
			.txns_for_chain(chain)
			.await?
			.into_iter()
			.filter(|t| statuses.contains(&t.status))
			.collect())
	}

	async fn update_txn_status(
		&self,
		log: &TransactionLog,
		new_status: TransactionStatus,
	) -> Result<TransactionLog, DatabaseError> {
		let mut updated = log.clone();
		updated.status = new_status;
		self.storage
			.update(
				StorageKey::TransactionLogs.as_str(),
				&updated.id.to_string(),
				&updated,
				Some(Self::txn_indexes(&updated)),
			)
			.await?;
		Ok(updated)
	}

	async fn create_transaction_log(&self, mut log: TransactionLog) -> Result<TransactionLog, DatabaseError> {
		let _guard = self.id_lock.lock().await;
		let next_id = self
			.find_latest_txn_log(&log.chain)
			.await?
			.map(|latest| latest.id + 1)
			.unwrap_or(1);
		log.id = next_id;
		log.created_at = relayer_types::current_timestamp();
		self.storage
			.store(
				StorageKey::TransactionLogs.as_str(),
				&log.id.to_string(),
				&log,
				Some(Self::txn_indexes(&log)),
			)
			.await?;
		Ok(log)
	}

	async fn find_latest_txn_log(&self, chain: &str) -> Result<Option<TransactionLog>, DatabaseError> {
		Ok(self
			.txns_for_chain(chain)
			.await?
			.into_iter()
			.max_by_key(|log| log.id))
	}

	async fn insert_order(&self, order: Order) -> Result<(), DatabaseError> {
		self.storage
			.store(
				StorageKey::Orders.as_str(),
				&order.id,
				&order,
				Some(Self::order_indexes(&order)),
			)
			.await?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::memory::MemoryStorage;
	use crate::StorageService;
	use serde_json::json;

	fn db() -> RelayerDatabase {
		RelayerDatabase::new(StorageService::new(Box::new(MemoryStorage::new())))
	}

	#[tokio::test]
	async fn zero_orders_are_scoped_to_chain_and_status() {
		let db = db();
		db.insert_order(Order::new("o1", "ethereum", json!({})))
			.await
			.unwrap();
		db.insert_order(Order::new("o2", "polygon", json!({})))
			.await
			.unwrap();

		let zero = db.get_zero_orders("ethereum").await.unwrap();
		assert_eq!(zero.len(), 1);
		assert_eq!(zero[0].id, "o1");
	}

	#[tokio::test]
	async fn batch_status_update_is_atomic_over_the_set() {
		let db = db();
		db.insert_order(Order::new("o1", "ethereum", json!({})))
			.await
			.unwrap();
		db.insert_order(Order::new("o2", "ethereum", json!({})))
			.await
			.unwrap();
		let orders = db.get_zero_orders("ethereum").await.unwrap();

		db.update_batch_order_status(&orders, MatchedStatus::MatchedInit)
			.await
			.unwrap();

		assert!(db.get_zero_orders("ethereum").await.unwrap().is_empty());
		let matched = db
			.get_orders_on_status("ethereum", &[MatchedStatus::MatchedInit])
			.await
			.unwrap();
		assert_eq!(matched.len(), 2);
	}

	#[tokio::test]
	async fn blocked_transition_increments_fail_count() {
		let db = db();
		db.insert_order(Order::new("o1", "ethereum", json!({})))
			.await
			.unwrap();

		let updated = db
			.update_order_status_and_fail_count("o1", MatchedStatus::Blocked)
			.await
			.unwrap();
		assert_eq!(updated.fail_count, 1);
		assert_eq!(updated.status, MatchedStatus::Blocked);

		let reconfirmed = db
			.update_order_status_and_fail_count("o1", MatchedStatus::FailedConfirmed)
			.await
			.unwrap();
		assert_eq!(reconfirmed.fail_count, 1, "non-failure transitions must not bump fail_count");
	}

	#[tokio::test]
	async fn transaction_log_ids_are_monotonic_per_chain() {
		let db = db();
		let log_a = db
			.create_transaction_log(TransactionLog::new("ethereum", "0xaaa", 1, vec!["o1".into()]))
			.await
			.unwrap();
		let log_b = db
			.create_transaction_log(TransactionLog::new("ethereum", "0xbbb", 2, vec!["o2".into()]))
			.await
			.unwrap();
		assert_eq!(log_a.id, 1);
		assert_eq!(log_b.id, 2);

		let latest = db.find_latest_txn_log("ethereum").await.unwrap().unwrap();
		assert_eq!(latest.id, 2);
	}

	#[tokio::test]
	async fn find_order_reports_not_found() {
		let db = db();
		let err = db.find_order("missing").await.unwrap_err();
		assert!(matches!(err, DatabaseError::NotFound(_)));
	}
}
