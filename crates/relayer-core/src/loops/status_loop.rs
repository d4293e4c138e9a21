//! Status-updater loop (§4.4).
//!
//! Grounded on the original `UpdateTx` loop: poll the Watcher for every
//! `Pending` transaction log on this chain and apply the observed outcome.
//! A log the chain doesn't know about yet is left alone until `grace` has
//! elapsed since it was created, since a transaction can legitimately take
//! a few blocks to be picked up by an RPC node (§4.4 edge case).

use std::sync::Arc;
use std::time::Duration;

use relayer_storage::Database;
use relayer_types::{current_timestamp, MatchedStatus, Order, TransactionStatus};
use relayer_watcher::Watcher;
use tokio_util::sync::CancellationToken;

use crate::error::LoopError;
use crate::state::order::{transition as order_transition, OrderEvent};
use crate::state::transaction::{transition as txn_transition, TxEvent};

use super::sleep_or_cancel;

/// Everything one chain's status-updater loop needs (§4.1).
pub struct StatusLoopContext {
	pub chain_name: String,
	pub watcher: Arc<dyn Watcher>,
	pub db: Arc<dyn Database>,
	pub period: Duration,
	/// How long a `Pending` log may go unseen by the chain before it's
	/// marked `NotFound` (§4.4).
	pub grace: Duration,
}

/// Runs the status-updater loop until `cancel` fires.
pub async fn run(ctx: StatusLoopContext, cancel: CancellationToken) {
	while !cancel.is_cancelled() {
		if let Err(err) = tick(&ctx).await {
			tracing::warn!(chain = %ctx.chain_name, error = %err, "status loop tick failed");
			if err.is_fatal() {
				tracing::error!(chain = %ctx.chain_name, "status loop exiting: state corruption");
				return;
			}
		}
		if sleep_or_cancel(ctx.period, &cancel).await {
			break;
		}
	}
}

async fn tick(ctx: &StatusLoopContext) -> Result<(), LoopError> {
	let pending = ctx.db.get_txns_on_status(&[TransactionStatus::Pending], &ctx.chain_name).await?;

	for log in &pending {
		let observed = ctx.watcher.transaction_status(&log.tx_hash).await?;

		match observed {
			TransactionStatus::Success => {
				let next = txn_transition(log.status, TxEvent::Mined)?;
				ctx.db.update_txn_status(log, next).await?;
				let orders = fetch_orders(ctx, &log.order_ids).await?;
				let next_order_status = order_transition(MatchedStatus::SentPending, OrderEvent::TxSucceeded)?;
				ctx.db.update_batch_order_status(&orders, next_order_status).await?;
			},
			TransactionStatus::Failed => {
				let next = txn_transition(log.status, TxEvent::Reverted)?;
				ctx.db.update_txn_status(log, next).await?;
				let orders = fetch_orders(ctx, &log.order_ids).await?;
				let next_order_status = order_transition(MatchedStatus::SentPending, OrderEvent::TxFailed)?;
				ctx.db.update_batch_order_status(&orders, next_order_status).await?;
			},
			TransactionStatus::NotFound => {
				let elapsed = current_timestamp().saturating_sub(log.created_at);
				if elapsed >= ctx.grace.as_secs() {
					let next = txn_transition(log.status, TxEvent::GraceExpired)?;
					ctx.db.update_txn_status(log, next).await?;
				}
			},
			// A Watcher never reports Pending, FailedConfirmed or Lost as
			// the *observed* outcome of a live poll; those are states the
			// core itself assigns.
			_ => {},
		}
	}

	Ok(())
}

async fn fetch_orders(ctx: &StatusLoopContext, order_ids: &[String]) -> Result<Vec<Order>, LoopError> {
	let mut orders = Vec::with_capacity(order_ids.len());
	for id in order_ids {
		orders.push(ctx.db.find_order(id).await?);
	}
	Ok(orders)
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use relayer_storage::{implementations::memory::MemoryStorage, RelayerDatabase, StorageService};
	use relayer_types::{Address, ConfigSchema, TransactionLog, ValidationError};
	use relayer_watcher::WatcherError;
	use serde_json::json;

	struct FakeWatcher {
		status: TransactionStatus,
	}

	#[async_trait]
	impl Watcher for FakeWatcher {
		fn chain_name(&self) -> &str {
			"ethereum"
		}
		async fn transaction_status(&self, _tx_hash: &str) -> Result<TransactionStatus, WatcherError> {
			Ok(self.status)
		}
		async fn owner_set_changed(&self, _known_owners: &[Address]) -> Result<Option<Vec<Address>>, WatcherError> {
			Ok(None)
		}
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			struct NoopSchema;
			impl ConfigSchema for NoopSchema {
				fn validate(&self, _config: &toml::Value) -> Result<(), ValidationError> {
					Ok(())
				}
			}
			Box::new(NoopSchema)
		}
	}

	async fn seed(db: &RelayerDatabase) -> TransactionLog {
		let mut order = Order::new("o1", "ethereum", json!({"side": "buy"}));
		order.status = MatchedStatus::SentPending;
		db.insert_order(order).await.unwrap();
		db.create_transaction_log(TransactionLog::new("ethereum", "0xabc", 1, vec!["o1".into()]))
			.await
			.unwrap()
	}

	fn ctx(watcher: Arc<dyn Watcher>, db: Arc<dyn Database>, grace: Duration) -> StatusLoopContext {
		StatusLoopContext { chain_name: "ethereum".into(), watcher, db, period: Duration::from_secs(15), grace }
	}

	#[tokio::test]
	async fn a_successful_mine_completes_both_the_log_and_its_orders() {
		let db = Arc::new(RelayerDatabase::new(StorageService::new(Box::new(MemoryStorage::new()))));
		seed(&db).await;
		let watcher: Arc<dyn Watcher> = Arc::new(FakeWatcher { status: TransactionStatus::Success });

		tick(&ctx(watcher, db.clone(), Duration::from_secs(60))).await.unwrap();

		let order = db.find_order("o1").await.unwrap();
		assert_eq!(order.status, MatchedStatus::FillComplete);
		let logs = db.get_txns_on_status(&[TransactionStatus::Success], "ethereum").await.unwrap();
		assert_eq!(logs.len(), 1);
	}

	#[tokio::test]
	async fn a_revert_marks_the_log_failed_and_its_orders_sent_failed() {
		let db = Arc::new(RelayerDatabase::new(StorageService::new(Box::new(MemoryStorage::new()))));
		seed(&db).await;
		let watcher: Arc<dyn Watcher> = Arc::new(FakeWatcher { status: TransactionStatus::Failed });

		tick(&ctx(watcher, db.clone(), Duration::from_secs(60))).await.unwrap();

		let order = db.find_order("o1").await.unwrap();
		assert_eq!(order.status, MatchedStatus::SentFailed);
	}

	#[tokio::test]
	async fn not_found_within_grace_leaves_the_log_pending() {
		let db = Arc::new(RelayerDatabase::new(StorageService::new(Box::new(MemoryStorage::new()))));
		seed(&db).await;
		let watcher: Arc<dyn Watcher> = Arc::new(FakeWatcher { status: TransactionStatus::NotFound });

		tick(&ctx(watcher, db.clone(), Duration::from_secs(3600))).await.unwrap();

		let logs = db.get_txns_on_status(&[TransactionStatus::Pending], "ethereum").await.unwrap();
		assert_eq!(logs.len(), 1);
	}

	#[tokio::test]
	async fn not_found_past_grace_marks_the_log_not_found() {
		let db = Arc::new(RelayerDatabase::new(StorageService::new(Box::new(MemoryStorage::new()))));
		seed(&db).await;
		let watcher: Arc<dyn Watcher> = Arc::new(FakeWatcher { status: TransactionStatus::NotFound });

		tick(&ctx(watcher, db.clone(), Duration::from_secs(0))).await.unwrap();

		let logs = db.get_txns_on_status(&[TransactionStatus::NotFound], "ethereum").await.unwrap();
		assert_eq!(logs.len(), 1);
	}
}
