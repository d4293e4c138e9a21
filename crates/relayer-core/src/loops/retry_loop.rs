//! Retry/reconciliation loop (§4.3).
//!
//! Grounded on the original `RetryMatching` loop: revalidate orders stuck
//! in `SentFailed` and reconcile transaction logs stuck in `Failed`. The
//! `NotFound` branch is deliberately left unimplemented (§9 open question:
//! the original's equivalent branch was commented-out dead code; no
//! `NotFound -> Lost` reconciliation exists yet).

use std::sync::Arc;
use std::time::Duration;

use relayer_chain::Worker;
use relayer_storage::Database;
use relayer_types::{MatchedStatus, Order, TransactionStatus};
use tokio_util::sync::CancellationToken;

use crate::error::LoopError;
use crate::state::order::{transition as order_transition, OrderEvent};
use crate::state::transaction::{transition as txn_transition, TxEvent};

use super::sleep_or_cancel;

/// Everything one chain's retry loop needs (§4.1).
pub struct RetryLoopContext {
	pub chain_name: String,
	pub worker: Arc<dyn Worker>,
	pub db: Arc<dyn Database>,
	pub period: Duration,
	/// Orders whose `FailCount` has reached this value are blocked instead
	/// of revalidated (invariant 3).
	pub max_fail_allowed: i64,
}

/// Runs the retry loop until `cancel` fires.
pub async fn run(ctx: RetryLoopContext, cancel: CancellationToken) {
	while !cancel.is_cancelled() {
		if let Err(err) = tick(&ctx).await {
			tracing::warn!(chain = %ctx.chain_name, error = %err, "retry loop tick failed");
			if err.is_fatal() {
				tracing::error!(chain = %ctx.chain_name, "retry loop exiting: state corruption");
				return;
			}
		}
		if sleep_or_cancel(ctx.period, &cancel).await {
			break;
		}
	}
}

async fn tick(ctx: &RetryLoopContext) -> Result<(), LoopError> {
	// A. Revalidate orders the match loop gave up on this tick.
	let failed_orders = ctx.db.get_orders_on_status(&ctx.chain_name, &[MatchedStatus::SentFailed]).await?;
	for order in &failed_orders {
		reconcile_order(ctx, order).await?;
	}

	// B. Reconcile transaction logs.
	let logs = ctx
		.db
		.get_txns_on_status(&[TransactionStatus::NotFound, TransactionStatus::Failed], &ctx.chain_name)
		.await?;
	for log in &logs {
		match log.status {
			TransactionStatus::Failed => {
				for order_id in &log.order_ids {
					let order = ctx.db.find_order(order_id).await?;
					reconcile_order(ctx, &order).await?;
				}
				let next = txn_transition(log.status, TxEvent::Reconciled)?;
				ctx.db.update_txn_status(log, next).await?;
			},
			TransactionStatus::NotFound => {
				// §9 open question: no reconciliation is implemented for a
				// log the chain never found past the status-updater's
				// grace period. It stays NotFound indefinitely.
				tracing::debug!(
					chain = %ctx.chain_name,
					log_id = log.id,
					"transaction log is NotFound; no reconciliation path is implemented"
				);
			},
			_ => {},
		}
	}

	Ok(())
}

async fn reconcile_order(ctx: &RetryLoopContext, order: &Order) -> Result<(), LoopError> {
	if order.fail_count >= ctx.max_fail_allowed {
		let next = order_transition(order.status, OrderEvent::FailCountExceeded)?;
		ctx.db.update_order_status_and_fail_count(&order.id, next).await?;
		return Ok(());
	}

	match ctx.worker.order_validation(order).await {
		Ok(_) => {
			let next = order_transition(order.status, OrderEvent::ValidationPassed)?;
			ctx.db.update_order_status_and_fail_count(&order.id, next).await?;
		},
		Err(_) => {
			let next = order_transition(order.status, OrderEvent::ValidationFailed)?;
			ctx.db.update_order_status_and_fail_count(&order.id, next).await?;
		},
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use relayer_chain::{GnosisTransaction, OrderValidationInfo, WorkerError};
	use relayer_storage::{implementations::memory::MemoryStorage, RelayerDatabase, StorageService};
	use relayer_types::{Address, ConfigSchema, GuardianSignature, TransactionLog, ValidationError};
	use serde_json::json;

	struct FakeWorker {
		valid: bool,
	}

	#[async_trait]
	impl Worker for FakeWorker {
		fn chain_name(&self) -> &str {
			"ethereum"
		}
		fn threshold(&self) -> u64 {
			1
		}
		fn get_chain_id(&self) -> u64 {
			1
		}
		async fn get_gnosis_owners(&self) -> Result<Vec<Address>, WorkerError> {
			Ok(vec![])
		}
		async fn get_threshold(&self) -> Result<u64, WorkerError> {
			Ok(1)
		}
		async fn create_gnosis_tx_and_hash(
			&self,
			_a: &[Order],
			_b: &[Order],
		) -> Result<(GnosisTransaction, [u8; 32]), WorkerError> {
			unimplemented!("not exercised by the retry loop")
		}
		async fn order_validation(&self, _order: &Order) -> Result<OrderValidationInfo, WorkerError> {
			if self.valid {
				Ok(OrderValidationInfo { detail: "still valid".into() })
			} else {
				Err(WorkerError::Validation("no longer valid".into()))
			}
		}
		async fn submit(
			&self,
			_tx: &GnosisTransaction,
			_order_ids: &[String],
			_signatures: &[GuardianSignature],
		) -> Result<String, WorkerError> {
			unimplemented!("not exercised by the retry loop")
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

	fn ctx(worker: Arc<dyn Worker>, db: Arc<dyn Database>) -> RetryLoopContext {
		RetryLoopContext {
			chain_name: "ethereum".into(),
			worker,
			db,
			period: Duration::from_secs(20),
			max_fail_allowed: 3,
		}
	}

	#[tokio::test]
	async fn a_valid_order_is_confirmed_as_failed_confirmed() {
		let db = Arc::new(RelayerDatabase::new(StorageService::new(Box::new(MemoryStorage::new()))));
		let mut order = Order::new("o1", "ethereum", json!({"side": "buy"}));
		order.status = MatchedStatus::SentFailed;
		db.insert_order(order).await.unwrap();

		let worker: Arc<dyn Worker> = Arc::new(FakeWorker { valid: true });
		tick(&ctx(worker, db.clone())).await.unwrap();

		let order = db.find_order("o1").await.unwrap();
		assert_eq!(order.status, MatchedStatus::FailedConfirmed);
	}

	#[tokio::test]
	async fn an_invalid_order_is_blocked() {
		let db = Arc::new(RelayerDatabase::new(StorageService::new(Box::new(MemoryStorage::new()))));
		let mut order = Order::new("o1", "ethereum", json!({"side": "buy"}));
		order.status = MatchedStatus::SentFailed;
		db.insert_order(order).await.unwrap();

		let worker: Arc<dyn Worker> = Arc::new(FakeWorker { valid: false });
		tick(&ctx(worker, db.clone())).await.unwrap();

		let order = db.find_order("o1").await.unwrap();
		assert_eq!(order.status, MatchedStatus::Blocked);
	}

	#[tokio::test]
	async fn fail_count_at_the_cap_blocks_without_revalidating() {
		let db = Arc::new(RelayerDatabase::new(StorageService::new(Box::new(MemoryStorage::new()))));
		let mut order = Order::new("o1", "ethereum", json!({"side": "buy"}));
		order.status = MatchedStatus::SentFailed;
		order.fail_count = 3;
		db.insert_order(order).await.unwrap();

		// This worker would panic if order_validation were called.
		let worker: Arc<dyn Worker> = Arc::new(FakeWorker { valid: true });
		tick(&ctx(worker, db.clone())).await.unwrap();

		let order = db.find_order("o1").await.unwrap();
		assert_eq!(order.status, MatchedStatus::Blocked);
	}

	#[tokio::test]
	async fn a_failed_transaction_log_reconciles_its_orders_and_itself() {
		let db = Arc::new(RelayerDatabase::new(StorageService::new(Box::new(MemoryStorage::new()))));
		let mut order = Order::new("o1", "ethereum", json!({"side": "buy"}));
		order.status = MatchedStatus::SentFailed;
		db.insert_order(order).await.unwrap();

		let mut log = TransactionLog::new("ethereum", "0xdead", 1, vec!["o1".into()]);
		log = db.create_transaction_log(log).await.unwrap();
		log.status = TransactionStatus::Failed;
		db.update_txn_status(&log, TransactionStatus::Failed).await.unwrap();

		let worker: Arc<dyn Worker> = Arc::new(FakeWorker { valid: true });
		tick(&ctx(worker, db.clone())).await.unwrap();

		let order = db.find_order("o1").await.unwrap();
		assert_eq!(order.status, MatchedStatus::FailedConfirmed);
		let logs = db.get_txns_on_status(&[TransactionStatus::FailedConfirmed], "ethereum").await.unwrap();
		assert_eq!(logs.len(), 1);
	}
}
