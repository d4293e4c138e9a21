//! Match-and-propose loop (§4.2).
//!
//! Grounded on the original `MatchAndSendToP2P` loop: claim zero-status
//! orders, pair them, build the settlement payload, collect guardian
//! signatures, submit. Unlike that original, any error in build, sign, or
//! submit ends the tick immediately with the involved orders moved to
//! `SentFailed` — it never falls through to submission after a failed
//! build or sign (§9, the bug fix this rewrite is required to make).

use std::sync::Arc;
use std::time::Duration;

use relayer_account::AccountService;
use relayer_chain::Worker;
use relayer_match::MatchingAlgorithm;
use relayer_peer::PeerBus;
use relayer_storage::Database;
use relayer_types::{Address, GossipMessage, GuardianSignature, MatchedStatus, Order};
use tokio_util::sync::CancellationToken;

use crate::consensus;
use crate::error::LoopError;
use crate::state::order::{transition, OrderEvent};

use super::sleep_or_cancel;

/// Everything one chain's match loop needs, wired up once at service
/// startup (§4.1).
pub struct MatchLoopContext {
	pub chain_name: String,
	pub worker: Arc<dyn Worker>,
	pub matcher: Arc<dyn MatchingAlgorithm>,
	pub db: Arc<dyn Database>,
	pub peer_bus: Arc<dyn PeerBus>,
	pub account: Arc<AccountService>,
	/// This chain's guardian set, as fetched once at startup (§7 class 6:
	/// a startup-time fetch, not refreshed per tick).
	pub guardian_set: Vec<Address>,
	/// This chain's signature threshold, as fetched once at startup.
	pub threshold: u64,
	pub period: Duration,
	pub consensus_timeout: Duration,
}

/// Runs the match loop until `cancel` fires.
pub async fn run(ctx: MatchLoopContext, cancel: CancellationToken) {
	while !cancel.is_cancelled() {
		if let Err(err) = tick(&ctx).await {
			tracing::warn!(chain = %ctx.chain_name, error = %err, "match loop tick failed");
			if err.is_fatal() {
				tracing::error!(chain = %ctx.chain_name, "match loop exiting: state corruption");
				return;
			}
		}
		if sleep_or_cancel(ctx.period, &cancel).await {
			break;
		}
	}
}

async fn tick(ctx: &MatchLoopContext) -> Result<(), LoopError> {
	// Step 1: claim. Orders still in `Init` become eligible for pairing.
	let fresh = ctx.db.get_zero_orders(&ctx.chain_name).await?;
	if !fresh.is_empty() {
		ctx.db.update_batch_order_status(&fresh, MatchedStatus::MatchedInit).await?;
	}

	// Step 2: pair. The pool includes orders claimed on earlier ticks that
	// didn't find a counterparty yet (§4.2 edge cases).
	let pool = ctx.db.get_orders_on_status(&ctx.chain_name, &[MatchedStatus::MatchedInit]).await?;
	let pairing = ctx.matcher.pair(&pool).await?;
	if pairing.is_empty() {
		return Ok(());
	}

	let involved: Vec<Order> = pairing.a.iter().chain(pairing.b.iter()).cloned().collect();

	// Steps 3-4: build the settlement payload and sign it locally. Any
	// failure here fails the whole tick for every involved order, and
	// never reaches submission (§9 bug fix).
	let built = build_and_sign(ctx, &pairing).await;
	let (tx, digest, local_sig) = match built {
		Ok(v) => v,
		Err(err) => {
			fail_involved(ctx, &involved).await?;
			return Err(err);
		},
	};

	// Step 5: broadcast our vote and collect a quorum.
	let local = GuardianSignature { guardian: ctx.account.address(), signature: local_sig };
	let gossip = GossipMessage {
		chain: ctx.chain_name.clone(),
		digest,
		guardian: local.guardian,
		signature: local.signature,
	};
	if let Err(err) = ctx.peer_bus.broadcast(gossip).await {
		fail_involved(ctx, &involved).await?;
		return Err(err.into());
	}

	let signatures = match consensus::collect(
		ctx.peer_bus.as_ref(),
		&ctx.chain_name,
		digest,
		local,
		&ctx.guardian_set,
		ctx.threshold,
		ctx.consensus_timeout,
	)
	.await
	{
		Ok(sigs) => sigs,
		Err(err) => {
			fail_involved(ctx, &involved).await?;
			return Err(err);
		},
	};

	// Step 6: submit.
	let order_ids: Vec<String> = involved.iter().map(|o| o.id.clone()).collect();
	let tx_hash = match ctx.worker.submit(&tx, &order_ids, &signatures).await {
		Ok(hash) => hash,
		Err(err) => {
			fail_involved(ctx, &involved).await?;
			return Err(err.into());
		},
	};

	let log = relayer_types::TransactionLog::new(ctx.chain_name.clone(), tx_hash, tx.safe_nonce, order_ids);
	ctx.db.create_transaction_log(log).await?;
	let next = transition(MatchedStatus::MatchedInit, OrderEvent::SettlementBroadcast)?;
	ctx.db.update_batch_order_status(&involved, next).await?;

	Ok(())
}

async fn build_and_sign(
	ctx: &MatchLoopContext,
	pairing: &relayer_match::Pairing,
) -> Result<(relayer_chain::GnosisTransaction, [u8; 32], [u8; 65]), LoopError> {
	let (tx, digest) = ctx.worker.create_gnosis_tx_and_hash(&pairing.a, &pairing.b).await?;
	let local_sig = ctx.account.sign_digest(&digest).await?;
	Ok((tx, digest, local_sig))
}

async fn fail_involved(ctx: &MatchLoopContext, involved: &[Order]) -> Result<(), LoopError> {
	let next = transition(MatchedStatus::MatchedInit, OrderEvent::SettlementAttemptFailed)?;
	ctx.db.update_batch_order_status(involved, next).await?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use relayer_account::AccountService;
	use relayer_chain::{GnosisTransaction, OrderValidationInfo, WorkerError};
	use relayer_match::implementations::strategies::simple::{SimpleMatchConfig, SimpleMatcher};
	use relayer_peer::implementations::direct::DirectPeerBus;
	use relayer_storage::{implementations::memory::MemoryStorage, Database, RelayerDatabase, StorageService};
	use relayer_types::{ConfigSchema, SecretString, ValidationError};
	use serde_json::json;

	struct FakeWorker {
		chain_name: String,
		owner: Address,
		fail_build: bool,
	}

	#[async_trait]
	impl Worker for FakeWorker {
		fn chain_name(&self) -> &str {
			&self.chain_name
		}

		fn threshold(&self) -> u64 {
			1
		}

		fn get_chain_id(&self) -> u64 {
			1
		}

		async fn get_gnosis_owners(&self) -> Result<Vec<Address>, WorkerError> {
			Ok(vec![self.owner])
		}

		async fn get_threshold(&self) -> Result<u64, WorkerError> {
			Ok(1)
		}

		async fn create_gnosis_tx_and_hash(
			&self,
			_a: &[Order],
			_b: &[Order],
		) -> Result<(GnosisTransaction, [u8; 32]), WorkerError> {
			if self.fail_build {
				return Err(WorkerError::BuildFailed("boom".into()));
			}
			Ok((
				GnosisTransaction { to: self.owner, data: vec![], safe_nonce: 1 },
				[9u8; 32],
			))
		}

		async fn order_validation(&self, _order: &Order) -> Result<OrderValidationInfo, WorkerError> {
			Ok(OrderValidationInfo { detail: "ok".into() })
		}

		async fn submit(
			&self,
			_tx: &GnosisTransaction,
			_order_ids: &[String],
			_signatures: &[GuardianSignature],
		) -> Result<String, WorkerError> {
			Ok("0xabc".into())
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

	async fn seed_order(db: &RelayerDatabase, id: &str, side: &str) {
		let order = Order::new(id, "ethereum", json!({"side": side}));
		db.insert_order(order).await.unwrap();
	}

	fn account() -> Arc<AccountService> {
		let key = SecretString::from("0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff8");
		Arc::new(AccountService::from_private_key(&key).unwrap())
	}

	#[tokio::test]
	async fn a_successful_tick_pairs_builds_and_settles() {
		let db = Arc::new(RelayerDatabase::new(StorageService::new(Box::new(MemoryStorage::new()))));
		seed_order(&db, "buy-1", "buy").await;
		seed_order(&db, "sell-1", "sell").await;

		let account = account();
		let worker: Arc<dyn Worker> =
			Arc::new(FakeWorker { chain_name: "ethereum".into(), owner: account.address(), fail_build: false });
		let matcher: Arc<dyn MatchingAlgorithm> =
			Arc::new(SimpleMatcher::new(SimpleMatchConfig { max_fail_allowed: 3 }));
		let peer_bus: Arc<dyn PeerBus> = Arc::new(DirectPeerBus::new(16));

		let ctx = MatchLoopContext {
			chain_name: "ethereum".into(),
			worker,
			matcher,
			db: db.clone() as Arc<dyn Database>,
			peer_bus,
			account: account.clone(),
			guardian_set: vec![account.address()],
			threshold: 1,
			period: Duration::from_secs(30),
			consensus_timeout: Duration::from_millis(200),
		};

		tick(&ctx).await.unwrap();

		let pending = db.get_orders_on_status("ethereum", &[MatchedStatus::SentPending]).await.unwrap();
		assert_eq!(pending.len(), 2);
		let logs = db.get_txns_on_status(&[relayer_types::TransactionStatus::Pending], "ethereum").await.unwrap();
		assert_eq!(logs.len(), 1);
		assert_eq!(logs[0].order_ids.len(), 2);
	}

	#[tokio::test]
	async fn a_build_failure_moves_the_pair_to_sent_failed_without_submitting() {
		let db = Arc::new(RelayerDatabase::new(StorageService::new(Box::new(MemoryStorage::new()))));
		seed_order(&db, "buy-1", "buy").await;
		seed_order(&db, "sell-1", "sell").await;

		let account = account();
		let worker: Arc<dyn Worker> =
			Arc::new(FakeWorker { chain_name: "ethereum".into(), owner: account.address(), fail_build: true });
		let matcher: Arc<dyn MatchingAlgorithm> =
			Arc::new(SimpleMatcher::new(SimpleMatchConfig { max_fail_allowed: 3 }));
		let peer_bus: Arc<dyn PeerBus> = Arc::new(DirectPeerBus::new(16));

		let ctx = MatchLoopContext {
			chain_name: "ethereum".into(),
			worker,
			matcher,
			db: db.clone() as Arc<dyn Database>,
			peer_bus,
			account: account.clone(),
			guardian_set: vec![account.address()],
			threshold: 1,
			period: Duration::from_secs(30),
			consensus_timeout: Duration::from_millis(200),
		};

		let err = tick(&ctx).await.unwrap_err();
		assert!(matches!(err, LoopError::Submit(_)));

		let failed = db.get_orders_on_status("ethereum", &[MatchedStatus::SentFailed]).await.unwrap();
		assert_eq!(failed.len(), 2);
		let logs = db.get_txns_on_status(&[relayer_types::TransactionStatus::Pending], "ethereum").await.unwrap();
		assert!(logs.is_empty());
	}
}
