//! The relayer service: owns every chain's Worker/Watcher/Matcher plus the
//! shared Database and Peer Bus, and drives the three loops per chain
//! (§4.1).
//!
//! Mirrors the original `RelayerSrv`: construction takes already-built
//! per-chain fixtures (the binary is responsible for dispatching each
//! chain's `implementation` string through `relayer_chain::build_worker`
//! and `relayer_watcher::build_watcher` — chain-specific construction is
//! out of core scope, §1), and `start`/`stop` are the entire public
//! surface the embedding binary needs (§6 "the core is embedded; it
//! exposes only Start/Stop").

use std::sync::Arc;
use std::time::Duration;

use relayer_account::AccountService;
use relayer_chain::Worker;
use relayer_match::MatchingAlgorithm;
use relayer_peer::PeerBus;
use relayer_storage::Database;
use relayer_types::Address;
use relayer_watcher::Watcher;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::LoopError;
use crate::loops::{match_loop, retry_loop, status_loop};

/// One chain's fully-constructed fixtures, wired up once at startup. The
/// guardian set and threshold are fetched once here rather than refreshed
/// per tick, mirroring the original service's one-time startup fetch.
pub struct ChainHandle {
	pub chain_name: String,
	pub worker: Arc<dyn Worker>,
	pub watcher: Arc<dyn Watcher>,
	pub matcher: Arc<dyn MatchingAlgorithm>,
	pub guardian_set: Vec<Address>,
	pub threshold: u64,
	pub match_period: Duration,
	pub retry_period: Duration,
	pub status_period: Duration,
	pub status_grace: Duration,
}

/// The coordination engine: every configured chain's three loops plus the
/// shared Database and Peer Bus they depend on (§4.1).
pub struct RelayerService {
	db: Arc<dyn Database>,
	peer_bus: Arc<dyn PeerBus>,
	account: Arc<AccountService>,
	max_fail_allowed: i64,
	consensus_timeout: Duration,
	chains: Vec<ChainHandle>,
	cancel: CancellationToken,
	tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RelayerService {
	/// Builds a service ready to run every configured chain's loops.
	/// Nothing is spawned until [`RelayerService::start`] is called.
	pub fn new(
		db: Arc<dyn Database>,
		peer_bus: Arc<dyn PeerBus>,
		account: Arc<AccountService>,
		max_fail_allowed: i64,
		consensus_timeout: Duration,
		chains: Vec<ChainHandle>,
	) -> Self {
		Self {
			db,
			peer_bus,
			account,
			max_fail_allowed,
			consensus_timeout,
			chains,
			cancel: CancellationToken::new(),
			tasks: Mutex::new(Vec::new()),
		}
	}

	/// Launches the match, retry and status-updater loops for every
	/// configured chain (§4.1). Calling `start` again while already
	/// running is a no-op — the service is idempotent to start.
	pub async fn start(&self) -> Result<(), LoopError> {
		let mut tasks = self.tasks.lock().await;
		if !tasks.is_empty() {
			return Ok(());
		}

		for chain in &self.chains {
			let match_ctx = match_loop::MatchLoopContext {
				chain_name: chain.chain_name.clone(),
				worker: chain.worker.clone(),
				matcher: chain.matcher.clone(),
				db: self.db.clone(),
				peer_bus: self.peer_bus.clone(),
				account: self.account.clone(),
				guardian_set: chain.guardian_set.clone(),
				threshold: chain.threshold,
				period: chain.match_period,
				consensus_timeout: self.consensus_timeout,
			};
			tasks.push(tokio::spawn(match_loop::run(match_ctx, self.cancel.clone())));

			let retry_ctx = retry_loop::RetryLoopContext {
				chain_name: chain.chain_name.clone(),
				worker: chain.worker.clone(),
				db: self.db.clone(),
				period: chain.retry_period,
				max_fail_allowed: self.max_fail_allowed,
			};
			tasks.push(tokio::spawn(retry_loop::run(retry_ctx, self.cancel.clone())));

			let status_ctx = status_loop::StatusLoopContext {
				chain_name: chain.chain_name.clone(),
				watcher: chain.watcher.clone(),
				db: self.db.clone(),
				period: chain.status_period,
				grace: chain.status_grace,
			};
			tasks.push(tokio::spawn(status_loop::run(status_ctx, self.cancel.clone())));

			tracing::info!(chain = %chain.chain_name, "chain loops started");
		}

		Ok(())
	}

	/// Signals every loop to stop and waits up to `grace` for all of them
	/// to exit (§4.1 "every loop must exit within a bounded grace period,
	/// suggested 30s"). Loops that haven't exited by then are abandoned;
	/// their tasks are detached rather than forcibly killed, since tokio
	/// offers no hard-kill primitive for a spawned task.
	pub async fn stop(&self, grace: Duration) {
		self.cancel.cancel();

		let mut tasks = self.tasks.lock().await;
		let handles = std::mem::take(&mut *tasks);
		if tokio::time::timeout(grace, futures::future::join_all(handles)).await.is_err() {
			tracing::warn!("relayer service did not shut down within its grace period");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use relayer_chain::{GnosisTransaction, OrderValidationInfo, WorkerError};
	use relayer_match::implementations::strategies::simple::{SimpleMatchConfig, SimpleMatcher};
	use relayer_peer::implementations::direct::DirectPeerBus;
	use relayer_storage::{implementations::memory::MemoryStorage, RelayerDatabase, StorageService};
	use relayer_types::{ConfigSchema, GuardianSignature, Order, SecretString, TransactionStatus, ValidationError};
	use relayer_watcher::WatcherError;

	struct IdleWorker;

	#[async_trait]
	impl Worker for IdleWorker {
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
			unimplemented!()
		}
		async fn order_validation(&self, _order: &Order) -> Result<OrderValidationInfo, WorkerError> {
			unimplemented!()
		}
		async fn submit(
			&self,
			_tx: &GnosisTransaction,
			_order_ids: &[String],
			_signatures: &[GuardianSignature],
		) -> Result<String, WorkerError> {
			unimplemented!()
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

	struct IdleWatcher;

	#[async_trait]
	impl Watcher for IdleWatcher {
		fn chain_name(&self) -> &str {
			"ethereum"
		}
		async fn transaction_status(&self, _tx_hash: &str) -> Result<TransactionStatus, WatcherError> {
			Ok(TransactionStatus::NotFound)
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

	fn build_service() -> RelayerService {
		let db: Arc<dyn Database> = Arc::new(RelayerDatabase::new(StorageService::new(Box::new(MemoryStorage::new()))));
		let peer_bus: Arc<dyn PeerBus> = Arc::new(DirectPeerBus::new(16));
		let key = SecretString::from("0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff8");
		let account = Arc::new(AccountService::from_private_key(&key).unwrap());
		let matcher: Arc<dyn MatchingAlgorithm> = Arc::new(SimpleMatcher::new(SimpleMatchConfig { max_fail_allowed: 3 }));

		let chain = ChainHandle {
			chain_name: "ethereum".into(),
			worker: Arc::new(IdleWorker),
			watcher: Arc::new(IdleWatcher),
			matcher,
			guardian_set: vec![account.address()],
			threshold: 1,
			match_period: Duration::from_millis(20),
			retry_period: Duration::from_millis(20),
			status_period: Duration::from_millis(20),
			status_grace: Duration::from_secs(60),
		};

		RelayerService::new(db, peer_bus, account, 3, Duration::from_millis(50), vec![chain])
	}

	#[tokio::test]
	async fn start_is_idempotent() {
		let service = build_service();
		service.start().await.unwrap();
		service.start().await.unwrap();
		assert_eq!(service.tasks.lock().await.len(), 3);
		service.stop(Duration::from_secs(1)).await;
	}

	#[tokio::test]
	async fn stop_brings_down_every_loop_within_its_grace_period() {
		let service = build_service();
		service.start().await.unwrap();
		service.stop(Duration::from_secs(2)).await;
		assert!(service.tasks.lock().await.is_empty());
	}
}
