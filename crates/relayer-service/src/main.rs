//! Entry point for the relayer process.
//!
//! This binary is the only place chain-specific construction happens: it
//! reads `Config`, dispatches each chain's `implementation` string through
//! the `relayer-chain`/`relayer-watcher` registries, wires a shared
//! `Database` and `PeerBus`, and hands the lot to `RelayerService`. The
//! service itself knows nothing about TOML, RPC URLs, or registries — it
//! only drives the loops (§4.1, §6 "the core is embedded; it exposes only
//! Start/Stop").

use anyhow::{bail, Context};
use clap::Parser;
use relayer_account::AccountService;
use relayer_config::{ChainWorkerConfig, Config};
use relayer_core::{ChainHandle, RelayerService};
use relayer_match::implementations::strategies::simple::{SimpleMatchConfig, SimpleMatcher};
use relayer_storage::{Database, RelayerDatabase, StorageService};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// The grace period every loop gets to exit once shutdown begins (§4.1
/// "every loop must exit within a bounded grace period, suggested 30s").
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Command-line arguments for the relayer process.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file.
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error).
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();
	init_tracing(&args.log_level);

	tracing::info!("starting relayer");

	let config_path = args.config.to_str().context("config path is not valid UTF-8")?;
	let config = Config::from_file(config_path).context("failed to load configuration")?;

	let service = build_service(&config).await.context("failed to build relayer service")?;

	service.start().await.context("failed to start relayer service")?;
	tracing::info!("relayer running; awaiting shutdown signal");

	wait_for_shutdown_signal().await;

	tracing::info!("shutdown signal received, stopping relayer");
	service.stop(SHUTDOWN_GRACE).await;
	tracing::info!("relayer stopped");

	Ok(())
}

fn init_tracing(log_level: &str) {
	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

	fmt().with_env_filter(env_filter).with_thread_ids(true).with_target(true).init();
}

/// Waits for either Ctrl+C or, on Unix, SIGTERM.
async fn wait_for_shutdown_signal() {
	#[cfg(unix)]
	{
		let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
			.expect("failed to install SIGTERM handler");
		tokio::select! {
			_ = tokio::signal::ctrl_c() => {},
			_ = terminate.recv() => {},
		}
	}
	#[cfg(not(unix))]
	{
		let _ = tokio::signal::ctrl_c().await;
	}
}

/// Builds every startup-time fixture and wires them into a [`RelayerService`]
/// (§7 class 6: any failure here is fatal and aborts the process before any
/// loop starts, matching `relayer-srv.go`'s `logger.Panicf` calls on DB
/// connect and owner-fetch failure).
async fn build_service(config: &Config) -> anyhow::Result<RelayerService> {
	let storage = build_storage(config)?;
	let db: Arc<dyn Database> = Arc::new(RelayerDatabase::new(storage));

	let account = Arc::new(
		AccountService::from_private_key(&config.node.private_key).context("failed to load node signing key")?,
	);

	let peer_bus = relayer_peer::build_peer_bus(&config.peer_bus.implementation, &config.peer_bus.config)
		.context("failed to build peer bus")?
		.into();

	// Matching economics are out of core scope (§1); the one concrete
	// strategy shares the same `max_fail_allowed` cutoff the retry loop
	// uses, so a single config value governs both (invariant 3).
	let matcher: Arc<dyn relayer_match::MatchingAlgorithm> =
		Arc::new(SimpleMatcher::new(SimpleMatchConfig { max_fail_allowed: config.matching.max_fail_allowed }));

	let mut chains = Vec::with_capacity(config.chains.len());
	for (chain_name, chain_config) in &config.chains {
		chains.push(build_chain_handle(chain_name, chain_config, &config.node.private_key, matcher.clone()).await?);
	}

	Ok(RelayerService::new(
		db,
		peer_bus,
		account,
		config.matching.max_fail_allowed,
		Duration::from_secs(config.peer_bus.consensus_timeout_seconds),
		chains,
	))
}

async fn build_chain_handle(
	chain_name: &str,
	chain_config: &ChainWorkerConfig,
	gas_payer_key: &relayer_types::SecretString,
	matcher: Arc<dyn relayer_match::MatchingAlgorithm>,
) -> anyhow::Result<ChainHandle> {
	let worker: Arc<dyn relayer_chain::Worker> = relayer_chain::build_worker(
		&chain_config.implementation,
		chain_name.to_string(),
		&chain_config.config,
		gas_payer_key,
	)
	.with_context(|| format!("failed to build worker for chain '{chain_name}'"))?
	.into();

	let watcher: Arc<dyn relayer_watcher::Watcher> =
		relayer_watcher::build_watcher(&chain_config.implementation, chain_name.to_string(), &chain_config.config)
			.with_context(|| format!("failed to build watcher for chain '{chain_name}'"))?
			.into();

	let guardian_set = worker
		.get_gnosis_owners()
		.await
		.with_context(|| format!("failed to fetch guardian set for chain '{chain_name}'"))?;
	if guardian_set.is_empty() {
		bail!("chain '{chain_name}' reported an empty guardian set");
	}
	let threshold = worker
		.get_threshold()
		.await
		.with_context(|| format!("failed to fetch signature threshold for chain '{chain_name}'"))?;

	Ok(ChainHandle {
		chain_name: chain_name.to_string(),
		worker,
		watcher,
		matcher,
		guardian_set,
		threshold,
		match_period: Duration::from_secs(chain_config.match_period_seconds),
		retry_period: Duration::from_secs(chain_config.retry_period_seconds),
		status_period: Duration::from_secs(chain_config.status_period_seconds),
		status_grace: Duration::from_secs(chain_config.status_grace_seconds),
	})
}

fn build_storage(config: &Config) -> anyhow::Result<StorageService> {
	let backend_config = config
		.storage
		.implementations
		.get(&config.storage.primary)
		.with_context(|| format!("primary storage '{}' has no configuration", config.storage.primary))?;

	let backend = relayer_storage::get_all_implementations()
		.into_iter()
		.find(|(name, _)| *name == config.storage.primary)
		.with_context(|| format!("unknown storage implementation: {}", config.storage.primary))?
		.1(backend_config)
		.with_context(|| format!("failed to build storage backend '{}'", config.storage.primary))?;

	Ok(StorageService::new(backend))
}
