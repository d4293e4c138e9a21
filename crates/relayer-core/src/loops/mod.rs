//! The three per-chain control loops (§4.1, §4.2, §4.3, §4.4).
//!
//! Each loop is its own recovery boundary (§7: "errors never cross loop
//! boundaries"): a tick's error is logged and the loop sleeps for its
//! normal period before trying again, except [`crate::error::LoopError::Corruption`],
//! which ends the loop. `run` is cancellation-aware so
//! [`crate::service::RelayerService::stop`] can bring every loop down
//! within its grace period (§4.1).

pub mod match_loop;
pub mod retry_loop;
pub mod status_loop;

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sleeps for `duration`, or returns early (`true`) if cancellation fires
/// first.
pub(crate) async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
	tokio::select! {
		_ = tokio::time::sleep(duration) => false,
		_ = cancel.cancelled() => true,
	}
}
