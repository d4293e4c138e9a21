//! Matching algorithm contract (§6 MatchingAlgorithm, pair discovery).
//!
//! The match loop hands the current pool of claimed orders to a
//! `MatchingAlgorithm` and gets back two parallel lists `A[]`, `B[]` such
//! that `A[i]` settles against `B[i]` (§4.2 step 2). Everything about the
//! economics of compatibility — price, size, counterparty constraints — is
//! out of core scope (§1) and lives entirely behind this trait.

use async_trait::async_trait;
use relayer_types::{ConfigSchema, ImplementationRegistry, Order};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod strategies {
		pub mod simple;
	}
}

/// Errors a matching algorithm can report.
#[derive(Debug, Error)]
pub enum MatchError {
	/// The order's opaque payload did not contain the fields this
	/// algorithm needs.
	#[error("malformed order payload: {0}")]
	MalformedPayload(String),
	/// Configuration for the implementation was invalid.
	#[error("configuration error: {0}")]
	Configuration(String),
}

/// A pair of parallel order lists produced by [`MatchingAlgorithm::pair`]:
/// `a[i]` settles against `b[i]`.
#[derive(Debug, Clone, Default)]
pub struct Pairing {
	pub a: Vec<Order>,
	pub b: Vec<Order>,
}

impl Pairing {
	/// True when neither side paired anything (§4.2 step 2: "if either list
	/// is empty, sleep and restart the cycle").
	pub fn is_empty(&self) -> bool {
		self.a.is_empty() || self.b.is_empty()
	}
}

/// External pairing strategy consumed by the match loop (§6).
#[async_trait]
pub trait MatchingAlgorithm: Send + Sync {
	/// Pairs compatible orders out of `pool`. Implementations are free to
	/// leave any subset of `pool` unpaired; unpaired orders remain in
	/// `MatchedInit` for the next tick (§4.2 edge cases).
	async fn pair(&self, pool: &[Order]) -> Result<Pairing, MatchError>;

	/// Returns the configuration schema for this implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Factory function type for matching algorithm implementations.
pub type MatchFactory = fn(&toml::Value) -> Result<Box<dyn MatchingAlgorithm>, MatchError>;

/// Registry trait for matching algorithm implementations.
pub trait MatchRegistry: ImplementationRegistry<Factory = MatchFactory> {}

/// All registered matching algorithm implementations, keyed by config name.
pub fn get_all_implementations() -> Vec<(&'static str, MatchFactory)> {
	use implementations::strategies::simple;

	vec![(simple::Registry::NAME, simple::Registry::factory())]
}
