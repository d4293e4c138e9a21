//! Simple greedy pairing strategy.
//!
//! Mirrors the teacher's `solver-order::implementations::strategies` shape
//! (a pluggable strategy behind a config-driven factory) but re-targeted at
//! §4.2 step 2's `(A[], B[])` pairing contract: given the pool of orders
//! currently claimed (`MatchedInit`), split it by opposing `side` and pair
//! them off in FIFO order up to `max_fail_allowed`. Real economics (price,
//! size, counterparty constraints) are a matching-algorithm concern outside
//! core scope (§1); this implementation only needs to produce a structurally
//! valid pairing so the core's loops have something to carry through
//! consensus and submission.

use crate::{MatchError, MatchingAlgorithm, Pairing};
use async_trait::async_trait;
use relayer_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Order, Schema, ValidationError};
use serde::{Deserialize, Serialize};

/// Configuration for the `simple` matching algorithm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleMatchConfig {
	/// Orders whose `fail_count` is at or above this value are excluded
	/// from pairing, mirroring the retry loop's `max_fail_allowed` cutoff
	/// (invariant 3) so the matcher never re-proposes an order the retry
	/// loop is about to block.
	#[serde(default = "default_max_fail_allowed")]
	pub max_fail_allowed: i64,
}

fn default_max_fail_allowed() -> i64 {
	3
}

/// Greedy same-chain pairing by opposing `side`.
pub struct SimpleMatcher {
	config: SimpleMatchConfig,
}

impl SimpleMatcher {
	pub fn new(config: SimpleMatchConfig) -> Self {
		Self { config }
	}

	fn side(order: &Order) -> Option<&str> {
		order.data.get("side").and_then(|v| v.as_str())
	}
}

#[async_trait]
impl MatchingAlgorithm for SimpleMatcher {
	async fn pair(&self, pool: &[Order]) -> Result<Pairing, MatchError> {
		let mut buys = Vec::new();
		let mut sells = Vec::new();
		for order in pool {
			if order.fail_count >= self.config.max_fail_allowed {
				continue;
			}
			match Self::side(order) {
				Some("buy") => buys.push(order.clone()),
				Some("sell") => sells.push(order.clone()),
				Some(other) => {
					return Err(MatchError::MalformedPayload(format!(
						"order {} has unknown side '{other}'",
						order.id
					)))
				},
				None => {
					return Err(MatchError::MalformedPayload(format!(
						"order {} payload missing 'side'",
						order.id
					)))
				},
			}
		}

		let n = buys.len().min(sells.len());
		Ok(Pairing {
			a: buys.into_iter().take(n).collect(),
			b: sells.into_iter().take(n).collect(),
		})
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(SimpleMatchSchema)
	}
}

/// Configuration schema for [`SimpleMatcher`].
pub struct SimpleMatchSchema;

impl ConfigSchema for SimpleMatchSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new(
				"max_fail_allowed",
				FieldType::Integer { min: Some(0), max: None },
			)],
		);
		schema.validate(config)
	}
}

/// Builds a [`SimpleMatcher`] from raw TOML configuration.
pub fn create_matcher(config: &toml::Value) -> Result<Box<dyn MatchingAlgorithm>, MatchError> {
	SimpleMatchSchema.validate(config).map_err(|e| MatchError::Configuration(e.to_string()))?;
	let parsed: SimpleMatchConfig = config
		.clone()
		.try_into()
		.map_err(|e| MatchError::Configuration(format!("invalid simple matcher config: {e}")))?;
	Ok(Box::new(SimpleMatcher::new(parsed)))
}

/// Registry for the `simple` matching algorithm implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "simple";
	type Factory = crate::MatchFactory;

	fn factory() -> Self::Factory {
		create_matcher
	}
}

impl crate::MatchRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn order(id: &str, side: &str, fail_count: i64) -> Order {
		let mut order = Order::new(id, "ethereum", json!({"side": side}));
		order.fail_count = fail_count;
		order
	}

	#[tokio::test]
	async fn pairs_equal_counts_of_opposing_sides() {
		let matcher = SimpleMatcher::new(SimpleMatchConfig { max_fail_allowed: 3 });
		let pool = vec![order("b1", "buy", 0), order("s1", "sell", 0), order("s2", "sell", 0)];
		let pairing = matcher.pair(&pool).await.unwrap();
		assert_eq!(pairing.a.len(), 1);
		assert_eq!(pairing.b.len(), 1);
		assert_eq!(pairing.a[0].id, "b1");
		assert_eq!(pairing.b[0].id, "s1");
	}

	#[tokio::test]
	async fn empty_when_only_one_side_present() {
		let matcher = SimpleMatcher::new(SimpleMatchConfig { max_fail_allowed: 3 });
		let pool = vec![order("b1", "buy", 0)];
		let pairing = matcher.pair(&pool).await.unwrap();
		assert!(pairing.is_empty());
	}

	#[tokio::test]
	async fn excludes_orders_at_or_above_max_fail_allowed() {
		let matcher = SimpleMatcher::new(SimpleMatchConfig { max_fail_allowed: 2 });
		let pool = vec![order("b1", "buy", 2), order("s1", "sell", 0)];
		let pairing = matcher.pair(&pool).await.unwrap();
		assert!(pairing.is_empty());
	}

	#[tokio::test]
	async fn rejects_malformed_side() {
		let matcher = SimpleMatcher::new(SimpleMatchConfig { max_fail_allowed: 3 });
		let pool = vec![order("x1", "long", 0)];
		assert!(matcher.pair(&pool).await.is_err());
	}
}
