//! In-memory storage backend for the relayer.
//!
//! Stores data in a `HashMap` guarded by a `RwLock`, with a secondary index
//! structure so `query()` can actually serve the Database Contract's typed
//! selection methods (§4.5) rather than returning nothing like a pure
//! key-value cache would. Useful for tests and single-process development;
//! it provides no persistence across restarts.

use crate::{QueryFilter, StorageError, StorageIndexes, StorageInterface};
use async_trait::async_trait;
use relayer_types::{ConfigSchema, Schema, ValidationError};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// `namespace -> field -> serialized value -> keys` index.
type Index = HashMap<String, HashMap<String, HashMap<String, HashSet<String>>>>;

/// In-memory storage implementation with working secondary indexes.
pub struct MemoryStorage {
	store: Arc<RwLock<HashMap<String, Vec<u8>>>>,
	index: Arc<RwLock<Index>>,
	/// Remembers which indexed fields were recorded for a key, so `delete`
	/// can remove the matching index entries.
	key_fields: Arc<RwLock<HashMap<String, StorageIndexes>>>,
}

impl MemoryStorage {
	/// Creates a new, empty `MemoryStorage`.
	pub fn new() -> Self {
		Self {
			store: Arc::new(RwLock::new(HashMap::new())),
			index: Arc::new(RwLock::new(HashMap::new())),
			key_fields: Arc::new(RwLock::new(HashMap::new())),
		}
	}

	fn namespace_of(key: &str) -> &str {
		key.split(':').next().unwrap_or(key)
	}

	async fn unindex(&self, key: &str) {
		let previous = self.key_fields.write().await.remove(key);
		let Some(previous) = previous else {
			return;
		};
		let namespace = Self::namespace_of(key).to_string();
		let mut index = self.index.write().await;
		if let Some(fields) = index.get_mut(&namespace) {
			for (field, value) in previous.fields {
				let serialized = value.to_string();
				if let Some(values) = fields.get_mut(&field) {
					if let Some(keys) = values.get_mut(&serialized) {
						keys.remove(key);
					}
				}
			}
		}
	}

	async fn reindex(&self, key: &str, indexes: StorageIndexes) {
		self.unindex(key).await;
		let namespace = Self::namespace_of(key).to_string();
		let mut index = self.index.write().await;
		let fields = index.entry(namespace).or_default();
		for (field, value) in &indexes.fields {
			fields
				.entry(field.clone())
				.or_default()
				.entry(value.to_string())
				.or_default()
				.insert(key.to_string());
		}
		self.key_fields
			.write()
			.await
			.insert(key.to_string(), indexes);
	}
}

impl Default for MemoryStorage {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let store = self.store.read().await;
		store.get(key).cloned().ok_or(StorageError::NotFound)
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		indexes: Option<StorageIndexes>,
		_ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		// TTL is not enforced by memory storage; every tick's caller is
		// expected to re-query fresh state rather than rely on expiry.
		if let Some(indexes) = indexes {
			self.reindex(key, indexes).await;
		}
		let mut store = self.store.write().await;
		store.insert(key.to_string(), value);
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		self.unindex(key).await;
		let mut store = self.store.write().await;
		store.remove(key);
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let store = self.store.read().await;
		Ok(store.contains_key(key))
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStorageSchema)
	}

	async fn query(
		&self,
		namespace: &str,
		filter: QueryFilter,
	) -> Result<Vec<String>, StorageError> {
		let index = self.index.read().await;
		let Some(fields) = index.get(namespace) else {
			return Ok(Vec::new());
		};

		match filter {
			QueryFilter::All => {
				let store = self.store.read().await;
				Ok(store
					.keys()
					.filter(|k| Self::namespace_of(k) == namespace)
					.cloned()
					.collect())
			}
			QueryFilter::Equals(field, value) => Ok(fields
				.get(&field)
				.and_then(|values| values.get(&value.to_string()))
				.map(|keys| keys.iter().cloned().collect())
				.unwrap_or_default()),
			QueryFilter::NotEquals(field, value) => {
				let target = value.to_string();
				let Some(values) = fields.get(&field) else {
					return Ok(Vec::new());
				};
				Ok(values
					.iter()
					.filter(|(v, _)| **v != target)
					.flat_map(|(_, keys)| keys.iter().cloned())
					.collect())
			}
			QueryFilter::In(field, values) => {
				let Some(indexed) = fields.get(&field) else {
					return Ok(Vec::new());
				};
				let targets: HashSet<String> = values.iter().map(|v| v.to_string()).collect();
				Ok(indexed
					.iter()
					.filter(|(v, _)| targets.contains(*v))
					.flat_map(|(_, keys)| keys.iter().cloned())
					.collect())
			}
			QueryFilter::NotIn(field, values) => {
				let Some(indexed) = fields.get(&field) else {
					return Ok(Vec::new());
				};
				let excluded: HashSet<String> = values.iter().map(|v| v.to_string()).collect();
				Ok(indexed
					.iter()
					.filter(|(v, _)| !excluded.contains(*v))
					.flat_map(|(_, keys)| keys.iter().cloned())
					.collect())
			}
		}
	}

	async fn get_batch(&self, keys: &[String]) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
		let store = self.store.read().await;
		let mut results = Vec::new();
		for key in keys {
			if let Some(value) = store.get(key) {
				results.push((key.clone(), value.clone()));
			}
		}
		Ok(results)
	}
}

/// Configuration schema for [`MemoryStorage`].
pub struct MemoryStorageSchema;

impl MemoryStorageSchema {
	/// Static validation method for use before instance creation.
	pub fn validate_config(config: &toml::Value) -> Result<(), ValidationError> {
		let instance = Self;
		instance.validate(config)
	}
}

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(vec![], vec![]);
		schema.validate(config)
	}
}

/// Factory function to create a memory storage backend from configuration.
///
/// Configuration parameters: none required.
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	MemoryStorageSchema::validate_config(config)
		.map_err(|e| StorageError::Configuration(format!("Invalid configuration: {}", e)))?;
	Ok(Box::new(MemoryStorage::new()))
}

/// Registry for the memory storage implementation.
pub struct Registry;

impl relayer_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = crate::StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl crate::StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::StorageIndexes;

	#[tokio::test]
	async fn test_basic_operations() {
		let storage = MemoryStorage::new();

		let key = "test_key";
		let value = b"test_value".to_vec();
		storage
			.set_bytes(key, value.clone(), None, None)
			.await
			.unwrap();

		let retrieved = storage.get_bytes(key).await.unwrap();
		assert_eq!(retrieved, value);

		assert!(storage.exists(key).await.unwrap());

		storage.delete(key).await.unwrap();
		assert!(!storage.exists(key).await.unwrap());

		let result = storage.get_bytes(key).await;
		assert!(matches!(result, Err(StorageError::NotFound)));
	}

	#[tokio::test]
	async fn test_overwrite() {
		let storage = MemoryStorage::new();

		let key = "overwrite_key";
		storage
			.set_bytes(key, b"value1".to_vec(), None, None)
			.await
			.unwrap();
		storage
			.set_bytes(key, b"value2".to_vec(), None, None)
			.await
			.unwrap();
		let retrieved = storage.get_bytes(key).await.unwrap();
		assert_eq!(retrieved, b"value2".to_vec());
	}

	#[tokio::test]
	async fn test_query_by_indexed_field() {
		let storage = MemoryStorage::new();

		storage
			.set_bytes(
				"orders:o1",
				b"{}".to_vec(),
				Some(StorageIndexes::new().with_field("status", "Init")),
				None,
			)
			.await
			.unwrap();
		storage
			.set_bytes(
				"orders:o2",
				b"{}".to_vec(),
				Some(StorageIndexes::new().with_field("status", "Blocked")),
				None,
			)
			.await
			.unwrap();

		let matches = storage
			.query(
				"orders",
				QueryFilter::Equals("status".into(), serde_json::json!("Init")),
			)
			.await
			.unwrap();
		assert_eq!(matches, vec!["orders:o1".to_string()]);
	}

	#[tokio::test]
	async fn test_reindex_on_update_drops_stale_entry() {
		let storage = MemoryStorage::new();
		storage
			.set_bytes(
				"orders:o1",
				b"{}".to_vec(),
				Some(StorageIndexes::new().with_field("status", "Init")),
				None,
			)
			.await
			.unwrap();
		storage
			.set_bytes(
				"orders:o1",
				b"{}".to_vec(),
				Some(StorageIndexes::new().with_field("status", "MatchedInit")),
				None,
			)
			.await
			.unwrap();

		let still_init = storage
			.query(
				"orders",
				QueryFilter::Equals("status".into(), serde_json::json!("Init")),
			)
			.await
			.unwrap();
		assert!(still_init.is_empty());

		let now_matched = storage
			.query(
				"orders",
				QueryFilter::Equals("status".into(), serde_json::json!("MatchedInit")),
			)
			.await
			.unwrap();
		assert_eq!(now_matched, vec!["orders:o1".to_string()]);
	}
}
