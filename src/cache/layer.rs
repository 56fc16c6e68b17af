//! Cache layer that namespaces keys and coordinates single-flight work.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

use super::storage::CacheStorage;
use super::traits::{Cacheable, WorkerSpec};
use crate::error::{Result, TrackerError};

type KeyLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Cache layer shared by every component of one client.
///
/// Values are (de)serialized through JSON so any storage backend can hold
/// them. Cloning is cheap and clones share storage and in-flight state.
pub struct CacheLayer {
  storage: Arc<dyn CacheStorage>,
  namespace: String,
  in_flight: Arc<KeyLocks>,
}

impl CacheLayer {
  /// Create a new cache layer over `storage`, prefixing keys with `namespace`.
  pub fn new(storage: Arc<dyn CacheStorage>, namespace: impl Into<String>) -> Self {
    Self {
      storage,
      namespace: namespace.into(),
      in_flight: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  pub fn namespace(&self) -> &str {
    &self.namespace
  }

  fn qualify(&self, key: &str) -> String {
    format!("{}:{}", self.namespace, key)
  }

  /// Read a typed value.
  pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
    match self.storage.get(&self.qualify(key))? {
      Some(value) => Ok(Some(serde_json::from_value(value)?)),
      None => Ok(None),
    }
  }

  /// Write a typed value. `ttl = None` means no expiry.
  pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
    let value = serde_json::to_value(value)?;
    self.storage.set(&self.qualify(key), &value, ttl)
  }

  /// Store a record under its own cache key.
  pub fn store<T: Cacheable>(&self, entity: &T, ttl: Option<Duration>) -> Result<()> {
    self.set(&entity.cache_key(), entity, ttl)
  }

  /// Remove every entry in this layer's namespace.
  pub fn clear(&self) -> Result<()> {
    self.storage.clear(&self.qualify(""))
  }

  /// Run `producer` at most once concurrently per `spec.id`, memoizing its
  /// result for `spec.expiry`.
  ///
  /// With `spec.enabled = false` the memo is not read, the producer always
  /// runs and a successful result replaces the memo. Failed runs are never
  /// memoized.
  pub async fn worker<T, F, Fut>(&self, spec: WorkerSpec, producer: F) -> Result<T>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    if !spec.enabled {
      debug!(id = %spec.id, "worker bypassed");
      let value = producer().await?;
      self.set(&spec.id, &value, spec.expiry)?;
      return Ok(value);
    }

    let key_lock = self.key_lock(&spec.id)?;
    let result: Result<T> = async {
      let _guard = key_lock.lock().await;

      if let Some(value) = self.get::<T>(&spec.id)? {
        debug!(id = %spec.id, "worker memo hit");
        return Ok(value);
      }

      debug!(id = %spec.id, "worker running producer");
      let value = producer().await?;
      self.set(&spec.id, &value, spec.expiry)?;
      Ok(value)
    }
    .await;

    self.release_key_lock(&spec.id, key_lock)?;
    result
  }

  fn key_lock(&self, id: &str) -> Result<Arc<tokio::sync::Mutex<()>>> {
    let mut locks = self
      .in_flight
      .lock()
      .map_err(|e| TrackerError::Cache(format!("Lock poisoned: {}", e)))?;
    Ok(Arc::clone(locks.entry(id.to_string()).or_default()))
  }

  fn release_key_lock(&self, id: &str, key_lock: Arc<tokio::sync::Mutex<()>>) -> Result<()> {
    let mut locks = self
      .in_flight
      .lock()
      .map_err(|e| TrackerError::Cache(format!("Lock poisoned: {}", e)))?;
    // Only the map and this caller hold it: nobody is waiting.
    if Arc::strong_count(&key_lock) == 2 {
      locks.remove(id);
    }
    Ok(())
  }
}

impl Clone for CacheLayer {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      namespace: self.namespace.clone(),
      in_flight: Arc::clone(&self.in_flight),
    }
  }
}
