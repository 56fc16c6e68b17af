//! Core traits and types for the caching system.

use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

/// Trait for records that live in the cache under their own key.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned {
  /// Key of the record inside the layer's namespace (e.g. `issues/ABC-12`).
  fn cache_key(&self) -> String;
}

/// Describes one single-flight worker run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
  /// Cache key under which the result is memoized
  pub id: String,
  /// How long the memoized result stays valid (`None` = indefinitely)
  pub expiry: Option<Duration>,
  /// When false, the memo is not consulted and the producer always runs
  pub enabled: bool,
}

impl WorkerSpec {
  pub fn new(id: impl Into<String>, expiry: Option<Duration>) -> Self {
    Self {
      id: id.into(),
      expiry,
      enabled: true,
    }
  }

  pub fn enabled(mut self, enabled: bool) -> Self {
    self.enabled = enabled;
    self
  }
}
