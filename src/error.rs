//! Error types for trackr.
//! Covers configuration, transport, lookup and cache failures.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
  #[error("Configuration error: {0}")]
  Config(String),

  #[error("HTTP request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("HTTP {status}: {body}")]
  Status { status: u16, body: String },

  #[error("Transport error: {0}")]
  Transport(String),

  #[error("Failed to decode response: {0}")]
  Decode(String),

  #[error("Issue not found: {0}")]
  NotFound(String),

  #[error("Ambiguous result for {reference}: {count} matching issues")]
  Ambiguous { reference: String, count: usize },

  #[error("Cache error: {0}")]
  Cache(String),

  #[error("Cache database error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),
}

impl TrackerError {
  /// True for failures raised while talking to the remote API.
  pub fn is_transport(&self) -> bool {
    matches!(
      self,
      Self::Request(_) | Self::Status { .. } | Self::Transport(_) | Self::Decode(_)
    )
  }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
