use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical issue record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
  /// Remote primary key, used for direct fetches
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub project: Option<String>,
  /// Human-readable reference, e.g. `ABC-1234`
  #[serde(rename = "ref")]
  pub reference: String,
  pub title: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub assignee: Option<String>,
  pub status: String,
  pub priority: String,
  pub url: String,
  pub html: String,
  /// Untransformed remote record (verbose mode only)
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub raw: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub comments: Option<Vec<Comment>>,
}

/// Comment on an issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
  pub id: String,
  pub user: String,
  pub url: String,
  pub html: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub raw: Option<Value>,
  /// Epoch milliseconds
  pub created: i64,
  /// Epoch milliseconds, only set when the comment was updated after creation
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub edited: Option<i64>,
}
