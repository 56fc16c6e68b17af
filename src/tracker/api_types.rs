//! Serde-deserializable types matching the tracker API responses.
//!
//! These types are separate from domain types to allow lenient
//! deserialization while keeping domain types focused on what callers need.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::types::{Comment, Issue};

// ============================================================================
// Envelopes
// ============================================================================

/// Response envelope shared by collection and single-item endpoints.
#[derive(Debug, Deserialize)]
pub struct ApiPage {
  /// An array for collections, a bare object for single items
  #[serde(default)]
  pub data: Value,
  #[serde(default)]
  pub has_more: bool,
}

impl ApiPage {
  pub fn into_items(self) -> Vec<Value> {
    match self.data {
      Value::Array(items) => items,
      Value::Null => Vec::new(),
      item => vec![item],
    }
  }
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiIssue {
  #[serde(deserialize_with = "deserialize_id")]
  pub id: String,
  #[serde(default, deserialize_with = "deserialize_opt_id")]
  pub project_id: Option<String>,
  #[serde(rename = "ref")]
  pub reference: String,
  pub title: Option<String>,
  pub assignee: Option<Value>,
  pub status: Option<Value>,
  pub priority: Option<Value>,
  pub url: Option<String>,
  pub html: Option<String>,
  /// Only present when the request asked for comments
  pub comments: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub struct ApiComment {
  #[serde(deserialize_with = "deserialize_id")]
  pub id: String,
  pub user: Option<Value>,
  pub url: Option<String>,
  pub html: Option<String>,
  /// Epoch seconds
  pub created_at: i64,
  /// Epoch seconds
  pub updated_at: Option<i64>,
}

// ============================================================================
// Conversions to domain types
// ============================================================================

/// Convert one raw issue record into the canonical shape.
///
/// The raw record (and each raw comment) is kept only when `verbose` is set.
pub fn to_issue(raw: Value, verbose: bool) -> serde_json::Result<Issue> {
  let api = ApiIssue::deserialize(&raw)?;

  let comments = match api.comments {
    Some(raw_comments) => Some(
      raw_comments
        .into_iter()
        .map(|raw_comment| to_comment(raw_comment, verbose))
        .collect::<serde_json::Result<Vec<_>>>()?,
    ),
    None => None,
  };

  Ok(Issue {
    id: api.id,
    project: api.project_id,
    reference: api.reference,
    title: api.title.unwrap_or_default(),
    assignee: display_name(api.assignee.as_ref()),
    status: display_name(api.status.as_ref()).unwrap_or_default(),
    priority: display_name(api.priority.as_ref()).unwrap_or_default(),
    url: api.url.unwrap_or_default(),
    html: api.html.unwrap_or_default(),
    raw: verbose.then_some(raw),
    comments,
  })
}

fn to_comment(raw: Value, verbose: bool) -> serde_json::Result<Comment> {
  let api = ApiComment::deserialize(&raw)?;
  let edited = api
    .updated_at
    .filter(|updated| *updated != api.created_at)
    .map(seconds_to_millis);

  Ok(Comment {
    id: api.id,
    user: display_name(api.user.as_ref()).unwrap_or_default(),
    url: api.url.unwrap_or_default(),
    html: api.html.unwrap_or_default(),
    raw: verbose.then_some(raw),
    created: seconds_to_millis(api.created_at),
    edited,
  })
}

// ============================================================================
// Helpers
// ============================================================================

fn seconds_to_millis(seconds: i64) -> i64 {
  seconds.saturating_mul(1000)
}

/// Extract a display string from a field that can be:
/// - A string or number
/// - An object with a "name" or "display_name" field
/// - null
fn display_name(value: Option<&Value>) -> Option<String> {
  match value? {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    Value::Object(obj) => obj
      .get("name")
      .or_else(|| obj.get("display_name"))
      .and_then(|v| v.as_str())
      .map(String::from),
    _ => None,
  }
}

fn id_string(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Value::deserialize(deserializer)?;
  id_string(&value).ok_or_else(|| serde::de::Error::custom(format!("invalid id: {}", value)))
}

fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  match Option::<Value>::deserialize(deserializer)? {
    None | Some(Value::Null) => Ok(None),
    Some(value) => id_string(&value)
      .map(Some)
      .ok_or_else(|| serde::de::Error::custom(format!("invalid id: {}", value))),
  }
}
