//! Turns raw remote records into canonical issues and records them in the
//! cache together with both linkage entries.

use serde_json::Value;
use tracing::trace;

use super::api_types::to_issue;
use super::cache::CacheKey;
use super::issues::Expiry;
use super::types::Issue;
use crate::cache::CacheLayer;
use crate::error::{Result, TrackerError};

#[derive(Clone)]
pub struct Normalizer {
  cache: CacheLayer,
  verbose: bool,
  expiry: Expiry,
}

impl Normalizer {
  pub fn new(cache: CacheLayer, verbose: bool, expiry: Expiry) -> Self {
    Self {
      cache,
      verbose,
      expiry,
    }
  }

  pub fn verbose(&self) -> bool {
    self.verbose
  }

  /// Normalize one raw issue and write `issues/<ref>` plus both linkages.
  pub fn issue(&self, raw: Value) -> Result<Issue> {
    let issue = self.decode(raw)?;
    self.record(issue)
  }

  /// Like [`Normalizer::issue`], for a record requested with its comments.
  /// A record without a `comments` field has none yet.
  pub fn issue_with_comments(&self, raw: Value) -> Result<Issue> {
    let mut issue = self.decode(raw)?;
    issue.comments.get_or_insert_with(Vec::new);
    self.record(issue)
  }

  fn decode(&self, raw: Value) -> Result<Issue> {
    to_issue(raw, self.verbose)
      .map_err(|e| TrackerError::Decode(format!("Invalid issue record: {}", e)))
  }

  fn record(&self, issue: Issue) -> Result<Issue> {
    self.cache.store(&issue, self.expiry.issue)?;
    self.cache.set(
      &CacheKey::LinkageByRef(&issue.reference).to_string(),
      &issue.id,
      self.expiry.linkage,
    )?;
    self.cache.set(
      &CacheKey::LinkageById(&issue.id).to_string(),
      &issue.reference,
      self.expiry.linkage,
    )?;

    trace!(reference = %issue.reference, id = %issue.id, "normalized issue");
    Ok(issue)
  }
}
