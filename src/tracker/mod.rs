//! Client for the issue-tracking API: request signing, transport,
//! normalization and the cached issue operations.

pub mod api_types;
pub mod auth;
pub mod cache;
pub mod client;
pub mod issues;
pub mod normalize;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

pub use auth::{Auth, Credentials, RequestOverrides, Scope, SignedRequest};
pub use cache::CacheKey;
pub use client::{HttpTransport, Page, Transport};
pub use issues::{Expiry, FetchAllOptions, Fallback, GetOptions, Issues, IssuesSettings};
pub use types::{Comment, Issue};

use crate::cache::CacheLayer;
use crate::config::Config;
use crate::error::Result;

/// Wire up an HTTP-backed [`Issues`] from configuration and credentials.
pub fn connect(config: &Config, mut credentials: Credentials) -> Result<Issues> {
  if credentials.project.is_none() {
    credentials.project = config.api.project.clone();
  }

  let auth = Arc::new(Auth::new(credentials, &config.api.url)?);
  let transport = Arc::new(HttpTransport::new(Duration::from_secs(
    config.api.timeout_secs,
  ))?);
  let cache = CacheLayer::new(config.cache.open_storage()?, config.cache.namespace.clone());

  Ok(Issues::new(auth, transport, cache, config.issues_settings()))
}
