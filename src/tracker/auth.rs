//! Request signing for the tracker API.
//!
//! Every request carries `api_key`, a millisecond `timestamp` and a
//! `signature`: the hex HMAC-SHA1 of `api_key ++ timestamp` keyed by the
//! account secret.

use hmac::{Hmac, Mac};
use reqwest::Method;
use sha1::Sha1;
use std::collections::BTreeMap;
use url::Url;

use crate::error::{Result, TrackerError};

type HmacSha1 = Hmac<Sha1>;

/// Default path of the issue collection, relative to the base URL
pub const ISSUES_PATH: &str = "issues";

/// Account credentials
#[derive(Clone)]
pub struct Credentials {
  pub secret: String,
  pub api_key: String,
  /// Primary project used for project-scoped requests
  pub project: Option<String>,
}

impl Credentials {
  /// Read credentials from the environment.
  ///
  /// Requires TRACKR_SECRET and TRACKR_API_KEY; TRACKR_PROJECT is optional.
  pub fn from_env() -> Result<Self> {
    let secret = std::env::var("TRACKR_SECRET")
      .map_err(|_| TrackerError::Config("TRACKR_SECRET is not set".to_string()))?;
    let api_key = std::env::var("TRACKR_API_KEY")
      .map_err(|_| TrackerError::Config("TRACKR_API_KEY is not set".to_string()))?;
    let project = std::env::var("TRACKR_PROJECT").ok();

    Ok(Self {
      secret,
      api_key,
      project,
    })
  }
}

impl std::fmt::Debug for Credentials {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Credentials")
      .field("secret", &"<redacted>")
      .field("api_key", &self.api_key)
      .field("project", &self.project)
      .finish()
  }
}

/// Whether a request is limited to the primary project
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Scope {
  #[default]
  Project,
  /// Search across every project the account can access
  Global,
}

impl Scope {
  pub fn from_global(global: bool) -> Self {
    if global {
      Scope::Global
    } else {
      Scope::Project
    }
  }
}

/// Caller-supplied values merged over the signed defaults
#[derive(Debug, Clone, Default)]
pub struct RequestOverrides {
  pub method: Option<Method>,
  /// Path relative to the base URL (default: the issue collection)
  pub path: Option<String>,
  pub params: BTreeMap<String, String>,
}

impl RequestOverrides {
  pub fn path(mut self, path: impl Into<String>) -> Self {
    self.path = Some(path.into());
    self
  }

  pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
    self.params.insert(key.into(), value.to_string());
    self
  }
}

/// A fully built, signed request ready for dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
  pub method: Method,
  pub url: Url,
  pub params: BTreeMap<String, String>,
}

/// Builds signed request descriptors.
#[derive(Debug, Clone)]
pub struct Auth {
  credentials: Credentials,
  base_url: Url,
}

impl Auth {
  /// Create a request builder. Fails if a credential is empty or the base
  /// URL is invalid.
  pub fn new(credentials: Credentials, base_url: &str) -> Result<Self> {
    let mut base_url = Url::parse(base_url)
      .map_err(|e| TrackerError::Config(format!("Invalid API URL {}: {}", base_url, e)))?;

    // Keep the last path segment when joining relative paths
    if !base_url.path().ends_with('/') {
      let path = format!("{}/", base_url.path());
      base_url.set_path(&path);
    }

    let auth = Self {
      credentials,
      base_url,
    };
    auth.check_credentials()?;
    Ok(auth)
  }

  pub fn primary_project(&self) -> Option<&str> {
    self.credentials.project.as_deref()
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  fn check_credentials(&self) -> Result<()> {
    if self.credentials.secret.is_empty() {
      return Err(TrackerError::Config("API secret is missing".to_string()));
    }
    if self.credentials.api_key.is_empty() {
      return Err(TrackerError::Config("API key is missing".to_string()));
    }
    Ok(())
  }

  /// Build a signed request stamped with the current time.
  pub fn build(&self, scope: Scope, overrides: RequestOverrides) -> Result<SignedRequest> {
    self.build_at(chrono::Utc::now().timestamp_millis(), scope, overrides)
  }

  /// Build a signed request for an explicit millisecond timestamp.
  pub fn build_at(
    &self,
    timestamp: i64,
    scope: Scope,
    overrides: RequestOverrides,
  ) -> Result<SignedRequest> {
    self.check_credentials()?;

    let mut params = BTreeMap::new();
    params.insert("api_key".to_string(), self.credentials.api_key.clone());
    params.insert("timestamp".to_string(), timestamp.to_string());
    params.insert(
      "signature".to_string(),
      sign(&self.credentials.secret, &self.credentials.api_key, timestamp)?,
    );

    if scope == Scope::Project {
      let project = self.primary_project().ok_or_else(|| {
        TrackerError::Config("Project-scoped request without a primary project".to_string())
      })?;
      params.insert("project_id".to_string(), project.to_string());
    }

    params.extend(overrides.params);

    let path = overrides.path.as_deref().unwrap_or(ISSUES_PATH);
    let url = self
      .base_url
      .join(path.trim_start_matches('/'))
      .map_err(|e| TrackerError::Config(format!("Invalid request path {}: {}", path, e)))?;

    Ok(SignedRequest {
      method: overrides.method.unwrap_or(Method::GET),
      url,
      params,
    })
  }
}

/// Hex HMAC-SHA1 of `api_key ++ timestamp`, keyed by `secret`.
pub fn sign(secret: &str, api_key: &str, timestamp: i64) -> Result<String> {
  let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
    .map_err(|e| TrackerError::Config(format!("Invalid API secret: {}", e)))?;
  mac.update(api_key.as_bytes());
  mac.update(timestamp.to_string().as_bytes());
  Ok(hex::encode(mac.finalize().into_bytes()))
}
