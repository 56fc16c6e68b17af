//! Transport seam and its HTTP implementation.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::api_types::ApiPage;
use super::auth::SignedRequest;
use crate::error::{Result, TrackerError};

/// One decoded response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
  /// Raw records, exactly one for single-item endpoints
  pub items: Vec<Value>,
  /// Whether the collection has more pages after this one
  pub has_more: bool,
}

/// Dispatches signed requests to the remote API.
///
/// Timeouts and retries, if any, belong to the implementation.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn dispatch(&self, request: &SignedRequest) -> Result<Page>;
}

/// `reqwest`-backed transport
#[derive(Clone)]
pub struct HttpTransport {
  client: Client,
}

impl HttpTransport {
  pub fn new(timeout: Duration) -> Result<Self> {
    let client = Client::builder()
      .timeout(timeout)
      .user_agent(concat!("trackr/", env!("CARGO_PKG_VERSION")))
      .build()?;

    Ok(Self { client })
  }

  /// Check response status and convert errors.
  async fn check_response(response: Response) -> Result<Response> {
    match response.status() {
      StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED => Ok(response),
      status => Err(TrackerError::Status {
        status: status.as_u16(),
        body: response.text().await.unwrap_or_default(),
      }),
    }
  }
}

#[async_trait]
impl Transport for HttpTransport {
  async fn dispatch(&self, request: &SignedRequest) -> Result<Page> {
    debug!(method = %request.method, url = %request.url, "dispatching request");

    let response = self
      .client
      .request(request.method.clone(), request.url.clone())
      .query(&request.params)
      .send()
      .await?;

    let response = Self::check_response(response).await?;
    let page: ApiPage = response
      .json()
      .await
      .map_err(|e| TrackerError::Decode(e.to_string()))?;

    let has_more = page.has_more;
    Ok(Page {
      items: page.into_items(),
      has_more,
    })
  }
}
