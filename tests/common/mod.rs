//! Scripted in-memory transport for exercising `Issues` without a network.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use trackr::cache::{CacheLayer, MemoryStorage};
use trackr::tracker::{
  Auth, Credentials, Issues, IssuesSettings, Page, SignedRequest, Transport,
};
use trackr::{Result, TrackerError};

pub const BASE_URL: &str = "https://tracker.example.com/api/v1/";

/// Serves a fixed set of raw issues the way the remote API does:
/// - `GET issues?limit&offset` pages through the set
/// - `GET issues?ref=&limit&offset` pages through every issue whose ref
///   contains the text
/// - `GET issues/<id>` returns one issue, with comments on `include=comments`
///   unless the issue is scripted as having none
pub struct ScriptedTransport {
  issues: Vec<Value>,
  requests: Mutex<Vec<SignedRequest>>,
  /// 1-based index of the request that fails, if any
  fail_on: Mutex<Option<usize>>,
  /// Serve single issues without a `comments` field even when asked
  omit_comments: Mutex<bool>,
}

impl ScriptedTransport {
  pub fn new(issues: Vec<Value>) -> Self {
    Self {
      issues,
      requests: Mutex::new(Vec::new()),
      fail_on: Mutex::new(None),
      omit_comments: Mutex::new(false),
    }
  }

  pub fn fail_on(&self, request_number: usize) {
    *self.fail_on.lock().unwrap() = Some(request_number);
  }

  pub fn omit_comments(&self) {
    *self.omit_comments.lock().unwrap() = true;
  }

  pub fn requests(&self) -> Vec<SignedRequest> {
    self.requests.lock().unwrap().clone()
  }

  pub fn request_count(&self) -> usize {
    self.requests.lock().unwrap().len()
  }

  fn path_tail(request: &SignedRequest) -> String {
    let path = request.url.path();
    path
      .strip_prefix("/api/v1/")
      .unwrap_or(path)
      .to_string()
  }

  fn collection(&self, request: &SignedRequest) -> Page {
    let matching: Vec<&Value> = match request.params.get("ref") {
      Some(text) => self
        .issues
        .iter()
        .filter(|raw| raw["ref"].as_str().is_some_and(|r| r.contains(text.as_str())))
        .collect(),
      None => self.issues.iter().collect(),
    };

    let limit: usize = request.params["limit"].parse().unwrap();
    let offset: usize = request.params["offset"].parse().unwrap();
    let end = (offset + limit).min(matching.len());
    let items = if offset < end {
      matching[offset..end].iter().map(|raw| (*raw).clone()).collect()
    } else {
      Vec::new()
    };

    Page {
      items,
      has_more: end < matching.len(),
    }
  }

  fn single(&self, request: &SignedRequest, id: &str) -> Page {
    let with_comments = request.params.get("include").map(String::as_str) == Some("comments")
      && !*self.omit_comments.lock().unwrap();
    let items = self
      .issues
      .iter()
      .filter(|raw| raw["id"].as_str() == Some(id))
      .map(|raw| {
        let mut raw = raw.clone();
        if with_comments {
          raw["comments"] = json!([
            {"id": format!("{}-c1", id), "user": {"name": "Dana"}, "html": "<p>seen</p>",
             "created_at": 1700000000, "updated_at": 1700000000},
            {"id": format!("{}-c2", id), "user": "Lee", "html": "<p>fixed</p>",
             "created_at": 1700000100, "updated_at": 1700000500}
          ]);
        }
        raw
      })
      .collect();

    Page {
      items,
      has_more: false,
    }
  }
}

#[async_trait]
impl Transport for ScriptedTransport {
  async fn dispatch(&self, request: &SignedRequest) -> Result<Page> {
    let number = {
      let mut requests = self.requests.lock().unwrap();
      requests.push(request.clone());
      requests.len()
    };

    // Let concurrent callers interleave
    tokio::task::yield_now().await;

    if *self.fail_on.lock().unwrap() == Some(number) {
      return Err(TrackerError::Status {
        status: 503,
        body: "unavailable".to_string(),
      });
    }

    let tail = Self::path_tail(request);
    match tail.split_once('/') {
      Some(("issues", id)) => Ok(self.single(request, id)),
      _ => Ok(self.collection(request)),
    }
  }
}

/// `count` raw issues: ids "1000", "1001", ..., refs "ABC-1", "ABC-2", ...
pub fn raw_issues(count: usize) -> Vec<Value> {
  (0..count)
    .map(|i| {
      json!({
        "id": (1000 + i).to_string(),
        "project_id": 42,
        "ref": format!("ABC-{}", i + 1),
        "title": format!("Issue number {}", i + 1),
        "assignee": if i % 2 == 0 { json!({"name": "Dana"}) } else { Value::Null },
        "status": {"name": "open"},
        "priority": "normal",
        "url": format!("https://tracker.example.com/ABC-{}", i + 1),
        "html": format!("<p>Body {}</p>", i + 1)
      })
    })
    .collect()
}

pub struct Harness {
  pub storage: Arc<MemoryStorage>,
  pub transport: Arc<ScriptedTransport>,
  pub issues: Issues,
}

impl Harness {
  pub fn new(raw: Vec<Value>) -> Self {
    Self::with_settings(raw, IssuesSettings::default())
  }

  pub fn with_settings(raw: Vec<Value>, settings: IssuesSettings) -> Self {
    let storage = Arc::new(MemoryStorage::new());
    let transport = Arc::new(ScriptedTransport::new(raw));
    let issues = build_issues(storage.clone(), transport.clone(), settings);

    Self {
      storage,
      transport,
      issues,
    }
  }

  /// A second `Issues` over the same cache and transport.
  pub fn reopen(&self, settings: IssuesSettings) -> Issues {
    build_issues(self.storage.clone(), self.transport.clone(), settings)
  }

  /// Cached keys starting with `prefix` (namespace excluded).
  pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
    self
      .storage
      .keys()
      .unwrap()
      .into_iter()
      .filter_map(|key| key.strip_prefix("test:").map(String::from))
      .filter(|key| key.starts_with(prefix))
      .collect()
  }
}

fn build_issues(
  storage: Arc<MemoryStorage>,
  transport: Arc<ScriptedTransport>,
  settings: IssuesSettings,
) -> Issues {
  let credentials = Credentials {
    secret: "sekrit".to_string(),
    api_key: "key-123".to_string(),
    project: Some("42".to_string()),
  };
  let auth = Arc::new(Auth::new(credentials, BASE_URL).unwrap());
  let cache = CacheLayer::new(storage, "test");
  Issues::new(auth, transport, cache, settings)
}
