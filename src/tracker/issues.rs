//! Paginated fetching and reference lookup for issues.
//!
//! Both paths share one [`CacheLayer`]. Every normalized record refreshes
//! `issues/<ref>` and the two linkage entries, so a full walk warms the
//! cache for later single lookups.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::auth::{Auth, RequestOverrides, Scope, SignedRequest, ISSUES_PATH};
use super::cache::CacheKey;
use super::client::Transport;
use super::normalize::Normalizer;
use super::types::Issue;
use crate::cache::{CacheLayer, WorkerSpec};
use crate::error::{Result, TrackerError};

/// Default page size for collection walks
pub const DEFAULT_PAGE_LIMIT: u32 = 100;

/// Lifetimes of the entries written by [`Issues`] (`None` = no expiry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiry {
  /// `issues/<ref>`
  pub issue: Option<Duration>,
  /// Both linkage indexes; the ref/id pair never changes for an issue
  pub linkage: Option<Duration>,
  /// Memo of the full collection walk
  pub fetch: Option<Duration>,
}

impl Default for Expiry {
  fn default() -> Self {
    Self {
      issue: Some(Duration::from_secs(60 * 60)),
      linkage: None,
      fetch: Some(Duration::from_secs(5 * 60)),
    }
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IssuesSettings {
  /// Keep the raw remote payload on every record
  pub verbose: bool,
  pub expiry: Expiry,
}

pub type PageHook<'a> = Box<dyn FnMut(u64) + Send + 'a>;
pub type RequestHook<'a> = Box<dyn FnMut(&mut SignedRequest) + Send + 'a>;
pub type ProgressHook<'a> = Box<dyn FnMut(usize) + Send + 'a>;

/// Options for [`Issues::fetch_all`]
pub struct FetchAllOptions<'a> {
  /// Skip the memoized result and always walk the collection
  pub force: bool,
  /// Fetch exactly one page starting here instead of walking every page
  pub offset: Option<u64>,
  /// Page size
  pub limit: u32,
  /// Search every accessible project instead of the primary one
  pub global: bool,
  pub on_fetch_page: Option<PageHook<'a>>,
  pub on_request: Option<RequestHook<'a>>,
  pub on_progress: Option<ProgressHook<'a>>,
}

impl Default for FetchAllOptions<'_> {
  fn default() -> Self {
    Self {
      force: false,
      offset: None,
      limit: DEFAULT_PAGE_LIMIT,
      global: false,
      on_fetch_page: None,
      on_request: None,
      on_progress: None,
    }
  }
}

impl<'a> FetchAllOptions<'a> {
  /// Called with the page index before each page is requested.
  pub fn on_fetch_page(mut self, hook: impl FnMut(u64) + Send + 'a) -> Self {
    self.on_fetch_page = Some(Box::new(hook));
    self
  }

  /// Called with each built request; changes are dispatched as made.
  pub fn on_request(mut self, hook: impl FnMut(&mut SignedRequest) + Send + 'a) -> Self {
    self.on_request = Some(Box::new(hook));
    self
  }

  /// Called after each page with the number of issues collected so far.
  pub fn on_progress(mut self, hook: impl FnMut(usize) + Send + 'a) -> Self {
    self.on_progress = Some(Box::new(hook));
    self
  }
}

/// What [`Issues::get`] does when no linkage is cached for a reference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Fallback {
  /// Reference search, paged until the server reports no more matches
  #[default]
  Search,
  /// Walk the whole collection and pick the match
  FetchAll,
}

/// Options for [`Issues::get`]
#[derive(Debug, Clone, Copy, Default)]
pub struct GetOptions {
  pub global: bool,
  /// Make sure the returned issue carries its comments
  pub comments: bool,
  pub fallback: Fallback,
}

/// Issue fetching with cache coordination.
#[derive(Clone)]
pub struct Issues {
  auth: Arc<Auth>,
  transport: Arc<dyn Transport>,
  cache: CacheLayer,
  normalizer: Normalizer,
  expiry: Expiry,
}

impl Issues {
  pub fn new(
    auth: Arc<Auth>,
    transport: Arc<dyn Transport>,
    cache: CacheLayer,
    settings: IssuesSettings,
  ) -> Self {
    let normalizer = Normalizer::new(cache.clone(), settings.verbose, settings.expiry);
    Self {
      auth,
      transport,
      cache,
      normalizer,
      expiry: settings.expiry,
    }
  }

  pub fn cache(&self) -> &CacheLayer {
    &self.cache
  }

  /// Fetch the whole issue collection, page by page.
  ///
  /// Concurrent and repeated calls within the fetch expiry share one walk
  /// unless `force` is set. A walk with an explicit `offset` fetches a
  /// single page and is never memoized. Any failed page fails the call.
  pub async fn fetch_all(&self, options: FetchAllOptions<'_>) -> Result<Vec<Issue>> {
    if options.limit == 0 {
      return Err(TrackerError::Config(
        "Page limit must be at least 1".to_string(),
      ));
    }

    if options.offset.is_some() {
      return self.walk(options).await;
    }

    let spec = WorkerSpec::new(
      CacheKey::FetchAll {
        global: options.global,
      }
      .to_string(),
      self.expiry.fetch,
    )
    .enabled(!options.force);

    self.cache.worker(spec, move || self.walk(options)).await
  }

  async fn walk(&self, mut options: FetchAllOptions<'_>) -> Result<Vec<Issue>> {
    let scope = Scope::from_global(options.global);
    let mut issues = Vec::new();
    let mut page: u64 = 0;

    loop {
      if let Some(hook) = options.on_fetch_page.as_mut() {
        hook(page);
      }

      let offset = options
        .offset
        .unwrap_or_else(|| u64::from(options.limit) * page);
      let overrides = RequestOverrides::default()
        .param("limit", options.limit)
        .param("offset", offset);
      let mut request = self.auth.build(scope, overrides)?;

      if let Some(hook) = options.on_request.as_mut() {
        hook(&mut request);
      }

      let response = self.transport.dispatch(&request).await?;
      debug!(
        page,
        offset,
        items = response.items.len(),
        has_more = response.has_more,
        "fetched issue page"
      );

      for raw in response.items {
        issues.push(self.normalizer.issue(raw)?);
      }

      if let Some(hook) = options.on_progress.as_mut() {
        hook(issues.len());
      }

      if !response.has_more || options.offset.is_some() {
        break;
      }
      page += 1;
    }

    info!(count = issues.len(), pages = page + 1, "fetched issues");
    Ok(issues)
  }

  /// Resolve one issue by reference (e.g. `ABC-1234`).
  ///
  /// Order: cached record, then a direct request through the cached
  /// ref -> id linkage, then the configured fallback.
  pub async fn get(&self, reference: &str, options: GetOptions) -> Result<Issue> {
    if reference.trim().is_empty() {
      return Err(TrackerError::Config(
        "Issue reference must not be empty".to_string(),
      ));
    }

    let key = CacheKey::Issue(reference).to_string();
    // A record cached by a non-verbose run lacks the raw payload
    let stale = self.normalizer.verbose()
      && self
        .cache
        .get::<Issue>(&key)?
        .is_some_and(|issue| issue.raw.is_none());
    if stale {
      debug!(reference, "cached issue has no raw payload, refetching");
    }

    let spec = WorkerSpec::new(key, self.expiry.issue).enabled(!stale);
    let issue = self
      .cache
      .worker(spec, || self.resolve(reference, options))
      .await?;

    self.with_comments(issue, options).await
  }

  /// Resolve one issue by remote id, serving it from the cache when the
  /// id -> ref linkage is known.
  pub async fn get_by_id(&self, id: &str, options: GetOptions) -> Result<Issue> {
    if let Some(reference) = self.reference_for(id)? {
      return self.get(&reference, options).await;
    }

    let issue = self
      .fetch_by_id(id, options.comments, options.global)
      .await?;
    self.with_comments(issue, options).await
  }

  /// Reference of a remote id, if it has been seen before.
  pub fn reference_for(&self, id: &str) -> Result<Option<String>> {
    self.cache.get(&CacheKey::LinkageById(id).to_string())
  }

  /// Drop every cached issue, linkage and memo.
  pub fn clear_cache(&self) -> Result<()> {
    self.cache.clear()
  }

  async fn resolve(&self, reference: &str, options: GetOptions) -> Result<Issue> {
    let linkage: Option<String> = self
      .cache
      .get(&CacheKey::LinkageByRef(reference).to_string())?;

    if let Some(id) = linkage {
      debug!(reference, id = %id, "resolving issue through linkage");
      return self.fetch_by_id(&id, options.comments, options.global).await;
    }

    match options.fallback {
      Fallback::Search => self.search(reference, options.global).await,
      Fallback::FetchAll => self.scan(reference, options.global).await,
    }
  }

  async fn with_comments(&self, issue: Issue, options: GetOptions) -> Result<Issue> {
    if options.comments && issue.comments.is_none() {
      debug!(reference = %issue.reference, "fetching comments");
      return self.fetch_by_id(&issue.id, true, options.global).await;
    }
    Ok(issue)
  }

  async fn fetch_by_id(&self, id: &str, comments: bool, global: bool) -> Result<Issue> {
    let mut overrides = RequestOverrides::default().path(format!("{}/{}", ISSUES_PATH, id));
    if comments {
      overrides = overrides.param("include", "comments");
    }

    let request = self.auth.build(Scope::from_global(global), overrides)?;
    let response = self.transport.dispatch(&request).await?;
    let raw = exactly_one(id, response.items)?;
    if comments {
      self.normalizer.issue_with_comments(raw)
    } else {
      self.normalizer.issue(raw)
    }
  }

  async fn search(&self, reference: &str, global: bool) -> Result<Issue> {
    debug!(reference, "no linkage cached, searching");

    let scope = Scope::from_global(global);
    let limit = DEFAULT_PAGE_LIMIT;
    let mut matches: Vec<Value> = Vec::new();
    let mut page: u64 = 0;

    loop {
      let offset = u64::from(limit) * page;
      let overrides = RequestOverrides::default()
        .param("ref", reference)
        .param("limit", limit)
        .param("offset", offset);
      let request = self.auth.build(scope, overrides)?;
      let response = self.transport.dispatch(&request).await?;
      debug!(
        reference,
        page,
        items = response.items.len(),
        has_more = response.has_more,
        "fetched search page"
      );

      // The search matches substrings; keep exact references only
      matches.extend(
        response
          .items
          .into_iter()
          .filter(|raw| raw.get("ref").and_then(Value::as_str) == Some(reference)),
      );

      if !response.has_more {
        break;
      }
      page += 1;
    }

    let raw = exactly_one(reference, matches)?;
    self.normalizer.issue(raw)
  }

  async fn scan(&self, reference: &str, global: bool) -> Result<Issue> {
    debug!(reference, "no linkage cached, scanning collection");

    let issues = self
      .fetch_all(FetchAllOptions {
        global,
        ..FetchAllOptions::default()
      })
      .await?;

    let matches: Vec<Issue> = issues
      .into_iter()
      .filter(|issue| issue.reference == reference)
      .collect();

    exactly_one(reference, matches)
  }
}

fn exactly_one<T>(what: &str, mut items: Vec<T>) -> Result<T> {
  match items.len() {
    0 => Err(TrackerError::NotFound(what.to_string())),
    1 => Ok(items.remove(0)),
    count => {
      warn!(what, count, "expected a single issue");
      Err(TrackerError::Ambiguous {
        reference: what.to_string(),
        count,
      })
    }
  }
}
