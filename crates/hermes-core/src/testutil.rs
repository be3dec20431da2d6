//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeDelta, Utc};

use crate::catalog::{Catalog, FormField, HttpMethod, Target};
use crate::engine::{RunEvent, RunReporter};
use crate::error::AppError;
use crate::models::{ExtractionResult, parse_body};
use crate::rewriter::{RequestDescriptor, RequestRewriter, RewriteDecision};
use crate::traits::{Browser, BrowserSession, SnapshotStore};

pub const CITIES_URL: &str = "https://api.example.com/rest/sponsors/cities.json?page=1";
pub const SEARCH_URL: &str = "https://api.example.com/rest/sponsors/home.json?page=1";

// ---------------------------------------------------------------------------
// MockBrowser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum MockPage {
    Body(String),
    NavigationError(String),
    EvaluationError(String),
}

/// A request as it left the mock browser, after the rewriter's decision
/// was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// Mock browser serving canned page bodies per URL.
///
/// Every navigation is passed through the session's rewriter and the
/// resulting request is recorded.
#[derive(Clone)]
pub struct MockBrowser {
    pages: Arc<Mutex<HashMap<String, MockPage>>>,
    open_error: Arc<Mutex<Option<AppError>>>,
    close_error: bool,
    navigation_delay: Option<Duration>,
    requests: Arc<Mutex<Vec<AppliedRequest>>>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self {
            pages: Arc::new(Mutex::new(HashMap::new())),
            open_error: Arc::new(Mutex::new(None)),
            close_error: false,
            navigation_delay: None,
            requests: Arc::new(Mutex::new(Vec::new())),
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Browser whose next `open_session` fails.
    pub fn with_open_error(error: AppError) -> Self {
        let browser = Self::new();
        *browser.open_error.lock().unwrap() = Some(error);
        browser
    }

    pub fn with_page(self, url: &str, body: &str) -> Self {
        self.insert(url, MockPage::Body(body.to_string()));
        self
    }

    pub fn with_navigation_error(self, url: &str, message: &str) -> Self {
        self.insert(url, MockPage::NavigationError(message.to_string()));
        self
    }

    pub fn with_evaluation_error(self, url: &str, message: &str) -> Self {
        self.insert(url, MockPage::EvaluationError(message.to_string()));
        self
    }

    pub fn with_close_error(mut self) -> Self {
        self.close_error = true;
        self
    }

    /// Sleep this long inside every navigation.
    pub fn with_navigation_delay(mut self, delay: Duration) -> Self {
        self.navigation_delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<AppliedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn sessions_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Highest number of sessions that were open at the same time.
    pub fn max_concurrent_sessions(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn insert(&self, url: &str, page: MockPage) {
        self.pages.lock().unwrap().insert(url.to_string(), page);
    }
}

impl Default for MockBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl Browser for MockBrowser {
    type Session = MockSession;

    async fn open_session(&self, rewriter: RequestRewriter) -> Result<MockSession, AppError> {
        if let Some(e) = self.open_error.lock().unwrap().take() {
            return Err(e);
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        let open_now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(open_now, Ordering::SeqCst);

        Ok(MockSession {
            rewriter,
            pages: self.pages.clone(),
            requests: self.requests.clone(),
            closed: self.closed.clone(),
            active: self.active.clone(),
            close_error: self.close_error,
            navigation_delay: self.navigation_delay,
            current: None,
        })
    }
}

pub struct MockSession {
    rewriter: RequestRewriter,
    pages: Arc<Mutex<HashMap<String, MockPage>>>,
    requests: Arc<Mutex<Vec<AppliedRequest>>>,
    closed: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    close_error: bool,
    navigation_delay: Option<Duration>,
    current: Option<MockPage>,
}

impl BrowserSession for MockSession {
    async fn navigate(&mut self, url: &str) -> Result<(), AppError> {
        if let Some(delay) = self.navigation_delay {
            tokio::time::sleep(delay).await;
        }

        let request = RequestDescriptor {
            method: "GET".to_string(),
            url: url.to_string(),
            headers: vec![("Accept".to_string(), "text/html".to_string())],
        };
        let applied = match self.rewriter.decide(&request) {
            RewriteDecision::Continue => AppliedRequest {
                method: request.method,
                url: request.url,
                headers: request.headers,
                body: None,
            },
            RewriteDecision::Rewrite(overrides) => AppliedRequest {
                method: overrides.method.as_str().to_string(),
                url: request.url,
                headers: overrides.headers,
                body: Some(overrides.body),
            },
        };
        self.requests.lock().unwrap().push(applied);

        let page = self.pages.lock().unwrap().get(url).cloned();
        match page {
            Some(MockPage::NavigationError(message)) => Err(AppError::NavigationError {
                url: url.to_string(),
                message,
            }),
            Some(page) => {
                self.current = Some(page);
                Ok(())
            }
            None => Err(AppError::NavigationError {
                url: url.to_string(),
                message: "no mock page configured".to_string(),
            }),
        }
    }

    async fn body_text(&mut self) -> Result<String, AppError> {
        match &self.current {
            Some(MockPage::Body(body)) => Ok(body.clone()),
            Some(MockPage::EvaluationError(message)) => {
                Err(AppError::EvaluationError(message.clone()))
            }
            _ => Ok(String::new()),
        }
    }

    async fn close(self) -> Result<(), AppError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        self.active.fetch_sub(1, Ordering::SeqCst);
        if self.close_error {
            return Err(AppError::BrowserError("browser process already gone".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// In-memory store that records calls and can inject failures.
#[derive(Clone)]
pub struct MockStore {
    results: Arc<Mutex<Vec<ExtractionResult>>>,
    /// Fail the insert attempted once this many inserts have succeeded.
    insert_error: Arc<Mutex<Option<(usize, AppError)>>>,
    list_error: Arc<Mutex<Option<AppError>>>,
    inserted: Arc<AtomicUsize>,
    clears: Arc<AtomicUsize>,
    lists: Arc<AtomicUsize>,
}

impl MockStore {
    /// Empty store, as before the very first run.
    pub fn empty() -> Self {
        Self::with_results(Vec::new())
    }

    /// Store holding the results of an earlier run.
    pub fn with_results(results: Vec<ExtractionResult>) -> Self {
        Self {
            results: Arc::new(Mutex::new(results)),
            insert_error: Arc::new(Mutex::new(None)),
            list_error: Arc::new(Mutex::new(None)),
            inserted: Arc::new(AtomicUsize::new(0)),
            clears: Arc::new(AtomicUsize::new(0)),
            lists: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Store whose insert fails after `successful` inserts went through.
    pub fn with_insert_error_after(successful: usize, error: AppError) -> Self {
        let store = Self::empty();
        *store.insert_error.lock().unwrap() = Some((successful, error));
        store
    }

    /// Store that returns an error on its next list.
    pub fn with_list_error(error: AppError) -> Self {
        let store = Self::empty();
        *store.list_error.lock().unwrap() = Some(error);
        store
    }

    pub fn stored(&self) -> Vec<ExtractionResult> {
        self.results.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }
}

impl SnapshotStore for MockStore {
    async fn clear(&self) -> Result<u64, AppError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        let mut results = self.results.lock().unwrap();
        let removed = results.len() as u64;
        results.clear();
        Ok(removed)
    }

    async fn insert(&self, result: &ExtractionResult) -> Result<(), AppError> {
        let mut pending = self.insert_error.lock().unwrap();
        let due = pending
            .as_ref()
            .is_some_and(|(after, _)| self.inserted.load(Ordering::SeqCst) >= *after);
        if due {
            if let Some((_, e)) = pending.take() {
                return Err(e);
            }
        }
        drop(pending);

        self.inserted.fetch_add(1, Ordering::SeqCst);
        self.results.lock().unwrap().push(result.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ExtractionResult>, AppError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.list_error.lock().unwrap().take() {
            return Err(e);
        }
        let mut results = self.results.lock().unwrap().clone();
        results.sort_by_key(|r| r.fetched_at);
        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock run reporter that records event labels.
#[derive(Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl RunReporter for MockReporter {
    fn report(&self, event: RunEvent<'_>) {
        let label = match &event {
            RunEvent::Started { .. } => "Started",
            RunEvent::StoreCleared { .. } => "StoreCleared",
            RunEvent::TargetFetched { .. } => "TargetFetched",
            RunEvent::Completed { .. } => "Completed",
            RunEvent::Failed { .. } => "Failed",
            RunEvent::Skipped => "Skipped",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Two-target catalog: a GET listing and a POST search with mixed fields.
pub fn test_catalog() -> Arc<Catalog> {
    let targets = vec![
        Target::new("cities", HttpMethod::Get, CITIES_URL, vec![]).unwrap(),
        Target::new(
            "home & search",
            HttpMethod::Post,
            SEARCH_URL,
            vec![
                FormField::enabled("from_city", "23"),
                FormField::disabled("to_city", "29"),
                FormField::enabled("tripDate", "2025-01-06"),
            ],
        )
        .unwrap(),
    ];
    let info = serde_json::json!({"name": "test catalog", "schema": "v2.1"});
    Arc::new(Catalog::new(info, targets).unwrap())
}

/// One result per catalog target with strictly increasing `fetched_at`.
pub fn make_test_results(catalog: &Catalog) -> Vec<ExtractionResult> {
    let base = Utc::now();
    catalog
        .targets()
        .iter()
        .enumerate()
        .map(|(i, target)| {
            ExtractionResult::new(
                target,
                parse_body(&format!(r#"{{"index": {i}}}"#)),
                base + TimeDelta::milliseconds(i as i64),
            )
        })
        .collect()
}
