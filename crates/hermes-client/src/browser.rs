use std::path::PathBuf;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, HeaderEntry, RequestPattern,
    RequestStage,
};
use chromiumoxide::{BrowserConfig, Page};
use futures::StreamExt;
use hermes_core::error::AppError;
use hermes_core::rewriter::{RequestDescriptor, RequestRewriter, RewriteDecision};
use hermes_core::traits::{Browser, BrowserSession};
use tokio::task::JoinHandle;

const BODY_TEXT_SCRIPT: &str = "document.body ? document.body.innerText : ''";

/// Headless Chromium driven over the Chrome DevTools Protocol.
///
/// Every call to [`Browser::open_session`] launches a fresh Chromium process
/// with the CDP `Fetch` domain enabled, so each outgoing request pauses until
/// the session's [`RequestRewriter`] has decided how it should continue.
///
/// # Example
///
/// ```rust,no_run
/// use hermes_client::ChromiumBrowser;
/// use hermes_core::{Browser, BrowserSession, Catalog, RequestRewriter};
/// use std::sync::Arc;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let catalog = Arc::new(Catalog::builtin()?);
/// let browser = ChromiumBrowser::new();
/// let mut session = browser.open_session(RequestRewriter::new(catalog)).await?;
/// session.navigate("https://example.com").await?;
/// println!("{}", session.body_text().await?);
/// session.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ChromiumBrowser {
    timeout: Duration,
    executable: Option<PathBuf>,
}

impl ChromiumBrowser {
    /// Browser with a **30 s** navigation timeout and automatic binary lookup.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            executable: find_chrome_binary(),
        }
    }

    /// Use this Chrome/Chromium binary instead of searching for one.
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn config(&self) -> Result<BrowserConfig, AppError> {
        let mut builder = BrowserConfig::builder();
        builder = builder.no_sandbox().disable_default_args();

        if let Some(bin) = &self.executable {
            tracing::debug!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--disable-translate")
            .arg("--no-first-run")
            .build()
            .map_err(|e| AppError::BrowserError(format!("Browser config error: {e}")))
    }
}

impl Default for ChromiumBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl Browser for ChromiumBrowser {
    type Session = ChromiumSession;

    async fn open_session(&self, rewriter: RequestRewriter) -> Result<ChromiumSession, AppError> {
        let (browser, mut handler) = chromiumoxide::Browser::launch(self.config()?)
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        match intercepted_page(&browser, rewriter).await {
            Ok((page, interceptor)) => Ok(ChromiumSession {
                browser,
                page,
                handler,
                interceptor,
                timeout: self.timeout,
            }),
            Err(e) => {
                // Dropping the browser kills the child process.
                drop(browser);
                handler.abort();
                Err(e)
            }
        }
    }
}

/// Open a blank page and start routing its paused requests through `rewriter`.
async fn intercepted_page(
    browser: &chromiumoxide::Browser,
    rewriter: RequestRewriter,
) -> Result<(Page, JoinHandle<()>), AppError> {
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| AppError::BrowserError(format!("Failed to open page: {e}")))?;

    // Subscribe before enabling so no paused request is missed.
    let mut paused = page
        .event_listener::<EventRequestPaused>()
        .await
        .map_err(|e| AppError::BrowserError(format!("Failed to listen for requests: {e}")))?;

    let pattern = RequestPattern::builder()
        .url_pattern("*")
        .request_stage(RequestStage::Request)
        .build();
    page.execute(EnableParams::builder().pattern(pattern).build())
        .await
        .map_err(|e| AppError::BrowserError(format!("Failed to enable interception: {e}")))?;

    let intercepting = page.clone();
    let interceptor = tokio::spawn(async move {
        while let Some(event) = paused.next().await {
            let params = match continue_params(&rewriter, &event) {
                Ok(params) => params,
                Err(e) => {
                    tracing::warn!(url = %event.request.url, error = %e, "Falling back to unmodified request");
                    ContinueRequestParams::new(event.request_id.clone())
                }
            };
            if let Err(e) = intercepting.execute(params).await {
                tracing::warn!(url = %event.request.url, error = %e, "Failed to continue request");
            }
        }
    });

    Ok((page, interceptor))
}

/// Build the `Fetch.continueRequest` call for a paused request.
fn continue_params(
    rewriter: &RequestRewriter,
    event: &EventRequestPaused,
) -> Result<ContinueRequestParams, AppError> {
    let descriptor = RequestDescriptor {
        method: event.request.method.clone(),
        url: event.request.url.clone(),
        headers: header_pairs(event.request.headers.inner()),
    };

    match rewriter.decide(&descriptor) {
        RewriteDecision::Continue => Ok(ContinueRequestParams::new(event.request_id.clone())),
        RewriteDecision::Rewrite(overrides) => {
            tracing::debug!(
                url = %descriptor.url,
                method = %overrides.method,
                "Rewriting intercepted request"
            );
            ContinueRequestParams::builder()
                .request_id(event.request_id.clone())
                .method(overrides.method.as_str())
                .post_data(BASE64.encode(overrides.body.as_bytes()))
                .headers(
                    overrides
                        .headers
                        .into_iter()
                        .map(|(name, value)| HeaderEntry::new(name, value)),
                )
                .build()
                .map_err(AppError::BrowserError)
        }
    }
}

/// Flatten a CDP `Headers` object into name/value pairs.
fn header_pairs(headers: &serde_json::Value) -> Vec<(String, String)> {
    let Some(map) = headers.as_object() else {
        return Vec::new();
    };
    map.iter()
        .map(|(name, value)| {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (name.clone(), value)
        })
        .collect()
}

/// Tries to locate the real Chrome/Chromium binary.
///
/// On systems where Chromium is installed via **snap**, the wrapper at
/// `/snap/bin/chromium` strips unknown CLI flags, breaking headless mode.
/// `CHROME_BIN` wins if it points at an existing file; otherwise the real
/// snap binary and well-known system paths are tried. `None` lets
/// `chromiumoxide` do its own lookup.
pub fn find_chrome_binary() -> Option<PathBuf> {
    let candidates: &[&str] = &[
        "/snap/chromium/current/usr/lib/chromium-browser/chrome",
        "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ];

    if let Ok(p) = std::env::var("CHROME_BIN") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    candidates.iter().map(PathBuf::from).find(|p| p.exists())
}

/// One Chromium process with a single intercepted tab.
pub struct ChromiumSession {
    browser: chromiumoxide::Browser,
    page: Page,
    handler: JoinHandle<()>,
    interceptor: JoinHandle<()>,
    timeout: Duration,
}

impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> Result<(), AppError> {
        match tokio::time::timeout(self.timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(AppError::NavigationError {
                url: url.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(AppError::Timeout(self.timeout.as_secs())),
        }
    }

    async fn body_text(&mut self) -> Result<String, AppError> {
        let result = self
            .page
            .evaluate(BODY_TEXT_SCRIPT)
            .await
            .map_err(|e| AppError::EvaluationError(e.to_string()))?;
        result
            .into_value::<String>()
            .map_err(|e| AppError::EvaluationError(format!("Body text was not a string: {e}")))
    }

    async fn close(mut self) -> Result<(), AppError> {
        self.interceptor.abort();

        let closed = self
            .browser
            .close()
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to close browser: {e}")));
        if closed.is_ok() {
            if let Err(e) = self.browser.wait().await {
                tracing::warn!(error = %e, "Browser process did not exit cleanly");
            }
        }

        self.handler.abort();
        closed.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_core::testutil::{CITIES_URL, SEARCH_URL, test_catalog};
    use serde_json::json;

    fn paused(method: &str, url: &str) -> EventRequestPaused {
        serde_json::from_value(json!({
            "requestId": "interception-1",
            "frameId": "frame-1",
            "resourceType": "Document",
            "request": {
                "url": url,
                "method": method,
                "headers": {
                    "Accept": "text/html",
                    "content-type": "text/plain"
                },
                "initialPriority": "VeryHigh",
                "referrerPolicy": "strict-origin-when-cross-origin"
            }
        }))
        .unwrap()
    }

    /// `Fetch.continueRequest` parameters as they go over the wire.
    fn wire(params: &ContinueRequestParams) -> serde_json::Value {
        serde_json::to_value(params).unwrap()
    }

    #[test]
    fn test_get_and_unmatched_requests_continue_untouched() {
        let rewriter = RequestRewriter::new(test_catalog());

        for url in [CITIES_URL, "https://cdn.example.net/app.js"] {
            let params = continue_params(&rewriter, &paused("GET", url)).unwrap();
            let sent = wire(&params);
            assert_eq!(sent["requestId"], "interception-1");
            assert!(sent.get("method").is_none(), "{url}");
            assert!(sent.get("postData").is_none(), "{url}");
            assert!(sent.get("headers").is_none(), "{url}");
        }
    }

    #[test]
    fn test_post_target_is_rewritten_to_form_submission() {
        let rewriter = RequestRewriter::new(test_catalog());

        let params = continue_params(&rewriter, &paused("GET", SEARCH_URL)).unwrap();
        let sent = wire(&params);

        assert_eq!(sent["requestId"], "interception-1");
        assert_eq!(sent["method"], "POST");

        let post_data = BASE64.decode(sent["postData"].as_str().unwrap()).unwrap();
        assert_eq!(
            String::from_utf8(post_data).unwrap(),
            "from_city=23&tripDate=2025-01-06"
        );

        let headers = sent["headers"].as_array().unwrap();
        let content_types: Vec<_> = headers
            .iter()
            .filter(|h| h["name"].as_str().unwrap().eq_ignore_ascii_case("content-type"))
            .collect();
        assert_eq!(content_types.len(), 1);
        assert_eq!(content_types[0]["name"], "Content-Type");
        assert_eq!(content_types[0]["value"], "application/x-www-form-urlencoded");
        assert!(
            headers
                .iter()
                .any(|h| h["name"] == "Accept" && h["value"] == "text/html")
        );
    }

    #[test]
    fn test_header_pairs_flattens_object() {
        let headers = json!({
            "Accept": "text/html",
            "Upgrade-Insecure-Requests": 1
        });
        let mut pairs = header_pairs(&headers);
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("Accept".to_string(), "text/html".to_string()),
                ("Upgrade-Insecure-Requests".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_header_pairs_non_object_is_empty() {
        assert!(header_pairs(&json!(null)).is_empty());
        assert!(header_pairs(&json!(["Accept"])).is_empty());
    }

    #[test]
    fn test_with_executable_overrides_lookup() {
        let browser = ChromiumBrowser::with_timeout(Duration::from_secs(5))
            .with_executable("/opt/chrome/chrome");
        assert_eq!(browser.timeout(), Duration::from_secs(5));
        assert_eq!(
            browser.executable.as_deref(),
            Some(std::path::Path::new("/opt/chrome/chrome"))
        );
    }
}
