use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::catalog::{HttpMethod, Target};

/// Method and URL a result was requested with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestInfo {
    pub method: HttpMethod,
    pub url: String,
}

/// The outcome of extracting one target during one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub name: String,
    pub request: RequestInfo,
    /// Parsed JSON, or `{"rawText": ...}` when the page was not JSON.
    pub data: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
}

impl ExtractionResult {
    pub fn new(target: &Target, data: serde_json::Value, fetched_at: DateTime<Utc>) -> Self {
        Self {
            name: target.name().to_string(),
            request: RequestInfo {
                method: target.method(),
                url: target.url().to_string(),
            },
            data,
            fetched_at,
        }
    }

    /// True if the page body could not be parsed as JSON.
    pub fn is_raw_text(&self) -> bool {
        self.data
            .as_object()
            .is_some_and(|o| o.len() == 1 && o.get("rawText").is_some_and(|v| v.is_string()))
    }

    /// SHA-256 of the serialized data.
    pub fn data_hash(&self) -> String {
        compute_hash(&self.data.to_string())
    }
}

/// The unit served by the read API: catalog metadata plus one run's results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub info: serde_json::Value,
    pub results: Vec<ExtractionResult>,
}

impl Snapshot {
    pub fn assemble(info: serde_json::Value, results: Vec<ExtractionResult>) -> Self {
        Self { info, results }
    }
}

/// Interpret a rendered page body.
///
/// Valid JSON is returned as parsed; anything else is wrapped as
/// `{"rawText": body}`.
pub fn parse_body(body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap_or_else(|_| serde_json::json!({ "rawText": body }))
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
