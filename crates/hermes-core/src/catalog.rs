//! The target catalog: which endpoints a run visits, in which order, and how
//! each one must be requested.
//!
//! Catalogs are immutable once built. They are usually loaded from a Postman
//! collection (v2.1), either the one embedded in the binary
//! ([`Catalog::builtin`]) or a file given at startup ([`Catalog::from_file`]).

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AppError;

const BUILTIN_COLLECTION: &str = include_str!("../catalogs/sponsors.postman.json");

/// HTTP verbs a target may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            _ => Err(format!("Unknown HTTP method: {s}")),
        }
    }
}

/// A named form field sent in the body of a non-GET target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub key: String,
    pub value: String,
    pub enabled: bool,
}

impl FormField {
    pub fn enabled(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            enabled: true,
        }
    }

    pub fn disabled(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            enabled: false,
        }
    }
}

/// One endpoint to extract.
///
/// `host` and `path` are the decomposed form of `url` used to match
/// intercepted browser requests; both are guaranteed to be substrings of `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    name: String,
    method: HttpMethod,
    url: String,
    host: String,
    path: String,
    fields: Vec<FormField>,
}

impl Target {
    /// Build a target, deriving `host` and `path` from the URL.
    pub fn new(
        name: impl Into<String>,
        method: HttpMethod,
        url: impl Into<String>,
        fields: Vec<FormField>,
    ) -> Result<Self, AppError> {
        let name = name.into();
        let url = url.into();
        let parsed = Url::parse(&url)
            .map_err(|e| AppError::CatalogError(format!("Target '{name}' has invalid URL: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| AppError::CatalogError(format!("Target '{name}' URL has no host")))?
            .to_string();
        let path = parsed.path().trim_start_matches('/').to_string();

        Self::with_parts(name, method, url, host, path, fields)
    }

    /// Build a target from an already decomposed URL.
    pub fn with_parts(
        name: impl Into<String>,
        method: HttpMethod,
        url: impl Into<String>,
        host: impl Into<String>,
        path: impl Into<String>,
        fields: Vec<FormField>,
    ) -> Result<Self, AppError> {
        let target = Self {
            name: name.into(),
            method,
            url: url.into(),
            host: host.into(),
            path: path.into(),
            fields,
        };

        if target.name.trim().is_empty() {
            return Err(AppError::CatalogError("Target name must not be empty".into()));
        }
        if target.host.is_empty() || !target.url.contains(&target.host) {
            return Err(AppError::CatalogError(format!(
                "Target '{}': host '{}' is not part of URL {}",
                target.name, target.host, target.url
            )));
        }
        if !target.url.contains(&target.path) {
            return Err(AppError::CatalogError(format!(
                "Target '{}': path '{}' is not part of URL {}",
                target.name, target.path, target.url
            )));
        }

        Ok(target)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    /// Enabled fields in declaration order.
    pub fn enabled_fields(&self) -> impl Iterator<Item = &FormField> {
        self.fields.iter().filter(|f| f.enabled)
    }

    /// True if an outgoing request to `url` belongs to this target.
    pub fn matches(&self, url: &str) -> bool {
        url.contains(&self.host) && url.contains(&self.path)
    }
}

/// Ordered, immutable list of targets plus the metadata served alongside
/// every snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Catalog {
    info: serde_json::Value,
    targets: Vec<Target>,
}

impl Catalog {
    /// Build a catalog. Target names must be unique and at least one target
    /// is required.
    pub fn new(info: serde_json::Value, targets: Vec<Target>) -> Result<Self, AppError> {
        if targets.is_empty() {
            return Err(AppError::CatalogError(
                "Catalog must contain at least one target".into(),
            ));
        }

        let mut seen = HashSet::new();
        for target in &targets {
            if !seen.insert(target.name()) {
                return Err(AppError::CatalogError(format!(
                    "Duplicate target name: {}",
                    target.name()
                )));
            }
        }

        Ok(Self { info, targets })
    }

    /// The collection embedded in the binary.
    pub fn builtin() -> Result<Self, AppError> {
        Self::from_postman_json(BUILTIN_COLLECTION)
    }

    /// Load a Postman v2.1 collection from disk.
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::CatalogError(format!(
                "Failed to read catalog file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_postman_json(&raw)
    }

    /// Parse a Postman v2.1 collection.
    pub fn from_postman_json(raw: &str) -> Result<Self, AppError> {
        let collection: PostmanCollection = serde_json::from_str(raw)?;
        let targets = collection
            .item
            .into_iter()
            .map(PostmanItem::into_target)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(collection.info, targets)
    }

    pub fn info(&self) -> &serde_json::Value {
        &self.info
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// First target (in catalog order) whose host and path both occur in `url`.
    pub fn find_by_url(&self, url: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.matches(url))
    }
}

// -- Postman collection v2.1 (the subset Hermes reads) --

#[derive(Deserialize)]
struct PostmanCollection {
    #[serde(default)]
    info: serde_json::Value,
    item: Vec<PostmanItem>,
}

#[derive(Deserialize)]
struct PostmanItem {
    name: String,
    request: PostmanRequest,
}

#[derive(Deserialize)]
struct PostmanRequest {
    #[serde(default = "default_method")]
    method: String,
    url: PostmanUrl,
    #[serde(default)]
    body: Option<PostmanBody>,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PostmanUrl {
    Raw(String),
    Detailed {
        raw: String,
        #[serde(default)]
        host: Option<Vec<String>>,
        #[serde(default)]
        path: Option<Vec<String>>,
    },
}

#[derive(Deserialize)]
struct PostmanBody {
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    formdata: Vec<PostmanParam>,
    #[serde(default)]
    urlencoded: Vec<PostmanParam>,
}

#[derive(Deserialize)]
struct PostmanParam {
    key: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    disabled: bool,
}

impl PostmanItem {
    fn into_target(self) -> Result<Target, AppError> {
        let method: HttpMethod = self
            .request
            .method
            .parse()
            .map_err(|e: String| AppError::CatalogError(format!("Target '{}': {e}", self.name)))?;

        let fields = match self.request.body {
            Some(body) => {
                let params = match body.mode.as_deref() {
                    Some("formdata") => body.formdata,
                    Some("urlencoded") => body.urlencoded,
                    _ => Vec::new(),
                };
                params
                    .into_iter()
                    .map(|p| FormField {
                        key: p.key,
                        value: p.value,
                        enabled: !p.disabled,
                    })
                    .collect()
            }
            None => Vec::new(),
        };

        match self.request.url {
            PostmanUrl::Raw(raw) => Target::new(self.name, method, raw, fields),
            PostmanUrl::Detailed {
                raw,
                host: Some(host),
                path: Some(path),
            } => Target::with_parts(
                self.name,
                method,
                raw,
                host.join("."),
                path.join("/"),
                fields,
            ),
            PostmanUrl::Detailed { raw, .. } => Target::new(self.name, method, raw, fields),
        }
    }
}
