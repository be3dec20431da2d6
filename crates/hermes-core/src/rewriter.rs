//! Request rewriting for non-GET targets.
//!
//! A browser can only navigate with `GET`. To reach endpoints that expect a
//! form submission, every outgoing request of a session is shown to the
//! [`RequestRewriter`], which decides whether it continues untouched or with
//! a new method, body and content type. The rewriter is pure; applying the
//! decision is up to the browser adapter.

use std::sync::Arc;

use url::form_urlencoded;

use crate::catalog::{Catalog, FormField, HttpMethod, Target};

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// An outgoing request as seen by the interception hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

/// Replacement values for an intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOverrides {
    pub method: HttpMethod,
    /// Always present for a rewrite; empty when no field is enabled.
    pub body: String,
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteDecision {
    /// Let the request proceed exactly as issued.
    Continue,
    /// Proceed with the given overrides.
    Rewrite(RequestOverrides),
}

/// Matches intercepted requests against the catalog.
#[derive(Debug, Clone)]
pub struct RequestRewriter {
    catalog: Arc<Catalog>,
}

impl RequestRewriter {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// Decide what happens to `request`.
    pub fn decide(&self, request: &RequestDescriptor) -> RewriteDecision {
        match self.catalog.find_by_url(&request.url) {
            Some(target) if target.method() != HttpMethod::Get => {
                RewriteDecision::Rewrite(overrides_for(target, &request.headers))
            }
            _ => RewriteDecision::Continue,
        }
    }
}

fn overrides_for(target: &Target, headers: &[(String, String)]) -> RequestOverrides {
    let mut headers: Vec<(String, String)> = headers
        .iter()
        .filter(|(name, _)| !name.eq_ignore_ascii_case("content-type"))
        .cloned()
        .collect();
    headers.push(("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string()));

    RequestOverrides {
        method: target.method(),
        body: encode_form(target.fields()),
        headers,
    }
}

/// Serialize the enabled fields as `key=value` pairs joined by `&`.
pub fn encode_form(fields: &[FormField]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for field in fields.iter().filter(|f| f.enabled) {
        serializer.append_pair(&field.key, &field.value);
    }
    serializer.finish()
}
