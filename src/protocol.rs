// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Protocol Objects
 * Typed Request/Response/UrlParts values owned by the engine for the
 * lifetime of one rule evaluation and projected into the expression
 * environment as object values.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::collections::BTreeMap;

use cel_interpreter::Value;
use url::Url;

use crate::errors::{Result, ScannerError};
use crate::expression::{bytes_value, object, string_map, string_value};
use crate::http_client::RawResponse;

/// Decomposed URL exposed to expressions as `request.url` / `response.url`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UrlParts {
    pub full: String,
    pub scheme: String,
    pub domain: String,
    pub host: String,
    pub port: String,
    pub path: String,
    pub query: String,
    pub fragment: String,
}

impl UrlParts {
    pub fn from_url(u: &Url) -> Self {
        let domain = u.host_str().unwrap_or("").to_string();
        let host = match u.port() {
            Some(p) => format!("{domain}:{p}"),
            None => domain.clone(),
        };
        Self {
            full: u.to_string(),
            scheme: u.scheme().to_string(),
            domain,
            host,
            port: u
                .port_or_known_default()
                .map(|p| p.to_string())
                .unwrap_or_default(),
            path: u.path().to_string(),
            query: u.query().unwrap_or("").to_string(),
            fragment: u.fragment().unwrap_or("").to_string(),
        }
    }

    pub(crate) fn to_value(&self) -> Value {
        object([
            ("full", string_value(&self.full)),
            ("scheme", string_value(&self.scheme)),
            ("domain", string_value(&self.domain)),
            ("host", string_value(&self.host)),
            ("port", string_value(&self.port)),
            ("path", string_value(&self.path)),
            ("query", string_value(&self.query)),
            ("fragment", string_value(&self.fragment)),
        ])
    }
}

/// Outgoing probe. Header keys are lowercased at construction; the body is
/// owned bytes (templates are substituted before this point).
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub method: String,
    pub url: UrlParts,
    pub headers: BTreeMap<String, String>,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl Request {
    /// Build a probe request from already-substituted rule fields. An empty
    /// method defaults to GET; a malformed method or URL is fatal.
    pub fn setup(
        method: &str,
        url: &str,
        body: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<Self> {
        let parsed = Url::parse(url)?;
        let method = method.trim();
        let method = if method.is_empty() {
            "GET".to_string()
        } else {
            method.to_uppercase()
        };
        if !method.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(ScannerError::InvalidRequest(format!(
                "malformed method `{method}`"
            )));
        }
        let headers: BTreeMap<String, String> = headers
            .iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
            .collect();
        let content_type = headers.get("content-type").cloned().unwrap_or_default();
        Ok(Self {
            method,
            url: UrlParts::from_url(&parsed),
            headers,
            content_type,
            body: body.as_bytes().to_vec(),
        })
    }

    pub(crate) fn to_value(&self) -> Value {
        object([
            ("method", string_value(&self.method)),
            ("url", self.url.to_value()),
            ("headers", string_map(&self.headers)),
            ("content_type", string_value(&self.content_type)),
            ("body", bytes_value(&self.body)),
        ])
    }
}

/// Wrapped probe response. `body` carries the raw bytes, `body_string` a
/// lossy UTF-8 copy; both are always present so `bcontains`/`bmatch` and
/// `contains`/`match` each have a natural operand.
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub status: i32,
    pub content_type: String,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
    pub body_string: String,
    pub url: UrlParts,
}

impl Response {
    /// Normalise a transport response: header keys lowercased and trimmed,
    /// duplicates last-value-wins, empty names skipped.
    pub fn setup(raw: RawResponse, request: &Request) -> Self {
        let mut headers = BTreeMap::new();
        for (name, value) in &raw.headers {
            let name = name.trim().to_lowercase();
            if name.is_empty() {
                continue;
            }
            headers.insert(name, value.trim().to_string());
        }
        let content_type = headers.get("content-type").cloned().unwrap_or_default();
        let body_string = String::from_utf8_lossy(&raw.body).into_owned();
        Self {
            status: raw.status as i32,
            content_type,
            headers,
            body: raw.body,
            body_string,
            url: request.url.clone(),
        }
    }

    pub(crate) fn to_value(&self) -> Value {
        object([
            ("status", Value::Int(self.status as i64)),
            ("url", self.url.to_value()),
            ("headers", string_map(&self.headers)),
            ("content_type", string_value(&self.content_type)),
            ("body", bytes_value(&self.body)),
            ("body_string", string_value(&self.body_string)),
        ])
    }
}
