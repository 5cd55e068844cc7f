// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - HTTP Dispatch
 * Transport seam for the scan engine. The engine only needs a blocking
 * request/response exchange honouring the per-rule redirect flag; pooling,
 * TLS and redirect mechanics belong to the collaborator behind the trait.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::time::Duration;

use crate::errors::{Result, ScannerError};
use crate::protocol::Request;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_REDIRECTS: usize = 5;
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Raw transport response: status, headers as received (order preserved,
/// duplicates intact), body bytes. Normalisation happens in
/// [`crate::protocol::Response::setup`].
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// The engine's transport contract. One exchange per call; implementations
/// own connection reuse and redirect following (bounded when the flag is
/// set, none otherwise).
pub trait HttpDispatch: Send + Sync {
    fn dispatch(&self, request: &Request, follow_redirects: bool) -> Result<RawResponse>;
}

/// Transport settings for the default dispatcher.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub max_redirects: usize,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Default blocking reqwest transport. Redirect policy is per-client in
/// reqwest, so two clients are built up front and selected per rule.
pub struct ReqwestDispatch {
    follow: reqwest::blocking::Client,
    no_follow: reqwest::blocking::Client,
}

impl ReqwestDispatch {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let build = |policy: reqwest::redirect::Policy| {
            reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(settings.timeout_secs))
                .user_agent(settings.user_agent.clone())
                .redirect(policy)
                .build()
                .map_err(|e| ScannerError::Transport(e.to_string()))
        };
        Ok(Self {
            follow: build(reqwest::redirect::Policy::limited(settings.max_redirects))?,
            no_follow: build(reqwest::redirect::Policy::none())?,
        })
    }
}

impl HttpDispatch for ReqwestDispatch {
    fn dispatch(&self, request: &Request, follow_redirects: bool) -> Result<RawResponse> {
        let client = if follow_redirects {
            &self.follow
        } else {
            &self.no_follow
        };
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| ScannerError::InvalidRequest(e.to_string()))?;
        let mut builder = client
            .request(method, request.url.full.clone())
            .header("connection", "close");
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }
        let response = builder
            .send()
            .map_err(|e| ScannerError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .bytes()
            .map_err(|e| ScannerError::Transport(e.to_string()))?
            .to_vec();
        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
