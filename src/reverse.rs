// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Reverse Callback (Out-of-Band) Support
 * Blind vulnerabilities are detected by planting a unique probe hostname
 * and asking a callback collector whether any DNS or HTTP interaction was
 * recorded for its flag. Only the collector's query contract lives here;
 * the collector itself is an external service.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use cel_interpreter::Value;
use tracing::debug;

use crate::encoding::contains_bytes;
use crate::expression::{object, string_value};
use crate::http_client::HttpDispatch;
use crate::protocol::Request;
use crate::random;

/// Default collector records endpoint (ceye.io API).
pub const DEFAULT_COLLECTOR_API: &str = "http://api.ceye.io/v1/records";

/// A collector body containing this marker means no interaction was seen.
const EMPTY_RECORDS: &[u8] = br#""data": []"#;

const FLAG_LEN: usize = 8;

/// Collector configuration, injected into the scanner. `domain` is the
/// callback zone probe hostnames are minted under; `token` authorises
/// record queries; `api` is the records endpoint (overridable for tests).
#[derive(Debug, Clone)]
pub struct ReverseConfig {
    pub domain: String,
    pub token: String,
    pub api: String,
}

impl ReverseConfig {
    pub fn new(domain: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            token: token.into(),
            api: DEFAULT_COLLECTOR_API.to_string(),
        }
    }
}

/// Handle to one out-of-band callback channel. Without a configured
/// collector this is the empty sentinel, whose `wait` is always false.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reverse {
    pub flag: String,
    pub url: String,
    pub domain: String,
    pub is_domain_name_server: bool,
}

impl Reverse {
    pub fn new(config: Option<&ReverseConfig>) -> Self {
        match config {
            Some(cfg) if !cfg.domain.is_empty() => {
                let flag = random::rand_letter_numbers(FLAG_LEN);
                let domain = format!("{}.{}", flag, cfg.domain);
                Self {
                    url: format!("http://{domain}"),
                    flag,
                    domain,
                    is_domain_name_server: false,
                }
            }
            _ => Self::default(),
        }
    }

    pub(crate) fn to_value(&self) -> Value {
        object([
            ("flag", string_value(&self.flag)),
            ("url", string_value(&self.url)),
            ("domain", string_value(&self.domain)),
            (
                "is_domain_name_server",
                Value::Bool(self.is_domain_name_server),
            ),
        ])
    }
}

/// Sleep `timeout` seconds, then ask the collector whether a DNS or HTTP
/// interaction was recorded for `flag`. Collector failures degrade to
/// "nothing seen".
pub(crate) fn verify_reverse(
    flag: &str,
    timeout: i64,
    config: Option<&ReverseConfig>,
    dispatch: &dyn HttpDispatch,
) -> bool {
    let Some(cfg) = config else {
        return false;
    };
    if cfg.token.is_empty() || flag.is_empty() {
        return false;
    }
    if timeout > 0 {
        thread::sleep(Duration::from_secs(timeout as u64));
    }
    ["dns", "http"].iter().any(|kind| {
        let url = format!(
            "{}?token={}&type={}&filter={}",
            cfg.api, cfg.token, kind, flag
        );
        record_seen(dispatch, &url)
    })
}

fn record_seen(dispatch: &dyn HttpDispatch, url: &str) -> bool {
    let request = match Request::setup("GET", url, "", &BTreeMap::new()) {
        Ok(request) => request,
        Err(_) => return false,
    };
    match dispatch.dispatch(&request, false) {
        Ok(raw) => !contains_bytes(&raw.body, EMPTY_RECORDS),
        Err(e) => {
            debug!("collector query failed: {}", e);
            false
        }
    }
}
