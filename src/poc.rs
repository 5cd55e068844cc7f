// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - PoC Document Model
 * A PoC is portable data describing HTTP probes and predicates; the scan
 * engine is the interpreter that gives it meaning. Accepted in YAML or
 * JSON, content-equivalent.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, ScannerError};

/// One PoC document: variable declarations plus the verification logic,
/// carried either as a flat rules list (AND) or named groups (OR across
/// groups). `BTreeMap` keeps `set` resolution and group iteration in
/// ascending key order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PocEvent {
    pub name: String,
    pub set: BTreeMap<String, String>,
    pub rules: Vec<PocRule>,
    pub groups: BTreeMap<String, Vec<PocRule>>,
}

/// A single HTTP probe plus its verdict source: either a regex `search`
/// with named captures, or a boolean `expression`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PocRule {
    pub method: String,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub follow_redirects: bool,
    pub search: String,
    pub expression: String,
}

impl PocEvent {
    pub fn from_yaml(code: &str) -> Result<Self> {
        serde_yaml::from_str(code).map_err(|e| ScannerError::Decode(e.to_string()))
    }

    pub fn from_json(code: &str) -> Result<Self> {
        serde_json::from_str(code).map_err(|e| ScannerError::Decode(e.to_string()))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| ScannerError::Decode(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ScannerError::Decode(e.to_string()))
    }

    /// Structural invariants: the PoC must carry verification logic, and
    /// every rule needs a search pattern or an expression.
    pub fn validate(&self) -> Result<()> {
        if self.rules.is_empty() && self.groups.is_empty() {
            return Err(self.invalid("no rules or groups"));
        }
        for rule in self.all_rules() {
            if rule.search.trim().is_empty() && rule.expression.trim().is_empty() {
                return Err(self.invalid("rule has neither search nor expression"));
            }
        }
        Ok(())
    }

    /// Every rule in the document, list first, then groups in key order.
    pub fn all_rules(&self) -> impl Iterator<Item = &PocRule> {
        self.rules.iter().chain(self.groups.values().flatten())
    }

    fn invalid(&self, reason: &str) -> ScannerError {
        ScannerError::InvalidPoc {
            name: self.name.clone(),
            reason: reason.to_string(),
        }
    }
}
