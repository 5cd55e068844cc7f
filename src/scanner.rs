// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Rule-Driven Scan Engine
 * Drives one PoC against one target: substitute templates, dispatch the
 * probe, wrap the response, then either regex-extract named captures or
 * evaluate the rule expression. A rules list verifies with AND semantics,
 * groups with OR across groups; both short-circuit.
 *
 * One scanner scans one target on one logical thread; rules execute
 * strictly in order and a scanner is not safe for concurrent use.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use cel_interpreter::{Program, Value};
use regex::Regex;
use tracing::debug;

use crate::errors::{Result, ScannerError};
use crate::expression::CelEnv;
use crate::http_client::{HttpDispatch, HttpSettings, ReqwestDispatch};
use crate::poc::{PocEvent, PocRule};
use crate::protocol::{Request, Response};
use crate::reverse::ReverseConfig;
use crate::set::{self, SetValue};
use crate::template;

/// Scanner construction options. The reverse configuration must be present
/// here for `newReverse()` to mint live handles, since the `set` block
/// resolves at construction time.
#[derive(Default)]
pub struct ScannerConfig {
    pub reverse: Option<ReverseConfig>,
    pub http: HttpSettings,
    /// Transport override; tests inject scripted dispatchers through this.
    pub dispatch: Option<Arc<dyn HttpDispatch>>,
}

/// Scans one target with one PoC. Construction compiles every expression
/// and search pattern reachable from the PoC and resolves the `set` block;
/// malformed predicates fail here rather than mid-scan.
pub struct Scanner {
    poc: PocEvent,
    env: CelEnv,
    bindings: BTreeMap<String, SetValue>,
    programs: HashMap<String, Program>,
    searches: HashMap<String, Regex>,
    dispatch: Arc<dyn HttpDispatch>,
}

impl Scanner {
    pub fn new(poc: &PocEvent) -> Result<Self> {
        Self::with_config(poc, ScannerConfig::default())
    }

    pub fn with_config(poc: &PocEvent, config: ScannerConfig) -> Result<Self> {
        poc.validate()?;
        let dispatch: Arc<dyn HttpDispatch> = match config.dispatch {
            Some(dispatch) => dispatch,
            None => Arc::new(ReqwestDispatch::new(&config.http)?),
        };
        let env = CelEnv::new(dispatch.clone(), config.reverse.clone());

        let mut programs = HashMap::new();
        let mut searches = HashMap::new();
        for rule in poc.all_rules() {
            let search = rule.search.trim();
            if !search.is_empty() {
                if !searches.contains_key(search) {
                    searches.insert(search.to_string(), compile_search(search)?);
                }
                continue;
            }
            let expression = rule.expression.trim();
            if !programs.contains_key(expression) {
                programs.insert(expression.to_string(), CelEnv::compile(expression)?);
            }
        }

        let bindings = set::resolve_set(&env, &poc.set, config.reverse.as_ref());
        Ok(Self {
            poc: poc.clone(),
            env,
            bindings,
            programs,
            searches,
            dispatch,
        })
    }

    /// Engine-level bindings: the resolved `set` block plus any named
    /// captures extracted by `search` rules so far.
    pub fn bindings(&self) -> &BTreeMap<String, SetValue> {
        &self.bindings
    }

    /// Run the PoC's own verification logic: the rules list first, then
    /// the groups if the list did not verify.
    pub fn run(&mut self, target: &str) -> Result<bool> {
        let rules = self.poc.rules.clone();
        if !rules.is_empty() && self.start(target, &rules)? {
            return Ok(true);
        }
        let groups = self.poc.groups.clone();
        if !groups.is_empty() {
            return self.start_by_groups(target, &groups);
        }
        Ok(false)
    }

    /// AND semantics: every rule must verify; stops at the first false
    /// verdict or error. An empty list verifies false.
    pub fn start(&mut self, target: &str, rules: &[PocRule]) -> Result<bool> {
        let mut verify = false;
        for rule in rules {
            verify = self.scan(target, rule)?;
            if !verify {
                return Ok(false);
            }
        }
        Ok(verify)
    }

    /// OR across groups, AND within each group. Groups run in ascending
    /// key order; the first fully-verifying group wins and no later group
    /// is executed. Hard errors inside a group surface immediately.
    pub fn start_by_groups(
        &mut self,
        target: &str,
        groups: &BTreeMap<String, Vec<PocRule>>,
    ) -> Result<bool> {
        for (name, rules) in groups {
            debug!("scanning group `{}`", name);
            if self.start(target, rules)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// One rule: substitute, dispatch, wrap, then search-extract or
    /// evaluate. Per-rule request/response objects live exactly for this
    /// call and are dropped on every path.
    fn scan(&mut self, target: &str, rule: &PocRule) -> Result<bool> {
        let rule = template::substitute_rule(rule, &self.bindings);
        let url = join_target(target, &rule.path);
        let request = Request::setup(&rule.method, &url, &rule.body, &rule.headers)?;
        debug!("probe {} {}", request.method, request.url.full);
        let raw = self.dispatch.dispatch(&request, rule.follow_redirects)?;
        let response = Response::setup(raw, &request);

        let search = rule.search.trim();
        if !search.is_empty() {
            return self.search_extract(search, &response.body_string);
        }

        let expression = rule.expression.trim();
        if !self.programs.contains_key(expression) {
            self.programs
                .insert(expression.to_string(), CelEnv::compile(expression)?);
        }
        let program = &self.programs[expression];
        let mut vars: Vec<(String, Value)> = self
            .bindings
            .iter()
            .map(|(name, value)| (name.clone(), value.to_value()))
            .collect();
        vars.push(("request".to_string(), request.to_value()));
        vars.push(("response".to_string(), response.to_value()));
        self.env.eval_bool(program, expression, &vars)
    }

    /// A matching search with at least one capture group is a true
    /// verdict; its named captures persist into the engine bindings for
    /// all subsequent rules. A miss is a false verdict, never an error.
    fn search_extract(&mut self, pattern: &str, body: &str) -> Result<bool> {
        if !self.searches.contains_key(pattern) {
            self.searches
                .insert(pattern.to_string(), compile_search(pattern)?);
        }
        let re = self.searches[pattern].clone();
        match re.captures(body) {
            Some(caps) if caps.len() > 1 => {
                for name in re.capture_names().flatten() {
                    if let Some(m) = caps.name(name) {
                        debug!("search extracted `{}`", name);
                        self.bindings
                            .insert(name.to_string(), SetValue::Str(m.as_str().to_string()));
                    }
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

fn compile_search(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| ScannerError::InvalidSearch {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Append the rule path to the target as a relative reference, preserving
/// the target's scheme, host, port and base path.
fn join_target(target: &str, path: &str) -> String {
    let target = target.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        target.to_string()
    } else {
        format!("{target}/{path}")
    }
}
