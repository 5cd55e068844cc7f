// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Set Resolution
 * Evaluates a PoC's `set` block into the initial binding environment.
 * Entries resolve in ascending key order, so later entries may reference
 * earlier ones; an entry that fails to resolve is skipped with a warning
 * rather than failing the scan.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::collections::BTreeMap;

use cel_interpreter::Value;
use tracing::warn;

use crate::expression::{string_value, CelEnv};
use crate::reverse::{Reverse, ReverseConfig};

/// A named value visible to template substitution and expressions.
/// Byte-slice results are normalised to strings at this boundary.
#[derive(Debug, Clone)]
pub enum SetValue {
    Int(i64),
    Str(String),
    Reverse(Reverse),
}

impl SetValue {
    /// Stringified form used by template substitution. A reverse binding
    /// renders as its probe URL; its other fields are reachable through
    /// dotted template keys.
    pub fn format(&self) -> String {
        match self {
            SetValue::Int(i) => i.to_string(),
            SetValue::Str(s) => s.clone(),
            SetValue::Reverse(rev) => rev.url.clone(),
        }
    }

    pub(crate) fn to_value(&self) -> Value {
        match self {
            SetValue::Int(i) => Value::Int(*i),
            SetValue::Str(s) => string_value(s),
            SetValue::Reverse(rev) => rev.to_value(),
        }
    }
}

/// Resolve the `set` block into concrete bindings. Empty entries are
/// skipped; the literal `newReverse()` mints a callback handle; anything
/// else is compiled and evaluated under the partial environment built so
/// far. Failures drop the binding with a warning.
pub fn resolve_set(
    env: &CelEnv,
    set: &BTreeMap<String, String>,
    reverse: Option<&ReverseConfig>,
) -> BTreeMap<String, SetValue> {
    let mut bindings: BTreeMap<String, SetValue> = BTreeMap::new();
    for (key, rhs) in set {
        let rhs = rhs.trim();
        if rhs.is_empty() {
            continue;
        }
        if rhs == "newReverse()" {
            bindings.insert(key.clone(), SetValue::Reverse(Reverse::new(reverse)));
            continue;
        }
        let program = match CelEnv::compile(rhs) {
            Ok(program) => program,
            Err(e) => {
                warn!("skipping set entry `{}`: {}", key, e);
                continue;
            }
        };
        let vars: Vec<(String, Value)> = bindings
            .iter()
            .map(|(name, value)| (name.clone(), value.to_value()))
            .collect();
        match env.eval(&program, rhs, &vars) {
            Ok(value) => {
                bindings.insert(key.clone(), convert(value));
            }
            Err(e) => warn!("skipping set entry `{}`: {}", key, e),
        }
    }
    bindings
}

fn convert(value: Value) -> SetValue {
    match value {
        Value::Int(i) => SetValue::Int(i),
        Value::Bytes(b) => SetValue::Str(String::from_utf8_lossy(&b).into_owned()),
        Value::String(s) => SetValue::Str(s.as_str().to_string()),
        Value::Bool(b) => SetValue::Str(b.to_string()),
        Value::Float(f) => SetValue::Str(f.to_string()),
        other => SetValue::Str(format!("{other:?}")),
    }
}
