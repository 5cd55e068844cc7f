// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Expression Environment
 * Binds a general-purpose CEL evaluator to the PoC vocabulary: the
 * built-in function set (encoding, hashing, regex, randomness, substring,
 * reverse-callback waiting) plus per-evaluation variables for `request`,
 * `response` and the resolved `set` bindings.
 *
 * Two lifecycle stages: compile (source to reusable program, errors carry
 * the offending expression) and eval (bind variables, reduce to a value).
 * Type mismatches inside built-ins are evaluation errors, never a false
 * verdict.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cel_interpreter::extractors::This;
use cel_interpreter::objects::{Key, Map};
use cel_interpreter::{Context, ExecutionError, Program, Value};
use rand::Rng;
use regex::Regex;

use crate::encoding;
use crate::errors::{Result, ScannerError};
use crate::http_client::HttpDispatch;
use crate::random;
use crate::reverse::{self, ReverseConfig};

/// Expression environment for one scanner. Holds what the built-ins need
/// beyond their arguments: the transport (for `wait`) and the collector
/// configuration.
pub struct CelEnv {
    dispatch: Arc<dyn HttpDispatch>,
    reverse: Option<ReverseConfig>,
}

impl CelEnv {
    pub fn new(dispatch: Arc<dyn HttpDispatch>, reverse: Option<ReverseConfig>) -> Self {
        Self { dispatch, reverse }
    }

    /// Compile an expression into a reusable program.
    pub fn compile(expression: &str) -> Result<Program> {
        Program::compile(expression).map_err(|e| ScannerError::Compile {
            expression: expression.to_string(),
            message: e.to_string(),
        })
    }

    /// Evaluate a compiled program under the given variables.
    pub fn eval(
        &self,
        program: &Program,
        expression: &str,
        vars: &[(String, Value)],
    ) -> Result<Value> {
        let mut ctx = Context::default();
        self.register_functions(&mut ctx);
        for (name, value) in vars {
            ctx.add_variable_from_value(name.clone(), value.clone());
        }
        program.execute(&ctx).map_err(|e| ScannerError::Evaluate {
            expression: expression.to_string(),
            message: e.to_string(),
        })
    }

    /// Evaluate and coerce to the rule verdict type.
    pub fn eval_bool(
        &self,
        program: &Program,
        expression: &str,
        vars: &[(String, Value)],
    ) -> Result<bool> {
        match self.eval(program, expression, vars)? {
            Value::Bool(b) => Ok(b),
            other => Err(ScannerError::Evaluate {
                expression: expression.to_string(),
                message: format!("expected bool result, got {other:?}"),
            }),
        }
    }

    fn register_functions(&self, ctx: &mut Context) {
        ctx.add_function(
            "contains",
            |This(this): This<Value>, needle: Value| -> std::result::Result<Value, ExecutionError> {
                match (&this, &needle) {
                    (Value::String(a), Value::String(b)) => {
                        Ok(Value::Bool(a.contains(b.as_str())))
                    }
                    _ => Err(type_error("contains", "(string, string)")),
                }
            },
        );

        ctx.add_function(
            "icontains",
            |This(this): This<Value>, needle: Value| -> std::result::Result<Value, ExecutionError> {
                match (&this, &needle) {
                    (Value::String(a), Value::String(b)) => Ok(Value::Bool(
                        a.to_lowercase().contains(&b.to_lowercase()),
                    )),
                    _ => Err(type_error("icontains", "(string, string)")),
                }
            },
        );

        ctx.add_function(
            "bcontains",
            |This(this): This<Value>, needle: Value| -> std::result::Result<Value, ExecutionError> {
                match (&this, &needle) {
                    (Value::Bytes(a), Value::Bytes(b)) => {
                        Ok(Value::Bool(encoding::contains_bytes(a, b)))
                    }
                    _ => Err(type_error("bcontains", "(bytes, bytes)")),
                }
            },
        );

        ctx.add_function(
            "match",
            |pattern: Value, text: Value| -> std::result::Result<Value, ExecutionError> {
                match (&pattern, &text) {
                    (Value::String(p), Value::String(s)) => {
                        let re = Regex::new(p).map_err(|e| function_error("match", e))?;
                        Ok(Value::Bool(re.is_match(s)))
                    }
                    _ => Err(type_error("match", "(string, string)")),
                }
            },
        );

        ctx.add_function(
            "bmatch",
            |pattern: Value, data: Value| -> std::result::Result<Value, ExecutionError> {
                match (&pattern, &data) {
                    (Value::String(p), Value::Bytes(b)) => {
                        let re = regex::bytes::Regex::new(p)
                            .map_err(|e| function_error("bmatch", e))?;
                        Ok(Value::Bool(re.is_match(b)))
                    }
                    _ => Err(type_error("bmatch", "(string, bytes)")),
                }
            },
        );

        ctx.add_function(
            "md5",
            |data: Value| -> std::result::Result<Value, ExecutionError> {
                match &data {
                    Value::String(s) => Ok(string_value(&encoding::md5_hex(s.as_bytes()))),
                    _ => Err(type_error("md5", "(string)")),
                }
            },
        );

        ctx.add_function(
            "randomInt",
            |lo: i64, hi: i64| -> std::result::Result<Value, ExecutionError> {
                if hi <= lo {
                    return Err(function_error(
                        "randomInt",
                        format!("empty range [{lo}, {hi})"),
                    ));
                }
                Ok(Value::Int(rand::rng().random_range(lo..hi)))
            },
        );

        ctx.add_function(
            "randomLowercase",
            |n: i64| -> std::result::Result<Value, ExecutionError> {
                if n < 0 {
                    return Err(function_error("randomLowercase", "negative length"));
                }
                Ok(string_value(&random::rand_lowercase(n as usize)))
            },
        );

        ctx.add_function(
            "base64",
            |data: Value| -> std::result::Result<Value, ExecutionError> {
                match &data {
                    Value::String(s) => Ok(string_value(&encoding::base64_encode(s.as_bytes()))),
                    Value::Bytes(b) => Ok(string_value(&encoding::base64_encode(b))),
                    _ => Err(type_error("base64", "(string|bytes)")),
                }
            },
        );

        ctx.add_function(
            "base64Decode",
            |data: Value| -> std::result::Result<Value, ExecutionError> {
                let decoded = match &data {
                    Value::String(s) => encoding::base64_decode(s.as_bytes()),
                    Value::Bytes(b) => encoding::base64_decode(b),
                    _ => return Err(type_error("base64Decode", "(string|bytes)")),
                };
                decoded
                    .map(|bytes| string_value(&String::from_utf8_lossy(&bytes)))
                    .map_err(|e| function_error("base64Decode", e))
            },
        );

        ctx.add_function(
            "urlencode",
            |data: Value| -> std::result::Result<Value, ExecutionError> {
                match &data {
                    Value::String(s) => Ok(string_value(&encoding::url_encode(s.as_bytes()))),
                    Value::Bytes(b) => Ok(string_value(&encoding::url_encode(b))),
                    _ => Err(type_error("urlencode", "(string|bytes)")),
                }
            },
        );

        ctx.add_function(
            "urldecode",
            |data: Value| -> std::result::Result<Value, ExecutionError> {
                let text = match &data {
                    Value::String(s) => s.as_str().to_string(),
                    Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
                    _ => return Err(type_error("urldecode", "(string|bytes)")),
                };
                encoding::url_decode(&text)
                    .map(|s| string_value(&s))
                    .map_err(|e| function_error("urldecode", e))
            },
        );

        ctx.add_function(
            "substr",
            |data: Value, start: i64, length: i64| -> std::result::Result<Value, ExecutionError> {
                let Value::String(s) = &data else {
                    return Err(type_error("substr", "(string, int, int)"));
                };
                if start < 0 || length < 0 {
                    return Err(function_error("substr", "invalid start or length"));
                }
                let chars: Vec<char> = s.chars().collect();
                let (start, length) = (start as usize, length as usize);
                if start + length > chars.len() {
                    return Err(function_error("substr", "invalid start or length"));
                }
                Ok(string_value(
                    &chars[start..start + length].iter().collect::<String>(),
                ))
            },
        );

        ctx.add_function(
            "sleep",
            |seconds: i64| -> std::result::Result<Value, ExecutionError> {
                if seconds > 0 {
                    thread::sleep(Duration::from_secs(seconds as u64));
                }
                Ok(Value::Null)
            },
        );

        let dispatch = self.dispatch.clone();
        let config = self.reverse.clone();
        ctx.add_function(
            "wait",
            move |This(this): This<Value>,
                  seconds: i64|
                  -> std::result::Result<Value, ExecutionError> {
                let Value::Map(m) = &this else {
                    return Err(type_error("wait", "(reverse, int)"));
                };
                let flag = match m.map.get(&Key::String(Arc::new("flag".to_string()))) {
                    Some(Value::String(s)) => s.as_str().to_string(),
                    _ => String::new(),
                };
                Ok(Value::Bool(reverse::verify_reverse(
                    &flag,
                    seconds,
                    config.as_ref(),
                    dispatch.as_ref(),
                )))
            },
        );
    }
}

fn type_error(function: &str, expected: &str) -> ExecutionError {
    ExecutionError::function_error(function, format!("unexpected argument types, expected {expected}"))
}

fn function_error(function: &str, error: impl ToString) -> ExecutionError {
    ExecutionError::function_error(function, error.to_string())
}

/// Build a CEL object value from named fields.
pub(crate) fn object<I>(fields: I) -> Value
where
    I: IntoIterator<Item = (&'static str, Value)>,
{
    let map: HashMap<Key, Value> = fields
        .into_iter()
        .map(|(k, v)| (Key::String(Arc::new(k.to_string())), v))
        .collect();
    Value::Map(Map { map: Arc::new(map) })
}

pub(crate) fn string_value(s: &str) -> Value {
    Value::String(Arc::new(s.to_string()))
}

pub(crate) fn bytes_value(b: &[u8]) -> Value {
    Value::Bytes(Arc::new(b.to_vec()))
}

/// Project a header/binding map into a CEL map of string to string.
pub(crate) fn string_map(entries: &BTreeMap<String, String>) -> Value {
    let map: HashMap<Key, Value> = entries
        .iter()
        .map(|(k, v)| (Key::String(Arc::new(k.clone())), string_value(v)))
        .collect();
    Value::Map(Map { map: Arc::new(map) })
}
