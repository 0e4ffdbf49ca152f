//! Deterministic cache key derivation.
//!
//! A key is `<namespace><operation>` or `<namespace><operation>:<params>`,
//! where `<params>` is JSON with object members sorted by name at every
//! depth, so equivalent parameter sets always produce the same key.

use crate::identity::Namespace;
use serde_json::Value;
use std::fmt;

/// Separator between the operation name and its canonical parameters
pub const PARAMS_DELIMITER: char = ':';

/// Opaque cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Build the key for `operation` with optional parameters under `namespace`
pub fn generate_key(namespace: &Namespace, operation: &str, params: Option<&Value>) -> CacheKey {
    let logical = match params {
        Some(params) if !is_empty_params(params) => {
            format!("{operation}{PARAMS_DELIMITER}{}", canonicalize(params))
        }
        _ => operation.to_string(),
    };
    CacheKey(format!("{}{}", namespace.prefix(), logical))
}

fn is_empty_params(params: &Value) -> bool {
    match params {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Serialize `value` as compact JSON with object members sorted by name
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut members: Vec<(&String, &Value)> = map.iter().collect();
            members.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (name, member)) in members.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_scalar(&Value::String(name.clone()), out);
                out.push(':');
                write_canonical(member, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => write_scalar(scalar, out),
    }
}

fn write_scalar(value: &Value, out: &mut String) {
    // Display on Value renders compact JSON, strings escaped
    out.push_str(&value.to_string());
}
