//! Cache key construction.
//!
//! Keys have the shape `namespace:v<version>:<16 hex chars>`, where the hex
//! suffix is the seahash of the canonical parameter string. Parameters are
//! held in a `BTreeMap`, so two maps with the same entries always serialize
//! identically regardless of insertion order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Scalar parameter value. Nested structures must be flattened by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    fn canonical(&self) -> String {
        match self {
            ParamValue::Bool(b) => b.to_string(),
            ParamValue::Int(i) => i.to_string(),
            ParamValue::Float(f) => format!("{:?}", f),
            // Quoted so separators inside values cannot collide with the framing
            ParamValue::Str(s) => quote(s),
        }
    }

    /// Value as it would appear in a provider query string.
    pub fn as_query_value(&self) -> String {
        match self {
            ParamValue::Str(s) => s.clone(),
            ParamValue::Float(f) => f.to_string(),
            other => other.canonical(),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.as_query_value())
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Str(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Str(s)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Int(i)
    }
}

impl From<i32> for ParamValue {
    fn from(i: i32) -> Self {
        ParamValue::Int(i as i64)
    }
}

impl From<u32> for ParamValue {
    fn from(i: u32) -> Self {
        ParamValue::Int(i as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(f: f64) -> Self {
        ParamValue::Float(f)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

pub type Params = BTreeMap<String, ParamValue>;

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

/// Opaque cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        CacheKey(s.to_string())
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        CacheKey(s)
    }
}

/// Canonical `"name"=value&...` rendering in lexicographic name order.
pub fn canonical_params(params: &Params) -> String {
    params
        .iter()
        .map(|(name, value)| format!("{}={}", quote(name), value.canonical()))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build a deterministic key for `(namespace, params)` under `version`.
pub fn build_key(namespace: &str, version: u32, params: &Params) -> CacheKey {
    let digest = seahash::hash(canonical_params(params).as_bytes());
    CacheKey(format!("{}:v{}:{:016x}", namespace, version, digest))
}

/// Key builder bound to one schema version.
#[derive(Debug, Clone, Copy)]
pub struct KeyBuilder {
    version: u32,
}

impl KeyBuilder {
    pub fn new(version: u32) -> Self {
        Self { version }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn build(&self, namespace: &str, params: &Params) -> CacheKey {
        build_key(namespace, self.version, params)
    }
}

impl Default for KeyBuilder {
    fn default() -> Self {
        Self::new(1)
    }
}
