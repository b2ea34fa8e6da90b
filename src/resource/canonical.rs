//! Cache key canonicalization
//!
//! A resource is identified by its scheme-stripped URI and a content hash of
//! the request body. Both are computed from the request without auth.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

use crate::error::Result;

/// Identity of a fetch: `(uri, post_hash)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub uri: String,
    pub post_hash: String,
}

impl CacheKey {
    pub fn new(uri: impl Into<String>, post_hash: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            post_hash: post_hash.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.post_hash.is_empty() {
            write!(f, "{}", self.uri)
        } else {
            write!(f, "{}#{}", self.uri, &self.post_hash[..self.post_hash.len().min(12)])
        }
    }
}

/// Strip the scheme from a URL, keeping the rest as is
pub fn uri_from_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url)?;
    let prefix = format!("{}://", parsed.scheme());
    let serialized = parsed.as_str();
    Ok(serialized
        .strip_prefix(&prefix)
        .unwrap_or(serialized)
        .to_string())
}

/// SHA-256 over the canonical JSON of a request body.
///
/// An absent or empty body hashes to the empty string.
pub fn hash_from_data(data: Option<&Value>) -> String {
    let data = match data {
        None | Some(Value::Null) => return String::new(),
        Some(Value::Object(map)) if map.is_empty() => return String::new(),
        Some(Value::Array(items)) if items.is_empty() => return String::new(),
        Some(Value::String(s)) if s.is_empty() => return String::new(),
        Some(data) => data,
    };

    let mut hasher = Sha256::new();
    hasher.update(canonical_json(data).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Serialize JSON with object keys sorted at every level
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
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
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_uri_from_url_strips_scheme() {
        assert_eq!(
            uri_from_url("https://example.org/x?y=1").unwrap(),
            "example.org/x?y=1"
        );
        assert_eq!(
            uri_from_url("http://example.org/a/b").unwrap(),
            "example.org/a/b"
        );
    }

    #[test]
    fn test_uri_from_url_rejects_garbage() {
        let err = uri_from_url("not a url").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_hash_is_order_independent() {
        let a: Value = serde_json::from_str(r#"{"q": "rust", "lang": "en", "page": {"n": 1, "size": 10}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"page": {"size": 10, "n": 1}, "lang": "en", "q": "rust"}"#).unwrap();
        assert_eq!(hash_from_data(Some(&a)), hash_from_data(Some(&b)));
        assert_eq!(hash_from_data(Some(&a)).len(), 64);
    }

    #[test]
    fn test_hash_changes_with_values() {
        let a = json!({"q": "rust"});
        let b = json!({"q": "go"});
        assert_ne!(hash_from_data(Some(&a)), hash_from_data(Some(&b)));
    }

    #[test]
    fn test_empty_bodies_hash_to_empty_string() {
        assert_eq!(hash_from_data(None), "");
        assert_eq!(hash_from_data(Some(&Value::Null)), "");
        assert_eq!(hash_from_data(Some(&json!({}))), "");
        assert_eq!(hash_from_data(Some(&json!([]))), "");
    }

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let value = json!({"b": [{"z": 1, "a": 2}], "a": "x"});
        assert_eq!(canonical_json(&value), r#"{"a":"x","b":[{"a":2,"z":1}]}"#);
    }
}
