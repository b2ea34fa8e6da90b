//! Request descriptors and URL helpers

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::{Error, ErrorCode, Result};
use crate::organism::Kwargs;

/// Query or header parameters with a stable order
pub type Params = BTreeMap<String, String>;

/// Supported HTTP methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("get"),
            Self::Post => f.write_str("post"),
        }
    }
}

impl FromStr for HttpMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Self::Get),
            "post" => Ok(Self::Post),
            other => Err(Error::validation_with_code(
                ErrorCode::VALIDATION_UNSUPPORTED_METHOD,
                format!("'{}' is not a supported resource method", other),
                Some("method".to_string()),
            )),
        }
    }
}

/// Everything needed to perform one fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    pub url: String,
    #[serde(default)]
    pub headers: Params,
    /// Positional arguments that produced this request
    #[serde(default)]
    pub args: Vec<Value>,
    /// Keyword arguments that produced this request
    #[serde(default)]
    pub kwargs: Kwargs,
    /// Request body, hashed into the cache key
    #[serde(default)]
    pub data: Option<Value>,
}

impl RequestDescriptor {
    /// Copy of this request with query parameters added or overridden
    pub fn with_query_params(&self, params: &Params) -> Result<Self> {
        Ok(Self {
            url: set_query_params(&self.url, params)?,
            ..self.clone()
        })
    }

    /// Copy of this request with the named query parameters removed
    pub fn without_query_params<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        Ok(Self {
            url: remove_query_params(&self.url, keys)?,
            ..self.clone()
        })
    }

    /// Current query parameters of the URL
    pub fn query_params(&self) -> Result<Params> {
        Ok(query_params(&Url::parse(&self.url)?))
    }
}

fn query_params(url: &Url) -> Params {
    url.query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn write_query(url: &mut Url, params: &Params) {
    if params.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(params.iter());
    }
}

/// Merge parameters into the query of a URL, sorted by name
pub fn set_query_params(url: &str, params: &Params) -> Result<String> {
    let mut parsed = Url::parse(url)?;
    let mut merged = query_params(&parsed);
    merged.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
    write_query(&mut parsed, &merged);
    Ok(parsed.into())
}

/// Remove parameters from the query of a URL
pub fn remove_query_params<'a>(url: &str, keys: impl IntoIterator<Item = &'a str>) -> Result<String> {
    let mut parsed = Url::parse(url)?;
    let mut remaining = query_params(&parsed);
    for key in keys {
        remaining.remove(key);
    }
    write_query(&mut parsed, &remaining);
    Ok(parsed.into())
}

/// Render a scalar JSON value as a URL or query fragment
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Fill the `{}` placeholders of a URI template with positional arguments
pub fn fill_template(template: &str, args: &[Value]) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut rest = template;

    while let Some(position) = rest.find("{}") {
        out.push_str(&rest[..position]);
        let arg = args.next().ok_or_else(|| {
            Error::validation_with_code(
                ErrorCode::VALIDATION_TEMPLATE,
                format!("Not enough arguments to fill '{}'", template),
                Some("args".to_string()),
            )
        })?;
        let fragment = scalar_to_string(arg).ok_or_else(|| {
            Error::validation_with_code(
                ErrorCode::VALIDATION_TEMPLATE,
                format!("Argument {} cannot be placed in a URL", arg),
                Some("args".to_string()),
            )
        })?;
        out.push_str(&fragment);
        rest = &rest[position + 2..];
    }
    out.push_str(rest);
    Ok(out)
}
