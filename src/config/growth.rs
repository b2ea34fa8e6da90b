//! Per-growth configuration
//!
//! The configuration blob travels with a growth and is handed to processors in
//! full. Positional and keyword arguments are private: they are dropped from
//! every view that leaves the processor boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, ErrorCode, Result};
use crate::organism::Kwargs;

/// Configuration of a single growth
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrowthConfig {
    /// Positional argument templates forwarded to the operation
    #[serde(default)]
    pub args: Vec<Value>,

    /// Keyword argument templates forwarded to the operation
    #[serde(default)]
    pub kwargs: Kwargs,

    /// Name of the resource kind used by fetch operations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    /// Processor-specific options, passed through untouched
    #[serde(flatten)]
    pub options: Kwargs,
}

impl GrowthConfig {
    pub const NAMESPACE: &'static str = "growth";
    pub const PRIVATE: [&'static str; 2] = ["args", "kwargs"];

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_kwargs(mut self, kwargs: Kwargs) -> Self {
        self.kwargs = kwargs;
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Fill keys that are not set on this growth from namespace defaults.
    ///
    /// Defaults never provide private keys.
    pub fn merged_with(mut self, defaults: &Kwargs) -> Self {
        for (key, value) in defaults {
            if Self::PRIVATE.contains(&key.as_str()) {
                continue;
            }
            if key == "resource" {
                if self.resource.is_none() {
                    self.resource = value.as_str().map(str::to_string);
                }
                continue;
            }
            self.options
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        self
    }

    /// Look up a processor-specific option
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// Look up an option that must be present
    pub fn require(&self, key: &str) -> Result<&Value> {
        self.get(key).ok_or_else(|| {
            Error::config_with_code(
                ErrorCode::CONFIG_MISSING_KEY,
                format!("'{}.{}' is required by this process", Self::NAMESPACE, key),
            )
        })
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(Value::as_u64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// The resource kind name, required by fetch operations
    pub fn resource_name(&self) -> Result<&str> {
        self.resource.as_deref().ok_or_else(|| {
            Error::config_with_code(
                ErrorCode::CONFIG_MISSING_KEY,
                format!("'{}.resource' is required by this process", Self::NAMESPACE),
            )
        })
    }

    /// Configuration as seen by processors, including private keys
    pub fn to_private_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Configuration as seen by anything other than a processor
    pub fn to_public_value(&self) -> Value {
        let mut value = self.to_private_value();
        if let Value::Object(map) = &mut value {
            for key in Self::PRIVATE {
                map.remove(key);
            }
        }
        value
    }
}
