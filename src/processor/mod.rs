//! Processor dispatch protocol
//!
//! A processor submits work for one [`Operation`] without waiting for it and
//! hands back a [`TaskHandle`]. Results are collected later by handle as an
//! [`Outcome`]: successes plus per-item [`ErrorRecord`]s. Only a failure of the
//! task itself is returned as an error from `collect`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, ErrorCode, Result};
use crate::growth::GrowthId;
use crate::organism::Arguments;

pub mod extract;
pub mod http;
pub mod registry;
pub mod task;

pub use extract::{ExtractProcessor, Objective};
pub use http::HttpFetchProcessor;
pub use registry::{ProcessorConstructor, ProcessorContext, ProcessorRegistry};
pub use task::{TaskBackend, TaskFuture, TaskHandle, TaskStatus, TokioTaskBackend};

/// The closed set of operations a growth can name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    FetchOne,
    FetchMany,
    ExtractFromResource,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FetchOne => "fetch_one",
            Self::FetchMany => "fetch_many",
            Self::ExtractFromResource => "extract_from_resource",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.replace('-', "_").as_str() {
            "fetch_one" => Ok(Self::FetchOne),
            "fetch_many" => Ok(Self::FetchMany),
            "extract_from_resource" => Ok(Self::ExtractFromResource),
            _ => Err(Error::config_with_code(
                ErrorCode::CONFIG_UNSUPPORTED_OPERATION,
                format!("Unknown operation '{}'", s),
            )),
        }
    }
}

/// Two-part process identifier: processor name plus operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessId {
    pub processor: String,
    pub operation: Operation,
}

impl ProcessId {
    pub fn new(processor: impl Into<String>, operation: Operation) -> Self {
        Self {
            processor: processor.into(),
            operation,
        }
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.processor, self.operation)
    }
}

impl FromStr for ProcessId {
    type Err = Error;

    /// Parse `"HttpResourceProcessor.fetch_many"`
    fn from_str(s: &str) -> Result<Self> {
        let (processor, operation) = s.split_once('.').ok_or_else(|| {
            Error::config_with_code(
                ErrorCode::CONFIG_UNKNOWN_PROCESSOR,
                format!("'{}' is not a 'Processor.operation' identifier", s),
            )
        })?;
        if processor.is_empty() {
            return Err(Error::config_with_code(
                ErrorCode::CONFIG_UNKNOWN_PROCESSOR,
                format!("'{}' has no processor name", s),
            ));
        }
        Ok(Self::new(processor, operation.parse()?))
    }
}

/// Results of one task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub successes: Vec<Value>,
    pub errors: Vec<ErrorRecord>,
}

impl Outcome {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Append another outcome, keeping order
    pub fn extend(&mut self, other: Outcome) {
        self.successes.extend(other.successes);
        self.errors.extend(other.errors);
    }
}

/// An item that failed without failing the whole task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: Uuid,
    pub operation: Operation,
    #[serde(default)]
    pub status: Option<u16>,
    pub message: String,
    /// The failed resource, or the request that could not be fetched
    #[serde(default)]
    pub payload: Value,
    /// Growth this record is retained against
    #[serde(default)]
    pub retainer: Option<GrowthId>,
    pub created_at: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn new(operation: Operation, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation,
            status: None,
            message: message.into(),
            payload: Value::Null,
            retainer: None,
            created_at: Utc::now(),
        }
    }

    /// Record an error, keeping the resource of transport failures
    pub fn from_error(operation: Operation, error: &Error) -> Self {
        let mut record = Self::new(operation, error.to_string());
        record.status = error.status();
        if let Some(resource) = error.resource() {
            record.payload = serde_json::to_value(resource).unwrap_or(Value::Null);
        }
        record
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

/// A unit implementing one or more operations
#[async_trait]
pub trait Processor: Send + Sync {
    fn name(&self) -> &str;

    fn supports(&self, operation: Operation) -> bool;

    /// Start work and return immediately with a handle.
    ///
    /// Invalid arguments fail here, before any task exists.
    async fn submit(&self, operation: Operation, arguments: Arguments) -> Result<TaskHandle>;

    /// Results of a submitted task, waiting for it if needed
    async fn collect(&self, handle: &TaskHandle) -> Result<Outcome>;

    /// Turn one success item into output records
    async fn contribute(&self, operation: Operation, _item: Value) -> Result<Vec<Value>> {
        Err(unsupported(self.name(), operation))
    }
}

pub(crate) fn unsupported(processor: &str, operation: Operation) -> Error {
    Error::config_with_code(
        ErrorCode::CONFIG_UNSUPPORTED_OPERATION,
        format!("{} does not support '{}'", processor, operation),
    )
}
