//! Unified error type for datagrowth
//!
//! Every failure carries a numeric code (see [`ErrorCode`]) so that callers and
//! logs can classify errors without matching on message text.

use thiserror::Error;

use crate::growth::GrowthState;
use crate::resource::Resource;

pub mod codes;

pub use codes::{describe_error_code, ErrorCode};

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// The unified error type for the entire crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("[E{code:04}] Configuration error: {message}")]
    Config {
        code: u16,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Validation error: {message}")]
    Validation {
        code: u16,
        message: String,
        field: Option<String>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Growth {growth} cannot {action} while in state {state}")]
    IllegalTransition {
        code: u16,
        growth: u64,
        state: GrowthState,
        action: &'static str,
    },

    #[error("[E{code:04}] Client error {status} for {}", .resource.uri)]
    Client {
        code: u16,
        status: u16,
        body: String,
        resource: Box<Resource>,
    },

    #[error("[E{code:04}] Server error {status} for {}", .resource.uri)]
    Server {
        code: u16,
        status: u16,
        body: String,
        resource: Box<Resource>,
    },

    #[error("[E{code:04}] Network error: {message}")]
    Network {
        code: u16,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Processor error: {message}")]
    Processor {
        code: u16,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Storage error: {message}")]
    Storage {
        code: u16,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Serialization error: {message}")]
    Serialization {
        code: u16,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
}

impl Error {
    /// Create a configuration error with default code
    pub fn config(message: impl Into<String>) -> Self {
        Self::config_with_code(ErrorCode::CONFIG_GENERIC, message)
    }

    /// Create a configuration error with specific code
    pub fn config_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Config {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create a validation error with default code
    pub fn validation(message: impl Into<String>) -> Self {
        Self::validation_with_code(ErrorCode::VALIDATION_GENERIC, message, None)
    }

    /// Create a validation error with specific code and field
    pub fn validation_with_code(
        code: u16,
        message: impl Into<String>,
        field: Option<String>,
    ) -> Self {
        Self::Validation {
            code,
            message: message.into(),
            field,
            source: None,
        }
    }

    /// Create an illegal transition error for a growth
    pub fn illegal_transition(growth: u64, state: GrowthState, action: &'static str) -> Self {
        Self::IllegalTransition {
            code: ErrorCode::STATE_ILLEGAL_TRANSITION,
            growth,
            state,
            action,
        }
    }

    /// Create a client error (4xx) for a fetched resource
    pub fn client(resource: Resource) -> Self {
        Self::Client {
            code: ErrorCode::TRANSPORT_CLIENT,
            status: resource.status.unwrap_or_default(),
            body: resource.body.clone().unwrap_or_default(),
            resource: Box::new(resource),
        }
    }

    /// Create a server error (5xx) for a fetched resource
    pub fn server(resource: Resource) -> Self {
        Self::Server {
            code: ErrorCode::TRANSPORT_SERVER,
            status: resource.status.unwrap_or_default(),
            body: resource.body.clone().unwrap_or_default(),
            resource: Box::new(resource),
        }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            code: ErrorCode::TRANSPORT_NETWORK,
            message: message.into(),
            source: None,
        }
    }

    /// Create a processor error with default code
    pub fn processor(message: impl Into<String>) -> Self {
        Self::processor_with_code(ErrorCode::PROCESSOR_GENERIC, message)
    }

    /// Create a processor error with specific code
    pub fn processor_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Processor {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create a storage error with default code
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            code: ErrorCode::STORAGE_GENERIC,
            message: message.into(),
            source: None,
        }
    }

    /// Create a not found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::Storage {
            code: ErrorCode::STORAGE_NOT_FOUND,
            message: format!("{} not found", what.into()),
            source: None,
        }
    }

    /// Add a source error to this error
    pub fn with_source(mut self, source: impl Into<BoxedSource>) -> Self {
        match &mut self {
            Self::Config { source: src, .. }
            | Self::Validation { source: src, .. }
            | Self::Network { source: src, .. }
            | Self::Processor { source: src, .. }
            | Self::Storage { source: src, .. }
            | Self::Serialization { source: src, .. } => {
                *src = Some(source.into());
            }
            Self::IllegalTransition { .. } | Self::Client { .. } | Self::Server { .. } => {}
        }
        self
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Config { code, .. }
            | Self::Validation { code, .. }
            | Self::IllegalTransition { code, .. }
            | Self::Client { code, .. }
            | Self::Server { code, .. }
            | Self::Network { code, .. }
            | Self::Processor { code, .. }
            | Self::Storage { code, .. }
            | Self::Serialization { code, .. } => *code,
        }
    }

    /// Failure of the asynchronous task layer itself
    pub fn is_processor(&self) -> bool {
        matches!(self, Self::Processor { .. })
    }

    /// Client, server or network failure on the fetch path
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Client { .. } | Self::Server { .. } | Self::Network { .. }
        )
    }

    /// Storage failure, including a missing record
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == ErrorCode::STORAGE_NOT_FOUND
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// HTTP status carried by a client or server error
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Client { status, .. } | Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Resource captured by a client or server error
    pub fn resource(&self) -> Option<&Resource> {
        match self {
            Self::Client { resource, .. } | Self::Server { resource, .. } => Some(resource.as_ref()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            code: ErrorCode::SERIALIZATION_JSON,
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            code: ErrorCode::SERIALIZATION_TOML,
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::network(err.to_string()).with_source(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::validation_with_code(ErrorCode::VALIDATION_URL, err.to_string(), None)
            .with_source(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_code() {
        let err = Error::config("unknown processor 'Nope'");
        assert_eq!(
            err.to_string(),
            "[E1000] Configuration error: unknown processor 'Nope'"
        );
        assert_eq!(err.code(), ErrorCode::CONFIG_GENERIC);
        assert!(err.is_config());
    }

    #[test]
    fn test_illegal_transition_display() {
        let err = Error::illegal_transition(7, GrowthState::Complete, "begin");
        assert_eq!(
            err.to_string(),
            "[E3001] Growth 7 cannot begin while in state Complete"
        );
    }

    #[test]
    fn test_classification_predicates() {
        assert!(Error::processor("task died").is_processor());
        assert!(!Error::processor("task died").is_transport());
        assert!(Error::network("connection refused").is_transport());
        assert!(Error::validation("bad args").is_validation());
        assert_eq!(Error::network("x").status(), None);
        assert!(Error::storage("db down").is_storage());
        assert!(!Error::storage("db down").is_not_found());
        assert!(Error::not_found("Growth 3").is_not_found());
        assert!(!Error::config("x").is_storage());
    }

    #[test]
    fn test_with_source_is_kept() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        let err = Error::storage("write failed").with_source(io);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = json_err.into();
        assert_eq!(err.code(), ErrorCode::SERIALIZATION_JSON);
    }
}
