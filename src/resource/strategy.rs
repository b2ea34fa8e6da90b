//! Pluggable strategies a resource kind is assembled from

use serde_json::Value;
use std::fmt;

use super::request::{scalar_to_string, Params};
use super::Resource;
use crate::error::{Error, Result};
use crate::organism::path;

/// Supplies auth parameters that are added to the URL of the network call
pub trait AuthStrategy: Send + Sync {
    fn auth_parameters(&self) -> Params;
}

/// Computes the parameters of the next page from a fetched resource
pub trait PaginationStrategy: Send + Sync {
    /// `None` or an empty map ends pagination
    fn next_parameters(&self, resource: &Resource) -> Result<Option<Params>>;
}

/// Turns a fetched resource into a typed failure when it did not succeed
pub trait ErrorInterpreter: Send + Sync {
    fn interpret(&self, resource: &Resource) -> Result<()>;
}

/// No authentication
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

impl AuthStrategy for NoAuth {
    fn auth_parameters(&self) -> Params {
        Params::new()
    }
}

/// Fixed credentials passed as query parameters
#[derive(Clone, Default)]
pub struct QueryAuth {
    params: Params,
}

impl QueryAuth {
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    pub fn single(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut params = Params::new();
        params.insert(key.into(), value.into());
        Self { params }
    }
}

impl fmt::Debug for QueryAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryAuth")
            .field("keys", &self.params.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AuthStrategy for QueryAuth {
    fn auth_parameters(&self) -> Params {
        self.params.clone()
    }
}

/// Never continues
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPagination;

impl PaginationStrategy for NoPagination {
    fn next_parameters(&self, _resource: &Resource) -> Result<Option<Params>> {
        Ok(None)
    }
}

/// Continuation read from a JSON response body.
///
/// Either an object whose scalar entries become the next query parameters
/// (`{"continue": {"gcmcontinue": "page|2"}}`), or a single scalar placed
/// under a fixed parameter name (`{"next_cursor": "abc"}` as `cursor=abc`).
#[derive(Debug, Clone)]
pub struct JsonContinuation {
    path: String,
    param: Option<String>,
}

impl JsonContinuation {
    pub fn object(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            param: None,
        }
    }

    pub fn value(path: impl Into<String>, param: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            param: Some(param.into()),
        }
    }
}

impl PaginationStrategy for JsonContinuation {
    fn next_parameters(&self, resource: &Resource) -> Result<Option<Params>> {
        let (_, data) = resource.content()?;
        let Some(data) = data else {
            return Ok(None);
        };
        let node = match path::resolve(&data, &self.path) {
            Some(Value::Null) | None => return Ok(None),
            Some(node) => node,
        };

        let params: Params = match (&self.param, node) {
            (None, Value::Object(map)) => map
                .iter()
                .filter_map(|(k, v)| scalar_to_string(v).map(|v| (k.clone(), v)))
                .collect(),
            (Some(param), value) => scalar_to_string(value)
                .map(|v| (param.clone(), v))
                .into_iter()
                .collect(),
            (None, _) => Params::new(),
        };

        Ok(if params.is_empty() { None } else { Some(params) })
    }
}

/// Raises on 4xx and 5xx statuses
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusErrors;

impl ErrorInterpreter for StatusErrors {
    fn interpret(&self, resource: &Resource) -> Result<()> {
        match resource.status {
            Some(status) if status >= 500 => Err(Error::server(resource.clone())),
            Some(status) if status >= 400 => Err(Error::client(resource.clone())),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::testing::fetched;
    use crate::error::ErrorCode;

    #[test]
    fn test_status_errors_classification() {
        let interpreter = StatusErrors;

        let err = interpreter
            .interpret(&fetched(503, "application/json", "{}"))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::TRANSPORT_SERVER);
        assert_eq!(err.status(), Some(503));

        let err = interpreter
            .interpret(&fetched(404, "text/html", "missing"))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::TRANSPORT_CLIENT);
        assert_eq!(err.resource().and_then(|r| r.body.as_deref()), Some("missing"));

        interpreter.interpret(&fetched(204, "", "")).unwrap();
        interpreter.interpret(&fetched(302, "text/html", "")).unwrap();
    }

    #[test]
    fn test_json_continuation_object() {
        let strategy = JsonContinuation::object("$.continue");
        let resource = fetched(
            200,
            "application/json; charset=utf-8",
            r#"{"continue": {"gcmcontinue": "page|2", "continue": "-||", "nested": {}}}"#,
        );

        let params = strategy.next_parameters(&resource).unwrap().unwrap();
        assert_eq!(params.get("gcmcontinue").map(String::as_str), Some("page|2"));
        assert_eq!(params.get("continue").map(String::as_str), Some("-||"));
        assert!(!params.contains_key("nested"));
    }

    #[test]
    fn test_json_continuation_value() {
        let strategy = JsonContinuation::value("$.meta.next_cursor", "cursor");
        let resource = fetched(200, "application/json", r#"{"meta": {"next_cursor": 42}}"#);
        let params = strategy.next_parameters(&resource).unwrap().unwrap();
        assert_eq!(params.get("cursor").map(String::as_str), Some("42"));

        let last = fetched(200, "application/json", r#"{"meta": {"next_cursor": null}}"#);
        assert!(strategy.next_parameters(&last).unwrap().is_none());
    }

    #[test]
    fn test_json_continuation_stops_on_failure() {
        let strategy = JsonContinuation::object("continue");
        let failed = fetched(500, "application/json", r#"{"continue": {"x": "1"}}"#);
        assert!(strategy.next_parameters(&failed).unwrap().is_none());
    }

    #[test]
    fn test_json_continuation_ends_on_no_content() {
        let strategy = JsonContinuation::value("$.next", "page");
        let empty = fetched(204, "application/json", "");
        assert!(strategy.next_parameters(&empty).unwrap().is_none());
    }

    #[test]
    fn test_query_auth_debug_hides_values() {
        let auth = QueryAuth::single("api_key", "secret");
        let debug = format!("{:?}", auth);
        assert!(debug.contains("api_key"));
        assert!(!debug.contains("secret"));
    }
}
