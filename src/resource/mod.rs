//! Cached representations of external HTTP fetches
//!
//! A [`ResourceKind`] describes how to build requests for one external source
//! and which strategies interpret its responses. A [`ResourceClient`] runs
//! requests of one kind through the cache/fetch cycle and stores the result as
//! a [`Resource`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::Result;

pub mod canonical;
pub mod client;
pub mod fetcher;
pub mod kind;
pub mod registry;
pub mod request;
pub mod schema;
pub mod strategy;

pub use canonical::{hash_from_data, uri_from_url, CacheKey};
pub use client::ResourceClient;
pub use fetcher::{Fetcher, HttpFetcher, RawResponse};
pub use kind::{ResourceKind, ResourceKindBuilder};
pub use registry::ResourceRegistry;
pub use request::{HttpMethod, Params, RequestDescriptor};
pub use schema::InputSchema;
pub use strategy::{
    AuthStrategy, ErrorInterpreter, JsonContinuation, NoAuth, NoPagination, PaginationStrategy,
    QueryAuth, StatusErrors,
};

/// One external fetch, identified by `(uri, post_hash)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Name of the resource kind that produced this fetch
    pub kind: String,
    pub uri: String,
    pub post_hash: String,
    /// Request without auth parameters
    pub request: RequestDescriptor,
    #[serde(default)]
    pub head: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    #[serde(default)]
    pub purge_at: Option<DateTime<Utc>>,
}

impl Resource {
    /// A resource that has not been fetched yet
    pub fn new(kind: impl Into<String>, request: RequestDescriptor, key: CacheKey) -> Self {
        let now = Utc::now();
        Self {
            kind: kind.into(),
            uri: key.uri,
            post_hash: key.post_hash,
            request,
            head: BTreeMap::new(),
            body: None,
            status: None,
            created_at: now,
            modified_at: now,
            purge_at: None,
        }
    }

    pub fn key(&self) -> CacheKey {
        CacheKey::new(self.uri.clone(), self.post_hash.clone())
    }

    /// Whether the status lies in `[200, 209)`
    pub fn success(&self) -> bool {
        matches!(self.status, Some(status) if (200..209).contains(&status))
    }

    pub fn is_fetched(&self) -> bool {
        self.status.is_some()
    }

    /// Whether the purge time has passed
    pub fn is_purged(&self, now: DateTime<Utc>) -> bool {
        self.purge_at.map_or(false, |purge_at| purge_at <= now)
    }

    /// Media type of the response without parameters
    pub fn content_type(&self) -> Option<&str> {
        self.head
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .and_then(|(_, value)| value.split(';').next())
            .map(str::trim)
            .filter(|media| !media.is_empty())
    }

    /// `(content type, decoded body)` of a successful response.
    ///
    /// Only JSON bodies are decoded. Unsuccessful responses and responses
    /// without a body (204 or empty) yield `(None, None)`.
    pub fn content(&self) -> Result<(Option<String>, Option<Value>)> {
        let empty = self.body.as_deref().map_or(true, |body| body.trim().is_empty());
        if !self.success() || self.status == Some(204) || empty {
            return Ok((None, None));
        }
        match self.content_type() {
            Some("application/json") => {
                let body = self.body.as_deref().unwrap_or_default();
                let data = serde_json::from_str(body)?;
                Ok((Some("application/json".to_string()), Some(data)))
            }
            Some(other) => Ok((Some(other.to_string()), None)),
            None => Ok((None, None)),
        }
    }

    /// Capture a response. Head, body and status are always set together.
    pub(crate) fn record_response(&mut self, response: RawResponse, purge_after: Option<Duration>) {
        let now = Utc::now();
        self.head = response.head;
        self.body = Some(response.body);
        self.status = Some(response.status);
        self.modified_at = now;
        self.purge_at = purge_after
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .map(|ttl| now + ttl);
    }
}
