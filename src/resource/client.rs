//! The cache/fetch cycle for one resource kind

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::canonical::CacheKey;
use super::fetcher::Fetcher;
use super::kind::ResourceKind;
use super::request::{HttpMethod, RequestDescriptor};
use super::Resource;
use crate::config::CacheSettings;
use crate::error::Result;
use crate::organism::Kwargs;
use crate::storage::{KeyedLocks, ResourceStore};

/// Runs requests of one [`ResourceKind`] through the cache.
///
/// A stored successful resource is returned without network I/O. Writers of
/// the same cache key are serialized, so concurrent callers asking for the
/// same resource cause one fetch and then read the stored row.
pub struct ResourceClient {
    kind: Arc<ResourceKind>,
    store: Arc<dyn ResourceStore>,
    fetcher: Arc<dyn Fetcher>,
    locks: KeyedLocks<CacheKey>,
    purge_after: Option<Duration>,
}

impl ResourceClient {
    pub fn new(
        kind: Arc<ResourceKind>,
        store: Arc<dyn ResourceStore>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            kind,
            store,
            fetcher,
            locks: KeyedLocks::new(),
            purge_after: None,
        }
    }

    pub fn with_cache_settings(mut self, settings: &CacheSettings) -> Self {
        self.purge_after = settings.purge_after;
        self
    }

    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    pub fn name(&self) -> &str {
        self.kind.name()
    }

    pub async fn get(&self, args: &[Value], kwargs: &Kwargs) -> Result<Resource> {
        self.send(HttpMethod::Get, args, kwargs).await
    }

    pub async fn post(&self, args: &[Value], kwargs: &Kwargs) -> Result<Resource> {
        self.send(HttpMethod::Post, args, kwargs).await
    }

    /// Build a request from caller arguments and run it
    pub async fn send(&self, method: HttpMethod, args: &[Value], kwargs: &Kwargs) -> Result<Resource> {
        let request = self.kind.create_request(method, args, kwargs)?;
        self.run(request).await
    }

    /// Return the cached resource for `request` or fetch it.
    ///
    /// Fails with a client or server error after storing the fetched resource
    /// when the response status is 4xx or 5xx.
    pub async fn run(&self, request: RequestDescriptor) -> Result<Resource> {
        self.kind.validate_request(&request, true)?;
        let key = self.kind.cache_key(&request)?;

        let resource = {
            let _guard = self.locks.lock(&key).await;

            let existing = self.store.get(&key).await?;
            if let Some(cached) = &existing {
                if cached.success() && !cached.is_purged(Utc::now()) {
                    debug!(uri = %key, "Resource cache hit");
                    return Ok(cached.clone());
                }
                debug!(uri = %key, status = ?cached.status, "Cached resource is unusable, refetching");
            }

            let mut resource = match existing {
                Some(resource) => resource,
                None => Resource::new(
                    self.kind.name(),
                    self.kind.request_without_auth(&request)?,
                    key.clone(),
                ),
            };

            let response = self
                .fetcher
                .fetch(&self.kind.request_with_auth(&request)?)
                .await
                .map_err(|e| {
                    warn!(uri = %key, "Fetch failed: {}", e);
                    e
                })?;
            resource.record_response(response, self.purge_after);
            self.store.put(&resource).await?;
            info!(uri = %key, status = ?resource.status, "Fetched resource");
            resource
        };

        self.kind.interpret(&resource)?;
        Ok(resource)
    }

    /// Request for the page after `resource`, or `None` when pagination ends
    pub fn create_next_request(&self, resource: &Resource) -> Result<Option<RequestDescriptor>> {
        self.kind.create_next_request(resource)
    }

    /// Run `request` and follow continuation for at most `limit` pages in total
    pub async fn paginate(&self, request: RequestDescriptor, limit: usize) -> Result<Vec<Resource>> {
        let mut pages = Vec::new();
        let mut next = Some(request);

        while let Some(request) = next.take() {
            if pages.len() >= limit {
                break;
            }
            let resource = self.run(request).await?;
            next = self.create_next_request(&resource)?;
            pages.push(resource);
        }
        Ok(pages)
    }

    /// `get` followed by continuation until the source reports no next page
    pub async fn get_all(&self, args: &[Value], kwargs: &Kwargs) -> Result<Vec<Resource>> {
        let request = self.kind.create_request(HttpMethod::Get, args, kwargs)?;
        self.paginate(request, usize::MAX).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::resource::fetcher::RawResponse;
    use crate::resource::strategy::{JsonContinuation, QueryAuth};
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays canned responses and records every request it sees
    struct ScriptedFetcher {
        responses: Mutex<Vec<RawResponse>>,
        seen: Mutex<Vec<RequestDescriptor>>,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn new(responses: Vec<RawResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into_iter().rev().collect()),
                seen: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, request: &RequestDescriptor) -> Result<RawResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request.clone());
            tokio::time::sleep(Duration::from_millis(5)).await;
            let mut responses = self.responses.lock().unwrap();
            Ok(responses.pop().unwrap_or_else(|| json_response(200, "{}")))
        }
    }

    fn json_response(status: u16, body: &str) -> RawResponse {
        let mut head = BTreeMap::new();
        head.insert("content-type".to_string(), "application/json".to_string());
        RawResponse {
            status,
            head,
            body: body.to_string(),
        }
    }

    fn client(fetcher: Arc<ScriptedFetcher>, store: Arc<MemoryStore>) -> ResourceClient {
        let kind = ResourceKind::builder("items", "https://api.example.org/{}")
            .auth(QueryAuth::single("key", "secret"))
            .pagination(JsonContinuation::value("$.next", "page"))
            .build();
        ResourceClient::new(Arc::new(kind), store, fetcher)
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let fetcher = ScriptedFetcher::new(vec![json_response(200, r#"{"items": [1]}"#)]);
        let store = Arc::new(MemoryStore::new());
        let client = client(Arc::clone(&fetcher), Arc::clone(&store));

        let first = client.get(&[json!("items")], &Kwargs::new()).await.unwrap();
        let second = client.get(&[json!("items")], &Kwargs::new()).await.unwrap();

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(first, second);
        assert_eq!(first.uri, "api.example.org/items");
        assert_eq!(store.resource_count().await, 1);
    }

    #[tokio::test]
    async fn test_auth_only_on_the_wire() {
        let fetcher = ScriptedFetcher::new(vec![]);
        let store = Arc::new(MemoryStore::new());
        let client = client(Arc::clone(&fetcher), store);

        let resource = client.get(&[json!("items")], &Kwargs::new()).await.unwrap();

        let seen = fetcher.seen.lock().unwrap().clone();
        assert_eq!(seen[0].url, "https://api.example.org/items?key=secret");
        assert_eq!(resource.request.url, "https://api.example.org/items");
        assert!(!resource.uri.contains("secret"));
    }

    #[tokio::test]
    async fn test_failed_resource_is_stored_and_refetched() {
        let fetcher = ScriptedFetcher::new(vec![
            json_response(503, "down"),
            json_response(200, r#"{"ok": true}"#),
        ]);
        let store = Arc::new(MemoryStore::new());
        let client = client(Arc::clone(&fetcher), Arc::clone(&store));

        let err = client.get(&[json!("items")], &Kwargs::new()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::TRANSPORT_SERVER);
        assert_eq!(err.status(), Some(503));
        assert_eq!(store.resource_count().await, 1);

        let resource = client.get(&[json!("items")], &Kwargs::new()).await.unwrap();
        assert!(resource.success());
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(store.resource_count().await, 1);
    }

    #[tokio::test]
    async fn test_client_error_carries_resource() {
        let fetcher = ScriptedFetcher::new(vec![json_response(404, "missing")]);
        let client = client(fetcher, Arc::new(MemoryStore::new()));

        let err = client.get(&[json!("gone")], &Kwargs::new()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::TRANSPORT_CLIENT);
        assert_eq!(err.resource().map(|r| r.uri.as_str()), Some("api.example.org/gone"));
    }

    #[tokio::test]
    async fn test_non_success_without_error() {
        let fetcher = ScriptedFetcher::new(vec![json_response(302, "")]);
        let client = client(fetcher, Arc::new(MemoryStore::new()));

        let resource = client.get(&[json!("moved")], &Kwargs::new()).await.unwrap();
        assert!(!resource.success());
        assert_eq!(resource.content().unwrap(), (None, None));
    }

    #[tokio::test]
    async fn test_concurrent_requests_fetch_once() {
        let fetcher = ScriptedFetcher::new(vec![json_response(200, "{}")]);
        let client = Arc::new(client(Arc::clone(&fetcher), Arc::new(MemoryStore::new())));

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let client = Arc::clone(&client);
                tokio::spawn(async move { client.get(&[json!("same")], &Kwargs::new()).await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().success());
        }

        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_pagination_ends_when_strategy_stops() {
        let fetcher = ScriptedFetcher::new(vec![
            json_response(200, r#"{"items": [1], "next": 2}"#),
            json_response(200, r#"{"items": [2], "next": null}"#),
        ]);
        let client = client(Arc::clone(&fetcher), Arc::new(MemoryStore::new()));

        let pages = client.get_all(&[json!("items")], &Kwargs::new()).await.unwrap();

        assert_eq!(pages.len(), 2);
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(pages[1].request.url, "https://api.example.org/items?page=2");
        assert!(client.create_next_request(&pages[1]).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_paginate_respects_limit() {
        let fetcher = ScriptedFetcher::new(vec![
            json_response(200, r#"{"next": 2}"#),
            json_response(200, r#"{"next": 3}"#),
        ]);
        let client = client(Arc::clone(&fetcher), Arc::new(MemoryStore::new()));
        let request = client
            .kind()
            .create_request(HttpMethod::Get, &[json!("items")], &Kwargs::new())
            .unwrap();

        let pages = client.paginate(request, 1).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_purged_resource_is_refetched() {
        let fetcher = ScriptedFetcher::new(vec![]);
        let store = Arc::new(MemoryStore::new());
        let client = client(Arc::clone(&fetcher), Arc::clone(&store)).with_cache_settings(
            &CacheSettings {
                purge_after: Some(Duration::from_secs(0)),
            },
        );

        client.get(&[json!("items")], &Kwargs::new()).await.unwrap();
        client.get(&[json!("items")], &Kwargs::new()).await.unwrap();
        assert_eq!(fetcher.calls(), 2);
    }
}
