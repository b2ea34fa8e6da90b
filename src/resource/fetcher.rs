//! The network side of the resource layer

use async_trait::async_trait;
use reqwest::Client;
use std::collections::BTreeMap;
use tracing::debug;

use super::request::{HttpMethod, RequestDescriptor};
use crate::config::HttpSettings;
use crate::error::{Error, Result};

/// Raw response as captured from the network
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub head: BTreeMap<String, String>,
    pub body: String,
}

/// Performs one network call for a request descriptor
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &RequestDescriptor) -> Result<RawResponse>;
}

/// [`Fetcher`] backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with timeouts, user agent and proxy from settings
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(settings.timeout)
            .connect_timeout(settings.connect_timeout)
            .user_agent(settings.user_agent.as_str());

        if let Some(proxy) = &settings.proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str()).map_err(|e| {
                Error::config(format!("Invalid proxy '{}'", proxy)).with_source(e)
            })?;
            builder = builder.proxy(proxy);
        } else {
            // Proxies come from settings only, never from the environment
            builder = builder.no_proxy();
        }

        let client = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &RequestDescriptor) -> Result<RawResponse> {
        debug!(method = %request.method, "Fetching resource");

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => {
                let builder = self.client.post(&request.url);
                match &request.data {
                    Some(data) => builder.json(data),
                    None => builder,
                }
            }
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let head = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(RawResponse { status, head, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_with_defaults() {
        assert!(HttpFetcher::new(&HttpSettings::default()).is_ok());
    }

    #[test]
    fn test_new_with_proxy() {
        let settings = HttpSettings {
            proxy: Some("http://127.0.0.1:3128".to_string()),
            ..HttpSettings::default()
        };
        assert!(HttpFetcher::new(&settings).is_ok());
    }
}
