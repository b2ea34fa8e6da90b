//! Named resource clients available to fetch processors

use std::collections::HashMap;
use std::sync::Arc;

use super::client::ResourceClient;
use crate::error::{Error, ErrorCode, Result};

/// Maps resource kind names to their clients
#[derive(Default, Clone)]
pub struct ResourceRegistry {
    clients: HashMap<String, Arc<ResourceClient>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client under the name of its resource kind
    pub fn register(mut self, client: ResourceClient) -> Self {
        self.clients
            .insert(client.name().to_string(), Arc::new(client));
        self
    }

    pub fn get(&self, name: &str) -> Result<Arc<ResourceClient>> {
        self.clients.get(name).cloned().ok_or_else(|| {
            Error::config_with_code(
                ErrorCode::CONFIG_UNKNOWN_RESOURCE,
                format!("No resource registered under '{}'", name),
            )
        })
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.clients.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpSettings;
    use crate::resource::{HttpFetcher, ResourceKind};
    use crate::storage::MemoryStore;

    fn client(name: &str) -> ResourceClient {
        ResourceClient::new(
            Arc::new(ResourceKind::builder(name, "https://example.org/{}").build()),
            Arc::new(MemoryStore::new()),
            Arc::new(HttpFetcher::new(&HttpSettings::default()).unwrap()),
        )
    }

    #[test]
    fn test_lookup_by_kind_name() {
        let registry = ResourceRegistry::new().register(client("b")).register(client("a"));
        assert_eq!(registry.names(), vec!["a", "b"]);
        assert_eq!(registry.get("a").unwrap().name(), "a");
    }

    #[test]
    fn test_unknown_resource() {
        let err = ResourceRegistry::new().get("missing").err().unwrap();
        assert_eq!(err.code(), ErrorCode::CONFIG_UNKNOWN_RESOURCE);
    }
}
