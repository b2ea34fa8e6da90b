//! In-memory storage backend

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{ErrorStore, GrowthStore, ResourceStore};
use crate::error::Result;
use crate::growth::{Growth, GrowthId, GrowthState};
use crate::processor::ErrorRecord;
use crate::resource::{CacheKey, Resource};

/// In-memory storage implementing every store trait
#[derive(Default, Clone)]
pub struct MemoryStore {
    resources: Arc<RwLock<HashMap<CacheKey, Resource>>>,
    growths: Arc<RwLock<HashMap<GrowthId, Growth>>>,
    errors: Arc<RwLock<HashMap<GrowthId, Vec<ErrorRecord>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn resource_count(&self) -> usize {
        self.resources.read().await.len()
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<Resource>> {
        Ok(self.resources.read().await.get(key).cloned())
    }

    async fn put(&self, resource: &Resource) -> Result<()> {
        self.resources
            .write()
            .await
            .insert(resource.key(), resource.clone());
        Ok(())
    }
}

#[async_trait]
impl GrowthStore for MemoryStore {
    async fn save(&self, growth: &Growth) -> Result<()> {
        self.growths
            .write()
            .await
            .insert(growth.id, growth.clone());
        Ok(())
    }

    async fn load(&self, id: GrowthId) -> Result<Option<Growth>> {
        Ok(self.growths.read().await.get(&id).cloned())
    }

    async fn list_by_state(&self, state: GrowthState) -> Result<Vec<Growth>> {
        let growths = self.growths.read().await;
        let mut matching: Vec<Growth> = growths
            .values()
            .filter(|growth| growth.state() == state)
            .cloned()
            .collect();
        matching.sort_by_key(|growth| growth.id);
        Ok(matching)
    }
}

#[async_trait]
impl ErrorStore for MemoryStore {
    async fn retain(&self, mut record: ErrorRecord, growth: GrowthId) -> Result<()> {
        record.retainer = Some(growth);
        let mut errors = self.errors.write().await;
        let retained = errors.entry(growth).or_default();
        if !retained.iter().any(|r| r.id == record.id) {
            retained.push(record);
        }
        Ok(())
    }

    async fn retained(&self, growth: GrowthId) -> Result<Vec<ErrorRecord>> {
        Ok(self
            .errors
            .read()
            .await
            .get(&growth)
            .cloned()
            .unwrap_or_default())
    }
}
