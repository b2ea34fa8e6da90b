//! Storage abstraction for growths, resources and retained errors
//!
//! Persistence is owned by callers. The crate only needs the operations below
//! and ships an in-memory backend implementing all of them.

use async_trait::async_trait;

use crate::error::Result;
use crate::growth::{Growth, GrowthId, GrowthState};
use crate::processor::ErrorRecord;
use crate::resource::{CacheKey, Resource};

pub mod lock;
pub mod memory;

pub use lock::KeyedLocks;
pub use memory::MemoryStore;

/// Storage of fetched resources, keyed by `(uri, post_hash)`
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<Resource>>;

    /// Insert or replace the resource stored under its key
    async fn put(&self, resource: &Resource) -> Result<()>;
}

/// Storage of growths
#[async_trait]
pub trait GrowthStore: Send + Sync {
    async fn save(&self, growth: &Growth) -> Result<()>;

    async fn load(&self, id: GrowthId) -> Result<Option<Growth>>;

    async fn list_by_state(&self, state: GrowthState) -> Result<Vec<Growth>>;
}

/// Retention of error records against the growth that produced them
#[async_trait]
pub trait ErrorStore: Send + Sync {
    /// Retaining a record id that is already retained keeps a single copy
    async fn retain(&self, record: ErrorRecord, growth: GrowthId) -> Result<()>;

    async fn retained(&self, growth: GrowthId) -> Result<Vec<ErrorRecord>>;
}
