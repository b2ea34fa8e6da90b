//! Lookup table resolving entity references to organisms

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use super::{EntityKind, EntityRef, Organism};
use crate::error::{Error, ErrorCode, Result};

/// Resolves ids of one entity kind
#[async_trait]
pub trait EntityLookup: Send + Sync {
    async fn lookup(&self, id: u64) -> Result<Option<Arc<dyn Organism>>>;
}

/// One lookup per entity kind, registered at startup
#[derive(Default, Clone)]
pub struct ReferenceTable {
    lookups: HashMap<EntityKind, Arc<dyn EntityLookup>>,
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, kind: EntityKind, lookup: Arc<dyn EntityLookup>) -> Self {
        self.lookups.insert(kind, lookup);
        self
    }

    pub fn is_registered(&self, kind: EntityKind) -> bool {
        self.lookups.contains_key(&kind)
    }

    /// Resolve a reference, failing when the kind is unknown or the id missing
    pub async fn resolve(&self, reference: &EntityRef) -> Result<Arc<dyn Organism>> {
        let lookup = self.lookups.get(&reference.kind).ok_or_else(|| {
            Error::config_with_code(
                ErrorCode::CONFIG_UNKNOWN_ENTITY_KIND,
                format!("No lookup registered for entity kind '{}'", reference.kind),
            )
        })?;

        lookup
            .lookup(reference.id)
            .await?
            .ok_or_else(|| Error::not_found(reference.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::organism::{Individual, OrganismPool};
    use serde_json::json;

    #[tokio::test]
    async fn test_resolve_registered_kind() {
        let pool = Arc::new(OrganismPool::new());
        pool.insert(Arc::new(Individual::new(3, json!({"title": "Rust"}))))
            .await;
        let table = ReferenceTable::new().register(EntityKind::Individual, pool);

        let organism = table.resolve(&EntityRef::individual(3)).await.unwrap();
        assert_eq!(organism.entity(), EntityRef::individual(3));
    }

    #[tokio::test]
    async fn test_resolve_unknown_kind_is_config_error() {
        let table = ReferenceTable::new();
        let err = table
            .resolve(&EntityRef::collective(1))
            .await
            .err()
            .unwrap();
        assert_eq!(err.code(), ErrorCode::CONFIG_UNKNOWN_ENTITY_KIND);
    }

    #[tokio::test]
    async fn test_resolve_missing_id() {
        let table = ReferenceTable::new()
            .register(EntityKind::Individual, Arc::new(OrganismPool::new()));
        let err = table
            .resolve(&EntityRef::individual(99))
            .await
            .err()
            .unwrap();
        assert_eq!(err.code(), ErrorCode::STORAGE_NOT_FOUND);
    }
}
