//! In-memory organisms
//!
//! Used by tests and by callers that grow data without a database behind it.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::path::render;
use super::references::EntityLookup;
use super::{Arguments, EntityRef, Kwargs, Organism};
use crate::error::{Error, ErrorCode, Result};

fn render_kwargs(templates: &Kwargs, source: &Value) -> Kwargs {
    templates
        .iter()
        .map(|(key, template)| (key.clone(), render(template, source)))
        .collect()
}

fn require_objects(records: &[Value]) -> Result<()> {
    if let Some(position) = records.iter().position(|r| !r.is_object()) {
        return Err(Error::validation_with_code(
            ErrorCode::VALIDATION_RECORD,
            format!("Record {} is not an object", position),
            None,
        ));
    }
    Ok(())
}

/// A single record with free-form properties
pub struct Individual {
    id: u64,
    properties: RwLock<Value>,
}

impl Individual {
    pub fn new(id: u64, properties: Value) -> Self {
        Self {
            id,
            properties: RwLock::new(properties),
        }
    }

    pub async fn properties(&self) -> Value {
        self.properties.read().await.clone()
    }
}

#[async_trait]
impl Organism for Individual {
    fn entity(&self) -> EntityRef {
        EntityRef::individual(self.id)
    }

    async fn output(&self, args: &[Value], kwargs: &Kwargs) -> Result<Arguments> {
        let properties = self.properties.read().await;
        Ok(Arguments::Single {
            args: args.iter().map(|t| render(t, &properties)).collect(),
            kwargs: render_kwargs(kwargs, &properties),
        })
    }

    /// Later records override keys of earlier ones
    async fn update(&self, records: Vec<Value>) -> Result<()> {
        require_objects(&records)?;
        let mut properties = self.properties.write().await;
        if !properties.is_object() {
            *properties = Value::Object(Kwargs::new());
        }
        if let Value::Object(target) = &mut *properties {
            for record in records {
                if let Value::Object(fields) = record {
                    target.extend(fields);
                }
            }
        }
        Ok(())
    }
}

/// A set of records sharing a schema
pub struct Collective {
    id: u64,
    members: RwLock<Vec<Value>>,
}

impl Collective {
    pub fn new(id: u64, members: Vec<Value>) -> Self {
        Self {
            id,
            members: RwLock::new(members),
        }
    }

    pub async fn members(&self) -> Vec<Value> {
        self.members.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.members.read().await.len()
    }
}

#[async_trait]
impl Organism for Collective {
    fn entity(&self) -> EntityRef {
        EntityRef::collective(self.id)
    }

    async fn output(&self, args: &[Value], kwargs: &Kwargs) -> Result<Arguments> {
        let members = self.members.read().await;
        Ok(Arguments::Batch {
            args: members
                .iter()
                .map(|member| args.iter().map(|t| render(t, member)).collect())
                .collect(),
            kwargs: members
                .iter()
                .map(|member| render_kwargs(kwargs, member))
                .collect(),
        })
    }

    async fn update(&self, records: Vec<Value>) -> Result<()> {
        require_objects(&records)?;
        self.members.write().await.extend(records);
        Ok(())
    }
}

/// Organisms of one kind held in memory, usable as an [`EntityLookup`]
#[derive(Default)]
pub struct OrganismPool {
    organisms: RwLock<HashMap<u64, Arc<dyn Organism>>>,
}

impl OrganismPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, organism: Arc<dyn Organism>) {
        let id = organism.entity().id;
        self.organisms.write().await.insert(id, organism);
    }
}

#[async_trait]
impl EntityLookup for OrganismPool {
    async fn lookup(&self, id: u64) -> Result<Option<Arc<dyn Organism>>> {
        Ok(self.organisms.read().await.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kwargs(value: Value) -> Kwargs {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_individual_output_renders_templates() {
        let individual = Individual::new(1, json!({"title": "Rust", "lang": "en"}));
        let arguments = individual
            .output(&[json!("$.title")], &kwargs(json!({"language": "$.lang"})))
            .await
            .unwrap();

        assert_eq!(
            arguments,
            Arguments::single(vec![json!("Rust")], kwargs(json!({"language": "en"})))
        );
    }

    #[tokio::test]
    async fn test_collective_output_covers_all_members() {
        let collective = Collective::new(
            2,
            vec![json!({"title": "Rust"}), json!({"title": "Go"})],
        );
        let arguments = collective.output(&[json!("$.title")], &Kwargs::new()).await.unwrap();

        match arguments {
            Arguments::Batch { args, kwargs } => {
                assert_eq!(args, vec![vec![json!("Rust")], vec![json!("Go")]]);
                assert_eq!(kwargs.len(), 2);
            }
            other => panic!("expected batch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_individual_update_merges_fields() {
        let individual = Individual::new(1, json!({"title": "Rust", "views": 1}));
        individual
            .update(vec![json!({"views": 2}), json!({"wikidata": "Q575650"})])
            .await
            .unwrap();

        assert_eq!(
            individual.properties().await,
            json!({"title": "Rust", "views": 2, "wikidata": "Q575650"})
        );
    }

    #[tokio::test]
    async fn test_collective_update_rejects_non_objects() {
        let collective = Collective::new(2, vec![]);
        let err = collective
            .update(vec![json!({"ok": true}), json!("nope")])
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::VALIDATION_RECORD);
        assert_eq!(collective.len().await, 0);
    }
}
