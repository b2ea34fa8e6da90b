//! Organisms: the data collections that growths read from and write into
//!
//! Growths never hold organisms directly. They hold an [`EntityRef`] (entity
//! kind plus id) and resolve it through a [`ReferenceTable`] when needed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::Result;

pub mod memory;
pub mod path;
pub mod references;

pub use memory::{Collective, Individual, OrganismPool};
pub use references::{EntityLookup, ReferenceTable};

/// Keyword arguments as passed to processors
pub type Kwargs = serde_json::Map<String, Value>;

/// Kinds of entity a growth may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Community,
    Individual,
    Collective,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Community => "community",
            Self::Individual => "individual",
            Self::Collective => "collective",
        };
        f.write_str(name)
    }
}

/// Reference to a stored entity by kind and id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: u64,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: u64) -> Self {
        Self { kind, id }
    }

    pub fn community(id: u64) -> Self {
        Self::new(EntityKind::Community, id)
    }

    pub fn individual(id: u64) -> Self {
        Self::new(EntityKind::Individual, id)
    }

    pub fn collective(id: u64) -> Self {
        Self::new(EntityKind::Collective, id)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Invocation arguments projected out of an organism.
///
/// A singular entity yields one `(args, kwargs)` pair, a collection yields one
/// pair of lists covering all members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Arguments {
    Single {
        args: Vec<Value>,
        kwargs: Kwargs,
    },
    Batch {
        args: Vec<Vec<Value>>,
        kwargs: Vec<Kwargs>,
    },
}

impl Arguments {
    pub fn single(args: Vec<Value>, kwargs: Kwargs) -> Self {
        Self::Single { args, kwargs }
    }

    /// Number of invocations these arguments describe
    pub fn len(&self) -> usize {
        match self {
            Self::Single { .. } => 1,
            Self::Batch { args, .. } => args.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into one `(args, kwargs)` pair per invocation.
    ///
    /// Missing keyword entries in a batch are treated as empty.
    pub fn into_pairs(self) -> Vec<(Vec<Value>, Kwargs)> {
        match self {
            Self::Single { args, kwargs } => vec![(args, kwargs)],
            Self::Batch { args, kwargs } => {
                let mut kwargs = kwargs.into_iter();
                args.into_iter()
                    .map(|args| (args, kwargs.next().unwrap_or_default()))
                    .collect()
            }
        }
    }
}

/// A stored data entity a growth can read from or merge into
#[async_trait]
pub trait Organism: Send + Sync {
    /// Reference under which this organism is stored
    fn entity(&self) -> EntityRef;

    /// Project internal state into invocation arguments using templates
    async fn output(&self, args: &[Value], kwargs: &Kwargs) -> Result<Arguments>;

    /// Merge records into this organism
    async fn update(&self, records: Vec<Value>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_ref_display() {
        assert_eq!(EntityRef::collective(12).to_string(), "collective:12");
        assert_eq!(EntityRef::community(1).to_string(), "community:1");
    }

    #[test]
    fn test_batch_into_pairs() {
        let mut first = Kwargs::new();
        first.insert("lang".into(), json!("en"));
        let arguments = Arguments::Batch {
            args: vec![vec![json!("a")], vec![json!("b")]],
            kwargs: vec![first.clone()],
        };

        assert_eq!(arguments.len(), 2);
        let pairs = arguments.into_pairs();
        assert_eq!(pairs[0], (vec![json!("a")], first));
        assert_eq!(pairs[1], (vec![json!("b")], Kwargs::new()));
    }

    #[test]
    fn test_arguments_serialization_is_tagged() {
        let arguments = Arguments::single(vec![json!(1)], Kwargs::new());
        let value = serde_json::to_value(&arguments).unwrap();
        assert_eq!(value["shape"], "single");
    }
}
