//! Extraction of structured records from fetched resources

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::registry::ProcessorContext;
use super::task::{TaskBackend, TaskHandle};
use super::{unsupported, ErrorRecord, Operation, Outcome, Processor};
use crate::error::{Error, ErrorCode, Result};
use crate::organism::{path, Arguments, Kwargs};
use crate::resource::Resource;

/// Which nodes to extract and which fields to read from each node.
///
/// Configured as an object whose `"@"` entry selects the nodes and whose other
/// entries map output fields to paths relative to a node:
///
/// ```json
/// {"@": "$.query.pages", "title": "$.title", "id": "$.pageid"}
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    root: String,
    fields: BTreeMap<String, String>,
}

impl Objective {
    pub const ROOT_KEY: &'static str = "@";

    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.fields.insert(name.into(), path.into());
        self
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let Value::Object(entries) = value else {
            return Err(Error::config("'growth.objective' must be an object"));
        };
        let mut objective = Self::new("$");
        for (key, path) in entries {
            let path = path.as_str().ok_or_else(|| {
                Error::config(format!("Objective path for '{}' must be a string", key))
            })?;
            if key == Self::ROOT_KEY {
                objective.root = path.to_string();
            } else {
                objective.fields.insert(key.clone(), path.to_string());
            }
        }
        Ok(objective)
    }

    /// One record per selected node; missing paths read as null
    pub fn extract(&self, data: &Value) -> Vec<Value> {
        let nodes: Vec<&Value> = match path::resolve(data, &self.root) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().collect(),
            Some(Value::Object(map)) if self.root_is_keyed(map) => map.values().collect(),
            Some(node) => vec![node],
        };

        nodes
            .into_iter()
            .map(|node| {
                let record: Kwargs = self
                    .fields
                    .iter()
                    .map(|(name, path)| {
                        let value = path::resolve(node, path).cloned().unwrap_or(Value::Null);
                        (name.clone(), value)
                    })
                    .collect();
                Value::Object(record)
            })
            .collect()
    }

    // Objects keyed by ids (`{"123": {...}, "456": {...}}`) hold one node per entry
    fn root_is_keyed(&self, map: &serde_json::Map<String, Value>) -> bool {
        !map.is_empty()
            && map.values().all(Value::is_object)
            && map.keys().all(|key| key.parse::<i64>().is_ok())
    }

    /// Records of a successful JSON resource
    pub fn extract_from_resource(&self, resource: &Resource) -> Result<Vec<Value>> {
        if !resource.success() {
            return Err(Error::processor(format!(
                "Cannot extract from {}: status {}",
                resource.uri,
                resource.status.map_or("none".to_string(), |s| s.to_string())
            )));
        }
        match resource.content()? {
            (_, Some(data)) => Ok(self.extract(&data)),
            (content_type, None) => Err(Error::processor(format!(
                "Cannot extract from {}: content type {}",
                resource.uri,
                content_type.as_deref().unwrap_or("unknown")
            ))),
        }
    }
}

/// Pulls records out of fetched resources with an [`Objective`]
pub struct ExtractProcessor {
    objective: Objective,
    tasks: Arc<dyn TaskBackend>,
}

impl ExtractProcessor {
    pub const NAME: &'static str = "ExtractProcessor";

    pub fn new(context: ProcessorContext) -> Result<Self> {
        let objective = Objective::from_value(context.config.require("objective")?)?;
        Ok(Self {
            objective,
            tasks: context.tasks,
        })
    }

    pub fn construct(context: ProcessorContext) -> Result<Arc<dyn Processor>> {
        Ok(Arc::new(Self::new(context)?))
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }
}

fn resource_argument(args: &[Value], kwargs: &Kwargs) -> Result<Value> {
    args.first()
        .or_else(|| kwargs.get("resource"))
        .cloned()
        .ok_or_else(|| {
            Error::validation_with_code(
                ErrorCode::VALIDATION_UNEXPECTED_ARGS,
                "Extraction needs a resource as first argument or 'resource' keyword",
                Some("args".to_string()),
            )
        })
}

#[async_trait]
impl Processor for ExtractProcessor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn supports(&self, operation: Operation) -> bool {
        operation == Operation::ExtractFromResource
    }

    async fn submit(&self, operation: Operation, arguments: Arguments) -> Result<TaskHandle> {
        if !self.supports(operation) {
            return Err(unsupported(Self::NAME, operation));
        }
        let items = arguments
            .into_pairs()
            .iter()
            .map(|(args, kwargs)| resource_argument(args, kwargs))
            .collect::<Result<Vec<_>>>()?;

        let objective = self.objective.clone();
        let task = async move {
            let mut outcome = Outcome::default();
            for item in items {
                let extracted = serde_json::from_value::<Resource>(item.clone())
                    .map_err(Error::from)
                    .and_then(|resource| objective.extract_from_resource(&resource));
                match extracted {
                    Ok(records) => outcome.successes.extend(records),
                    Err(e) => outcome
                        .errors
                        .push(ErrorRecord::from_error(operation, &e).with_payload(item)),
                }
            }
            Ok::<_, Error>(outcome)
        };
        self.tasks.submit(task.boxed()).await
    }

    async fn collect(&self, handle: &TaskHandle) -> Result<Outcome> {
        self.tasks.collect(handle).await
    }

    async fn contribute(&self, operation: Operation, item: Value) -> Result<Vec<Value>> {
        if !self.supports(operation) {
            return Err(unsupported(Self::NAME, operation));
        }
        let resource: Resource = serde_json::from_value(item)?;
        let records = self.objective.extract_from_resource(&resource)?;
        debug!(uri = %resource.uri, records = records.len(), "Extracted records");
        Ok(records)
    }
}
