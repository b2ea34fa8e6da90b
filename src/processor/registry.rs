//! Explicit mapping from processor names to constructors

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::extract::ExtractProcessor;
use super::http::HttpFetchProcessor;
use super::task::TaskBackend;
use super::{unsupported, ProcessId, Processor};
use crate::config::GrowthConfig;
use crate::error::{Error, ErrorCode, Result};
use crate::resource::ResourceRegistry;

/// Everything a processor is constructed from
#[derive(Clone)]
pub struct ProcessorContext {
    /// Effective growth configuration, private keys included
    pub config: GrowthConfig,
    pub tasks: Arc<dyn TaskBackend>,
    pub resources: Arc<ResourceRegistry>,
    /// Default bound on concurrent requests of a batch
    pub concurrency: usize,
}

pub type ProcessorConstructor = fn(ProcessorContext) -> Result<Arc<dyn Processor>>;

/// Processor constructors by name.
///
/// Unknown names fail when a growth resolves its process, not at registration.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    constructors: HashMap<String, ProcessorConstructor>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the fetch and extract processors
    pub fn with_builtins() -> Self {
        Self::new()
            .register(HttpFetchProcessor::NAME, HttpFetchProcessor::construct)
            .register(ExtractProcessor::NAME, ExtractProcessor::construct)
    }

    pub fn register(mut self, name: impl Into<String>, constructor: ProcessorConstructor) -> Self {
        self.constructors.insert(name.into(), constructor);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Construct the processor named by `process` and check it supports the operation
    pub fn resolve(&self, process: &ProcessId, context: ProcessorContext) -> Result<Arc<dyn Processor>> {
        let constructor = self.constructors.get(&process.processor).ok_or_else(|| {
            Error::config_with_code(
                ErrorCode::CONFIG_UNKNOWN_PROCESSOR,
                format!("No processor registered under '{}'", process.processor),
            )
        })?;
        let processor = constructor(context)?;
        if !processor.supports(process.operation) {
            return Err(unsupported(processor.name(), process.operation));
        }
        debug!(process = %process, "Resolved processor");
        Ok(processor)
    }
}
