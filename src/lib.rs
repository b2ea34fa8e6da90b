//! # Datagrowth
//!
//! Grows structured data collections through asynchronous processing steps.
//!
//! A [`Growth`] wraps one unit of external work: fetching data over HTTP,
//! extracting structured fields, or merging results back into a collection.
//! The work is done by processors behind a submit/collect protocol, and HTTP
//! fetches go through a content-addressable resource cache.
//!
//! ## Modules
//!
//! - `app` - Logging setup for applications embedding the crate
//! - `config` - Crate settings (TOML, environment) and per-growth configuration
//! - `error` - Error type with numeric codes
//! - `growth` - Growth state machine, merge strategies and the poll driver
//! - `organism` - Data collections growths read from and merge into
//! - `processor` - Processor dispatch protocol, task backend and built-in processors
//! - `resource` - Request building, caching, pagination and error classification
//! - `storage` - Store traits, key-scoped locks and the in-memory backend

pub mod app;
pub mod config;
pub mod error;
pub mod growth;
pub mod organism;
pub mod processor;
pub mod resource;
pub mod storage;

pub use config::{DatagrowthConfig, GrowthConfig};
pub use error::{Error, ErrorCode, Result};
pub use growth::{
    ContributeType, Growth, GrowthDriver, GrowthEngine, GrowthId, GrowthResult, GrowthState,
};
pub use organism::{Arguments, EntityKind, EntityRef, Kwargs, Organism, ReferenceTable};
pub use processor::{
    ErrorRecord, Operation, Outcome, ProcessId, Processor, ProcessorRegistry, TaskBackend,
    TaskHandle,
};
pub use resource::{
    HttpFetcher, HttpMethod, RequestDescriptor, Resource, ResourceClient, ResourceKind,
    ResourceRegistry,
};
pub use storage::{ErrorStore, GrowthStore, MemoryStore, ResourceStore};
