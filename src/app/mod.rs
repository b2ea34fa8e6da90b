//! Process-level setup for applications embedding datagrowth

pub mod config;
pub mod logging;

pub use config::AppConfig;
pub use logging::{init_logging, init_tracing};
