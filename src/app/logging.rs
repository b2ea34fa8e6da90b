//! Logging configuration and initialization

use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::app::config::AppConfig;

/// Environment variable overriding the verbosity-derived filter
pub const LOG_ENV: &str = "DATAGROWTH_LOG";

/// Filter from `DATAGROWTH_LOG`, then `RUST_LOG`, then verbosity
pub fn log_filter(config: &AppConfig) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(config.log_level()))
}

/// Install a fmt subscriber for the process.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_logging(config: &AppConfig) -> bool {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(log_filter(config))
        .with_target(config.verbose >= 2) // Show target module for -vv and above
        .with_thread_ids(config.verbose >= 3) // Show thread IDs for -vvv
        .with_line_number(config.verbose >= 3) // Show line numbers for -vvv
        .try_init()
        .is_ok();

    if installed {
        debug!("Datagrowth logging at verbosity level {}", config.verbose);
    }
    installed
}

/// Initialize tracing with just a verbosity level
pub fn init_tracing(verbose: u8) -> bool {
    init_logging(&AppConfig::new(verbose))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_install_is_not_an_error() {
        init_tracing(0);
        assert!(!init_tracing(1));
    }
}
