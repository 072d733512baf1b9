use tracing_subscriber::EnvFilter;

use crate::error::{Result, SyncError};

/// Installs the global stderr subscriber. `RUST_LOG` overrides the default
/// level, which is `info`, or `debug` when `verbose` is set.
pub fn init_tracing(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|err| SyncError::Logging(err.to_string()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| SyncError::Logging(err.to_string()))
}
