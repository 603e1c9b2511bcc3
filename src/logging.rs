//! Tracing setup for the command-line tool.
//!
//! Logs go to stderr so that stdout stays free for reports, and optionally to a file as
//! well. `RUST_LOG` overrides the default filter.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

use crate::error::{BadspotError, Result};

fn build_env_filter(verbose: bool) -> EnvFilter {
    let default = if verbose {
        "badspot_predictor=debug,info"
    } else {
        "badspot_predictor=info,warn"
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the global subscriber. Calling it again is a no-op.
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    BadspotError::Config(format!(
                        "Failed to open log file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let stderr_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let installed = Registry::default()
        .with(build_env_filter(verbose))
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(verbose, "logging initialized");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        let dir = tempfile::TempDir::new().unwrap();
        let log_path = dir.path().join("badspot.log");

        assert!(init(false, Some(&log_path)).is_ok());
        assert!(init(true, None).is_ok());
        assert!(log_path.exists());
    }

    #[test]
    fn test_unwritable_log_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let log_path = dir.path().join("missing").join("badspot.log");

        assert!(matches!(init(false, Some(&log_path)), Err(BadspotError::Config(_))));
    }
}
