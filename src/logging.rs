//! Tracing subscriber setup.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::error::ConfigError;

const LOG_FILE_PREFIX: &str = "worker-registration.log";

/// Filter from `RUST_LOG` when set, otherwise from `level`.
pub fn build_filter(level: &str) -> Result<EnvFilter, ConfigError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|e| ConfigError::InvalidValue {
        key: "LOG_LEVEL".into(),
        message: e.to_string(),
    })
}

/// Install the global subscriber: compact stderr output, plus a daily rolling
/// file under `log_dir` when given.
///
/// Keep the returned guard alive for the life of the process, otherwise
/// buffered file output is lost.
pub fn init(level: &str, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>, ConfigError> {
    let filter = build_filter(level)?;

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| ConfigError::InvalidValue {
                key: "LOG_DIR".into(),
                message: format!("cannot create {}: {e}", dir.display()),
            })?;
            let (writer, guard) = tracing_appender::non_blocking(rolling::daily(dir, LOG_FILE_PREFIX));
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(file_layer)
        .try_init()
        .map_err(|e| ConfigError::ParseError(format!("failed to install logger: {e}")))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_directives_parse() {
        assert!(build_filter("debug").is_ok());
        assert!(build_filter("info,worker_registration=trace").is_ok());
    }
}
