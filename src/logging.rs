//! Logging configuration and initialization for roomchat.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::Result;

/// Parse a log level name. Unknown names yield `None`.
fn parse_level(level: &str) -> Option<Level> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn filter_for(level: &str) -> EnvFilter {
    let level = parse_level(level).unwrap_or(Level::INFO);
    EnvFilter::from_default_env().add_directive(level.into())
}

/// Initialize logging to stdout and the configured log file.
///
/// The file is appended to, so restarts keep earlier logs. An empty
/// `file` setting means console only.
pub fn init(config: &LoggingConfig) -> Result<()> {
    if config.file.trim().is_empty() {
        init_console_only(&config.level);
        return Ok(());
    }

    if let Some(parent) = Path::new(&config.file).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.file)?;
    let writer = std::io::stdout.and(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false),
        )
        .with(filter_for(&config.level))
        .init();

    if parse_level(&config.level).is_none() {
        tracing::warn!("Unknown log level '{}', using info", config.level);
    }

    Ok(())
}

/// Initialize console-only logging.
pub fn init_console_only(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_ansi(true)
                .with_target(true),
        )
        .with(filter_for(level))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level_names() {
        assert_eq!(parse_level("trace"), Some(Level::TRACE));
        assert_eq!(parse_level("DEBUG"), Some(Level::DEBUG));
        assert_eq!(parse_level(" info "), Some(Level::INFO));
        assert_eq!(parse_level("warning"), Some(Level::WARN));
        assert_eq!(parse_level("Error"), Some(Level::ERROR));
    }

    #[test]
    fn test_parse_level_unknown() {
        assert_eq!(parse_level("verbose"), None);
        assert_eq!(parse_level(""), None);
    }
}
