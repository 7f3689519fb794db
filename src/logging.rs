use crate::config::LoggingConfig;
use anyhow::{anyhow, Context, Result};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Where log lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    /// The configured log file; used while a TUI owns the terminal
    File,
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the configured level.
pub fn init(config: &LoggingConfig, target: LogTarget) -> Result<()> {
    // A bad configured level is an error even when RUST_LOG overrides it
    let configured = EnvFilter::try_new(&config.level)
        .with_context(|| format!("Invalid log level: {}", config.level))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or(configured);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match (target, config.json) {
        (LogTarget::Stderr, false) => builder.with_writer(std::io::stderr).try_init(),
        (LogTarget::Stderr, true) => builder.json().with_writer(std::io::stderr).try_init(),
        (LogTarget::File, json) => {
            let file = open_log_file(&config.file)?;
            let builder = builder.with_ansi(false).with_writer(Mutex::new(file));
            if json {
                builder.json().try_init()
            } else {
                builder.try_init()
            }
        }
    };

    result.map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}
