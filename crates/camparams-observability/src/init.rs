// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization
//!
//! Console output always; with `file-logging`, a timestamped run folder with
//! one combined JSON log and retention of the most recent runs.

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;

/// Console logging options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOptions {
    /// Base level for everything without a debug flag
    pub level: String,
    /// JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Filter built from the debug flags and base level
pub fn build_env_filter(debug_flags: &CrateDebugFlags, base_level: &str) -> Result<EnvFilter> {
    let filter = debug_flags.to_filter_string(base_level);
    EnvFilter::try_new(&filter).with_context(|| format!("Invalid log filter: {}", filter))
}

fn console_layer(
    debug_flags: &CrateDebugFlags,
    options: &LogOptions,
) -> Result<Box<dyn Layer<Registry> + Send + Sync>> {
    let filter = build_env_filter(debug_flags, &options.level)?;
    let layer = if options.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_filter(filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .with_filter(filter)
            .boxed()
    };
    Ok(layer)
}

/// Install a console subscriber
///
/// # Errors
///
/// Fails if the filter is invalid or a global subscriber is already set.
pub fn init_console_logging(debug_flags: &CrateDebugFlags, options: &LogOptions) -> Result<()> {
    Registry::default()
        .with(console_layer(debug_flags, options)?)
        .try_init()
        .context("Failed to install tracing subscriber")
}

#[cfg(feature = "file-logging")]
pub use file::{init_logging, LoggingGuard};

#[cfg(feature = "file-logging")]
mod file {
    use std::path::{Path, PathBuf};

    use anyhow::{Context, Result};
    use chrono::{Local, NaiveDateTime};
    use tracing_appender::rolling;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{Layer, Registry};

    use super::{build_env_filter, console_layer, LogOptions};
    use crate::cli::CrateDebugFlags;

    const RUN_PREFIX: &str = "run_";
    const RUN_FORMAT: &str = "%Y%m%d_%H%M%S";

    /// Keeps the non-blocking writer alive; logs are flushed on drop
    pub struct LoggingGuard {
        _file_guard: tracing_appender::non_blocking::WorkerGuard,
    }

    /// Initialize console plus file logging
    ///
    /// ```text
    /// ./logs/
    ///   └── run_20250101_120000/
    ///       └── camparams.log   (JSON lines, all crates)
    /// ```
    ///
    /// # Arguments
    /// * `log_dir` - Base directory for logs (default: `./logs`)
    /// * `retention_runs` - Keep N most recent runs (default: 10)
    pub fn init_logging(
        debug_flags: &CrateDebugFlags,
        options: &LogOptions,
        log_dir: Option<PathBuf>,
        retention_runs: Option<usize>,
    ) -> Result<LoggingGuard> {
        let base_log_dir = log_dir.unwrap_or_else(|| PathBuf::from("./logs"));
        let run_folder = base_log_dir.join(format!("{}{}", RUN_PREFIX, Local::now().format(RUN_FORMAT)));
        std::fs::create_dir_all(&run_folder)
            .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;

        cleanup_old_runs(&base_log_dir, retention_runs.unwrap_or(10))?;

        let appender = rolling::daily(&run_folder, "camparams.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .json()
            .with_filter(build_env_filter(debug_flags, &options.level)?)
            .boxed();

        Registry::default()
            .with(vec![console_layer(debug_flags, options)?, file_layer])
            .try_init()
            .context("Failed to install tracing subscriber")?;

        Ok(LoggingGuard { _file_guard: guard })
    }

    /// Remove all but the `keep` most recent run folders
    pub(crate) fn cleanup_old_runs(base_log_dir: &Path, keep: usize) -> Result<()> {
        if !base_log_dir.exists() {
            return Ok(());
        }

        let mut runs: Vec<(PathBuf, NaiveDateTime)> = Vec::new();
        for entry in std::fs::read_dir(base_log_dir)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let stamp = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix(RUN_PREFIX))
                .and_then(|s| NaiveDateTime::parse_from_str(s, RUN_FORMAT).ok());
            if let Some(stamp) = stamp {
                runs.push((path, stamp));
            }
        }

        runs.sort_by_key(|(_, stamp)| *stamp);
        let excess = runs.len().saturating_sub(keep);
        for (path, _) in runs.iter().take(excess) {
            if let Err(e) = std::fs::remove_dir_all(path) {
                eprintln!("Warning: Failed to remove old log directory {}: {}", path.display(), e);
            }
        }
        Ok(())
    }

}
