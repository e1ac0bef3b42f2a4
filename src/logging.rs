//! Logging setup for taskbot using tracing.
//!
//! Logs go to stderr and to a daily file under `TASKBOT_LOG_DIR` (or the
//! platform data dir). `TASKBOT_LOG_FORMAT=json` writes the file as one JSON
//! object per line.

use anyhow::Result;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_DIR_ENV: &str = "TASKBOT_LOG_DIR";
pub const LOG_FORMAT_ENV: &str = "TASKBOT_LOG_FORMAT";

// teloxide logs every polling hiccup at info.
const DEFAULT_FILTER: &str = "info,taskbot=debug,teloxide=warn";
const LOG_FILE_PREFIX: &str = "taskbot.log";

/// Encoding of the log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Text,
    Json,
}

impl FileFormat {
    fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => FileFormat::Json,
            _ => FileFormat::Text,
        }
    }
}

/// Install the global subscriber. Keep the returned guard alive until exit,
/// buffered file lines are lost otherwise.
pub fn init() -> Result<(WorkerGuard, PathBuf)> {
    let log_dir = log_dir(std::env::var_os(LOG_DIR_ENV).map(PathBuf::from))?;
    std::fs::create_dir_all(&log_dir)?;
    let format = FileFormat::from_env_value(std::env::var(LOG_FORMAT_ENV).ok().as_deref());

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // Exactly one file layer is installed.
    let (text_file, json_file) = match format {
        FileFormat::Text => (
            Some(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            ),
            None,
        ),
        FileFormat::Json => (None, Some(fmt::layer().json().with_writer(writer))),
    };

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(text_file)
        .with(json_file)
        .with(console)
        .init();

    tracing::info!("taskbot logging to {} ({:?})", log_dir.display(), format);

    Ok((guard, log_dir))
}

/// The override when set, otherwise `logs/` under the platform data dir.
fn log_dir(dir_override: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = dir_override.filter(|d| !d.as_os_str().is_empty()) {
        return Ok(dir);
    }
    let dirs = directories::ProjectDirs::from("com", "taskbot", "taskbot")
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;

    Ok(dirs.data_dir().join("logs"))
}

/// Console-only logging for tests. Later calls are no-ops.
#[cfg(test)]
pub fn init_test() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_test_writer())
        .try_init();
}
