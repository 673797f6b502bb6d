use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_error::ErrorLayer;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "ZENNIT_LOG";
const LOG_FILE: &str = "zennit.log";

pub fn log_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("zennit")
}

pub fn log_path() -> PathBuf {
    log_dir().join(LOG_FILE)
}

/// Logs go to a file; the terminal belongs to the ui. `ZENNIT_LOG` takes
/// precedence over `level` when set.
pub fn init(level: LogLevel) -> Result<PathBuf> {
    let dir = log_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("logging: create directory {}", dir.display()))?;
    let path = dir.join(LOG_FILE);
    let log_file = fs::File::create(&path)
        .with_context(|| format!("logging: create {}", path.display()))?;

    let filter = EnvFilter::builder()
        .with_default_directive(level.try_into().context("logging: parse level")?)
        .with_env_var(LOG_ENV)
        .from_env_lossy();

    let file_subscriber = fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_writer(log_file)
        .with_target(true)
        .with_ansi(false);
    tracing_subscriber::registry()
        .with(filter)
        .with(file_subscriber)
        .with(ErrorLayer::default())
        .try_init()
        .context("logging: install subscriber")?;

    Ok(path)
}
