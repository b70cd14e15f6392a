use anyhow::{Context, Result};
use std::env;
use std::fs::File;
use std::path::Path;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const LOG_FILE_NAME: &str = "sap_automation.log";

/// Level from `LOG_LEVEL`, defaulting to info.
pub fn log_level() -> Level {
    env::var("LOG_LEVEL")
        .map(|level| parse_level(&level))
        .unwrap_or(Level::INFO)
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    }
}

/// Log to stderr and to `<log_dir>/sap_automation.log`.
///
/// The file is truncated on every run. Keep the returned guard alive until
/// exit, dropping it flushes the file writer.
pub fn init_logging(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let path = log_dir.join(LOG_FILE_NAME);
    let file = File::create(&path)
        .with_context(|| format!("Failed to create log file {}", path.display()))?;
    let (file_writer, guard) = tracing_appender::non_blocking(file);

    let filter = || EnvFilter::from_default_env().add_directive(log_level().into());

    tracing_subscriber::registry()
        .with(
            // Console layer
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter()),
        )
        .with(
            // File layer
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(true)
                .with_filter(filter()),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("warn"), Level::WARN);
        assert_eq!(parse_level("verbose"), Level::INFO);
    }
}
