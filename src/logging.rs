//! Logging setup with journald support on Linux.
//!
//! Events go to systemd's journal when it is reachable, otherwise to a daily
//! rolling file. Storage failures are reported through here and never abort
//! the session, so this is where lost writes show up.

use anyhow::Result;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Environment variable holding the log filter, e.g. `PHOTONOTES_LOG=debug`
pub const LOG_ENV: &str = "PHOTONOTES_LOG";

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Daily rolling log file under `directory`. Buffered events are written
/// out when the guard is dropped.
fn file_writer(directory: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(directory)?;
    let file_appender = tracing_appender::rolling::daily(directory, "photonotes.log");
    Ok(tracing_appender::non_blocking(file_appender))
}

/// Initialize the global subscriber. Call once at startup.
///
/// With the file backend the returned guard must be held until exit,
/// otherwise the last events are lost.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = env_filter(&config.level);

    #[cfg(target_os = "linux")]
    {
        if let Ok(journald_layer) = tracing_journald::layer() {
            tracing_subscriber::registry()
                .with(filter)
                .with(journald_layer)
                .try_init()?;

            tracing::info!("Logging initialized with journald backend");
            return Ok(None);
        }
    }

    let (non_blocking, guard) = file_writer(&config.directory)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init()?;

    tracing::info!(directory = ?config.directory, "Logging initialized with file backend");
    Ok(Some(guard))
}
