//! File-based tracing setup.
//!
//! The TUI owns the terminal, so logs go to a daily-rolling file under the
//! platform data directory instead of stdout. Level via `RUST_LOG`.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing. The returned guard must live as long as the process,
/// or buffered log lines are dropped on exit.
pub fn init() -> Result<WorkerGuard> {
  let proj_dirs = ProjectDirs::from("", "", "flick").context("Could not determine a log directory")?;
  let log_dir = proj_dirs.data_dir().join("logs");
  std::fs::create_dir_all(&log_dir)
    .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

  let appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "flick.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flick=debug,warn"));

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_writer(writer).with_ansi(false).with_target(true))
    .init();

  tracing::info!(dir = %log_dir.display(), "logging initialized");
  Ok(guard)
}
