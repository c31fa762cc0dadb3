//! Tracing setup. Logs go to a daily rolling file so stdout stays clean for
//! command output; `--verbose` mirrors debug events to stderr.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the global subscriber. Keep the returned guard alive for the
/// whole run, or buffered file output is lost.
pub fn init(verbose: bool) -> Option<WorkerGuard> {
  let (file_layer, guard) = match log_dir() {
    Some(dir) if std::fs::create_dir_all(&dir).is_ok() => {
      let appender = tracing_appender::rolling::daily(&dir, "mailctl.log");
      let (writer, guard) = tracing_appender::non_blocking(appender);
      let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_filter(file_filter());
      (Some(layer), Some(guard))
    }
    _ => (None, None),
  };

  let stderr_layer = verbose.then(|| {
    fmt::layer()
      .with_writer(std::io::stderr)
      .with_target(false)
      .with_filter(EnvFilter::new("mailctl=debug"))
  });

  let _ = tracing_subscriber::registry()
    .with(file_layer)
    .with(stderr_layer)
    .try_init();

  guard
}

fn file_filter() -> EnvFilter {
  EnvFilter::try_from_env("MAILCTL_LOG").unwrap_or_else(|_| EnvFilter::new("info"))
}

fn log_dir() -> Option<PathBuf> {
  dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .map(|dir| dir.join("mailctl").join("logs"))
}
