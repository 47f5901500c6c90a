use color_eyre::{eyre::eyre, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the configured level. When a log directory is set,
/// output goes to a daily-rolling file and the returned guard must be held
/// until exit so buffered lines are flushed.
pub fn init(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
  let env_filter = EnvFilter::try_from_default_env()
    .or_else(|_| EnvFilter::try_new(&logging.level))
    .map_err(|e| eyre!("Invalid log level {:?}: {}", logging.level, e))?;

  let (fmt_layer, guard) = match &logging.directory {
    Some(dir) => {
      let appender = tracing_appender::rolling::daily(dir, "diraasti-offline.log");
      let (writer, guard) = tracing_appender::non_blocking(appender);
      let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .boxed();
      (layer, Some(guard))
    }
    None => {
      let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .compact()
        .with_target(false)
        .boxed();
      (layer, None)
    }
  };

  tracing_subscriber::registry()
    .with(env_filter)
    .with(fmt_layer)
    .try_init()
    .map_err(|e| eyre!("Failed to install tracing subscriber: {}", e))?;

  Ok(guard)
}
