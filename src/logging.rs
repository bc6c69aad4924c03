use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogFormat;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `level`. Logs go to stderr.
pub fn init(level: &str, format: LogFormat) -> Result<()> {
    let env = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("invalid log level {level:?}"))?,
    };
    let base = fmt::layer().with_target(false).with_writer(std::io::stderr);
    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env)
            .with(base.json())
            .try_init()?,
        LogFormat::Text => tracing_subscriber::registry()
            .with(env)
            .with(base.compact())
            .try_init()?,
    }
    Ok(())
}
