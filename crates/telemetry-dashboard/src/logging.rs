use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{Error, Result};

pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// `RUST_LOG` wins over the configured level.
pub fn env_filter(cfg: &LoggingConfig) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .map_err(|e| Error::msg(format!("invalid log level '{}': {e}", cfg.level)))
}

/// Text or JSON formatter. With `to_file` the output goes to `cfg.file`
/// (the terminal belongs to the TUI); otherwise to stderr.
pub fn format_layer(cfg: &LoggingConfig, to_file: bool) -> Result<BoxedLayer> {
    let writer = if to_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&cfg.file)
            .map_err(|e| {
                Error::msg(format!("failed to open log file {}: {e}", cfg.file.display()))
            })?;
        BoxMakeWriter::new(Mutex::new(file))
    } else {
        BoxMakeWriter::new(std::io::stderr)
    };

    Ok(match cfg.format {
        LogFormat::Json => fmt::layer()
            .with_writer(writer)
            .with_ansi(!to_file)
            .json()
            .boxed(),
        LogFormat::Text => fmt::layer()
            .with_writer(writer)
            .with_ansi(!to_file)
            .boxed(),
    })
}

/// Installs the global subscriber.
pub fn init_logging(cfg: &LoggingConfig, to_file: bool) -> Result<()> {
    let filter = env_filter(cfg)?;
    let layer = format_layer(cfg, to_file)?;
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .map_err(|e| Error::msg(format!("failed to install log subscriber: {e}")))
}
