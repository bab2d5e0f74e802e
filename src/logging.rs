use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, fmt::time::ChronoLocal, layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::{
    config::{LogConfig, LogFormat},
    error::{ApiError, Result},
};

const LOG_FILE_PREFIX: &str = "atlas-metadata.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// `RUST_LOG` when set, otherwise the configured directive
fn env_filter(default: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(default)
        .map_err(|e| ApiError::Config(format!("Invalid log level {default:?}: {e}")))
}

fn layer<W>(format: LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_timer(ChronoLocal::rfc_3339())
        .with_target(true)
        .with_ansi(ansi)
        .with_writer(writer);

    match format {
        LogFormat::Text => layer.boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = env_filter(&config.level)?;
    let mut layers: Vec<BoxedLayer> = vec![layer(config.format, std::io::stdout, true)];

    let guard = config.directory.as_ref().map(|directory| {
        let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        layers.push(layer(config.format, writer, false));
        guard
    });

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| ApiError::Config(format!("Failed to install tracing subscriber: {e}")))?;

    Ok(guard)
}
