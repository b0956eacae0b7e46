//! Logging setup for binaries and tests that embed the data layer.
//!
//! The library itself only emits `tracing` events: cache activity at
//! `debug`, background refetch failures at `warn`, credential changes at
//! `info`. Installing a subscriber is left to the process.

use tracing::Subscriber;
use tracing::subscriber::set_global_default;
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line output with span timings, for interactive use.
    #[default]
    Pretty,
    /// One line per event, for test output.
    Compact,
}

/// Log an error with its full chain of causes.
pub fn log_error(e: impl Into<anyhow::Error>) {
    let e: anyhow::Error = e.into();
    tracing::error!("{e:#}");
}

/// Build a stderr subscriber. `RUST_LOG` takes precedence over
/// `default_filter`.
pub fn get_subscriber(
    default_filter: &str,
    format: LogFormat,
) -> impl Subscriber + Sync + Send {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    let pretty = (format == LogFormat::Pretty).then(|| {
        fmt::Layer::new()
            .with_writer(std::io::stderr)
            .pretty()
            .with_span_events(fmt::format::FmtSpan::CLOSE)
    });
    let compact = (format == LogFormat::Compact).then(|| {
        fmt::Layer::new()
            .with_writer(std::io::stderr)
            .compact()
            .with_target(false)
    });
    Registry::default().with(env_filter).with(pretty).with(compact)
}

/// Register a subscriber as global default and route `log` records to it.
///
/// Fails if a global subscriber is already installed.
pub fn init_subscriber(
    subscriber: impl Subscriber + Sync + Send,
) -> anyhow::Result<()> {
    LogTracer::init()?;
    set_global_default(subscriber)?;
    Ok(())
}
