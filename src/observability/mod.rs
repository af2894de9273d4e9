use tracing::Subscriber;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, ObservabilityConfig};

type FormatLayer = Box<dyn Layer<Layered<EnvFilter, Registry>> + Send + Sync>;

/// The subscriber `config` describes, without installing it. `RUST_LOG`
/// overrides the configured level.
pub fn subscriber(config: &ObservabilityConfig) -> impl Subscriber + Send + Sync + use<> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let format: FormatLayer = match config.log_format {
        LogFormat::Json => fmt::layer().json().boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
    };

    tracing_subscriber::registry().with(filter).with(format)
}

/// Install the global subscriber. Later calls are no-ops, so embedding
/// applications that already set one up keep theirs.
pub fn init_tracing(config: &ObservabilityConfig) {
    if subscriber(config).try_init().is_err() {
        tracing::debug!("global tracing subscriber already installed");
    }
}
