//! Tracing subscriber setup

use crate::config::ObservabilityConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global subscriber and apply `metrics_enabled`. `RUST_LOG` and
/// `LOG_FORMAT` override the configured filter and format. Returns `false`
/// if a subscriber was already installed.
pub fn init_tracing(config: &ObservabilityConfig) -> bool {
    crate::metrics::set_enabled(config.metrics_enabled);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| config.log_format.clone());

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if format.eq_ignore_ascii_case("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    installed.is_ok()
}
