//! Logging setup

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes the tracing subscriber
///
/// Both the library and the binary log at `default_log_level`; the
/// `RUST_LOG` environment variable overrides the filter entirely. HTTP
/// request spans from `tower_http` follow the same level.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g. "quizhost_server")
/// * `default_log_level` - The default log level (e.g. "debug", "info")
pub fn setup_logger(binary_name: &str, default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(binary_name, default_log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn default_filter(binary_name: &str, default_log_level: &str) -> String {
    format!(
        "{}={level},{}={level},tower_http={level}",
        env!("CARGO_PKG_NAME").replace('-', "_"),
        binary_name.replace('-', "_"),
        level = default_log_level,
    )
}
