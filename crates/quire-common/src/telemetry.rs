//! Telemetry for quire binaries.
//!
//! Provides:
//! - Prometheus metrics rendered for a `/metrics` endpoint
//! - Compact console tracing filtered by `RUST_LOG`
//!
//! # Usage
//!
//! ```ignore
//! use quire_common::telemetry::{self, TelemetryConfig};
//!
//! telemetry::init(TelemetryConfig::from_env("quire-server"));
//!
//! let app = Router::new()
//!     .route("/metrics", get(|| async { telemetry::render() }));
//!
//! metrics::counter!("quire_relay_updates_total").increment(1);
//! ```

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name for labeling (e.g., "quire-server", "quire-cli")
    pub service_name: String,
    /// Console log level (default: INFO, DEBUG in debug builds)
    pub console_level: Level,
    /// Install the prometheus recorder. Off for short-lived tools.
    pub metrics: bool,
}

impl TelemetryConfig {
    /// Defaults for `service_name`.
    ///
    /// - `RUST_LOG`: Standard env filter (optional, overrides console_level)
    pub fn from_env(service_name: impl Into<String>) -> Self {
        let console_level = if cfg!(debug_assertions) {
            Level::DEBUG
        } else {
            Level::INFO
        };

        Self {
            service_name: service_name.into(),
            console_level,
            metrics: true,
        }
    }

    pub fn without_metrics(mut self) -> Self {
        self.metrics = false;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.console_level.as_str().to_lowercase()))
    }
}

/// Initialize telemetry (metrics + tracing).
///
/// Call once at application startup.
pub fn init(config: TelemetryConfig) {
    if config.metrics {
        init_metrics();
    }
    init_tracing(&config);
}

/// Initialize just the prometheus metrics recorder.
///
/// If another recorder is already installed the handle still renders,
/// it just sees no samples.
pub fn init_metrics() -> &'static PrometheusHandle {
    PROMETHEUS_HANDLE.get_or_init(|| {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        if let Err(e) = metrics::set_global_recorder(recorder) {
            tracing::warn!(error = %e, "metrics recorder already installed");
        }
        handle
    })
}

fn init_tracing(config: &TelemetryConfig) {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_filter(config.env_filter());

    if tracing_subscriber::registry()
        .with(console_layer)
        .try_init()
        .is_err()
    {
        return;
    }

    tracing::debug!(service = %config.service_name, "telemetry initialized");
}

/// Get the prometheus handle.
pub fn handle() -> &'static PrometheusHandle {
    init_metrics()
}

/// Render metrics in prometheus text format.
pub fn render() -> String {
    handle().render()
}

// Re-export the metrics crate for convenience
pub use metrics::{counter, gauge, histogram};
