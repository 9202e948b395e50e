//! Logging, tracing export and profiling settings

use std::time::Duration;

use clap::{Args, ValueEnum};

/// How log lines are rendered.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogFormat {
    /// One line per event, for terminals.
    Compact,

    /// One JSON object per event, for log shippers.
    Json,
}

/// Logging settings.
#[derive(Debug, Args)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. `info` or `atelier_app=debug`
    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// Requests slower than this are logged at `warn`.
    #[arg(long = "slow-request-ms", env = "SLOW_REQUEST_THRESHOLD_MS", default_value_t = 1_000)]
    pub slow_request_ms: u64,
}

impl LoggingConfig {
    pub(crate) fn slow_request_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_request_ms)
    }
}

/// Service identity plus the optional OTLP and Pyroscope exporters.
#[derive(Debug, Args)]
pub struct ObservabilityConfig {
    #[arg(long, env = "OTEL_SERVICE_NAME", default_value = "atelier-json")]
    pub service_name: String,

    #[arg(long, env = "OTEL_SERVICE_VERSION", default_value = env!("CARGO_PKG_VERSION"))]
    pub service_version: String,

    /// Deployment environment reported with traces and profiles.
    #[arg(long, env = "DEPLOYMENT_ENVIRONMENT", default_value = "development")]
    pub environment: String,

    #[command(flatten)]
    pub otlp: OtlpConfig,

    #[command(flatten)]
    pub profiling: ProfilingConfig,
}

/// OTLP trace export over gRPC.
#[derive(Debug, Args)]
pub struct OtlpConfig {
    #[arg(long = "otel-enabled", env = "OTEL_ENABLED", default_value_t = false)]
    pub otel_enabled: bool,

    /// Continue traces from an incoming `traceparent` header.
    #[arg(long = "otel-propagate-parent", env = "OTEL_PROPAGATE_PARENT", default_value_t = false)]
    pub otel_propagate_parent: bool,

    #[arg(long = "otel-endpoint", env = "OTEL_EXPORTER_OTLP_ENDPOINT", default_value = "http://localhost:4317")]
    pub otel_endpoint: String,

    #[arg(long = "otel-timeout-seconds", env = "OTEL_EXPORTER_OTLP_TIMEOUT_SECONDS", default_value_t = 3)]
    pub otel_timeout_seconds: u64,

    /// Fraction of root traces kept, between 0 and 1.
    #[arg(long = "otel-sample-ratio", env = "OTEL_TRACE_SAMPLE_RATIO", default_value_t = 1.0)]
    pub otel_sample_ratio: f64,
}

impl OtlpConfig {
    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_secs(self.otel_timeout_seconds)
    }

    pub(crate) fn sample_ratio(&self) -> f64 {
        self.otel_sample_ratio.clamp(0.0, 1.0)
    }
}

/// Continuous CPU profiling.
#[derive(Debug, Args)]
pub struct ProfilingConfig {
    #[arg(long = "pyroscope-enabled", env = "PYROSCOPE_ENABLED", default_value_t = false)]
    pub pyroscope_enabled: bool,

    #[arg(long = "pyroscope-address", env = "PYROSCOPE_SERVER_ADDRESS", default_value = "http://localhost:4040")]
    pub pyroscope_server_address: String,

    /// Samples per second.
    #[arg(long = "pyroscope-sample-rate", env = "PYROSCOPE_SAMPLE_RATE", default_value_t = 100)]
    pub pyroscope_sample_rate: u32,
}
