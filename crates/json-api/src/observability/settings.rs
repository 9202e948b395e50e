//! Process-global observability runtime settings.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::config::ServerConfig;

static SLOW_REQUEST_THRESHOLD_MS: AtomicU64 = AtomicU64::new(1_000);
static OTEL_PARENT_PROPAGATION_ENABLED: AtomicBool = AtomicBool::new(false);

pub(super) fn apply_runtime_config(config: &ServerConfig) {
    let otlp = &config.observability.otlp;
    let threshold = u64::try_from(config.logging.slow_request_threshold().as_millis()).unwrap_or(u64::MAX);

    SLOW_REQUEST_THRESHOLD_MS.store(threshold, Ordering::Relaxed);
    OTEL_PARENT_PROPAGATION_ENABLED.store(otlp.otel_enabled && otlp.otel_propagate_parent, Ordering::Relaxed);
}

pub(super) fn slow_request_threshold_ms() -> u64 {
    SLOW_REQUEST_THRESHOLD_MS.load(Ordering::Relaxed)
}

pub(super) fn otel_parent_propagation_enabled() -> bool {
    OTEL_PARENT_PROPAGATION_ENABLED.load(Ordering::Relaxed)
}
