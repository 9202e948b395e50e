//! Prometheus metrics collection and exposition endpoint.

use std::sync::OnceLock;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
    core::Collector,
};
use salvo::{
    Request, Response, handler,
    http::{
        StatusCode,
        header::{CONTENT_TYPE, HeaderValue},
    },
};
use tracing::error;

#[derive(Debug)]
struct Metrics {
    registry: Registry,
    requests_total: IntCounterVec,
    request_duration_seconds: HistogramVec,
    requests_in_flight: IntGauge,
    checkouts_total: IntCounterVec,
    webhook_events_total: IntCounterVec,
    reservations_expired_total: IntCounterVec,
    outbox_deliveries_total: IntCounterVec,
}

static METRICS: OnceLock<Option<Metrics>> = OnceLock::new();

#[derive(Debug)]
pub(crate) struct InFlightRequestGuard {
    tracked: bool,
}

impl InFlightRequestGuard {
    pub(crate) fn track() -> Self {
        let Some(metrics) = metrics() else {
            return Self { tracked: false };
        };

        metrics.requests_in_flight.inc();

        Self { tracked: true }
    }
}

impl Drop for InFlightRequestGuard {
    fn drop(&mut self) {
        if self.tracked
            && let Some(metrics) = metrics()
        {
            metrics.requests_in_flight.dec();
        }
    }
}

pub(crate) fn observe_request(method: &str, route: &str, status_code: u16, duration_seconds: f64) {
    let Some(metrics) = metrics() else {
        return;
    };

    let status_code_label = status_code.to_string();

    metrics
        .requests_total
        .with_label_values(&[method, route, status_class(status_code), status_code_label.as_str()])
        .inc();

    metrics
        .request_duration_seconds
        .with_label_values(&[method, route])
        .observe(duration_seconds);
}

/// Count one checkout attempt; `outcome` is `created` or an error kind.
pub(crate) fn observe_checkout(outcome: &str) {
    if let Some(metrics) = metrics() {
        metrics.checkouts_total.with_label_values(&[outcome]).inc();
    }
}

/// Count one gateway webhook delivery by outcome.
pub(crate) fn observe_webhook(outcome: &str) {
    if let Some(metrics) = metrics() {
        metrics.webhook_events_total.with_label_values(&[outcome]).inc();
    }
}

/// Count holds released by one sweep.
pub(crate) fn observe_sweep(timed_out_orders: usize, orphan_holds: u64) {
    let Some(metrics) = metrics() else {
        return;
    };

    metrics
        .reservations_expired_total
        .with_label_values(&["order_timed_out"])
        .inc_by(u64::try_from(timed_out_orders).unwrap_or(u64::MAX));

    metrics
        .reservations_expired_total
        .with_label_values(&["orphan"])
        .inc_by(orphan_holds);
}

/// Count outbox entries handled by one drain.
pub(crate) fn observe_outbox(processed: usize, retried: usize, failed: usize) {
    let Some(metrics) = metrics() else {
        return;
    };

    for (outcome, count) in [("processed", processed), ("retried", retried), ("failed", failed)] {
        metrics
            .outbox_deliveries_total
            .with_label_values(&[outcome])
            .inc_by(u64::try_from(count).unwrap_or(u64::MAX));
    }
}

#[handler]
pub(crate) async fn metrics_handler(_req: &mut Request, res: &mut Response) {
    let Some(metrics) = metrics() else {
        res.status_code(StatusCode::INTERNAL_SERVER_ERROR);
        return;
    };

    let encoder = TextEncoder::new();
    let mut encoded = Vec::new();

    if let Err(source) = encoder.encode(&metrics.registry.gather(), &mut encoded) {
        error!("failed to encode metrics response: {source}");
        res.status_code(StatusCode::INTERNAL_SERVER_ERROR);

        return;
    }

    match HeaderValue::from_str(encoder.format_type()) {
        Ok(content_type) => {
            res.headers_mut().insert(CONTENT_TYPE, content_type);
            res.render(String::from_utf8_lossy(&encoded).into_owned());
        }
        Err(source) => {
            error!("failed to encode metrics content type header: {source}");
            res.status_code(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}

fn metrics() -> Option<&'static Metrics> {
    METRICS
        .get_or_init(|| {
            build_metrics()
                .inspect_err(|source| error!("failed to build metrics registry: {source}"))
                .ok()
        })
        .as_ref()
}

fn register<M>(registry: &Registry, metric: M) -> prometheus::Result<M>
where
    M: Collector + Clone + 'static,
{
    registry.register(Box::new(metric.clone()))?;

    Ok(metric)
}

fn counter(name: &str, help: &str, labels: &[&str]) -> prometheus::Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
}

fn build_metrics() -> prometheus::Result<Metrics> {
    let registry = Registry::new();

    let requests_total = register(
        &registry,
        counter(
            "atelier_json_http_requests_total",
            "Total HTTP requests partitioned by method, route, status class, and status code.",
            &["method", "route", "status_class", "status_code"],
        )?,
    )?;

    let request_duration_seconds = register(
        &registry,
        HistogramVec::new(
            HistogramOpts::new(
                "atelier_json_http_request_duration_seconds",
                "HTTP request duration in seconds partitioned by method and route.",
            )
            .buckets(vec![
                0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "route"],
        )?,
    )?;

    let requests_in_flight = register(
        &registry,
        IntGauge::with_opts(Opts::new(
            "atelier_json_http_requests_in_flight",
            "Current number of in-flight HTTP requests.",
        ))?,
    )?;

    let checkouts_total = register(
        &registry,
        counter(
            "atelier_checkouts_total",
            "Checkout attempts partitioned by outcome.",
            &["outcome"],
        )?,
    )?;

    let webhook_events_total = register(
        &registry,
        counter(
            "atelier_webhook_events_total",
            "Gateway webhook deliveries partitioned by outcome.",
            &["outcome"],
        )?,
    )?;

    let reservations_expired_total = register(
        &registry,
        counter(
            "atelier_reservations_expired_total",
            "Reservations released by the sweeper partitioned by reason.",
            &["reason"],
        )?,
    )?;

    let outbox_deliveries_total = register(
        &registry,
        counter(
            "atelier_outbox_deliveries_total",
            "Outbox entries handled partitioned by outcome.",
            &["outcome"],
        )?,
    )?;

    Ok(Metrics {
        registry,
        requests_total,
        request_duration_seconds,
        requests_in_flight,
        checkouts_total,
        webhook_events_total,
        reservations_expired_total,
        outbox_deliveries_total,
    })
}

fn status_class(status_code: u16) -> &'static str {
    match status_code {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use salvo::{
        Router, Service,
        test::{ResponseExt, TestClient},
    };
    use testresult::TestResult;

    use super::*;

    #[tokio::test]
    async fn metrics_endpoint_exposes_http_and_domain_metrics() -> TestResult {
        observe_request("POST", "/checkout/intent", 200, 0.042);
        observe_checkout("created");
        observe_webhook("duplicate");
        observe_sweep(1, 2);
        observe_outbox(3, 0, 1);

        let service =
            Service::new(Router::new().push(Router::with_path("metrics").get(metrics_handler)));

        let response = TestClient::get("http://example.com/metrics")
            .send(&service)
            .await
            .take_string()
            .await?;

        for name in [
            "atelier_json_http_requests_total",
            "atelier_json_http_request_duration_seconds",
            "atelier_json_http_requests_in_flight",
            "atelier_checkouts_total",
            "atelier_webhook_events_total",
            "atelier_reservations_expired_total",
            "atelier_outbox_deliveries_total",
        ] {
            assert!(response.contains(name), "expected {name} in response");
        }

        Ok(())
    }

    #[test]
    fn status_codes_fall_into_classes() {
        assert_eq!(status_class(302), "3xx");
        assert_eq!(status_class(429), "4xx");
        assert_eq!(status_class(503), "5xx");
        assert_eq!(status_class(42), "other");
    }
}
