// src/metrics.rs
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec, TextEncoder,
};
use std::net::SocketAddr;
use std::time::Duration;

use crate::types::{Outcome, UpdateAttempt};

pub static CYCLES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "oracle_cycles_total", "Update cycles by outcome", &["outcome"] // skipped|confirmed|failed
    ).unwrap()
});

pub static CYCLE_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "oracle_cycle_errors_total", "Failed cycles by error kind", &["kind"]
    ).unwrap()
});

pub static CYCLE_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "oracle_cycle_seconds",
        "Wall time of one update cycle",
        &["outcome"],
        vec![0.05, 0.25, 1.0, 2.5, 5.0, 15.0, 30.0, 60.0, 180.0]
    ).unwrap()
});

fn outcome_label(o: Outcome) -> &'static str {
    match o {
        Outcome::Skipped => "skipped",
        Outcome::Sent => "sent",
        Outcome::Confirmed => "confirmed",
        Outcome::Failed => "failed",
    }
}

pub fn observe_cycle(attempt: &UpdateAttempt, elapsed: Duration) {
    let outcome = outcome_label(attempt.outcome);
    CYCLES_TOTAL.with_label_values(&[outcome]).inc();
    CYCLE_SECONDS.with_label_values(&[outcome]).observe(elapsed.as_secs_f64());
    if let Some(kind) = attempt.error {
        CYCLE_ERRORS_TOTAL.with_label_values(&[kind.as_str()]).inc();
    }
}

/// Prometheus text exposition of the default registry.
pub fn render() -> String {
    let mut buf = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut buf) {
        tracing::warn!("metrics encode failed: {e}");
    }
    String::from_utf8(buf).unwrap_or_default()
}

/// Serve `/metrics` until the process exits.
pub async fn serve(addr: SocketAddr) -> std::io::Result<()> {
    let app = axum::Router::new().route("/metrics", axum::routing::get(|| async { render() }));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "metrics listening");
    axum::serve(listener, app).await
}
