//! Ranking Metrics
//!
//! Prometheus metrics for the recompute workers, the feed composer and the
//! precomputed view refresher.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};
use std::time::Duration;

static FULL_RECOMPUTE_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "ranking_full_recompute_runs_total",
        "Full recompute runs by kind and status",
        &["kind", "status"]
    )
    .expect("Failed to register full recompute runs metric")
});

static FULL_RECOMPUTE_ITEMS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "ranking_full_recompute_items_total",
        "Items processed by full recompute, by kind and outcome",
        &["kind", "outcome"]
    )
    .expect("Failed to register full recompute items metric")
});

static FULL_RECOMPUTE_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "ranking_full_recompute_duration_seconds",
        "Duration of full recompute runs",
        &["kind"],
        vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0]
    )
    .expect("Failed to register full recompute duration metric")
});

static DELTA_RECOMPUTE_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "ranking_delta_recompute_total",
        "Delta recomputes by kind and outcome (updated/debounced/dropped/error)",
        &["kind", "outcome"]
    )
    .expect("Failed to register delta recompute metric")
});

static FEED_KIND_FETCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "ranking_feed_kind_fetches_total",
        "Per-kind feed fetches by kind and source (ranked/recency/timeout/error)",
        &["kind", "source"]
    )
    .expect("Failed to register feed fetch metric")
});

static FEED_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "ranking_feed_compose_duration_seconds",
        "Duration of feed composition",
        &["status"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register feed duration metric")
});

static VIEW_REFRESH_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "ranking_view_refresh_total",
        "Precomputed view refreshes by status",
        &["status"]
    )
    .expect("Failed to register view refresh metric")
});

/// Record a full recompute run (success/error/cancelled/aborted)
pub fn record_full_recompute_run(kind: &str, status: &str, duration: Duration) {
    FULL_RECOMPUTE_RUNS_TOTAL
        .with_label_values(&[kind, status])
        .inc();
    FULL_RECOMPUTE_DURATION_SECONDS
        .with_label_values(&[kind])
        .observe(duration.as_secs_f64());
}

pub fn record_full_recompute_items(kind: &str, succeeded: u32, failed: u32) {
    FULL_RECOMPUTE_ITEMS_TOTAL
        .with_label_values(&[kind, "succeeded"])
        .inc_by(u64::from(succeeded));
    FULL_RECOMPUTE_ITEMS_TOTAL
        .with_label_values(&[kind, "failed"])
        .inc_by(u64::from(failed));
}

pub fn record_delta(kind: &str, outcome: &str) {
    DELTA_RECOMPUTE_TOTAL
        .with_label_values(&[kind, outcome])
        .inc();
}

pub fn record_feed_fetch(kind: &str, source: &str) {
    FEED_KIND_FETCHES_TOTAL.with_label_values(&[kind, source]).inc();
}

pub fn record_feed_duration(status: &str, duration: Duration) {
    FEED_DURATION_SECONDS
        .with_label_values(&[status])
        .observe(duration.as_secs_f64());
}

pub fn record_view_refresh(status: &str) {
    VIEW_REFRESH_TOTAL.with_label_values(&[status]).inc();
}

/// Render every registered metric in the Prometheus text format
pub fn gather_text() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
