/// HTTP handlers
///
/// Feed reads live in `feed`; operator and engagement endpoints in `ranking`.
use actix_web::{get, web, HttpResponse};
use std::sync::Arc;

use crate::config::FeedConfig;
use crate::error::{AppError, Result};
use crate::jobs::{DeltaTrigger, FullRecomputeWorker};
use crate::metrics;
use crate::services::{FeedComposer, ViewRefresher};

pub mod feed;
pub mod ranking;

/// Shared state for every ranking endpoint
pub struct RankingHandlerState {
    pub composer: Arc<FeedComposer>,
    pub view: ViewRefresher,
    pub recompute: Arc<FullRecomputeWorker>,
    pub delta: DeltaTrigger,
    pub feed_config: FeedConfig,
    pub default_changed_since_days: i64,
}

#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}

#[get("/metrics")]
pub async fn serve_metrics() -> Result<HttpResponse> {
    let body = metrics::gather_text()
        .map_err(|e| AppError::Internal(format!("failed to encode metrics: {e}")))?;
    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(body))
}

/// Register every route; state is attached by the caller
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health).service(serve_metrics).service(
        web::scope("/api/v1")
            .service(feed::get_feed)
            .service(feed::get_ranked)
            .service(ranking::trigger_recompute)
            .service(ranking::record_event)
            .service(ranking::refresh_view),
    );
}
