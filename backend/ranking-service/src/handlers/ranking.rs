/// Ranking maintenance handlers
///
/// Operator-triggered recompute, engagement events and view refresh.
use actix_web::{post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::RankingHandlerState;
use crate::error::{AppError, Result};
use crate::models::{ItemKind, MAX_WINDOW_DAYS};

/// Body of POST /api/v1/ranking/recompute
#[derive(Debug, Deserialize)]
pub struct RecomputeRequest {
    pub kind: ItemKind,
    pub changed_since_days: Option<i64>,
    #[serde(default)]
    pub dry_run: bool,
}

/// Body of POST /api/v1/ranking/events
#[derive(Debug, Deserialize)]
pub struct EngagementEvent {
    pub kind: ItemKind,
    pub item_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub accepted: bool,
}

/// POST /api/v1/ranking/recompute
///
/// Runs a full recompute inline and returns its report.
#[post("/ranking/recompute")]
pub async fn trigger_recompute(
    body: web::Json<RecomputeRequest>,
    state: web::Data<RankingHandlerState>,
) -> Result<HttpResponse> {
    let changed_since_days = body
        .changed_since_days
        .unwrap_or(state.default_changed_since_days);
    if !(0..=MAX_WINDOW_DAYS).contains(&changed_since_days) {
        return Err(AppError::Validation(format!(
            "changed_since_days must be between 0 and {MAX_WINDOW_DAYS}"
        )));
    }

    info!(
        kind = %body.kind,
        changed_since_days,
        dry_run = body.dry_run,
        "Operator triggered full recompute"
    );

    let report = state
        .recompute
        .run(body.kind, changed_since_days, body.dry_run)
        .await?;
    Ok(HttpResponse::Ok().json(report))
}

/// POST /api/v1/ranking/events
///
/// Always 202: a dropped delta is picked up by the next full recompute.
#[post("/ranking/events")]
pub async fn record_event(
    body: web::Json<EngagementEvent>,
    state: web::Data<RankingHandlerState>,
) -> HttpResponse {
    let accepted = state.delta.trigger(body.kind, body.item_id);
    HttpResponse::Accepted().json(AcceptedResponse { accepted })
}

/// POST /api/v1/ranking/view/refresh
#[post("/ranking/view/refresh")]
pub async fn refresh_view(state: web::Data<RankingHandlerState>) -> HttpResponse {
    let view = state.view.clone();
    tokio::spawn(async move {
        view.refresh().await;
    });
    HttpResponse::Accepted().json(AcceptedResponse { accepted: true })
}
