/// Feed API Handlers
///
/// Ranked mixed feed and paging through the precomputed ranked view
use actix_web::{get, web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::RankingHandlerState;
use crate::error::Result;
use crate::models::{ItemKind, PrecomputedRankedItem};
use crate::services::{FeedRequest, MixRatios};

/// Query parameters for GET /api/v1/feed
#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    /// "card", "collection" or absent for a mixed feed
    pub kind: Option<String>,
    pub card_ratio: Option<f64>,
    pub collection_ratio: Option<f64>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

/// Query parameters for GET /api/v1/ranked
#[derive(Debug, Deserialize)]
pub struct RankedQuery {
    pub kind: String,
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

#[derive(Debug, Serialize)]
pub struct RankedResponse {
    pub kind: ItemKind,
    pub items: Vec<PrecomputedRankedItem>,
    pub limit: usize,
    pub offset: usize,
}

fn parse_kind_filter(kind: Option<&str>) -> Result<Option<ItemKind>> {
    match kind.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(value) => value.parse().map(Some),
    }
}

/// GET /api/v1/feed
#[get("/feed")]
pub async fn get_feed(
    query: web::Query<FeedQuery>,
    state: web::Data<RankingHandlerState>,
) -> Result<HttpResponse> {
    let kind_filter = parse_kind_filter(query.kind.as_deref())?;
    let request = FeedRequest {
        kind_filter,
        mix: MixRatios {
            card: query.card_ratio.unwrap_or(state.feed_config.card_ratio),
            collection: query
                .collection_ratio
                .unwrap_or(state.feed_config.collection_ratio),
        },
        limit: state.feed_config.clamp_limit(query.limit),
        offset: query.offset,
    };

    debug!(
        kind = ?request.kind_filter,
        limit = request.limit,
        offset = request.offset,
        "Composing feed"
    );

    let page = state.composer.compose(&request).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// GET /api/v1/ranked
#[get("/ranked")]
pub async fn get_ranked(
    query: web::Query<RankedQuery>,
    state: web::Data<RankingHandlerState>,
) -> Result<HttpResponse> {
    let kind: ItemKind = query.kind.parse()?;
    let limit = state.feed_config.clamp_limit(query.limit);

    let items = state.view.list_precomputed(kind, limit, query.offset).await?;

    Ok(HttpResponse::Ok().json(RankedResponse {
        kind,
        items,
        limit,
        offset: query.offset,
    }))
}
