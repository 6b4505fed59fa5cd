/// Item Repository
///
/// Reads cards and collections through the `ranking_item_source` view.
/// The item-owning schema provides that view and applies visibility rules
/// in it; this repository only filters on its `is_visible` column.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{ChangedItem, DisplayItem, ItemKind, RankingSignals, RecentItem};
use crate::services::sources::{ItemStore, SignalSource};

fn source_error(context: &'static str) -> impl Fn(sqlx::Error) -> AppError {
    move |e| {
        error!(error = %e, "{}", context);
        AppError::Source(format!("{context}: {e}"))
    }
}

#[derive(Clone)]
pub struct PgItemStore {
    pool: PgPool,
}

impl PgItemStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ItemStore for PgItemStore {
    async fn list_changed_items(
        &self,
        kind: ItemKind,
        since: DateTime<Utc>,
    ) -> Result<Vec<ChangedItem>> {
        let rows = sqlx::query_as::<_, (Uuid, DateTime<Utc>, Option<Uuid>)>(
            r#"
            SELECT item_id, created_at, owner_id
            FROM ranking_item_source
            WHERE item_kind = $1
                AND is_visible
                AND GREATEST(created_at, updated_at) >= $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(kind.as_str())
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(source_error("Failed to list changed items"))?;

        Ok(rows
            .into_iter()
            .map(|(id, created_at, owner_id)| ChangedItem {
                id,
                created_at,
                owner_id,
            })
            .collect())
    }

    async fn list_recent_visible(
        &self,
        kind: ItemKind,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RecentItem>> {
        let rows = sqlx::query_as::<_, (Uuid, DateTime<Utc>)>(
            r#"
            SELECT item_id, created_at
            FROM ranking_item_source
            WHERE item_kind = $1 AND is_visible
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(kind.as_str())
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(source_error("Failed to list recent items"))?;

        Ok(rows
            .into_iter()
            .map(|(id, created_at)| RecentItem { id, created_at })
            .collect())
    }

    async fn hydrate(&self, kind: ItemKind, ids: &[Uuid]) -> Result<Vec<DisplayItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<
            _,
            (
                Uuid,           // item_id
                String,         // title
                Option<String>, // thumbnail_url
                Option<String>, // canonical_url
                Option<Uuid>,   // owner_id
                Option<Uuid>,   // collection_id
                i64,            // upvotes_count
                i64,            // saves_count
                i64,            // comments_count
                DateTime<Utc>,  // created_at
            ),
        >(
            r#"
            SELECT item_id, title, thumbnail_url, canonical_url, owner_id, collection_id,
                   upvotes_count, saves_count, comments_count, created_at
            FROM ranking_item_source
            WHERE item_kind = $1 AND is_visible AND item_id = ANY($2)
            "#,
        )
        .bind(kind.as_str())
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(source_error("Failed to hydrate items"))?;

        Ok(rows
            .into_iter()
            .map(
                |(
                    id,
                    title,
                    thumbnail_url,
                    canonical_url,
                    owner_id,
                    collection_id,
                    upvotes_count,
                    saves_count,
                    comments_count,
                    created_at,
                )| DisplayItem {
                    id,
                    kind,
                    title,
                    thumbnail_url,
                    canonical_url,
                    owner_id,
                    collection_id,
                    upvotes_count,
                    saves_count,
                    comments_count,
                    created_at,
                },
            )
            .collect())
    }
}

#[async_trait]
impl SignalSource for PgItemStore {
    async fn get_signals(&self, kind: ItemKind, item_id: Uuid) -> Result<RankingSignals> {
        let row = sqlx::query_as::<
            _,
            (
                i64,           // upvotes_count
                i64,           // saves_count
                i64,           // comments_count
                i64,           // visits_count
                f64,           // age_hours
                Option<f64>,   // creator_quality
                f64,           // promotion_boost
                f64,           // abuse_factor
            ),
        >(
            r#"
            SELECT upvotes_count, saves_count, comments_count, visits_count,
                   EXTRACT(EPOCH FROM (NOW() - created_at))::FLOAT8 / 3600.0 AS age_hours,
                   creator_quality::FLOAT8,
                   COALESCE(promotion_boost, 0)::FLOAT8,
                   COALESCE(abuse_factor, 1)::FLOAT8
            FROM ranking_item_source
            WHERE item_kind = $1 AND item_id = $2
            "#,
        )
        .bind(kind.as_str())
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(source_error("Failed to fetch ranking signals"))?
        .ok_or_else(|| AppError::NotFound(format!("{kind} {item_id}")))?;

        let (upvotes, saves, comments, visits, age_hours, creator_quality, promotion_boost, abuse) =
            row;

        Ok(RankingSignals {
            upvotes_count: upvotes.max(0) as u64,
            saves_count: saves.max(0) as u64,
            comments_count: comments.max(0) as u64,
            visits_count: visits.max(0) as u64,
            age_hours,
            creator_quality,
            promotion_boost,
            abuse_factor: abuse,
        })
    }
}
