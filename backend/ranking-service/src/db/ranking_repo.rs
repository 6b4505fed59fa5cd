/// Ranking Repository
///
/// PostgreSQL storage for `ranking_scores`, `ranking_stats` and the
/// `ranked_items_view` materialized view.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use super::RankingStore;
use crate::error::{AppError, Result};
use crate::models::{ItemKind, PrecomputedRankedItem, RankingScore, RankingStats};

type ScoreRow = (
    String,                // item_kind
    Uuid,                  // item_id
    f64,                   // raw_score
    Option<f64>,           // norm_score
    DateTime<Utc>,         // last_raw_updated
    Option<DateTime<Utc>>, // last_norm_updated
    Option<DateTime<Utc>>, // last_event_at
);

fn score_from_row(row: ScoreRow) -> Result<RankingScore> {
    let (kind, item_id, raw_score, norm_score, last_raw_updated, last_norm_updated, last_event_at) =
        row;
    Ok(RankingScore {
        item_kind: kind.parse()?,
        item_id,
        raw_score,
        norm_score,
        last_raw_updated,
        last_norm_updated,
        last_event_at,
    })
}

fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> AppError {
    move |e| {
        error!(error = %e, "{}", context);
        AppError::Database(format!("{context}: {e}"))
    }
}

/// Ranking Repository
#[derive(Clone)]
pub struct PgRankingRepo {
    pool: PgPool,
}

impl PgRankingRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RankingStore for PgRankingRepo {
    async fn get_score(&self, kind: ItemKind, item_id: Uuid) -> Result<Option<RankingScore>> {
        let row = sqlx::query_as::<_, ScoreRow>(
            r#"
            SELECT item_kind, item_id, raw_score, norm_score,
                   last_raw_updated, last_norm_updated, last_event_at
            FROM ranking_scores
            WHERE item_kind = $1 AND item_id = $2
            "#,
        )
        .bind(kind.as_str())
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to read ranking score"))?;

        row.map(score_from_row).transpose()
    }

    async fn upsert_raw_score(
        &self,
        kind: ItemKind,
        item_id: Uuid,
        raw_score: f64,
        updated_at: DateTime<Utc>,
        event_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ranking_scores (item_kind, item_id, raw_score, last_raw_updated, last_event_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (item_kind, item_id) DO UPDATE SET
                raw_score = EXCLUDED.raw_score,
                last_raw_updated = EXCLUDED.last_raw_updated,
                last_event_at = COALESCE(EXCLUDED.last_event_at, ranking_scores.last_event_at)
            "#,
        )
        .bind(kind.as_str())
        .bind(item_id)
        .bind(raw_score)
        .bind(updated_at)
        .bind(event_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to upsert raw score"))?;

        Ok(())
    }

    async fn list_window(&self, kind: ItemKind, since: DateTime<Utc>) -> Result<Vec<RankingScore>> {
        sqlx::query_as::<_, ScoreRow>(
            r#"
            SELECT item_kind, item_id, raw_score, norm_score,
                   last_raw_updated, last_norm_updated, last_event_at
            FROM ranking_scores
            WHERE item_kind = $1 AND last_raw_updated >= $2
            "#,
        )
        .bind(kind.as_str())
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list ranking window"))?
        .into_iter()
        .map(score_from_row)
        .collect()
    }

    async fn update_norm_score(
        &self,
        kind: ItemKind,
        item_id: Uuid,
        norm_score: f64,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE ranking_scores
            SET norm_score = $3, last_norm_updated = $4
            WHERE item_kind = $1 AND item_id = $2
            "#,
        )
        .bind(kind.as_str())
        .bind(item_id)
        .bind(norm_score)
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to update norm score"))?;

        Ok(())
    }

    async fn upsert_stats(&self, stats: &RankingStats) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ranking_stats
                (item_kind, window_start, window_end, mean_raw_score, stddev_raw_score, item_count)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (item_kind, window_start, window_end) DO UPDATE SET
                mean_raw_score = EXCLUDED.mean_raw_score,
                stddev_raw_score = EXCLUDED.stddev_raw_score,
                item_count = EXCLUDED.item_count
            "#,
        )
        .bind(stats.item_kind.as_str())
        .bind(stats.window_start)
        .bind(stats.window_end)
        .bind(stats.mean_raw_score)
        .bind(stats.stddev_raw_score)
        .bind(stats.item_count)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to upsert ranking stats"))?;

        Ok(())
    }

    async fn top_ranked(
        &self,
        kind: ItemKind,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RankingScore>> {
        sqlx::query_as::<_, ScoreRow>(
            r#"
            SELECT item_kind, item_id, raw_score, norm_score,
                   last_raw_updated, last_norm_updated, last_event_at
            FROM ranking_scores
            WHERE item_kind = $1 AND norm_score IS NOT NULL
            ORDER BY norm_score DESC,
                     last_event_at DESC NULLS LAST,
                     last_raw_updated DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(kind.as_str())
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to read top ranked items"))?
        .into_iter()
        .map(score_from_row)
        .collect()
    }

    async fn refresh_view(&self) -> Result<()> {
        sqlx::query("REFRESH MATERIALIZED VIEW CONCURRENTLY ranked_items_view")
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to refresh ranked_items_view"))?;

        Ok(())
    }

    async fn list_precomputed(
        &self,
        kind: ItemKind,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PrecomputedRankedItem>> {
        sqlx::query_as::<_, (String, Uuid, f64, i64, Option<DateTime<Utc>>)>(
            r#"
            SELECT item_kind, item_id, score, rank, last_event_at
            FROM ranked_items_view
            WHERE item_kind = $1
            ORDER BY rank ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(kind.as_str())
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to read ranked_items_view"))?
        .into_iter()
        .map(|(kind, item_id, score, rank, last_event_at)| {
            Ok(PrecomputedRankedItem {
                item_kind: kind.parse()?,
                item_id,
                score,
                rank,
                last_event_at,
            })
        })
        .collect()
    }
}
