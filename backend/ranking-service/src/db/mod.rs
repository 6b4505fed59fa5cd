//! Ranking persistence.
//!
//! Every write is an upsert keyed by natural identity, so concurrent
//! writers need no locking; the last write wins on a single row.

pub mod config_repo;
pub mod item_repo;
pub mod memory;
pub mod ranking_repo;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{ItemKind, PrecomputedRankedItem, RankingScore, RankingStats};

pub use config_repo::PgConfigStore;
pub use item_repo::PgItemStore;
pub use memory::InMemoryRankingStore;
pub use ranking_repo::PgRankingRepo;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RankingStore: Send + Sync {
    async fn get_score(&self, kind: ItemKind, item_id: Uuid) -> Result<Option<RankingScore>>;

    /// Insert or update `raw_score` and `last_raw_updated`.
    /// `last_event_at` is written only when `Some`; `norm_score` is never touched.
    async fn upsert_raw_score(
        &self,
        kind: ItemKind,
        item_id: Uuid,
        raw_score: f64,
        updated_at: DateTime<Utc>,
        event_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Rows whose `last_raw_updated` is at or after `since`
    async fn list_window(&self, kind: ItemKind, since: DateTime<Utc>) -> Result<Vec<RankingScore>>;

    async fn update_norm_score(
        &self,
        kind: ItemKind,
        item_id: Uuid,
        norm_score: f64,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn upsert_stats(&self, stats: &RankingStats) -> Result<()>;

    /// Rows with a norm score, ordered by norm score desc, then
    /// `last_event_at` desc (nulls last), then `last_raw_updated` desc
    async fn top_ranked(
        &self,
        kind: ItemKind,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RankingScore>>;

    /// Rebuild the precomputed ranked view
    async fn refresh_view(&self) -> Result<()>;

    async fn list_precomputed(
        &self,
        kind: ItemKind,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PrecomputedRankedItem>>;
}
