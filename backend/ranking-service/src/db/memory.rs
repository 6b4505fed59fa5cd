//! In-memory `RankingStore` for tests and local runs without PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use super::RankingStore;
use crate::error::{AppError, Result};
use crate::models::{ItemKind, PrecomputedRankedItem, RankingScore, RankingStats};

type StatsKey = (ItemKind, DateTime<Utc>, DateTime<Utc>);

#[derive(Default)]
pub struct InMemoryRankingStore {
    scores: RwLock<HashMap<(ItemKind, Uuid), RankingScore>>,
    stats: RwLock<HashMap<StatsKey, RankingStats>>,
    view: RwLock<Vec<PrecomputedRankedItem>>,
}

impl InMemoryRankingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or overwrite a row directly
    pub fn insert(&self, score: RankingScore) {
        if let Ok(mut scores) = self.scores.write() {
            scores.insert((score.item_kind, score.item_id), score);
        }
    }

    pub fn scores(&self, kind: ItemKind) -> Vec<RankingScore> {
        self.scores
            .read()
            .map(|scores| {
                scores
                    .values()
                    .filter(|s| s.item_kind == kind)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn stats(&self, kind: ItemKind) -> Vec<RankingStats> {
        self.stats
            .read()
            .map(|stats| {
                stats
                    .values()
                    .filter(|s| s.item_kind == kind)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn poisoned<T>(_: T) -> AppError {
    AppError::Internal("in-memory ranking store lock poisoned".to_string())
}

/// Same ordering as the ranked read path in SQL
fn ranked_order(a: &RankingScore, b: &RankingScore) -> Ordering {
    let by_norm = b
        .norm_score
        .unwrap_or(f64::NEG_INFINITY)
        .total_cmp(&a.norm_score.unwrap_or(f64::NEG_INFINITY));
    let by_event = match (a.last_event_at, b.last_event_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_norm
        .then(by_event)
        .then(b.last_raw_updated.cmp(&a.last_raw_updated))
}

#[async_trait]
impl RankingStore for InMemoryRankingStore {
    async fn get_score(&self, kind: ItemKind, item_id: Uuid) -> Result<Option<RankingScore>> {
        let scores = self.scores.read().map_err(poisoned)?;
        Ok(scores.get(&(kind, item_id)).cloned())
    }

    async fn upsert_raw_score(
        &self,
        kind: ItemKind,
        item_id: Uuid,
        raw_score: f64,
        updated_at: DateTime<Utc>,
        event_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut scores = self.scores.write().map_err(poisoned)?;
        let row = scores.entry((kind, item_id)).or_insert_with(|| RankingScore {
            item_kind: kind,
            item_id,
            raw_score,
            norm_score: None,
            last_raw_updated: updated_at,
            last_norm_updated: None,
            last_event_at: None,
        });
        row.raw_score = raw_score;
        row.last_raw_updated = updated_at;
        if event_at.is_some() {
            row.last_event_at = event_at;
        }
        Ok(())
    }

    async fn list_window(&self, kind: ItemKind, since: DateTime<Utc>) -> Result<Vec<RankingScore>> {
        let scores = self.scores.read().map_err(poisoned)?;
        Ok(scores
            .values()
            .filter(|s| s.item_kind == kind && s.last_raw_updated >= since)
            .cloned()
            .collect())
    }

    async fn update_norm_score(
        &self,
        kind: ItemKind,
        item_id: Uuid,
        norm_score: f64,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut scores = self.scores.write().map_err(poisoned)?;
        if let Some(row) = scores.get_mut(&(kind, item_id)) {
            row.norm_score = Some(norm_score);
            row.last_norm_updated = Some(updated_at);
        }
        Ok(())
    }

    async fn upsert_stats(&self, stats: &RankingStats) -> Result<()> {
        let mut all = self.stats.write().map_err(poisoned)?;
        all.insert(
            (stats.item_kind, stats.window_start, stats.window_end),
            stats.clone(),
        );
        Ok(())
    }

    async fn top_ranked(
        &self,
        kind: ItemKind,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RankingScore>> {
        let scores = self.scores.read().map_err(poisoned)?;
        let mut ranked: Vec<RankingScore> = scores
            .values()
            .filter(|s| s.item_kind == kind && s.norm_score.is_some())
            .cloned()
            .collect();
        ranked.sort_by(ranked_order);
        Ok(ranked.into_iter().skip(offset).take(limit).collect())
    }

    async fn refresh_view(&self) -> Result<()> {
        let scores = self.scores.read().map_err(poisoned)?;
        let mut view = Vec::new();

        for kind in ItemKind::ALL {
            let mut ranked: Vec<&RankingScore> = scores
                .values()
                .filter(|s| s.item_kind == kind && s.norm_score.is_some())
                .collect();
            ranked.sort_by(|a, b| ranked_order(a, b));
            view.extend(ranked.into_iter().enumerate().map(|(idx, s)| {
                PrecomputedRankedItem {
                    item_kind: kind,
                    item_id: s.item_id,
                    score: s.norm_score.unwrap_or_default(),
                    rank: idx as i64 + 1,
                    last_event_at: s.last_event_at,
                }
            }));
        }

        *self.view.write().map_err(poisoned)? = view;
        Ok(())
    }

    async fn list_precomputed(
        &self,
        kind: ItemKind,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PrecomputedRankedItem>> {
        let view = self.view.read().map_err(poisoned)?;
        Ok(view
            .iter()
            .filter(|v| v.item_kind == kind)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}
