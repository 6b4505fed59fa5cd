//! Feed Composer
//!
//! Builds a mixed card/collection feed page from the ranking store.
//!
//! Algorithm:
//! - Split `limit` (and `offset`) across kinds by the mix ratios
//! - Fetch each kind concurrently under a per-kind timeout, over-fetching
//!   so collapsed duplicates do not leave the page short
//! - Kinds with no ranked rows fall back to recency with score 0
//! - Sort each kind by score (epsilon ties broken by `last_event_at`)
//! - Collapse duplicate cards by canonical URL, keep the max score
//! - Cut each kind to its quota, merge, re-sort and truncate to `limit`
//!
//! The composer holds no state between requests.

use futures::future::join_all;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::RankingStore;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{Attribution, DisplayItem, FeedEntry, FeedPage, FeedSource, ItemKind};
use crate::services::sources::ItemStore;

/// Scores closer than this are ties
pub const SCORE_EPSILON: f64 = 1e-6;

/// Each kind fetches this many times its quota as candidates
const CANDIDATE_FACTOR: usize = 2;

/// Requested share of each kind; normalized before use
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixRatios {
    pub card: f64,
    pub collection: f64,
}

impl Default for MixRatios {
    fn default() -> Self {
        Self {
            card: 0.7,
            collection: 0.3,
        }
    }
}

impl MixRatios {
    fn ratio(&self, kind: ItemKind) -> f64 {
        match kind {
            ItemKind::Card => self.card,
            ItemKind::Collection => self.collection,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedRequest {
    /// Restrict the feed to one kind; that kind gets the whole limit
    pub kind_filter: Option<ItemKind>,
    pub mix: MixRatios,
    pub limit: usize,
    pub offset: usize,
}

/// Page size and offset assigned to one kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindQuota {
    pub kind: ItemKind,
    pub limit: usize,
    pub offset: usize,
}

/// Split a request across the kinds in scope.
///
/// Invalid ratios (negative, non-finite, zero sum) become an equal split.
/// The card share is rounded and collections take the remainder of both
/// the limit and the offset.
pub fn kind_quotas(request: &FeedRequest) -> Vec<KindQuota> {
    if let Some(kind) = request.kind_filter {
        return vec![KindQuota {
            kind,
            limit: request.limit,
            offset: request.offset,
        }];
    }

    let valid = ItemKind::ALL
        .iter()
        .all(|k| request.mix.ratio(*k).is_finite() && request.mix.ratio(*k) >= 0.0);
    let sum: f64 = ItemKind::ALL.iter().map(|k| request.mix.ratio(*k)).sum();

    let card_share = if valid && sum > 0.0 {
        request.mix.card / sum
    } else {
        0.5
    };

    let card_limit = ((request.limit as f64) * card_share).round() as usize;
    let card_limit = card_limit.min(request.limit);
    let card_offset = ((request.offset as f64) * card_share).round() as usize;
    let card_offset = card_offset.min(request.offset);

    vec![
        KindQuota {
            kind: ItemKind::Card,
            limit: card_limit,
            offset: card_offset,
        },
        KindQuota {
            kind: ItemKind::Collection,
            limit: request.limit - card_limit,
            offset: request.offset - card_offset,
        },
    ]
}

/// Dedup identity of a card's canonical URL: lower-cased with scheme,
/// leading `www.`, fragment and trailing slashes removed.
pub fn canonical_key(url: &str) -> Option<String> {
    let mut key = url.trim().to_lowercase();

    if let Some(idx) = key.find('#') {
        key.truncate(idx);
    }
    if let Some(idx) = key.find("://") {
        key = key[idx + 3..].to_string();
    }
    if let Some(rest) = key.strip_prefix("www.") {
        key = rest.to_string();
    }
    while key.ends_with('/') {
        key.pop();
    }

    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

fn score_bucket(score: f64) -> f64 {
    (score / SCORE_EPSILON).round()
}

/// Score descending, then `last_event_at` descending with missing last
pub fn compare_entries(a: &FeedEntry, b: &FeedEntry) -> Ordering {
    score_bucket(b.score)
        .total_cmp(&score_bucket(a.score))
        .then_with(|| match (a.last_event_at, b.last_event_at) {
            (Some(a_at), Some(b_at)) => b_at.cmp(&a_at),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

/// Collapse cards sharing a canonical URL into their first occurrence.
/// Expects `entries` sorted with `compare_entries`.
pub fn dedup_cards(entries: Vec<FeedEntry>) -> Vec<FeedEntry> {
    let mut kept: Vec<FeedEntry> = Vec::with_capacity(entries.len());
    let mut by_key: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        let key = match entry.kind {
            ItemKind::Card => entry.item.canonical_url.as_deref().and_then(canonical_key),
            ItemKind::Collection => None,
        };

        let Some(key) = key else {
            kept.push(entry);
            continue;
        };

        match by_key.get(&key) {
            Some(&idx) => {
                let target = &mut kept[idx];
                target.score = target.score.max(entry.score);
                target.attributions.extend(entry.attributions);
            }
            None => {
                by_key.insert(key, kept.len());
                kept.push(entry);
            }
        }
    }

    kept
}

pub struct FeedComposer {
    store: Arc<dyn RankingStore>,
    items: Arc<dyn ItemStore>,
    per_kind_timeout: Duration,
}

impl FeedComposer {
    pub fn new(
        store: Arc<dyn RankingStore>,
        items: Arc<dyn ItemStore>,
        per_kind_timeout: Duration,
    ) -> Self {
        Self {
            store,
            items,
            per_kind_timeout,
        }
    }

    pub async fn compose(&self, request: &FeedRequest) -> Result<FeedPage> {
        let started = Instant::now();

        let quotas: Vec<KindQuota> = kind_quotas(request)
            .into_iter()
            .filter(|q| q.limit > 0)
            .collect();

        let fetches = quotas.iter().map(|quota| async move {
            let result = timeout(self.per_kind_timeout, self.fetch_kind(*quota)).await;
            (*quota, result)
        });

        let mut merged = Vec::new();
        let mut total = 0usize;
        let mut failed_kinds = 0usize;
        for (quota, result) in join_all(fetches).await {
            match result {
                Ok(Ok(mut entries)) => {
                    entries.sort_by(compare_entries);
                    let mut entries = dedup_cards(entries);
                    total += entries.len();
                    entries.truncate(quota.limit);
                    merged.extend(entries);
                }
                Ok(Err(e)) => {
                    failed_kinds += 1;
                    metrics::record_feed_fetch(quota.kind.as_str(), "error");
                    warn!(kind = %quota.kind, error = %e, "Feed fetch failed, skipping kind");
                }
                Err(_) => {
                    failed_kinds += 1;
                    metrics::record_feed_fetch(quota.kind.as_str(), "timeout");
                    warn!(
                        kind = %quota.kind,
                        timeout_ms = self.per_kind_timeout.as_millis() as u64,
                        "Feed fetch timed out, skipping kind"
                    );
                }
            }
        }

        if !quotas.is_empty() && failed_kinds == quotas.len() {
            metrics::record_feed_duration("unavailable", started.elapsed());
            return Err(AppError::Unavailable(
                "no item kind could be fetched for the feed".to_string(),
            ));
        }

        let mut feed = merged;
        feed.sort_by(compare_entries);
        feed.truncate(request.limit);

        metrics::record_feed_duration("success", started.elapsed());
        debug!(
            entries = feed.len(),
            total,
            duration_ms = started.elapsed().as_millis() as u64,
            "Feed composed"
        );

        Ok(FeedPage { feed, total })
    }

    async fn fetch_kind(&self, quota: KindQuota) -> Result<Vec<FeedEntry>> {
        let candidates = quota.limit.saturating_mul(CANDIDATE_FACTOR);
        let ranked = self
            .store
            .top_ranked(quota.kind, candidates, quota.offset)
            .await?;

        if ranked.is_empty() {
            return self.fetch_recent(quota, candidates).await;
        }

        let ids: Vec<Uuid> = ranked.iter().map(|row| row.item_id).collect();
        let mut hydrated = self.hydrate_map(quota.kind, &ids).await?;

        let entries: Vec<FeedEntry> = ranked
            .into_iter()
            .filter_map(|row| {
                let item = hydrated.remove(&row.item_id)?;
                Some(entry(
                    item,
                    row.norm_score.unwrap_or(0.0),
                    row.last_event_at,
                    FeedSource::Ranked,
                ))
            })
            .collect();

        metrics::record_feed_fetch(quota.kind.as_str(), "ranked");
        Ok(entries)
    }

    async fn fetch_recent(&self, quota: KindQuota, candidates: usize) -> Result<Vec<FeedEntry>> {
        debug!(kind = %quota.kind, "No ranked rows, falling back to recency");

        let recent = self
            .items
            .list_recent_visible(quota.kind, candidates, quota.offset)
            .await?;
        let ids: Vec<Uuid> = recent.iter().map(|item| item.id).collect();
        let mut hydrated = self.hydrate_map(quota.kind, &ids).await?;

        let entries: Vec<FeedEntry> = recent
            .into_iter()
            .filter_map(|recent| {
                let item = hydrated.remove(&recent.id)?;
                Some(entry(item, 0.0, None, FeedSource::Recency))
            })
            .collect();

        metrics::record_feed_fetch(quota.kind.as_str(), "recency");
        Ok(entries)
    }

    async fn hydrate_map(&self, kind: ItemKind, ids: &[Uuid]) -> Result<HashMap<Uuid, DisplayItem>> {
        let items = self.items.hydrate(kind, ids).await?;
        Ok(items.into_iter().map(|item| (item.id, item)).collect())
    }
}

fn entry(
    item: DisplayItem,
    score: f64,
    last_event_at: Option<chrono::DateTime<chrono::Utc>>,
    source: FeedSource,
) -> FeedEntry {
    let attributions = vec![Attribution::from(&item)];
    FeedEntry {
        kind: item.kind,
        item,
        score,
        last_event_at,
        source,
        attributions,
    }
}
