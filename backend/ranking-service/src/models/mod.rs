use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;

/// Longest trailing window, in days, accepted for recompute and normalization
pub const MAX_WINDOW_DAYS: i64 = 3650;

/// Start of a trailing window of `days` ending at `end`.
///
/// `days` is clamped to `0..=MAX_WINDOW_DAYS`, so the result never overflows.
pub fn window_start(end: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    chrono::Duration::try_days(days.clamp(0, MAX_WINDOW_DAYS))
        .and_then(|window| end.checked_sub_signed(window))
        .unwrap_or(end)
}

/// Item kinds that carry a ranking score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Card,
    Collection,
}

impl ItemKind {
    pub const ALL: [ItemKind; 2] = [ItemKind::Card, ItemKind::Collection];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Collection => "collection",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "card" | "cards" => Ok(Self::Card),
            "collection" | "collections" => Ok(Self::Collection),
            other => Err(AppError::Validation(format!("unknown item kind: {other}"))),
        }
    }
}

/// Engagement signals for one item, fetched on demand and never stored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankingSignals {
    pub upvotes_count: u64,
    pub saves_count: u64,
    pub comments_count: u64,
    pub visits_count: u64,
    /// Hours since the item was created
    pub age_hours: f64,
    /// 0-100 reputation proxy; `None` uses the configured default
    pub creator_quality: Option<f64>,
    /// Editorial boost, 0 = not promoted
    pub promotion_boost: f64,
    /// 0-1 penalty multiplier, 1 = no penalty
    pub abuse_factor: f64,
}

/// Persisted score row, one per (item_kind, item_id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingScore {
    pub item_kind: ItemKind,
    pub item_id: Uuid,
    pub raw_score: f64,
    pub norm_score: Option<f64>,
    pub last_raw_updated: DateTime<Utc>,
    pub last_norm_updated: Option<DateTime<Utc>>,
    pub last_event_at: Option<DateTime<Utc>>,
}

/// Audit row written by each normalization pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingStats {
    pub item_kind: ItemKind,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub mean_raw_score: f64,
    pub stddev_raw_score: f64,
    pub item_count: i64,
}

/// Item returned by `ItemStore::list_changed_items`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangedItem {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub owner_id: Option<Uuid>,
}

/// Item returned by `ItemStore::list_recent_visible`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentItem {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Display data hydrated from the item store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayItem {
    pub id: Uuid,
    pub kind: ItemKind,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Canonical resource URL; only meaningful for cards
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Uuid>,
    /// Collection the card was saved into, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<Uuid>,
    pub upvotes_count: i64,
    pub saves_count: i64,
    pub comments_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Where a card was saved from; merged when duplicates collapse
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    pub item_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<Uuid>,
}

impl From<&DisplayItem> for Attribution {
    fn from(item: &DisplayItem) -> Self {
        Self {
            item_id: item.id,
            owner_id: item.owner_id,
            collection_id: item.collection_id,
        }
    }
}

/// How a feed entry was selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSource {
    Ranked,
    Recency,
}

impl FeedSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ranked => "ranked",
            Self::Recency => "recency",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub kind: ItemKind,
    pub item: DisplayItem,
    pub score: f64,
    pub last_event_at: Option<DateTime<Utc>>,
    pub source: FeedSource,
    pub attributions: Vec<Attribution>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedPage {
    pub feed: Vec<FeedEntry>,
    /// Candidate count after dedup, before cutting to quotas and the limit
    pub total: usize,
}

/// Row of the precomputed `ranked_items_view`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecomputedRankedItem {
    pub item_kind: ItemKind,
    pub item_id: Uuid,
    pub score: f64,
    pub rank: i64,
    pub last_event_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemError {
    /// `None` for fatal errors that are not tied to an item
    pub item_id: Option<Uuid>,
    pub message: String,
}

/// Outcome of one full recompute run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecomputeReport {
    pub kind: ItemKind,
    pub processed: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub errors: Vec<ItemError>,
    pub normalized: bool,
    pub cancelled: bool,
    pub aborted: bool,
    pub duration_ms: u64,
}

impl RecomputeReport {
    pub fn new(kind: ItemKind) -> Self {
        Self {
            kind,
            processed: 0,
            succeeded: 0,
            failed: 0,
            errors: Vec::new(),
            normalized: false,
            cancelled: false,
            aborted: false,
            duration_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_kind_parse() {
        assert_eq!("card".parse::<ItemKind>().unwrap(), ItemKind::Card);
        assert_eq!(
            " Collections ".parse::<ItemKind>().unwrap(),
            ItemKind::Collection
        );
        assert!("post".parse::<ItemKind>().is_err());
    }

    #[test]
    fn test_window_start_is_bounded() {
        let end = Utc::now();
        assert_eq!(window_start(end, 7), end - chrono::Duration::days(7));
        assert_eq!(window_start(end, -3), end);
        assert_eq!(
            window_start(end, i64::MAX),
            end - chrono::Duration::days(MAX_WINDOW_DAYS)
        );
    }

    #[test]
    fn test_item_kind_serde() {
        let json = serde_json::to_string(&ItemKind::Collection).unwrap();
        assert_eq!(json, "\"collection\"");
    }
}
