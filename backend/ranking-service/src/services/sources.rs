//! External collaborators consumed by the ranking engine.
//!
//! Visibility and privacy filtering belong to the item store; the ranking
//! engine never decides whether an item may be shown.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{ChangedItem, DisplayItem, ItemKind, RankingSignals, RecentItem};

/// Current engagement counters and age for one item
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignalSource: Send + Sync {
    async fn get_signals(&self, kind: ItemKind, item_id: Uuid) -> Result<RankingSignals>;
}

/// Read access to cards and collections
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Items created or mutated at or after `since`
    async fn list_changed_items(
        &self,
        kind: ItemKind,
        since: DateTime<Utc>,
    ) -> Result<Vec<ChangedItem>>;

    /// Most recently created visible items, newest first
    async fn list_recent_visible(
        &self,
        kind: ItemKind,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RecentItem>>;

    /// Display data for `ids`; ids that are no longer visible are omitted
    async fn hydrate(&self, kind: ItemKind, ids: &[Uuid]) -> Result<Vec<DisplayItem>>;
}

/// Tunable key-value configuration
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_config_value(&self, key: &str) -> Result<Option<String>>;
}
