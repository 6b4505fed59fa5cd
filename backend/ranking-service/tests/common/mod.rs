//! In-memory collaborators shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use uuid::Uuid;

use curation_ranking::error::{AppError, Result};
use curation_ranking::models::{ChangedItem, DisplayItem, ItemKind, RankingSignals, RecentItem};
use curation_ranking::services::sources::{ConfigStore, ItemStore, SignalSource};

#[derive(Debug, Clone)]
pub struct FakeItem {
    pub display: DisplayItem,
    pub signals: RankingSignals,
    pub visible: bool,
}

/// Item store and signal source over a fixed set of items
#[derive(Default)]
pub struct FakeCatalog {
    items: RwLock<Vec<FakeItem>>,
    failing_signals: RwLock<HashSet<Uuid>>,
    fail_listing: RwLock<bool>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, kind: ItemKind, age_hours: f64, upvotes: u64, url: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        let created_at = Utc::now() - Duration::minutes((age_hours * 60.0) as i64);
        let item = FakeItem {
            display: DisplayItem {
                id,
                kind,
                title: format!("{kind} {id}"),
                thumbnail_url: None,
                canonical_url: url.map(str::to_string),
                owner_id: Some(Uuid::new_v4()),
                collection_id: None,
                upvotes_count: upvotes as i64,
                saves_count: 0,
                comments_count: 0,
                created_at,
            },
            signals: RankingSignals {
                upvotes_count: upvotes,
                saves_count: upvotes / 2,
                comments_count: 1,
                visits_count: upvotes * 10,
                age_hours,
                creator_quality: Some(60.0),
                promotion_boost: 0.0,
                abuse_factor: 1.0,
            },
            visible: true,
        };
        self.items.write().unwrap().push(item);
        id
    }

    pub fn hide(&self, id: Uuid) {
        for item in self.items.write().unwrap().iter_mut() {
            if item.display.id == id {
                item.visible = false;
            }
        }
    }

    pub fn fail_signals_for(&self, id: Uuid) {
        self.failing_signals.write().unwrap().insert(id);
    }

    pub fn fail_listing(&self) {
        *self.fail_listing.write().unwrap() = true;
    }

    fn visible(&self, kind: ItemKind) -> Vec<FakeItem> {
        self.items
            .read()
            .unwrap()
            .iter()
            .filter(|i| i.display.kind == kind && i.visible)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ItemStore for FakeCatalog {
    async fn list_changed_items(
        &self,
        kind: ItemKind,
        since: DateTime<Utc>,
    ) -> Result<Vec<ChangedItem>> {
        if *self.fail_listing.read().unwrap() {
            return Err(AppError::Source("item store unreachable".to_string()));
        }
        Ok(self
            .visible(kind)
            .into_iter()
            .filter(|i| i.display.created_at >= since)
            .map(|i| ChangedItem {
                id: i.display.id,
                created_at: i.display.created_at,
                owner_id: i.display.owner_id,
            })
            .collect())
    }

    async fn list_recent_visible(
        &self,
        kind: ItemKind,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RecentItem>> {
        let mut items = self.visible(kind);
        items.sort_by(|a, b| b.display.created_at.cmp(&a.display.created_at));
        Ok(items
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|i| RecentItem {
                id: i.display.id,
                created_at: i.display.created_at,
            })
            .collect())
    }

    async fn hydrate(&self, kind: ItemKind, ids: &[Uuid]) -> Result<Vec<DisplayItem>> {
        Ok(self
            .visible(kind)
            .into_iter()
            .filter(|i| ids.contains(&i.display.id))
            .map(|i| i.display)
            .collect())
    }
}

#[async_trait]
impl SignalSource for FakeCatalog {
    async fn get_signals(&self, kind: ItemKind, item_id: Uuid) -> Result<RankingSignals> {
        if self.failing_signals.read().unwrap().contains(&item_id) {
            return Err(AppError::Source(format!("signals unavailable for {item_id}")));
        }
        self.items
            .read()
            .unwrap()
            .iter()
            .find(|i| i.display.kind == kind && i.display.id == item_id)
            .map(|i| i.signals.clone())
            .ok_or_else(|| AppError::NotFound(format!("{kind} {item_id}")))
    }
}

/// Key-value config store
#[derive(Default)]
pub struct FakeConfig {
    values: RwLock<HashMap<String, String>>,
}

impl FakeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: &str, value: &str) {
        self.values
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }
}

#[async_trait]
impl ConfigStore for FakeConfig {
    async fn get_config_value(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().unwrap().get(key).cloned())
    }
}
