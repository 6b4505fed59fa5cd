mod common;

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use common::{FakeCatalog, FakeConfig};
use curation_ranking::config::WorkerConfig;
use curation_ranking::db::InMemoryRankingStore;
use curation_ranking::jobs::FullRecomputeWorker;
use curation_ranking::models::{FeedSource, ItemKind, RankingScore};
use curation_ranking::services::{FeedComposer, FeedRequest, MixRatios};

fn composer(catalog: &Arc<FakeCatalog>, store: &Arc<InMemoryRankingStore>) -> FeedComposer {
    FeedComposer::new(store.clone(), catalog.clone(), Duration::from_secs(1))
}

fn ranked(kind: ItemKind, id: Uuid, norm: f64) -> RankingScore {
    RankingScore {
        item_kind: kind,
        item_id: id,
        raw_score: norm,
        norm_score: Some(norm),
        last_raw_updated: Utc::now(),
        last_norm_updated: Some(Utc::now()),
        last_event_at: None,
    }
}

fn mixed(limit: usize) -> FeedRequest {
    FeedRequest {
        kind_filter: None,
        mix: MixRatios::default(),
        limit,
        offset: 0,
    }
}

#[tokio::test]
async fn test_cold_start_feed_is_recency_ordered() {
    let catalog = Arc::new(FakeCatalog::new());
    let store = Arc::new(InMemoryRankingStore::new());
    let newest = catalog.add(ItemKind::Card, 1.0, 0, None);
    let middle = catalog.add(ItemKind::Card, 5.0, 100, None);
    catalog.add(ItemKind::Card, 9.0, 0, None);

    let page = composer(&catalog, &store)
        .compose(&FeedRequest {
            kind_filter: Some(ItemKind::Card),
            mix: MixRatios::default(),
            limit: 2,
            offset: 0,
        })
        .await
        .unwrap();

    let ids: Vec<Uuid> = page.feed.iter().map(|e| e.item.id).collect();
    assert_eq!(ids, vec![newest, middle]);
    assert!(page.feed.iter().all(|e| e.source == FeedSource::Recency));
}

#[tokio::test]
async fn test_mixed_feed_respects_quotas_and_merges_by_score() {
    let catalog = Arc::new(FakeCatalog::new());
    let store = Arc::new(InMemoryRankingStore::new());

    for i in 0..10 {
        let id = catalog.add(ItemKind::Card, 1.0, 1, None);
        store.insert(ranked(ItemKind::Card, id, i as f64 * 0.1));
    }
    let top_collection = catalog.add(ItemKind::Collection, 1.0, 1, None);
    store.insert(ranked(ItemKind::Collection, top_collection, 3.0));
    for _ in 0..5 {
        let id = catalog.add(ItemKind::Collection, 1.0, 1, None);
        store.insert(ranked(ItemKind::Collection, id, -1.0));
    }

    let page = composer(&catalog, &store).compose(&mixed(10)).await.unwrap();

    assert_eq!(page.feed.len(), 10);
    let cards = page.feed.iter().filter(|e| e.kind == ItemKind::Card).count();
    assert_eq!(cards, 7);
    assert_eq!(page.feed[0].item.id, top_collection);
    assert!(page
        .feed
        .windows(2)
        .all(|pair| pair[0].score >= pair[1].score));
}

#[tokio::test]
async fn test_kind_without_ranking_falls_back_while_other_is_ranked() {
    let catalog = Arc::new(FakeCatalog::new());
    let store = Arc::new(InMemoryRankingStore::new());

    let card = catalog.add(ItemKind::Card, 1.0, 1, None);
    store.insert(ranked(ItemKind::Card, card, 1.2));
    let collection = catalog.add(ItemKind::Collection, 2.0, 1, None);

    let page = composer(&catalog, &store).compose(&mixed(4)).await.unwrap();

    let sources: Vec<(Uuid, FeedSource)> = page.feed.iter().map(|e| (e.item.id, e.source)).collect();
    assert_eq!(
        sources,
        vec![(card, FeedSource::Ranked), (collection, FeedSource::Recency)]
    );
}

#[tokio::test]
async fn test_duplicate_cards_collapse_after_full_recompute() {
    let catalog = Arc::new(FakeCatalog::new());
    let store = Arc::new(InMemoryRankingStore::new());
    let config = Arc::new(FakeConfig::new());

    let popular = catalog.add(ItemKind::Card, 2.0, 80, Some("https://www.example.com/guide/"));
    let repost = catalog.add(ItemKind::Card, 2.0, 2, Some("http://example.com/guide#intro"));
    let other = catalog.add(ItemKind::Card, 2.0, 20, Some("https://example.com/other"));

    FullRecomputeWorker::new(
        catalog.clone(),
        catalog.clone(),
        store.clone(),
        config,
        &WorkerConfig::default(),
    )
    .run(ItemKind::Card, 7, false)
    .await
    .unwrap();

    let page = composer(&catalog, &store)
        .compose(&FeedRequest {
            kind_filter: Some(ItemKind::Card),
            mix: MixRatios::default(),
            limit: 10,
            offset: 0,
        })
        .await
        .unwrap();

    assert_eq!(page.total, 2);
    assert_eq!(page.feed[0].item.id, popular);
    let attributed: Vec<Uuid> = page.feed[0].attributions.iter().map(|a| a.item_id).collect();
    assert!(attributed.contains(&popular) && attributed.contains(&repost));
    assert_eq!(page.feed[1].item.id, other);
}

#[tokio::test]
async fn test_hidden_items_drop_out_of_ranked_feed() {
    let catalog = Arc::new(FakeCatalog::new());
    let store = Arc::new(InMemoryRankingStore::new());

    let shown = catalog.add(ItemKind::Collection, 1.0, 1, None);
    let hidden = catalog.add(ItemKind::Collection, 1.0, 1, None);
    store.insert(ranked(ItemKind::Collection, shown, 0.5));
    store.insert(ranked(ItemKind::Collection, hidden, 2.0));
    catalog.hide(hidden);

    let page = composer(&catalog, &store)
        .compose(&FeedRequest {
            kind_filter: Some(ItemKind::Collection),
            mix: MixRatios::default(),
            limit: 10,
            offset: 0,
        })
        .await
        .unwrap();

    assert_eq!(page.feed.len(), 1);
    assert_eq!(page.feed[0].item.id, shown);
}

#[tokio::test]
async fn test_recent_activity_breaks_score_ties() {
    let catalog = Arc::new(FakeCatalog::new());
    let store = Arc::new(InMemoryRankingStore::new());

    let quiet = catalog.add(ItemKind::Card, 1.0, 1, None);
    let active = catalog.add(ItemKind::Card, 1.0, 1, None);
    let mut quiet_row = ranked(ItemKind::Card, quiet, 1.0);
    quiet_row.last_event_at = Some(Utc::now() - ChronoDuration::hours(6));
    let mut active_row = ranked(ItemKind::Card, active, 1.0 + 1e-9);
    active_row.last_event_at = Some(Utc::now());
    store.insert(quiet_row);
    store.insert(active_row);

    let page = composer(&catalog, &store)
        .compose(&FeedRequest {
            kind_filter: Some(ItemKind::Card),
            mix: MixRatios::default(),
            limit: 10,
            offset: 0,
        })
        .await
        .unwrap();

    assert_eq!(page.feed[0].item.id, active);
    assert_eq!(page.feed[1].item.id, quiet);
}

#[tokio::test]
async fn test_offset_pages_through_ranked_rows() {
    let catalog = Arc::new(FakeCatalog::new());
    let store = Arc::new(InMemoryRankingStore::new());

    let mut ids = Vec::new();
    for i in 0..6 {
        let id = catalog.add(ItemKind::Card, 1.0, 1, None);
        store.insert(ranked(ItemKind::Card, id, 10.0 - i as f64));
        ids.push(id);
    }

    let page = composer(&catalog, &store)
        .compose(&FeedRequest {
            kind_filter: Some(ItemKind::Card),
            mix: MixRatios::default(),
            limit: 2,
            offset: 2,
        })
        .await
        .unwrap();

    let got: Vec<Uuid> = page.feed.iter().map(|e| e.item.id).collect();
    assert_eq!(got, vec![ids[2], ids[3]]);
}
