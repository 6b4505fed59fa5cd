mod common;

use actix_web::{http::StatusCode, test, web, App};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use common::{FakeCatalog, FakeConfig};
use curation_ranking::config::{DeltaConfig, FeedConfig, WorkerConfig};
use curation_ranking::db::InMemoryRankingStore;
use curation_ranking::handlers::{self, RankingHandlerState};
use curation_ranking::jobs::{DeltaDispatcher, DeltaRecomputeWorker, FullRecomputeWorker};
use curation_ranking::models::ItemKind;
use curation_ranking::services::{FeedComposer, ViewRefresher};

struct Harness {
    catalog: Arc<FakeCatalog>,
    store: Arc<InMemoryRankingStore>,
    state: web::Data<RankingHandlerState>,
    dispatcher: DeltaDispatcher,
}

fn harness() -> Harness {
    let catalog = Arc::new(FakeCatalog::new());
    let store = Arc::new(InMemoryRankingStore::new());
    let config = Arc::new(FakeConfig::new());

    let delta_worker = Arc::new(DeltaRecomputeWorker::new(
        catalog.clone(),
        store.clone(),
        config.clone(),
        Duration::from_secs(30),
    ));
    let dispatcher = DeltaDispatcher::spawn(delta_worker, &DeltaConfig::default());

    let state = web::Data::new(RankingHandlerState {
        composer: Arc::new(FeedComposer::new(
            store.clone(),
            catalog.clone(),
            Duration::from_secs(1),
        )),
        view: ViewRefresher::new(store.clone()),
        recompute: Arc::new(FullRecomputeWorker::new(
            catalog.clone(),
            catalog.clone(),
            store.clone(),
            config,
            &WorkerConfig::default(),
        )),
        delta: dispatcher.trigger.clone(),
        feed_config: FeedConfig::default(),
        default_changed_since_days: 7,
    });

    Harness {
        catalog,
        store,
        state,
        dispatcher,
    }
}

#[actix_web::test]
async fn test_health() {
    let h = harness();
    let app = test::init_service(App::new().app_data(h.state.clone()).configure(handlers::configure)).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_recompute_then_feed() {
    let h = harness();
    let low = h.catalog.add(ItemKind::Card, 2.0, 1, None);
    let high = h.catalog.add(ItemKind::Card, 2.0, 90, None);
    let app = test::init_service(App::new().app_data(h.state.clone()).configure(handlers::configure)).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/ranking/recompute")
        .set_json(json!({"kind": "card"}))
        .to_request();
    let report: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(report["kind"], "card");
    assert_eq!(report["succeeded"], 2);
    assert_eq!(report["normalized"], true);

    let req = test::TestRequest::get()
        .uri("/api/v1/feed?kind=card&limit=10")
        .to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["total"], 2);
    assert_eq!(page["feed"][0]["item"]["id"], high.to_string());
    assert_eq!(page["feed"][0]["source"], "ranked");
    assert_eq!(page["feed"][1]["item"]["id"], low.to_string());
}

#[actix_web::test]
async fn test_feed_rejects_unknown_kind() {
    let h = harness();
    let app = test::init_service(App::new().app_data(h.state.clone()).configure(handlers::configure)).await;

    let req = test::TestRequest::get()
        .uri("/api/v1/feed?kind=videos")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["status"], 400);
}

#[actix_web::test]
async fn test_feed_limit_is_clamped() {
    let h = harness();
    for _ in 0..3 {
        h.catalog.add(ItemKind::Collection, 1.0, 1, None);
    }
    let app = test::init_service(App::new().app_data(h.state.clone()).configure(handlers::configure)).await;

    let req = test::TestRequest::get()
        .uri("/api/v1/feed?kind=collection&limit=0")
        .to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["feed"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn test_engagement_event_is_accepted_and_scored() {
    let mut h = harness();
    let item = h.catalog.add(ItemKind::Card, 1.0, 4, None);
    let app = test::init_service(App::new().app_data(h.state.clone()).configure(handlers::configure)).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/ranking/events")
        .set_json(json!({"kind": "card", "item_id": item}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let mut scored = false;
    for _ in 0..50 {
        if h.store.scores(ItemKind::Card).iter().any(|r| r.item_id == item) {
            scored = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(scored);
    assert!(h.dispatcher.failures.try_recv().is_err());
}

#[actix_web::test]
async fn test_failed_delta_still_returns_accepted() {
    let mut h = harness();
    let app = test::init_service(App::new().app_data(h.state.clone()).configure(handlers::configure)).await;

    let missing = Uuid::new_v4();
    let req = test::TestRequest::post()
        .uri("/api/v1/ranking/events")
        .set_json(json!({"kind": "collection", "item_id": missing}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let failure = tokio::time::timeout(Duration::from_secs(5), h.dispatcher.failures.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failure.request.item_id, missing);
}

#[actix_web::test]
async fn test_view_refresh_and_ranked_listing() {
    let h = harness();
    h.catalog.add(ItemKind::Card, 1.0, 3, None);
    h.catalog.add(ItemKind::Card, 1.0, 30, None);
    let app = test::init_service(App::new().app_data(h.state.clone()).configure(handlers::configure)).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/ranking/recompute")
        .set_json(json!({"kind": "card", "changed_since_days": 7}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::post()
        .uri("/api/v1/ranking/view/refresh")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let mut items = Vec::new();
    for _ in 0..50 {
        let req = test::TestRequest::get()
            .uri("/api/v1/ranked?kind=card&limit=5")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        items = body["items"].as_array().cloned().unwrap_or_default();
        if !items.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["rank"], 1);
    assert_eq!(items[1]["rank"], 2);
}

#[actix_web::test]
async fn test_negative_window_is_rejected() {
    let h = harness();
    let app = test::init_service(App::new().app_data(h.state.clone()).configure(handlers::configure)).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/ranking/recompute")
        .set_json(json!({"kind": "collection", "changed_since_days": -1}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_oversized_window_is_rejected() {
    let h = harness();
    h.catalog.add(ItemKind::Card, 1.0, 1, None);
    let app = test::init_service(App::new().app_data(h.state.clone()).configure(handlers::configure)).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/ranking/recompute")
        .set_json(json!({"kind": "card", "changed_since_days": 1_000_000_000i64}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(h.store.scores(ItemKind::Card).is_empty());
}

#[actix_web::test]
async fn test_metrics_endpoint() {
    let h = harness();
    let app = test::init_service(App::new().app_data(h.state.clone()).configure(handlers::configure)).await;

    let req = test::TestRequest::get().uri("/api/v1/feed").to_request();
    let _ = test::call_service(&app, req).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    let text = String::from_utf8_lossy(&body);
    assert!(text.contains("ranking_feed_compose_duration_seconds"));
}
