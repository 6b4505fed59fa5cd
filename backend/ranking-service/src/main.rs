use actix_web::{web, App, HttpServer};
use anyhow::Context;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::io;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use curation_ranking::config::{Config, DatabaseConfig};
use curation_ranking::db::{PgConfigStore, PgItemStore, PgRankingRepo, RankingStore};
use curation_ranking::handlers::{self, RankingHandlerState};
use curation_ranking::jobs::{
    run_full_recompute_job, start_full_recompute_scheduler, DeltaDispatcher,
    DeltaRecomputeWorker, FullRecomputeWorker, RecomputeJobConfig,
};
use curation_ranking::services::sources::{ConfigStore, ItemStore, SignalSource};
use curation_ranking::services::{start_view_refresher, FeedComposer, ViewRefresher};

#[derive(Debug, Clone, Copy, PartialEq)]
enum RunMode {
    Serve,
    FullRecompute,
}

fn run_mode() -> RunMode {
    let args: Vec<String> = std::env::args().collect();
    let from_args = args
        .iter()
        .position(|arg| arg == "--mode")
        .and_then(|idx| args.get(idx + 1).cloned());
    let mode = from_args.or_else(|| std::env::var("RANKING_MODE").ok());

    match mode.as_deref() {
        Some("full-recompute") => RunMode::FullRecompute,
        _ => RunMode::Serve,
    }
}

async fn connect_pool(database: &DatabaseConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(database.max_connections)
        .connect(&database.url)
        .await
        .context("Failed to connect to database")
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_line_number(true)
                .with_target(true),
        )
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "Configuration loading failed");
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        env = %config.app.env,
        "Starting curation-ranking-service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let pool = match connect_pool(&config.database).await {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = ?e, "Database unavailable");
            eprintln!("ERROR: {e:#}");
            std::process::exit(1);
        }
    };

    let item_store = Arc::new(PgItemStore::new(pool.clone()));
    let items: Arc<dyn ItemStore> = item_store.clone();
    let signals: Arc<dyn SignalSource> = item_store;
    let store: Arc<dyn RankingStore> = Arc::new(PgRankingRepo::new(pool.clone()));
    let config_store: Arc<dyn ConfigStore> = Arc::new(PgConfigStore::new(pool));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let recompute = Arc::new(
        FullRecomputeWorker::new(
            items.clone(),
            signals.clone(),
            store.clone(),
            config_store.clone(),
            &config.worker,
        )
        .with_cancellation(shutdown_rx.clone()),
    );

    if run_mode() == RunMode::FullRecompute {
        let job = match RecomputeJobConfig::from_env() {
            Ok(job) => job,
            Err(e) => {
                error!(error = %e, "Invalid recompute job configuration");
                std::process::exit(2);
            }
        };

        return match run_full_recompute_job(recompute, &job).await {
            Ok(reports) => {
                for report in &reports {
                    match serde_json::to_string(report) {
                        Ok(line) => println!("{line}"),
                        Err(e) => warn!(error = %e, "Failed to encode recompute report"),
                    }
                }
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Full recompute job failed");
                std::process::exit(1);
            }
        };
    }

    if config.worker.scheduler_enabled {
        tokio::spawn(start_full_recompute_scheduler(
            recompute.clone(),
            config.worker.schedule_interval(),
            config.worker.changed_since_days,
            shutdown_rx.clone(),
        ));
    } else {
        info!("Full recompute scheduler disabled");
    }

    let delta_worker = Arc::new(DeltaRecomputeWorker::new(
        signals,
        store.clone(),
        config_store,
        config.delta.debounce(),
    ));
    let DeltaDispatcher {
        trigger,
        mut failures,
        handle: _dispatcher,
    } = DeltaDispatcher::spawn(delta_worker, &config.delta);

    tokio::spawn(async move {
        while let Some(failure) = failures.recv().await {
            warn!(
                kind = %failure.request.kind,
                item_id = %failure.request.item_id,
                error = %failure.error,
                "Delta recompute will be retried by the next full recompute"
            );
        }
    });

    let view = ViewRefresher::new(store.clone());
    if config.view.enabled {
        tokio::spawn(start_view_refresher(
            view.clone(),
            config.view.refresh_interval(),
            shutdown_rx,
        ));
    }

    let state = web::Data::new(RankingHandlerState {
        composer: Arc::new(FeedComposer::new(
            store,
            items,
            config.feed.per_kind_timeout(),
        )),
        view,
        recompute,
        delta: trigger,
        feed_config: config.feed.clone(),
        default_changed_since_days: config.worker.changed_since_days,
    });

    info!(port = config.app.port, "HTTP server listening");

    let result = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(handlers::configure)
    })
    .bind(format!("0.0.0.0:{}", config.app.port))?
    .run()
    .await;

    let _ = shutdown_tx.send(true);
    info!("curation-ranking-service stopped");

    result
}
