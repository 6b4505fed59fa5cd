//! Precomputed ranked view
//!
//! `ranked_items_view` snapshots the ranked order per kind for cheap
//! browsing outside the primary feed. Refreshing it is maintenance only:
//! a failed refresh is logged and counted, never returned.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info};

use crate::db::RankingStore;
use crate::error::Result;
use crate::metrics;
use crate::models::{ItemKind, PrecomputedRankedItem};

#[derive(Clone)]
pub struct ViewRefresher {
    store: Arc<dyn RankingStore>,
}

impl ViewRefresher {
    pub fn new(store: Arc<dyn RankingStore>) -> Self {
        Self { store }
    }

    /// Returns whether the refresh succeeded
    pub async fn refresh(&self) -> bool {
        let started = Instant::now();
        match self.store.refresh_view().await {
            Ok(()) => {
                metrics::record_view_refresh("success");
                info!(
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Ranked view refreshed"
                );
                true
            }
            Err(e) => {
                metrics::record_view_refresh("error");
                error!(error = %e, "Ranked view refresh failed");
                false
            }
        }
    }

    pub async fn list_precomputed(
        &self,
        kind: ItemKind,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PrecomputedRankedItem>> {
        self.store.list_precomputed(kind, limit, offset).await
    }
}

pub async fn start_view_refresher(
    refresher: ViewRefresher,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        interval_secs = interval.as_secs(),
        "Starting ranked view refresher"
    );

    loop {
        tokio::select! {
            _ = sleep(interval) => {}
            _ = shutdown.changed() => {
                info!("Ranked view refresher shutting down");
                return;
            }
        }

        if *shutdown.borrow() {
            return;
        }

        refresher.refresh().await;
    }
}
