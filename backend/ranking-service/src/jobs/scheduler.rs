//! Full Recompute Scheduler
//!
//! Periodically runs a full recompute for every item kind. Kinds run one
//! after another so the normalization pass of one kind never competes with
//! the scoring batches of the other.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::sleep;

use crate::jobs::full_recompute::FullRecomputeWorker;
use crate::models::ItemKind;

pub async fn start_full_recompute_scheduler(
    worker: Arc<FullRecomputeWorker>,
    interval: Duration,
    changed_since_days: i64,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        changed_since_days,
        "Starting full recompute scheduler"
    );

    loop {
        tokio::select! {
            _ = sleep(interval) => {}
            _ = shutdown.changed() => {
                tracing::info!("Full recompute scheduler shutting down");
                return;
            }
        }

        if *shutdown.borrow() {
            return;
        }

        let cycle_start = Instant::now();
        for kind in ItemKind::ALL {
            match worker.run(kind, changed_since_days, false).await {
                Ok(report) if report.cancelled => {
                    tracing::info!(kind = %kind, "Scheduled full recompute cancelled");
                    return;
                }
                Ok(report) => {
                    tracing::info!(
                        kind = %kind,
                        succeeded = report.succeeded,
                        failed = report.failed,
                        aborted = report.aborted,
                        "Scheduled full recompute completed"
                    );
                }
                Err(e) => {
                    tracing::error!(kind = %kind, error = %e, "Scheduled full recompute failed");
                }
            }
        }

        tracing::info!(
            duration_ms = cycle_start.elapsed().as_millis(),
            "Full recompute cycle completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;
    use crate::db::InMemoryRankingStore;
    use crate::services::sources::{MockConfigStore, MockItemStore, MockSignalSource};

    #[tokio::test]
    async fn test_scheduler_stops_on_shutdown() {
        let mut items = MockItemStore::new();
        items.expect_list_changed_items().never();
        let mut config_store = MockConfigStore::new();
        config_store.expect_get_config_value().returning(|_| Ok(None));

        let worker = Arc::new(FullRecomputeWorker::new(
            Arc::new(items),
            Arc::new(MockSignalSource::new()),
            Arc::new(InMemoryRankingStore::new()),
            Arc::new(config_store),
            &WorkerConfig::default(),
        ));

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(start_full_recompute_scheduler(
            worker,
            Duration::from_secs(3600),
            7,
            rx,
        ));

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
