// ============================================
// Full Recompute Job
// ============================================
//
// Batch job that rescores every item of a kind changed within a trailing
// window, then runs the normalization pass for that kind.
//
// Workflow:
// 1. Load a ranking config snapshot
// 2. List items changed within `changed_since_days`
// 3. Score items batch by batch; each item succeeds or fails on its own
// 4. Normalize the kind's window unless this was a dry run
//
// Cancellation is checked between batches only, so a cancelled run never
// leaves an item half-written.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::WorkerConfig;
use crate::db::RankingStore;
use crate::error::Result;
use crate::jobs::normalization::normalize_window;
use crate::metrics;
use crate::models::{window_start, ItemError, ItemKind, RecomputeReport, MAX_WINDOW_DAYS};
use crate::services::ranking_config::RankingConfig;
use crate::services::scoring::raw_score;
use crate::services::sources::{ConfigStore, ItemStore, SignalSource};

/// Full recompute job runner
#[derive(Clone)]
pub struct FullRecomputeWorker {
    items: Arc<dyn ItemStore>,
    signals: Arc<dyn SignalSource>,
    store: Arc<dyn RankingStore>,
    config_store: Arc<dyn ConfigStore>,
    batch_size: usize,
    item_concurrency: usize,
    cancel: Option<watch::Receiver<bool>>,
}

impl FullRecomputeWorker {
    pub fn new(
        items: Arc<dyn ItemStore>,
        signals: Arc<dyn SignalSource>,
        store: Arc<dyn RankingStore>,
        config_store: Arc<dyn ConfigStore>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            items,
            signals,
            store,
            config_store,
            batch_size: config.batch_size.max(1),
            item_concurrency: config.item_concurrency.max(1),
            cancel: None,
        }
    }

    /// Stop at the next batch boundary once the receiver reads `true`
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Run one full recompute for `kind`.
    ///
    /// Per-item failures are collected in the report. Only a failed
    /// normalization pass is returned as an error.
    pub async fn run(
        &self,
        kind: ItemKind,
        changed_since_days: i64,
        dry_run: bool,
    ) -> Result<RecomputeReport> {
        let started = Instant::now();
        let mut report = RecomputeReport::new(kind);

        let config = RankingConfig::load(self.config_store.as_ref()).await;

        if !(0..=MAX_WINDOW_DAYS).contains(&changed_since_days) {
            warn!(
                kind = %kind,
                changed_since_days,
                max = MAX_WINDOW_DAYS,
                "changed_since_days out of range, clamping"
            );
        }
        let since = window_start(Utc::now(), changed_since_days);
        let items = match self.items.list_changed_items(kind, since).await {
            Ok(items) => items,
            Err(e) => {
                error!(kind = %kind, error = %e, "Full recompute aborted: cannot list items");
                report.aborted = true;
                report.errors.push(ItemError {
                    item_id: None,
                    message: format!("failed to list changed items: {e}"),
                });
                return Ok(self.finish(report, started, "aborted"));
            }
        };

        info!(
            kind = %kind,
            items = items.len(),
            changed_since_days,
            dry_run,
            batch_size = self.batch_size,
            "Starting full recompute"
        );

        for (batch_idx, batch) in items.chunks(self.batch_size).enumerate() {
            if self.is_cancelled() {
                warn!(
                    kind = %kind,
                    batch = batch_idx,
                    processed = report.processed,
                    "Full recompute cancelled at batch boundary"
                );
                report.cancelled = true;
                return Ok(self.finish(report, started, "cancelled"));
            }

            let ids: Vec<Uuid> = batch.iter().map(|item| item.id).collect();
            let results: Vec<(Uuid, Result<f64>)> = stream::iter(ids)
                .map(|item_id| {
                    let config = &config;
                    async move { (item_id, self.recompute_item(kind, item_id, config, dry_run).await) }
                })
                .buffer_unordered(self.item_concurrency)
                .collect()
                .await;

            for (item_id, result) in results {
                report.processed += 1;
                match result {
                    Ok(_) => report.succeeded += 1,
                    Err(e) => {
                        report.failed += 1;
                        warn!(kind = %kind, item_id = %item_id, error = %e, "Item recompute failed");
                        report.errors.push(ItemError {
                            item_id: Some(item_id),
                            message: e.to_string(),
                        });
                    }
                }
            }

            info!(
                kind = %kind,
                batch = batch_idx + 1,
                processed = report.processed,
                failed = report.failed,
                "Full recompute batch completed"
            );
        }

        if !dry_run && report.succeeded > 0 {
            if let Err(e) = normalize_window(self.store.as_ref(), kind, &config).await {
                self.finish(report, started, "error");
                return Err(e);
            }
            report.normalized = true;
        }

        Ok(self.finish(report, started, "success"))
    }

    async fn recompute_item(
        &self,
        kind: ItemKind,
        item_id: Uuid,
        config: &RankingConfig,
        dry_run: bool,
    ) -> Result<f64> {
        let signals = self.signals.get_signals(kind, item_id).await?;
        let score = raw_score(kind, &signals, config);

        if !dry_run {
            self.store
                .upsert_raw_score(kind, item_id, score, Utc::now(), None)
                .await?;
        }

        Ok(score)
    }

    fn finish(&self, mut report: RecomputeReport, started: Instant, status: &str) -> RecomputeReport {
        let elapsed = started.elapsed();
        report.duration_ms = elapsed.as_millis() as u64;

        metrics::record_full_recompute_run(report.kind.as_str(), status, elapsed);
        metrics::record_full_recompute_items(report.kind.as_str(), report.succeeded, report.failed);

        info!(
            kind = %report.kind,
            status,
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            normalized = report.normalized,
            duration_ms = report.duration_ms,
            "Full recompute finished"
        );

        report
    }
}
