//! Delta Recompute Worker
//!
//! Rescores a single item after an engagement event (vote, save, ...).
//! Requests land on a bounded queue and run on spawned tasks, so the
//! action that triggered them never waits on or fails because of ranking.
//!
//! A delta arriving within the debounce window of the row's last raw
//! update is dropped, not queued: a later event or the next full
//! recompute picks up the newer state. Norm scores are never touched here.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::DeltaConfig;
use crate::db::RankingStore;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::ItemKind;
use crate::services::ranking_config::RankingConfig;
use crate::services::scoring::raw_score;
use crate::services::sources::{ConfigStore, SignalSource};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeltaOutcome {
    /// Last raw update is younger than the debounce window
    Debounced,
    Updated { raw_score: f64 },
}

pub struct DeltaRecomputeWorker {
    signals: Arc<dyn SignalSource>,
    store: Arc<dyn RankingStore>,
    config_store: Arc<dyn ConfigStore>,
    debounce: Duration,
}

impl DeltaRecomputeWorker {
    pub fn new(
        signals: Arc<dyn SignalSource>,
        store: Arc<dyn RankingStore>,
        config_store: Arc<dyn ConfigStore>,
        debounce: Duration,
    ) -> Self {
        Self {
            signals,
            store,
            config_store,
            debounce,
        }
    }

    /// Recompute one item's raw score. Errors are logged and returned;
    /// retrying is the caller's decision.
    pub async fn recompute(
        &self,
        kind: ItemKind,
        item_id: Uuid,
        event_at: DateTime<Utc>,
    ) -> Result<DeltaOutcome> {
        match self.try_recompute(kind, item_id, event_at).await {
            Ok(outcome) => {
                let label = match outcome {
                    DeltaOutcome::Debounced => "debounced",
                    DeltaOutcome::Updated { .. } => "updated",
                };
                metrics::record_delta(kind.as_str(), label);
                Ok(outcome)
            }
            Err(e) => {
                metrics::record_delta(kind.as_str(), "error");
                error!(kind = %kind, item_id = %item_id, error = %e, "Delta recompute failed");
                Err(e)
            }
        }
    }

    async fn try_recompute(
        &self,
        kind: ItemKind,
        item_id: Uuid,
        event_at: DateTime<Utc>,
    ) -> Result<DeltaOutcome> {
        let config = RankingConfig::load(self.config_store.as_ref()).await;

        if let Some(existing) = self.store.get_score(kind, item_id).await? {
            let debounce = ChronoDuration::from_std(self.debounce)
                .map_err(|e| AppError::Internal(format!("invalid debounce window: {e}")))?;
            let since_update = Utc::now() - existing.last_raw_updated;
            if since_update < debounce {
                debug!(
                    kind = %kind,
                    item_id = %item_id,
                    since_update_ms = since_update.num_milliseconds(),
                    "Delta recompute debounced"
                );
                return Ok(DeltaOutcome::Debounced);
            }
        }

        let signals = self.signals.get_signals(kind, item_id).await?;
        let score = raw_score(kind, &signals, &config);

        self.store
            .upsert_raw_score(kind, item_id, score, Utc::now(), Some(event_at))
            .await?;

        debug!(kind = %kind, item_id = %item_id, raw_score = score, "Delta recompute stored");
        Ok(DeltaOutcome::Updated { raw_score: score })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeltaRequest {
    pub kind: ItemKind,
    pub item_id: Uuid,
    pub event_at: DateTime<Utc>,
}

/// A delta request whose recompute failed
#[derive(Debug, Clone)]
pub struct DeltaFailure {
    pub request: DeltaRequest,
    pub error: String,
}

/// Cheap, cloneable handle used by engagement handlers
#[derive(Clone)]
pub struct DeltaTrigger {
    tx: mpsc::Sender<DeltaRequest>,
}

impl DeltaTrigger {
    /// Submit a delta without waiting. Returns `false` when the request was
    /// dropped because the queue is full or the dispatcher is gone.
    pub fn trigger(&self, kind: ItemKind, item_id: Uuid) -> bool {
        let request = DeltaRequest {
            kind,
            item_id,
            event_at: Utc::now(),
        };

        match self.tx.try_send(request) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                metrics::record_delta(kind.as_str(), "dropped");
                warn!(kind = %kind, item_id = %item_id, "Delta queue full, dropping request");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                metrics::record_delta(kind.as_str(), "dropped");
                warn!(kind = %kind, item_id = %item_id, "Delta dispatcher stopped, dropping request");
                false
            }
        }
    }
}

/// Queue consumer that runs each delta on its own task
pub struct DeltaDispatcher {
    pub trigger: DeltaTrigger,
    /// Error channel for failed recomputes
    pub failures: mpsc::UnboundedReceiver<DeltaFailure>,
    pub handle: JoinHandle<()>,
}

impl DeltaDispatcher {
    pub fn spawn(worker: Arc<DeltaRecomputeWorker>, config: &DeltaConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (failure_tx, failures) = mpsc::unbounded_channel();
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));

        info!(
            queue_capacity = config.queue_capacity,
            max_concurrent = config.max_concurrent,
            debounce_secs = config.debounce_secs,
            "Starting delta recompute dispatcher"
        );

        let handle = tokio::spawn(run_dispatch_loop(worker, rx, failure_tx, semaphore));

        Self {
            trigger: DeltaTrigger { tx },
            failures,
            handle,
        }
    }
}

async fn run_dispatch_loop(
    worker: Arc<DeltaRecomputeWorker>,
    mut rx: mpsc::Receiver<DeltaRequest>,
    failure_tx: mpsc::UnboundedSender<DeltaFailure>,
    semaphore: Arc<Semaphore>,
) {
    while let Some(request) = rx.recv().await {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let worker = worker.clone();
        let failure_tx = failure_tx.clone();

        tokio::spawn(async move {
            if let Err(e) = worker
                .recompute(request.kind, request.item_id, request.event_at)
                .await
            {
                let _ = failure_tx.send(DeltaFailure {
                    request,
                    error: e.to_string(),
                });
            }
            drop(permit);
        });
    }

    info!("Delta recompute dispatcher stopped");
}
