//! Normalization pass
//!
//! Recomputes mean/stddev over every score of a kind updated inside the
//! normalization window, writes an audit stats row, then rewrites each
//! row's norm score. The pass is one unit of work: the first persistence
//! error aborts it and is returned to the caller.

use chrono::Utc;
use tracing::{error, info};

use crate::db::RankingStore;
use crate::error::{AppError, Result};
use crate::models::{window_start, ItemKind, RankingStats};
use crate::services::ranking_config::RankingConfig;
use crate::services::scoring::{normalize, stats};

/// Summary of one normalization pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationSummary {
    pub item_count: usize,
    pub mean: f64,
    pub stddev: f64,
}

/// Returns `Ok(None)` when the window is empty.
pub async fn normalize_window(
    store: &dyn RankingStore,
    kind: ItemKind,
    config: &RankingConfig,
) -> Result<Option<NormalizationSummary>> {
    let window_end = Utc::now();
    let window_start = window_start(window_end, config.normalization_window_days);

    let rows = store
        .list_window(kind, window_start)
        .await
        .map_err(|e| normalization_error(kind, "read window", e))?;

    if rows.is_empty() {
        info!(
            kind = %kind,
            window_days = config.normalization_window_days,
            "Normalization window empty, skipping"
        );
        return Ok(None);
    }

    let raw_scores: Vec<f64> = rows.iter().map(|r| r.raw_score).collect();
    let window_stats = stats(&raw_scores);

    store
        .upsert_stats(&RankingStats {
            item_kind: kind,
            window_start,
            window_end,
            mean_raw_score: window_stats.mean,
            stddev_raw_score: window_stats.stddev,
            item_count: rows.len() as i64,
        })
        .await
        .map_err(|e| normalization_error(kind, "write stats", e))?;

    let updated_at = Utc::now();
    for row in &rows {
        let norm = normalize(row.raw_score, window_stats.mean, window_stats.stddev);
        store
            .update_norm_score(kind, row.item_id, norm, updated_at)
            .await
            .map_err(|e| normalization_error(kind, "write norm score", e))?;
    }

    info!(
        kind = %kind,
        items = rows.len(),
        mean = window_stats.mean,
        stddev = window_stats.stddev,
        "Normalization pass completed"
    );

    Ok(Some(NormalizationSummary {
        item_count: rows.len(),
        mean: window_stats.mean,
        stddev: window_stats.stddev,
    }))
}

fn normalization_error(kind: ItemKind, step: &str, e: AppError) -> AppError {
    error!(kind = %kind, step, error = %e, "Normalization pass aborted");
    AppError::Normalization(format!("{kind}: {step}: {e}"))
}
