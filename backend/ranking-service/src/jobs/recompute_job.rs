//! One-shot full recompute, run with `--mode full-recompute`.
//!
//! Meant for CronJobs and operators: scores the requested kinds once,
//! prints a JSON report per kind on stdout and exits.

use std::sync::Arc;
use tracing::info;

use crate::error::{AppError, Result};
use crate::jobs::full_recompute::FullRecomputeWorker;
use crate::models::{ItemKind, RecomputeReport, MAX_WINDOW_DAYS};

/// One-shot recompute options
#[derive(Debug, Clone, PartialEq)]
pub struct RecomputeJobConfig {
    /// Empty means every kind
    pub kinds: Vec<ItemKind>,
    pub changed_since_days: i64,
    pub dry_run: bool,
}

impl Default for RecomputeJobConfig {
    fn default() -> Self {
        Self {
            kinds: ItemKind::ALL.to_vec(),
            changed_since_days: 7,
            dry_run: false,
        }
    }
}

impl RecomputeJobConfig {
    /// Reads `RECOMPUTE_KIND` (card|collection|all), `RECOMPUTE_CHANGED_SINCE_DAYS`
    /// and `RECOMPUTE_DRY_RUN`.
    pub fn from_env() -> Result<Self> {
        let kinds = parse_kinds(
            &std::env::var("RECOMPUTE_KIND").unwrap_or_else(|_| "all".to_string()),
        )?;

        Ok(Self {
            kinds,
            changed_since_days: parse_changed_since_days(
                std::env::var("RECOMPUTE_CHANGED_SINCE_DAYS").ok().as_deref(),
            )?,
            dry_run: parse_dry_run(std::env::var("RECOMPUTE_DRY_RUN").ok().as_deref())?,
        })
    }
}

fn parse_changed_since_days(raw: Option<&str>) -> Result<i64> {
    let Some(raw) = raw else {
        return Ok(7);
    };
    match raw.trim().parse::<i64>() {
        Ok(days) if (0..=MAX_WINDOW_DAYS).contains(&days) => Ok(days),
        _ => Err(AppError::Config(format!(
            "RECOMPUTE_CHANGED_SINCE_DAYS must be an integer between 0 and {MAX_WINDOW_DAYS}, got {raw:?}"
        ))),
    }
}

fn parse_dry_run(raw: Option<&str>) -> Result<bool> {
    let Some(raw) = raw else {
        return Ok(false);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(AppError::Config(format!(
            "RECOMPUTE_DRY_RUN must be true or false, got {raw:?}"
        ))),
    }
}

pub fn parse_kinds(value: &str) -> Result<Vec<ItemKind>> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "all" => Ok(ItemKind::ALL.to_vec()),
        other => other.parse::<ItemKind>().map(|kind| vec![kind]),
    }
}

/// Run the one-shot recompute. A normalization failure on any kind is
/// returned after the remaining kinds have run.
pub async fn run_full_recompute_job(
    worker: Arc<FullRecomputeWorker>,
    job: &RecomputeJobConfig,
) -> Result<Vec<RecomputeReport>> {
    info!(
        kinds = ?job.kinds,
        changed_since_days = job.changed_since_days,
        dry_run = job.dry_run,
        "Running one-shot full recompute"
    );

    let mut reports = Vec::with_capacity(job.kinds.len());
    let mut first_error: Option<AppError> = None;

    for kind in &job.kinds {
        match worker.run(*kind, job.changed_since_days, job.dry_run).await {
            Ok(report) => reports.push(report),
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(reports),
    }
}
