// ============================================
// Background Jobs Module
// ============================================
//
// Contains background job runners for:
// 1. Full recompute of every changed item of a kind
// 2. Normalization of a kind's score window
// 3. Delta recompute after single engagement events
//
// Full recompute can be triggered via:
// - Scheduler (RANKING_WORKER_SCHEDULER_ENABLED)
// - Command line argument (--mode full-recompute)
// - HTTP API (POST /api/v1/ranking/recompute)

pub mod delta_recompute;
pub mod full_recompute;
pub mod normalization;
pub mod recompute_job;
pub mod scheduler;

pub use delta_recompute::{
    DeltaDispatcher, DeltaFailure, DeltaOutcome, DeltaRecomputeWorker, DeltaRequest, DeltaTrigger,
};
pub use full_recompute::FullRecomputeWorker;
pub use normalization::{normalize_window, NormalizationSummary};
pub use recompute_job::{run_full_recompute_job, RecomputeJobConfig};
pub use scheduler::start_full_recompute_scheduler;
