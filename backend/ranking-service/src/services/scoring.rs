//! Raw scoring, window statistics and z-score normalization.
//!
//! raw = base * creator_factor * promotion_factor * age_decay * abuse_factor
//!
//! - base: weighted sum of ln(1 + count) so viral counts grow sub-linearly
//! - age_decay: exp(-ln(2) / half_life * age_hours)
//! - creator_factor: 1 + quality / 100
//! - promotion_factor: 1 + multiplier when promoted, otherwise 1
//! - abuse_factor: clamped into [floor, 1]

use serde::{Deserialize, Serialize};

use crate::models::{ItemKind, RankingSignals};
use crate::services::ranking_config::RankingConfig;

/// Below this standard deviation the window is treated as flat
pub const STDDEV_EPSILON: f64 = 1e-4;

/// Compute the raw score for one item. Total and side-effect free.
pub fn raw_score(kind: ItemKind, signals: &RankingSignals, config: &RankingConfig) -> f64 {
    let weights = config.weights(kind);

    let base = weights.upvotes * log_count(signals.upvotes_count)
        + weights.saves * log_count(signals.saves_count)
        + weights.comments * log_count(signals.comments_count)
        + weights.visits * log_count(signals.visits_count);

    let age_hours = if signals.age_hours.is_finite() {
        signals.age_hours.max(0.0)
    } else {
        0.0
    };
    let lambda = std::f64::consts::LN_2 / weights.half_life_hours;
    let age_decay = (-lambda * age_hours).exp();

    let quality = signals
        .creator_quality
        .filter(|q| q.is_finite())
        .unwrap_or(config.default_creator_quality)
        .clamp(0.0, 100.0);
    let creator_factor = 1.0 + quality / 100.0;

    let promotion_factor = if signals.promotion_boost.is_finite() && signals.promotion_boost > 0.0
    {
        1.0 + config.promotion_multiplier
    } else {
        1.0
    };

    let abuse = if signals.abuse_factor.is_finite() {
        signals.abuse_factor
    } else {
        1.0
    };
    let abuse_factor = abuse.clamp(config.abuse_penalty_floor, 1.0);

    base * creator_factor * promotion_factor * age_decay * abuse_factor
}

fn log_count(count: u64) -> f64 {
    (count as f64).ln_1p()
}

/// Mean and population standard deviation of a score window
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreStats {
    pub mean: f64,
    pub stddev: f64,
}

pub fn stats(raw_scores: &[f64]) -> ScoreStats {
    if raw_scores.is_empty() {
        return ScoreStats::default();
    }

    let n = raw_scores.len() as f64;
    let mean = raw_scores.iter().sum::<f64>() / n;
    let variance = raw_scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;

    ScoreStats {
        mean,
        stddev: variance.sqrt(),
    }
}

/// z-score of `raw` against the window, or `raw` itself for a flat window
pub fn normalize(raw: f64, mean: f64, stddev: f64) -> f64 {
    if stddev < STDDEV_EPSILON {
        raw
    } else {
        (raw - mean) / stddev
    }
}
