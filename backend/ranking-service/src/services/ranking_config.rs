//! Ranking configuration loader
//!
//! Reads weights, half-lives and thresholds from a `ConfigStore`. Each key
//! is read on its own; a missing, unreadable or out-of-range value falls
//! back to the compiled-in default for that key only.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{ItemKind, MAX_WINDOW_DAYS};
use crate::services::sources::ConfigStore;

/// Weights and half-life for one item kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindWeights {
    pub upvotes: f64,
    pub saves: f64,
    pub comments: f64,
    pub visits: f64,
    pub half_life_hours: f64,
}

impl KindWeights {
    pub fn card_defaults() -> Self {
        Self {
            upvotes: 1.0,
            saves: 2.0,
            comments: 1.5,
            visits: 0.3,
            half_life_hours: 48.0,
        }
    }

    /// Collections keep their relevance longer than single cards
    pub fn collection_defaults() -> Self {
        Self {
            upvotes: 1.0,
            saves: 2.5,
            comments: 1.5,
            visits: 0.2,
            half_life_hours: 168.0,
        }
    }
}

/// Snapshot of the tunable ranking parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingConfig {
    pub card: KindWeights,
    pub collection: KindWeights,
    pub promotion_multiplier: f64,
    pub normalization_window_days: i64,
    pub default_creator_quality: f64,
    pub abuse_penalty_floor: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            card: KindWeights::card_defaults(),
            collection: KindWeights::collection_defaults(),
            promotion_multiplier: 0.5,
            normalization_window_days: 7,
            default_creator_quality: 50.0,
            abuse_penalty_floor: 0.1,
        }
    }
}

impl RankingConfig {
    pub fn weights(&self, kind: ItemKind) -> &KindWeights {
        match kind {
            ItemKind::Card => &self.card,
            ItemKind::Collection => &self.collection,
        }
    }

    /// Load a config snapshot. Never fails.
    pub async fn load(store: &dyn ConfigStore) -> Self {
        let defaults = Self::default();

        let card = load_weights(store, ItemKind::Card, &defaults.card).await;
        let collection = load_weights(store, ItemKind::Collection, &defaults.collection).await;

        let promotion_multiplier = read_f64(
            store,
            "ranking.promotion_multiplier",
            defaults.promotion_multiplier,
            |v| v >= 0.0,
        )
        .await;

        let normalization_window_days = read_f64(
            store,
            "ranking.normalization_window_days",
            defaults.normalization_window_days as f64,
            |v| (1.0..=MAX_WINDOW_DAYS as f64).contains(&v),
        )
        .await
        .floor() as i64;

        let default_creator_quality = read_f64(
            store,
            "ranking.default_creator_quality",
            defaults.default_creator_quality,
            |v| (0.0..=100.0).contains(&v),
        )
        .await;

        let abuse_penalty_floor = read_f64(
            store,
            "ranking.abuse_penalty_floor",
            defaults.abuse_penalty_floor,
            |v| v > 0.0 && v <= 1.0,
        )
        .await;

        Self {
            card,
            collection,
            promotion_multiplier,
            normalization_window_days,
            default_creator_quality,
            abuse_penalty_floor,
        }
    }
}

async fn load_weights(store: &dyn ConfigStore, kind: ItemKind, defaults: &KindWeights) -> KindWeights {
    let prefix = format!("ranking.{}", kind.as_str());
    let non_negative = |v: f64| v >= 0.0;

    KindWeights {
        upvotes: read_f64(
            store,
            &format!("{prefix}.weight.upvotes"),
            defaults.upvotes,
            non_negative,
        )
        .await,
        saves: read_f64(
            store,
            &format!("{prefix}.weight.saves"),
            defaults.saves,
            non_negative,
        )
        .await,
        comments: read_f64(
            store,
            &format!("{prefix}.weight.comments"),
            defaults.comments,
            non_negative,
        )
        .await,
        visits: read_f64(
            store,
            &format!("{prefix}.weight.visits"),
            defaults.visits,
            non_negative,
        )
        .await,
        half_life_hours: read_f64(
            store,
            &format!("{prefix}.half_life_hours"),
            defaults.half_life_hours,
            |v| v > 0.0,
        )
        .await,
    }
}

async fn read_f64(
    store: &dyn ConfigStore,
    key: &str,
    default: f64,
    valid: impl Fn(f64) -> bool,
) -> f64 {
    let raw = match store.get_config_value(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!(key, default, "Ranking config key absent, using default");
            return default;
        }
        Err(e) => {
            warn!(key, error = %e, default, "Failed to read ranking config key, using default");
            return default;
        }
    };

    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && valid(value) => value,
        Ok(value) => {
            warn!(key, value, default, "Ranking config value out of range, using default");
            default
        }
        Err(e) => {
            warn!(key, raw = %raw, error = %e, default, "Malformed ranking config value, using default");
            default
        }
    }
}
