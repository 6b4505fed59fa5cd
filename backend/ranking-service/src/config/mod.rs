use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub worker: WorkerConfig,
    pub delta: DeltaConfig,
    pub feed: FeedConfig,
    pub view: ViewConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Full recompute settings (`RANKING_WORKER_*`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_item_concurrency")]
    pub item_concurrency: usize,
    #[serde(default = "default_changed_since_days")]
    pub changed_since_days: i64,
    #[serde(default = "default_schedule_interval_secs")]
    pub schedule_interval_secs: u64,
    #[serde(default = "default_true")]
    pub scheduler_enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            item_concurrency: default_item_concurrency(),
            changed_since_days: default_changed_since_days(),
            schedule_interval_secs: default_schedule_interval_secs(),
            scheduler_enabled: true,
        }
    }
}

impl WorkerConfig {
    pub fn schedule_interval(&self) -> Duration {
        Duration::from_secs(self.schedule_interval_secs.max(1))
    }
}

/// Delta recompute settings (`RANKING_DELTA_*`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaConfig {
    #[serde(default = "default_debounce_secs")]
    pub debounce_secs: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for DeltaConfig {
    fn default() -> Self {
        Self {
            debounce_secs: default_debounce_secs(),
            queue_capacity: default_queue_capacity(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl DeltaConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_secs(self.debounce_secs)
    }
}

/// Feed composition settings (`RANKING_FEED_*`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_per_kind_timeout_ms")]
    pub per_kind_timeout_ms: u64,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
    #[serde(default = "default_card_ratio")]
    pub card_ratio: f64,
    #[serde(default = "default_collection_ratio")]
    pub collection_ratio: f64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            per_kind_timeout_ms: default_per_kind_timeout_ms(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            card_ratio: default_card_ratio(),
            collection_ratio: default_collection_ratio(),
        }
    }
}

impl FeedConfig {
    pub fn per_kind_timeout(&self) -> Duration {
        Duration::from_millis(self.per_kind_timeout_ms)
    }

    /// Clamp a requested page size into `1..=max_limit`
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1))
    }
}

/// Precomputed view refresh settings (`RANKING_VIEW_*`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

impl ViewConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                port: std::env::var("APP_PORT")
                    .unwrap_or_else(|_| "8012".to_string())
                    .parse()
                    .map_err(|e| AppError::Config(format!("APP_PORT: {e}")))?,
                log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .map_err(|_| AppError::Config("DATABASE_URL must be set".to_string()))?,
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .map_err(|e| AppError::Config(format!("DATABASE_MAX_CONNECTIONS: {e}")))?,
            },
            worker: envy::prefixed("RANKING_WORKER_").from_env::<WorkerConfig>()?,
            delta: envy::prefixed("RANKING_DELTA_").from_env::<DeltaConfig>()?,
            feed: envy::prefixed("RANKING_FEED_").from_env::<FeedConfig>()?,
            view: envy::prefixed("RANKING_VIEW_").from_env::<ViewConfig>()?,
        })
    }
}

fn default_batch_size() -> usize {
    100
}

fn default_item_concurrency() -> usize {
    4
}

fn default_changed_since_days() -> i64 {
    7
}

fn default_schedule_interval_secs() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

fn default_debounce_secs() -> u64 {
    30
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_max_concurrent() -> usize {
    8
}

fn default_per_kind_timeout_ms() -> u64 {
    800
}

fn default_limit() -> usize {
    20
}

fn default_max_limit() -> usize {
    100
}

fn default_card_ratio() -> f64 {
    0.7
}

fn default_collection_ratio() -> f64 {
    0.3
}

fn default_refresh_interval_secs() -> u64 {
    900
}
