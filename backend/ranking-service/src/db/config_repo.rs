/// Ranking config store backed by the `ranking_config` key-value table
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::error;

use crate::error::{AppError, Result};
use crate::services::sources::ConfigStore;

#[derive(Clone)]
pub struct PgConfigStore {
    pool: PgPool,
}

impl PgConfigStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConfigStore for PgConfigStore {
    async fn get_config_value(&self, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT value FROM ranking_config WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!(key, error = %e, "Failed to read ranking config value");
                AppError::Database(e.to_string())
            })
    }
}
