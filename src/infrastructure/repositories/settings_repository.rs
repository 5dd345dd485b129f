use crate::infrastructure::db::DbPool;
use crate::error::AppResult;
use chrono::Utc;
use std::sync::Arc;

pub struct SettingsRepository {
    pool: Arc<DbPool>,
}

impl SettingsRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Read a tunable, materializing the default on first access. The
    /// conflict clause makes the lazy write race-safe across instances: the
    /// stored value always wins and is what comes back.
    pub async fn get_or_default(&self, key: &str, default: &str) -> AppResult<String> {
        let pool = self.pool.as_ref();
        let value = sqlx::query_scalar::<_, String>(
            r#"
            INSERT INTO app_settings (key, value, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE SET value = app_settings.value
            RETURNING value
            "#,
        )
        .bind(key)
        .bind(default)
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;

        Ok(value)
    }
}
