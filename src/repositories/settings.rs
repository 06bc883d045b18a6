use crate::models::platform::PlatformSettings;

use async_trait::async_trait;
use sqlx::{types::Json, PgPool};

use super::SettingsStore;

/// The settings table holds at most one row, keyed `1`.
#[derive(Clone)]
pub struct SettingsRepository {
    conn: PgPool,
}

impl SettingsRepository {
    pub fn new(conn: PgPool) -> Self {
        SettingsRepository { conn }
    }
}

#[async_trait]
impl SettingsStore for SettingsRepository {
    async fn load(&self) -> Result<PlatformSettings, anyhow::Error> {
        let value: Option<Json<PlatformSettings>> =
            sqlx::query_scalar("SELECT value FROM settings WHERE id = 1")
                .fetch_optional(&self.conn)
                .await?;

        Ok(value.map(|Json(settings)| settings).unwrap_or_default())
    }

    async fn save(&self, settings: &PlatformSettings) -> Result<(), anyhow::Error> {
        sqlx::query(
            r#"INSERT INTO settings (id, value) VALUES (1, $1)
            ON CONFLICT (id) DO UPDATE SET value = EXCLUDED.value, updated_at = CURRENT_TIMESTAMP"#,
        )
        .bind(Json(settings))
        .execute(&self.conn)
        .await?;

        Ok(())
    }
}
