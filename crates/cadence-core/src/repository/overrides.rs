use crate::error::CoreError;
use crate::models::{DayKey, DayOverride, GeneratedKey, OverrideAction};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, FromRow)]
pub(crate) struct OverrideRow {
    key: String,
    action: OverrideAction,
    created_at: DateTime<Utc>,
}

impl TryFrom<OverrideRow> for DayOverride {
    type Error = CoreError;

    fn try_from(row: OverrideRow) -> Result<Self, Self::Error> {
        Ok(DayOverride {
            key: row.key.parse()?,
            action: row.action,
            created_at: row.created_at,
        })
    }
}

fn decode_all(rows: Vec<OverrideRow>) -> Result<Vec<DayOverride>, CoreError> {
    rows.into_iter().map(DayOverride::try_from).collect()
}

#[async_trait]
impl super::OverrideRepository for SqliteRepository {
    async fn find_override(&self, key: &GeneratedKey) -> Result<Option<DayOverride>, CoreError> {
        let row: Option<OverrideRow> =
            sqlx::query_as("SELECT key, action, created_at FROM day_overrides WHERE key = $1")
                .bind(key.to_string())
                .fetch_optional(self.pool())
                .await?;
        row.map(DayOverride::try_from).transpose()
    }

    async fn find_overrides_for_day(&self, day: DayKey) -> Result<Vec<DayOverride>, CoreError> {
        let rows: Vec<OverrideRow> =
            sqlx::query_as("SELECT key, action, created_at FROM day_overrides WHERE day_key = $1 ORDER BY key")
                .bind(day.to_string())
                .fetch_all(self.pool())
                .await?;
        decode_all(rows)
    }

    async fn find_overrides_for_template(&self, template_id: Uuid) -> Result<Vec<DayOverride>, CoreError> {
        let rows: Vec<OverrideRow> =
            sqlx::query_as("SELECT key, action, created_at FROM day_overrides WHERE template_id = $1 ORDER BY day_key")
                .bind(template_id)
                .fetch_all(self.pool())
                .await?;
        decode_all(rows)
    }

    async fn add_override(&self, key: GeneratedKey, action: OverrideAction) -> Result<DayOverride, CoreError> {
        let day_override = DayOverride::new(key, action);

        // Re-marking a day replaces the earlier action
        sqlx::query(
            r#"INSERT INTO day_overrides (key, template_id, day_key, action, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT(key) DO UPDATE SET action = excluded.action, created_at = excluded.created_at"#
        )
        .bind(key.to_string())
        .bind(key.template_id)
        .bind(key.day.to_string())
        .bind(action)
        .bind(day_override.created_at)
        .execute(self.pool())
        .await?;

        tracing::info!(key = %key, action = %action, "Recorded day override");
        Ok(day_override)
    }

    async fn delete_override(&self, key: &GeneratedKey) -> Result<bool, CoreError> {
        let result = sqlx::query("DELETE FROM day_overrides WHERE key = $1")
            .bind(key.to_string())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
