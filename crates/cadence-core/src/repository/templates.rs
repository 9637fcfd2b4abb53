use crate::error::CoreError;
use crate::models::{Template, TemplateDraft, WorkoutKind, WorkoutLink};
use crate::recurrence::{RecurrenceKind, RecurrenceRule};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Column layout of the `templates` table
#[derive(Debug, FromRow)]
pub(crate) struct TemplateRow {
    id: Uuid,
    title: String,
    enabled: bool,
    start_offset_minutes: i32,
    duration_minutes: i32,
    recurrence_kind: RecurrenceKind,
    recurrence_start_date: NaiveDate,
    recurrence_end_date: Option<NaiveDate>,
    recurrence_interval: i64,
    recurrence_weekdays: String,
    workout_kind: WorkoutKind,
    workout_routine_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TemplateRow> for Template {
    type Error = CoreError;

    fn try_from(row: TemplateRow) -> Result<Self, Self::Error> {
        let recurrence = RecurrenceRule {
            kind: row.recurrence_kind,
            start_date: row.recurrence_start_date,
            end_date: row.recurrence_end_date,
            interval: u32::try_from(row.recurrence_interval.max(1)).unwrap_or(u32::MAX),
            weekdays: row.recurrence_weekdays.parse()?,
        };
        Ok(Template {
            id: row.id,
            title: row.title,
            enabled: row.enabled,
            start_offset_minutes: row.start_offset_minutes,
            duration_minutes: row.duration_minutes,
            recurrence,
            workout: WorkoutLink::decode(row.workout_kind, row.workout_routine_id),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn decode_all(rows: Vec<TemplateRow>) -> Result<Vec<Template>, CoreError> {
    rows.into_iter().map(Template::try_from).collect()
}

#[async_trait]
impl super::TemplateRepository for SqliteRepository {
    async fn add_template(&self, draft: TemplateDraft) -> Result<Template, CoreError> {
        let template = Template::from_draft(draft)?;
        let (workout_kind, routine_id) = template.workout.encode();

        sqlx::query(
            r#"INSERT INTO templates (id, title, enabled, start_offset_minutes, duration_minutes,
                recurrence_kind, recurrence_start_date, recurrence_end_date, recurrence_interval, recurrence_weekdays,
                workout_kind, workout_routine_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"#
        )
        .bind(template.id)
        .bind(&template.title)
        .bind(template.enabled)
        .bind(template.start_offset_minutes)
        .bind(template.duration_minutes)
        .bind(template.recurrence.kind)
        .bind(template.recurrence.start_date)
        .bind(template.recurrence.end_date)
        .bind(template.recurrence.interval as i64)
        .bind(template.recurrence.weekdays.to_string())
        .bind(workout_kind)
        .bind(routine_id)
        .bind(template.created_at)
        .bind(template.updated_at)
        .execute(self.pool())
        .await?;

        tracing::info!(template_id = %template.id, title = %template.title, "Created template");
        Ok(template)
    }

    async fn find_template_by_id(&self, id: Uuid) -> Result<Option<Template>, CoreError> {
        let row: Option<TemplateRow> = sqlx::query_as("SELECT * FROM templates WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.map(Template::try_from).transpose()
    }

    async fn find_templates(&self) -> Result<Vec<Template>, CoreError> {
        let rows: Vec<TemplateRow> = sqlx::query_as("SELECT * FROM templates ORDER BY created_at")
            .fetch_all(self.pool())
            .await?;
        decode_all(rows)
    }

    async fn find_enabled_templates(&self) -> Result<Vec<Template>, CoreError> {
        let rows: Vec<TemplateRow> = sqlx::query_as("SELECT * FROM templates WHERE enabled = true ORDER BY created_at")
            .fetch_all(self.pool())
            .await?;
        decode_all(rows)
    }

    async fn save_template(&self, id: Uuid, draft: TemplateDraft) -> Result<Template, CoreError> {
        draft.validate()?;
        let (workout_kind, routine_id) = draft.workout.encode();

        let result = sqlx::query(
            r#"UPDATE templates SET title = $1, enabled = $2, start_offset_minutes = $3, duration_minutes = $4,
                recurrence_kind = $5, recurrence_start_date = $6, recurrence_end_date = $7,
                recurrence_interval = $8, recurrence_weekdays = $9,
                workout_kind = $10, workout_routine_id = $11, updated_at = $12
            WHERE id = $13"#
        )
        .bind(&draft.title)
        .bind(draft.enabled)
        .bind(draft.start_offset_minutes)
        .bind(draft.duration_minutes)
        .bind(draft.recurrence.kind)
        .bind(draft.recurrence.start_date)
        .bind(draft.recurrence.end_date)
        .bind(draft.recurrence.interval.max(1) as i64)
        .bind(draft.recurrence.weekdays.to_string())
        .bind(workout_kind)
        .bind(routine_id)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::TemplateNotFound(id));
        }

        self.find_template_by_id(id)
            .await?
            .ok_or(CoreError::TemplateNotFound(id))
    }

    async fn set_template_enabled(&self, id: Uuid, enabled: bool) -> Result<Template, CoreError> {
        let result = sqlx::query("UPDATE templates SET enabled = $1, updated_at = $2 WHERE id = $3")
            .bind(enabled)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::TemplateNotFound(id));
        }

        self.find_template_by_id(id)
            .await?
            .ok_or(CoreError::TemplateNotFound(id))
    }
}
