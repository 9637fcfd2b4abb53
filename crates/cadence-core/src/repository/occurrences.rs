use crate::error::CoreError;
use crate::models::{
    DayKey, GeneratedKey, Occurrence, OccurrenceEdit, OccurrenceSnapshot, OccurrenceStatus, WorkoutKind,
    WorkoutLink,
};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Column layout of the `occurrences` table. Keys are stored as text.
#[derive(Debug, FromRow)]
pub(crate) struct OccurrenceRow {
    id: Uuid,
    title: String,
    start_at: DateTime<Utc>,
    end_at: Option<DateTime<Utc>>,
    planned_title: Option<String>,
    planned_start_at: Option<DateTime<Utc>>,
    planned_end_at: Option<DateTime<Utc>>,
    template_id: Option<Uuid>,
    day_key: Option<String>,
    generated_key: Option<String>,
    status: OccurrenceStatus,
    workout_kind: WorkoutKind,
    workout_routine_id: Option<Uuid>,
    workout_session_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OccurrenceRow> for Occurrence {
    type Error = CoreError;

    fn try_from(row: OccurrenceRow) -> Result<Self, Self::Error> {
        Ok(Occurrence {
            id: row.id,
            title: row.title,
            start_at: row.start_at,
            end_at: row.end_at,
            planned_title: row.planned_title,
            planned_start_at: row.planned_start_at,
            planned_end_at: row.planned_end_at,
            template_id: row.template_id,
            day_key: row.day_key.map(|k| k.parse::<DayKey>()).transpose()?,
            generated_key: row.generated_key.map(|k| k.parse::<GeneratedKey>()).transpose()?,
            status: row.status,
            workout: WorkoutLink::decode(row.workout_kind, row.workout_routine_id),
            workout_session_id: row.workout_session_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn decode_all(rows: Vec<OccurrenceRow>) -> Result<Vec<Occurrence>, CoreError> {
    rows.into_iter().map(Occurrence::try_from).collect()
}

impl SqliteRepository {
    async fn fetch_occurrence(&self, id: Uuid) -> Result<Occurrence, CoreError> {
        let row: Option<OccurrenceRow> = sqlx::query_as("SELECT * FROM occurrences WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.map(Occurrence::try_from)
            .transpose()?
            .ok_or(CoreError::MissingOccurrence(id))
    }
}

#[async_trait]
impl super::OccurrenceRepository for SqliteRepository {
    async fn find_occurrence_by_id(&self, id: Uuid) -> Result<Option<Occurrence>, CoreError> {
        let row: Option<OccurrenceRow> = sqlx::query_as("SELECT * FROM occurrences WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.map(Occurrence::try_from).transpose()
    }

    async fn find_occurrence_by_generated_key(&self, key: &GeneratedKey) -> Result<Option<Occurrence>, CoreError> {
        let row: Option<OccurrenceRow> = sqlx::query_as("SELECT * FROM occurrences WHERE generated_key = $1")
            .bind(key.to_string())
            .fetch_optional(self.pool())
            .await?;
        row.map(Occurrence::try_from).transpose()
    }

    async fn find_occurrences_for_day(&self, day: DayKey) -> Result<Vec<Occurrence>, CoreError> {
        let rows: Vec<OccurrenceRow> =
            sqlx::query_as("SELECT * FROM occurrences WHERE day_key = $1 ORDER BY start_at, id")
                .bind(day.to_string())
                .fetch_all(self.pool())
                .await?;
        decode_all(rows)
    }

    async fn find_occurrences_by_template(&self, template_id: Uuid) -> Result<Vec<Occurrence>, CoreError> {
        let rows: Vec<OccurrenceRow> =
            sqlx::query_as("SELECT * FROM occurrences WHERE template_id = $1 ORDER BY start_at, id")
                .bind(template_id)
                .fetch_all(self.pool())
                .await?;
        decode_all(rows)
    }

    async fn find_occurrences_for_template_in_range(
        &self,
        template_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Occurrence>, CoreError> {
        let rows: Vec<OccurrenceRow> = sqlx::query_as(
            r#"SELECT * FROM occurrences
            WHERE template_id = $1 AND start_at >= $2 AND start_at < $3
            ORDER BY start_at, id"#
        )
        .bind(template_id)
        .bind(start)
        .bind(end)
        .fetch_all(self.pool())
        .await?;
        decode_all(rows)
    }

    async fn insert_occurrences(&self, occurrences: &[Occurrence]) -> Result<(), CoreError> {
        if occurrences.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool().begin().await?;
        for occ in occurrences {
            let (workout_kind, routine_id) = occ.workout.encode();
            sqlx::query(
                r#"INSERT INTO occurrences (id, title, start_at, end_at, planned_title, planned_start_at, planned_end_at,
                    template_id, day_key, generated_key, status, workout_kind, workout_routine_id, workout_session_id,
                    created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)"#
            )
            .bind(occ.id)
            .bind(&occ.title)
            .bind(occ.start_at)
            .bind(occ.end_at)
            .bind(&occ.planned_title)
            .bind(occ.planned_start_at)
            .bind(occ.planned_end_at)
            .bind(occ.template_id)
            .bind(occ.day_key.map(|k| k.to_string()))
            .bind(occ.generated_key.map(|k| k.to_string()))
            .bind(occ.status)
            .bind(workout_kind)
            .bind(routine_id)
            .bind(occ.workout_session_id)
            .bind(occ.created_at)
            .bind(occ.updated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::debug!(count = occurrences.len(), "Inserted occurrences");
        Ok(())
    }

    async fn write_snapshot(&self, id: Uuid, snapshot: &OccurrenceSnapshot) -> Result<bool, CoreError> {
        let (workout_kind, routine_id) = snapshot.workout.encode();
        let result = sqlx::query(
            r#"UPDATE occurrences SET title = $1, start_at = $2, end_at = $3,
                planned_title = $4, planned_start_at = $5, planned_end_at = $6,
                template_id = $7, day_key = $8, generated_key = $9, status = $10,
                workout_kind = $11, workout_routine_id = $12, workout_session_id = $13, updated_at = $14
            WHERE id = $15"#
        )
        .bind(&snapshot.title)
        .bind(snapshot.start_at)
        .bind(snapshot.end_at)
        .bind(&snapshot.planned_title)
        .bind(snapshot.planned_start_at)
        .bind(snapshot.planned_end_at)
        .bind(snapshot.template_id)
        .bind(snapshot.day_key.map(|k| k.to_string()))
        .bind(snapshot.generated_key.map(|k| k.to_string()))
        .bind(snapshot.status)
        .bind(workout_kind)
        .bind(routine_id)
        .bind(snapshot.workout_session_id)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_occurrence_by_generated_key(&self, key: &GeneratedKey) -> Result<u64, CoreError> {
        let result = sqlx::query("DELETE FROM occurrences WHERE generated_key = $1")
            .bind(key.to_string())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }

    async fn edit_occurrence(&self, id: Uuid, edit: OccurrenceEdit) -> Result<Occurrence, CoreError> {
        let mut occurrence = self.fetch_occurrence(id).await?;
        edit.apply_to(&mut occurrence);

        if !self.write_snapshot(id, &occurrence.snapshot()).await? {
            return Err(CoreError::MissingOccurrence(id));
        }
        self.fetch_occurrence(id).await
    }

    async fn link_workout_session(&self, id: Uuid, session_id: Uuid) -> Result<Occurrence, CoreError> {
        let result = sqlx::query("UPDATE occurrences SET workout_session_id = $1, updated_at = $2 WHERE id = $3")
            .bind(session_id)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::MissingOccurrence(id));
        }
        self.fetch_occurrence(id).await
    }
}
