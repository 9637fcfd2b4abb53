use crate::db::DbPool;
use crate::error::CoreError;
use crate::models::{
    DayKey, DayOverride, GeneratedKey, Occurrence, OccurrenceEdit, OccurrenceSnapshot, OverrideAction,
    Template, TemplateDraft,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod memory;
pub mod occurrences;
pub mod overrides;
pub mod templates;

pub use memory::InMemoryRepository;

// Traits are defined in this module and implemented in respective domain modules

/// Domain-specific trait for template operations
#[async_trait]
pub trait TemplateRepository {
    async fn add_template(&self, draft: TemplateDraft) -> Result<Template, CoreError>;
    async fn find_template_by_id(&self, id: Uuid) -> Result<Option<Template>, CoreError>;
    async fn find_templates(&self) -> Result<Vec<Template>, CoreError>;
    async fn find_enabled_templates(&self) -> Result<Vec<Template>, CoreError>;
    /// Commits a draft as the template's new state
    async fn save_template(&self, id: Uuid, draft: TemplateDraft) -> Result<Template, CoreError>;
    async fn set_template_enabled(&self, id: Uuid, enabled: bool) -> Result<Template, CoreError>;
}

/// Domain-specific trait for occurrence operations
#[async_trait]
pub trait OccurrenceRepository {
    async fn find_occurrence_by_id(&self, id: Uuid) -> Result<Option<Occurrence>, CoreError>;
    async fn find_occurrence_by_generated_key(&self, key: &GeneratedKey) -> Result<Option<Occurrence>, CoreError>;
    async fn find_occurrences_for_day(&self, day: DayKey) -> Result<Vec<Occurrence>, CoreError>;
    async fn find_occurrences_by_template(&self, template_id: Uuid) -> Result<Vec<Occurrence>, CoreError>;
    /// Occurrences linked to `template_id` starting in `[start, end)`
    async fn find_occurrences_for_template_in_range(
        &self,
        template_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Occurrence>, CoreError>;
    /// Inserts all rows in one transaction
    async fn insert_occurrences(&self, occurrences: &[Occurrence]) -> Result<(), CoreError>;
    /// Writes every snapshot field onto the row. Returns false if the row is gone.
    async fn write_snapshot(&self, id: Uuid, snapshot: &OccurrenceSnapshot) -> Result<bool, CoreError>;
    async fn delete_occurrence_by_generated_key(&self, key: &GeneratedKey) -> Result<u64, CoreError>;
    async fn edit_occurrence(&self, id: Uuid, edit: OccurrenceEdit) -> Result<Occurrence, CoreError>;
    /// Write path of the workout-session subsystem
    async fn link_workout_session(&self, id: Uuid, session_id: Uuid) -> Result<Occurrence, CoreError>;
}

/// Domain-specific trait for day override operations
#[async_trait]
pub trait OverrideRepository {
    async fn find_override(&self, key: &GeneratedKey) -> Result<Option<DayOverride>, CoreError>;
    async fn find_overrides_for_day(&self, day: DayKey) -> Result<Vec<DayOverride>, CoreError>;
    async fn find_overrides_for_template(&self, template_id: Uuid) -> Result<Vec<DayOverride>, CoreError>;
    async fn add_override(&self, key: GeneratedKey, action: OverrideAction) -> Result<DayOverride, CoreError>;
    /// Returns false if no override existed for `key`
    async fn delete_override(&self, key: &GeneratedKey) -> Result<bool, CoreError>;
}

/// Main repository trait that composes all domain traits
pub trait Repository: TemplateRepository + OccurrenceRepository + OverrideRepository + Send + Sync {}

/// SQLite implementation of the repository pattern
pub struct SqliteRepository {
    pool: DbPool,
}

impl SqliteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the database pool for internal use across modules
    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl Repository for SqliteRepository {}
