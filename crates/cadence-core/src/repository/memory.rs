//! A repository that keeps everything in process memory.
//!
//! Used by tests and benchmarks. Mirrors the SQLite repository's semantics,
//! including the uniqueness of generated keys, and can be told to fail a
//! write to exercise rollback paths.

use crate::error::CoreError;
use crate::models::{
    DayKey, DayOverride, GeneratedKey, Occurrence, OccurrenceEdit, OccurrenceSnapshot, OverrideAction,
    Template, TemplateDraft,
};
use crate::repository::{OccurrenceRepository, OverrideRepository, Repository, TemplateRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
struct MemoryState {
    templates: BTreeMap<Uuid, Template>,
    occurrences: HashMap<Uuid, Occurrence>,
    overrides: BTreeMap<GeneratedKey, DayOverride>,
    /// Writes left before the injected failure
    fail_after: Option<usize>,
    /// Keep failing once the injected failure fired
    sticky: bool,
}

impl MemoryState {
    fn check_write(&mut self) -> Result<(), CoreError> {
        match self.fail_after {
            Some(0) => {
                if !self.sticky {
                    self.fail_after = None;
                }
                Err(CoreError::Persistence("injected write failure".to_string()))
            }
            Some(n) => {
                self.fail_after = Some(n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn sorted(mut rows: Vec<Occurrence>) -> Vec<Occurrence> {
        rows.sort_by(|a, b| (a.start_at, a.id).cmp(&(b.start_at, b.id)));
        rows
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: Mutex<MemoryState>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets the next `n` writes succeed and fails the one after, once.
    pub fn fail_writes_after(&self, n: usize) {
        self.inject_failure(n, false);
    }

    /// Lets the next `n` writes succeed and fails every write after that.
    pub fn fail_every_write_after(&self, n: usize) {
        self.inject_failure(n, true);
    }

    fn inject_failure(&self, n: usize, sticky: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_after = Some(n);
            state.sticky = sticky;
        }
    }

    /// Number of stored occurrences, linked or not.
    pub fn occurrence_count(&self) -> usize {
        self.state.lock().map(|s| s.occurrences.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, CoreError> {
        self.state
            .lock()
            .map_err(|_| CoreError::Persistence("in-memory store poisoned".to_string()))
    }
}

#[async_trait]
impl TemplateRepository for InMemoryRepository {
    async fn add_template(&self, draft: TemplateDraft) -> Result<Template, CoreError> {
        let template = Template::from_draft(draft)?;
        let mut state = self.lock()?;
        state.check_write()?;
        state.templates.insert(template.id, template.clone());
        Ok(template)
    }

    async fn find_template_by_id(&self, id: Uuid) -> Result<Option<Template>, CoreError> {
        Ok(self.lock()?.templates.get(&id).cloned())
    }

    async fn find_templates(&self) -> Result<Vec<Template>, CoreError> {
        Ok(self.lock()?.templates.values().cloned().collect())
    }

    async fn find_enabled_templates(&self) -> Result<Vec<Template>, CoreError> {
        Ok(self.lock()?.templates.values().filter(|t| t.enabled).cloned().collect())
    }

    async fn save_template(&self, id: Uuid, draft: TemplateDraft) -> Result<Template, CoreError> {
        draft.validate()?;
        let mut state = self.lock()?;
        if !state.templates.contains_key(&id) {
            return Err(CoreError::TemplateNotFound(id));
        }
        state.check_write()?;
        let template = state.templates.get_mut(&id).ok_or(CoreError::TemplateNotFound(id))?;
        template.title = draft.title;
        template.enabled = draft.enabled;
        template.start_offset_minutes = draft.start_offset_minutes;
        template.duration_minutes = draft.duration_minutes;
        template.recurrence = draft.recurrence;
        template.workout = draft.workout;
        template.updated_at = Utc::now();
        Ok(template.clone())
    }

    async fn set_template_enabled(&self, id: Uuid, enabled: bool) -> Result<Template, CoreError> {
        let mut state = self.lock()?;
        if !state.templates.contains_key(&id) {
            return Err(CoreError::TemplateNotFound(id));
        }
        state.check_write()?;
        let template = state.templates.get_mut(&id).ok_or(CoreError::TemplateNotFound(id))?;
        template.enabled = enabled;
        template.updated_at = Utc::now();
        Ok(template.clone())
    }
}

#[async_trait]
impl OccurrenceRepository for InMemoryRepository {
    async fn find_occurrence_by_id(&self, id: Uuid) -> Result<Option<Occurrence>, CoreError> {
        Ok(self.lock()?.occurrences.get(&id).cloned())
    }

    async fn find_occurrence_by_generated_key(&self, key: &GeneratedKey) -> Result<Option<Occurrence>, CoreError> {
        Ok(self
            .lock()?
            .occurrences
            .values()
            .find(|o| o.generated_key.as_ref() == Some(key))
            .cloned())
    }

    async fn find_occurrences_for_day(&self, day: DayKey) -> Result<Vec<Occurrence>, CoreError> {
        let rows = self
            .lock()?
            .occurrences
            .values()
            .filter(|o| o.day_key == Some(day))
            .cloned()
            .collect();
        Ok(MemoryState::sorted(rows))
    }

    async fn find_occurrences_by_template(&self, template_id: Uuid) -> Result<Vec<Occurrence>, CoreError> {
        let rows = self
            .lock()?
            .occurrences
            .values()
            .filter(|o| o.template_id == Some(template_id))
            .cloned()
            .collect();
        Ok(MemoryState::sorted(rows))
    }

    async fn find_occurrences_for_template_in_range(
        &self,
        template_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Occurrence>, CoreError> {
        let rows = self
            .lock()?
            .occurrences
            .values()
            .filter(|o| o.template_id == Some(template_id) && o.start_at >= start && o.start_at < end)
            .cloned()
            .collect();
        Ok(MemoryState::sorted(rows))
    }

    async fn insert_occurrences(&self, occurrences: &[Occurrence]) -> Result<(), CoreError> {
        if occurrences.is_empty() {
            return Ok(());
        }
        let mut state = self.lock()?;
        state.check_write()?;

        // All or nothing, like the SQLite transaction
        let mut claimed: Vec<GeneratedKey> = state
            .occurrences
            .values()
            .filter_map(|o| o.generated_key)
            .collect();
        for occ in occurrences {
            if state.occurrences.contains_key(&occ.id) {
                return Err(CoreError::Persistence(format!("Duplicate occurrence id {}", occ.id)));
            }
            if let Some(key) = occ.generated_key {
                if claimed.contains(&key) {
                    return Err(CoreError::Persistence(format!("Generated key already exists: {}", key)));
                }
                claimed.push(key);
            }
        }
        for occ in occurrences {
            state.occurrences.insert(occ.id, occ.clone());
        }
        Ok(())
    }

    async fn write_snapshot(&self, id: Uuid, snapshot: &OccurrenceSnapshot) -> Result<bool, CoreError> {
        let mut state = self.lock()?;
        state.check_write()?;
        if let Some(key) = snapshot.generated_key {
            let clash = state
                .occurrences
                .values()
                .any(|o| o.id != id && o.generated_key == Some(key));
            if clash {
                return Err(CoreError::Persistence(format!("Generated key already exists: {}", key)));
            }
        }
        match state.occurrences.get_mut(&id) {
            Some(occurrence) => {
                occurrence.restore(snapshot);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_occurrence_by_generated_key(&self, key: &GeneratedKey) -> Result<u64, CoreError> {
        let mut state = self.lock()?;
        state.check_write()?;
        let before = state.occurrences.len();
        state.occurrences.retain(|_, o| o.generated_key.as_ref() != Some(key));
        Ok((before - state.occurrences.len()) as u64)
    }

    async fn edit_occurrence(&self, id: Uuid, edit: OccurrenceEdit) -> Result<Occurrence, CoreError> {
        let mut state = self.lock()?;
        if !state.occurrences.contains_key(&id) {
            return Err(CoreError::MissingOccurrence(id));
        }
        state.check_write()?;
        let occurrence = state.occurrences.get_mut(&id).ok_or(CoreError::MissingOccurrence(id))?;
        edit.apply_to(occurrence);
        Ok(occurrence.clone())
    }

    async fn link_workout_session(&self, id: Uuid, session_id: Uuid) -> Result<Occurrence, CoreError> {
        let mut state = self.lock()?;
        if !state.occurrences.contains_key(&id) {
            return Err(CoreError::MissingOccurrence(id));
        }
        state.check_write()?;
        let occurrence = state.occurrences.get_mut(&id).ok_or(CoreError::MissingOccurrence(id))?;
        occurrence.workout_session_id = Some(session_id);
        occurrence.updated_at = Utc::now();
        Ok(occurrence.clone())
    }
}

#[async_trait]
impl OverrideRepository for InMemoryRepository {
    async fn find_override(&self, key: &GeneratedKey) -> Result<Option<DayOverride>, CoreError> {
        Ok(self.lock()?.overrides.get(key).cloned())
    }

    async fn find_overrides_for_day(&self, day: DayKey) -> Result<Vec<DayOverride>, CoreError> {
        Ok(self
            .lock()?
            .overrides
            .values()
            .filter(|o| o.key.day == day)
            .cloned()
            .collect())
    }

    async fn find_overrides_for_template(&self, template_id: Uuid) -> Result<Vec<DayOverride>, CoreError> {
        let mut rows: Vec<DayOverride> = self
            .lock()?
            .overrides
            .values()
            .filter(|o| o.key.template_id == template_id)
            .cloned()
            .collect();
        rows.sort_by_key(|o| o.key.day);
        Ok(rows)
    }

    async fn add_override(&self, key: GeneratedKey, action: OverrideAction) -> Result<DayOverride, CoreError> {
        let mut state = self.lock()?;
        state.check_write()?;
        let day_override = DayOverride::new(key, action);
        state.overrides.insert(key, day_override.clone());
        Ok(day_override)
    }

    async fn delete_override(&self, key: &GeneratedKey) -> Result<bool, CoreError> {
        let mut state = self.lock()?;
        state.check_write()?;
        Ok(state.overrides.remove(key).is_some())
    }
}

impl Repository for InMemoryRepository {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Calendar;
    use crate::models::WorkoutLink;
    use crate::recurrence::RecurrenceRule;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn draft() -> TemplateDraft {
        TemplateDraft {
            title: "Stretch".to_string(),
            enabled: true,
            start_offset_minutes: 6 * 60,
            duration_minutes: 15,
            recurrence: RecurrenceRule::daily(date(2025, 1, 1)),
            workout: WorkoutLink::Generic,
        }
    }

    #[tokio::test]
    async fn test_duplicate_generated_key_rejects_whole_batch() {
        let repo = InMemoryRepository::new();
        let cal = Calendar::utc();
        let template = repo.add_template(draft()).await.unwrap();
        let first = Occurrence::generated(&draft(), template.id, date(2025, 1, 10), &cal);
        repo.insert_occurrences(&[first]).await.unwrap();

        let other_day = Occurrence::generated(&draft(), template.id, date(2025, 1, 11), &cal);
        let clash = Occurrence::generated(&draft(), template.id, date(2025, 1, 10), &cal);
        let result = repo.insert_occurrences(&[other_day, clash]).await;

        assert!(matches!(result, Err(CoreError::Persistence(_))));
        assert_eq!(repo.occurrence_count(), 1);
    }

    #[tokio::test]
    async fn test_injected_failure_fires_once() {
        let repo = InMemoryRepository::new();
        repo.fail_writes_after(1);

        assert!(repo.add_template(draft()).await.is_ok());
        assert!(matches!(repo.add_template(draft()).await, Err(CoreError::Persistence(_))));
        assert!(repo.add_template(draft()).await.is_ok());
        assert_eq!(repo.find_templates().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_write_snapshot_reports_missing_rows() {
        let repo = InMemoryRepository::new();
        let cal = Calendar::utc();
        let occ = Occurrence::generated(&draft(), Uuid::now_v7(), date(2025, 1, 10), &cal);
        assert!(!repo.write_snapshot(occ.id, &occ.snapshot()).await.unwrap());
    }
}
