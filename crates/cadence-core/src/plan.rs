//! Declarative template-update plans.
//!
//! A plan is computed without touching the store and carries everything
//! needed to apply it and to undo it: after-images for updates, full rows for
//! creates, and before-images for every occurrence it touches.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::models::{
    DayKey, EditScope, GeneratedKey, Occurrence, OccurrenceSnapshot, OccurrenceStatus, WorkoutLink,
};

/// Switches that shape how a template edit propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanOptions {
    /// Overwrite actual title/start/end even where the user diverged them
    pub overwrite_actual: bool,
    /// Unlink occurrences on days the template no longer applies to
    pub detach_if_no_longer_matches: bool,
    /// Create the apply-day occurrence when it does not exist yet
    pub include_apply_day_create: bool,
    /// Create the apply-day occurrence even if the rule does not match that day
    pub force_apply_day_create: bool,
    /// Lift a skip/delete override on the apply day
    pub resurrect_overrides_on_apply_day: bool,
    /// Look-ahead window for `ThisAndFuture`, in days after the apply day
    pub days_ahead: u32,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            overwrite_actual: false,
            detach_if_no_longer_matches: true,
            include_apply_day_create: true,
            force_apply_day_create: false,
            resurrect_overrides_on_apply_day: false,
            days_ahead: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedUpdate {
    pub occurrence_id: Uuid,
    pub after: OccurrenceSnapshot,
}

/// A new template-derived occurrence the plan will insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedCreate {
    pub generated_key: GeneratedKey,
    pub day_key: DayKey,
    pub template_id: Uuid,
    pub title: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub workout: WorkoutLink,
    pub planned_title: String,
    pub planned_start_at: DateTime<Utc>,
    pub planned_end_at: DateTime<Utc>,
}

impl PlannedCreate {
    pub fn day(&self) -> NaiveDate {
        self.day_key.day()
    }

    /// The row this create inserts. New rows always start out planned.
    pub fn to_occurrence(&self) -> Occurrence {
        let now = Utc::now();
        Occurrence {
            id: Uuid::now_v7(),
            title: self.title.clone(),
            start_at: self.start_at,
            end_at: Some(self.end_at),
            planned_title: Some(self.planned_title.clone()),
            planned_start_at: Some(self.planned_start_at),
            planned_end_at: Some(self.planned_end_at),
            template_id: Some(self.template_id),
            day_key: Some(self.day_key),
            generated_key: Some(self.generated_key),
            status: OccurrenceStatus::Planned,
            workout: self.workout,
            workout_session_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// What a confirmation dialog shows before a plan is committed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanPreview {
    pub affected_count: usize,
    pub sample_start_dates: Vec<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatePlan {
    pub template_id: Uuid,
    pub scope: EditScope,
    pub apply_day: DayKey,
    /// Sorted by (after.start_at, occurrence_id)
    pub updates: Vec<PlannedUpdate>,
    pub creates: Vec<PlannedCreate>,
    pub override_keys_to_delete: Vec<GeneratedKey>,
    pub before_snapshots: BTreeMap<Uuid, OccurrenceSnapshot>,
    pub created_generated_keys: Vec<GeneratedKey>,
    pub preview: PlanPreview,
}

impl UpdatePlan {
    pub fn empty(template_id: Uuid, scope: EditScope, apply_day: NaiveDate) -> Self {
        Self {
            template_id,
            scope,
            apply_day: DayKey::new(apply_day),
            updates: Vec::new(),
            creates: Vec::new(),
            override_keys_to_delete: Vec::new(),
            before_snapshots: BTreeMap::new(),
            created_generated_keys: Vec::new(),
            preview: PlanPreview::default(),
        }
    }

    /// True when applying the plan would change nothing.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.creates.is_empty() && self.override_keys_to_delete.is_empty()
    }

    pub fn affected_count(&self) -> usize {
        self.updates.len() + self.creates.len()
    }

    /// Recomputes the preview from the current updates and creates.
    pub(crate) fn refresh_preview(&mut self, sample_size: usize) {
        let mut starts: Vec<DateTime<Utc>> = self
            .updates
            .iter()
            .map(|u| u.after.start_at)
            .chain(self.creates.iter().map(|c| c.start_at))
            .collect();
        starts.sort();
        starts.truncate(sample_size);
        self.preview = PlanPreview {
            affected_count: self.affected_count(),
            sample_start_dates: starts,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn create_at(template_id: Uuid, day: NaiveDate, hour: u32) -> PlannedCreate {
        let start = Utc.from_utc_datetime(&day.and_hms_opt(hour, 0, 0).unwrap());
        PlannedCreate {
            generated_key: GeneratedKey::new(template_id, day),
            day_key: DayKey::new(day),
            template_id,
            title: "New".to_string(),
            start_at: start,
            end_at: start + Duration::minutes(45),
            workout: WorkoutLink::Generic,
            planned_title: "New".to_string(),
            planned_start_at: start,
            planned_end_at: start + Duration::minutes(45),
        }
    }

    #[test]
    fn test_preview_counts_and_samples_earliest() {
        let template_id = Uuid::now_v7();
        let day = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let mut plan = UpdatePlan::empty(template_id, EditScope::ThisAndFuture, day);
        for offset in [3, 0, 2, 1] {
            plan.creates.push(create_at(template_id, day + Duration::days(offset), 8));
        }
        plan.refresh_preview(3);

        assert_eq!(plan.preview.affected_count, 4);
        assert_eq!(plan.preview.sample_start_dates.len(), 3);
        assert_eq!(plan.preview.sample_start_dates[0], plan.creates[1].start_at);
        assert!(plan.preview.sample_start_dates.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_create_row_is_planned_and_linked() {
        let template_id = Uuid::now_v7();
        let day = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let row = create_at(template_id, day, 8).to_occurrence();
        assert_eq!(row.status, OccurrenceStatus::Planned);
        assert_eq!(row.template_id, Some(template_id));
        assert_eq!(row.generated_key, Some(GeneratedKey::new(template_id, day)));
        assert_eq!(row.planned_start_at, Some(row.start_at));
    }

    #[test]
    fn test_empty_plan() {
        let plan = UpdatePlan::empty(Uuid::now_v7(), EditScope::AllInstances, NaiveDate::from_ymd_opt(2025, 1, 10).unwrap());
        assert!(plan.is_empty());
        assert_eq!(plan.affected_count(), 0);
    }
}
