//! Turns a proposed template state into a declarative update plan.
//!
//! The planner only reads. Plans can be computed speculatively for previews
//! and thrown away; nothing changes until [`crate::applier::UpdateApplier`]
//! runs one.

use chrono::{Duration, NaiveDate};
use std::collections::HashSet;
use uuid::Uuid;

use crate::calendar::Calendar;
use crate::error::CoreError;
use crate::models::{
    DayKey, EditScope, GeneratedKey, Occurrence, OccurrenceSnapshot, OccurrenceStatus, PlanningConfig,
    TemplateDraft, WorkoutLink,
};
use crate::plan::{PlanOptions, PlannedCreate, PlannedUpdate, UpdatePlan};
use crate::repository::Repository;

/// Computes the after-image of a template-linked occurrence for `day`.
///
/// Planned fields always follow the draft. Each actual field follows only if
/// it still equals its old planned value, or if `overwrite_actual` is set.
/// A missing planned value counts as equal.
pub fn merge_snapshot(
    occurrence: &Occurrence,
    template_id: Uuid,
    draft: &TemplateDraft,
    day: NaiveDate,
    calendar: &Calendar,
    overwrite_actual: bool,
) -> OccurrenceSnapshot {
    let (start, end) = draft.planned_times(day, calendar);
    let mut after = occurrence.snapshot();

    let title_tracks = occurrence
        .planned_title
        .as_ref()
        .map_or(true, |planned| planned == &occurrence.title);
    let start_tracks = occurrence
        .planned_start_at
        .map_or(true, |planned| planned == occurrence.start_at);
    let end_tracks = occurrence.planned_end_at.is_none() || occurrence.planned_end_at == occurrence.end_at;

    if overwrite_actual || title_tracks {
        after.title = draft.title.clone();
    }
    if overwrite_actual || start_tracks {
        after.start_at = start;
    }
    if overwrite_actual || end_tracks {
        after.end_at = Some(end);
    }

    after.planned_title = Some(draft.title.clone());
    after.planned_start_at = Some(start);
    after.planned_end_at = Some(end);
    after.template_id = Some(template_id);

    after.workout = if workout_sync_is_safe(occurrence, overwrite_actual) {
        draft.workout
    } else {
        occurrence.workout
    };

    after
}

/// A started workout session pins the link no matter what.
fn workout_sync_is_safe(occurrence: &Occurrence, overwrite_actual: bool) -> bool {
    occurrence.workout_session_id.is_none()
        && (overwrite_actual || occurrence.status == OccurrenceStatus::Planned)
}

/// After-image of an occurrence whose template no longer applies to its day.
///
/// The row keeps its actual fields and its day but loses every link back to
/// the template.
pub fn detach_snapshot(occurrence: &Occurrence) -> OccurrenceSnapshot {
    let mut after = occurrence.snapshot();
    after.template_id = None;
    after.generated_key = None;
    after.planned_title = None;
    after.planned_start_at = None;
    after.planned_end_at = None;
    if occurrence.status == OccurrenceStatus::Planned && occurrence.workout_session_id.is_none() {
        after.workout = WorkoutLink::Generic;
    }
    after
}

fn has_legacy_planned_fields(occurrence: &Occurrence) -> bool {
    occurrence.planned_title.is_none() || occurrence.planned_start_at.is_none()
}

pub struct UpdatePlanner<'a, R: Repository + ?Sized> {
    repo: &'a R,
    calendar: Calendar,
    config: PlanningConfig,
}

impl<'a, R: Repository + ?Sized> UpdatePlanner<'a, R> {
    pub fn new(repo: &'a R, calendar: Calendar) -> Self {
        Self::with_config(repo, calendar, PlanningConfig::default())
    }

    pub fn with_config(repo: &'a R, calendar: Calendar, config: PlanningConfig) -> Self {
        Self { repo, calendar, config }
    }

    /// Plans how `draft` propagates to the template's occurrences.
    ///
    /// A template that no longer exists yields an empty plan.
    pub async fn make_plan(
        &self,
        template_id: Uuid,
        draft: &TemplateDraft,
        scope: EditScope,
        apply_day: NaiveDate,
        options: PlanOptions,
    ) -> Result<UpdatePlan, CoreError> {
        let mut plan = UpdatePlan::empty(template_id, scope, apply_day);

        if self.repo.find_template_by_id(template_id).await?.is_none() {
            tracing::debug!(%template_id, "Template is gone, nothing to plan");
            return Ok(plan);
        }

        let apply_key = GeneratedKey::new(template_id, apply_day);
        let (candidates, mut overridden) = self
            .collect_scope(template_id, scope, apply_day, options.days_ahead)
            .await?;

        // The apply-day override is looked up directly so resurrection works
        // in every scope
        if self.repo.find_override(&apply_key).await?.is_some() {
            if options.resurrect_overrides_on_apply_day {
                tracing::debug!(key = %apply_key, "Resurrecting apply-day occurrence");
                plan.override_keys_to_delete.push(apply_key);
                overridden.remove(&apply_key);
            } else {
                overridden.insert(apply_key);
            }
        }

        // Keys that are taken once the plan is applied
        let mut claimed: HashSet<GeneratedKey> = candidates.iter().filter_map(|o| o.generated_key).collect();

        let apply_occurrence = if overridden.contains(&apply_key) {
            None
        } else {
            self.repo.find_occurrence_by_generated_key(&apply_key).await?
        };

        match &apply_occurrence {
            Some(occurrence) => {
                claimed.insert(apply_key);
                let after = merge_snapshot(
                    occurrence,
                    template_id,
                    draft,
                    apply_day,
                    &self.calendar,
                    options.overwrite_actual,
                );
                self.push_update(&mut plan, occurrence, after);
            }
            None if !overridden.contains(&apply_key)
                && options.include_apply_day_create
                && (options.force_apply_day_create || draft.applies_on(apply_day, &self.calendar)) =>
            {
                claimed.insert(apply_key);
                plan.creates.push(self.planned_create(template_id, draft, apply_day));
            }
            None => {}
        }

        let apply_id = apply_occurrence.as_ref().map(|o| o.id);
        for occurrence in &candidates {
            if Some(occurrence.id) == apply_id || occurrence.generated_key == Some(apply_key) {
                continue;
            }

            let day = occurrence.day(&self.calendar);
            let key = GeneratedKey::new(template_id, day);
            if overridden.contains(&key) {
                tracing::debug!(key = %key, "Override holds occurrence back");
                continue;
            }

            let after = if draft.applies_on(day, &self.calendar) {
                let mut after = merge_snapshot(
                    occurrence,
                    template_id,
                    draft,
                    day,
                    &self.calendar,
                    options.overwrite_actual,
                );
                if occurrence.generated_key.is_none() && !claimed.contains(&key) {
                    // Rows outside the window can hold the key too
                    let holder = self.repo.find_occurrence_by_generated_key(&key).await?;
                    if holder.map_or(true, |other| other.id == occurrence.id) {
                        after.generated_key = Some(key);
                        after.day_key = Some(DayKey::new(day));
                        claimed.insert(key);
                    } else {
                        tracing::debug!(key = %key, occurrence_id = %occurrence.id, "Key already held, not back-filling");
                    }
                }
                after
            } else if options.detach_if_no_longer_matches {
                tracing::debug!(occurrence_id = %occurrence.id, %day, "Detaching occurrence");
                detach_snapshot(occurrence)
            } else {
                continue;
            };

            self.push_update(&mut plan, occurrence, after);
        }

        plan.updates
            .sort_by(|a, b| (a.after.start_at, a.occurrence_id).cmp(&(b.after.start_at, b.occurrence_id)));
        plan.creates.sort_by(|a, b| a.start_at.cmp(&b.start_at));
        plan.created_generated_keys = plan.creates.iter().map(|c| c.generated_key).collect();
        plan.refresh_preview(self.config.preview_sample_size);

        tracing::debug!(
            %template_id,
            %scope,
            updates = plan.updates.len(),
            creates = plan.creates.len(),
            "Computed update plan"
        );
        Ok(plan)
    }

    /// Linked occurrences and overridden keys within the scope's window.
    async fn collect_scope(
        &self,
        template_id: Uuid,
        scope: EditScope,
        apply_day: NaiveDate,
        days_ahead: u32,
    ) -> Result<(Vec<Occurrence>, HashSet<GeneratedKey>), CoreError> {
        match scope {
            EditScope::ThisInstance => Ok((Vec::new(), HashSet::new())),
            EditScope::ThisAndFuture => {
                let last_day = apply_day + Duration::days(days_ahead as i64);
                let start = self.calendar.day_start(apply_day);
                let end = self.calendar.day_start(last_day + Duration::days(1));
                let candidates = self
                    .repo
                    .find_occurrences_for_template_in_range(template_id, start, end)
                    .await?;
                let overridden = self
                    .repo
                    .find_overrides_for_template(template_id)
                    .await?
                    .into_iter()
                    .filter(|o| (apply_day..=last_day).contains(&o.key.day.day()))
                    .map(|o| o.key)
                    .collect();
                Ok((candidates, overridden))
            }
            EditScope::AllInstances => {
                let candidates = self.repo.find_occurrences_by_template(template_id).await?;
                let overridden = self
                    .repo
                    .find_overrides_for_template(template_id)
                    .await?
                    .into_iter()
                    .map(|o| o.key)
                    .collect();
                Ok((candidates, overridden))
            }
        }
    }

    fn push_update(&self, plan: &mut UpdatePlan, occurrence: &Occurrence, after: OccurrenceSnapshot) {
        let before = occurrence.snapshot();
        if after == before {
            return;
        }
        if occurrence.template_id.is_some() && has_legacy_planned_fields(occurrence) && after.template_id.is_some() {
            tracing::warn!(
                occurrence_id = %occurrence.id,
                "Occurrence has no planned values; its actual fields are overwritten on first template update"
            );
        }
        plan.before_snapshots.insert(occurrence.id, before);
        plan.updates.push(PlannedUpdate { occurrence_id: occurrence.id, after });
    }

    fn planned_create(&self, template_id: Uuid, draft: &TemplateDraft, day: NaiveDate) -> PlannedCreate {
        let (start, end) = draft.planned_times(day, &self.calendar);
        PlannedCreate {
            generated_key: GeneratedKey::new(template_id, day),
            day_key: DayKey::new(day),
            template_id,
            title: draft.title.clone(),
            start_at: start,
            end_at: end,
            workout: draft.workout,
            planned_title: draft.title.clone(),
            planned_start_at: start,
            planned_end_at: end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applier::UpdateApplier;
    use crate::materializer::Materializer;
    use crate::models::{OccurrenceEdit, OverrideAction, Template};
    use crate::recurrence::{RecurrenceRule, WeekdaySet};
    use crate::repository::{InMemoryRepository, OccurrenceRepository, OverrideRepository, TemplateRepository};
    use chrono::{DateTime, TimeZone, Utc, Weekday};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, d, h, m, 0).unwrap()
    }

    fn morning() -> TemplateDraft {
        TemplateDraft {
            title: "Morning".to_string(),
            enabled: true,
            start_offset_minutes: 7 * 60,
            duration_minutes: 30,
            recurrence: RecurrenceRule::daily(date(2025, 1, 1)),
            workout: WorkoutLink::Generic,
        }
    }

    fn edited() -> TemplateDraft {
        TemplateDraft {
            title: "New".to_string(),
            start_offset_minutes: 8 * 60,
            duration_minutes: 45,
            ..morning()
        }
    }

    fn future_options() -> PlanOptions {
        PlanOptions { days_ahead: 10, ..PlanOptions::default() }
    }

    /// T materialized for Jan 10 to Jan 12
    async fn seeded(days: &[u32]) -> (InMemoryRepository, Template) {
        let repo = InMemoryRepository::new();
        let template = repo.add_template(morning()).await.unwrap();
        let materializer = Materializer::new(&repo, Calendar::utc());
        for d in days {
            materializer.ensure_day_is_preloaded(date(2025, 1, *d)).await.unwrap();
        }
        (repo, template)
    }

    async fn occurrence_on(repo: &InMemoryRepository, template: &Template, d: u32) -> Occurrence {
        repo.find_occurrence_by_generated_key(&template.key_for(date(2025, 1, d)))
            .await
            .unwrap()
            .unwrap()
    }

    mod merge_tests {
        use super::*;

        #[test]
        fn test_untouched_fields_follow_template() {
            let cal = Calendar::utc();
            let id = Uuid::now_v7();
            let occ = Occurrence::generated(&morning(), id, date(2025, 1, 10), &cal);

            let after = merge_snapshot(&occ, id, &edited(), date(2025, 1, 10), &cal, false);
            assert_eq!(after.title, "New");
            assert_eq!(after.start_at, at(10, 8, 0));
            assert_eq!(after.end_at, Some(at(10, 8, 45)));
            assert_eq!(after.planned_title.as_deref(), Some("New"));
            assert_eq!(after.planned_start_at, Some(at(10, 8, 0)));
        }

        #[test]
        fn test_diverged_fields_are_preserved() {
            let cal = Calendar::utc();
            let id = Uuid::now_v7();
            let mut occ = Occurrence::generated(&morning(), id, date(2025, 1, 10), &cal);
            OccurrenceEdit {
                title: Some("My run".to_string()),
                start_at: Some(at(10, 6, 15)),
                ..Default::default()
            }
            .apply_to(&mut occ);

            let after = merge_snapshot(&occ, id, &edited(), date(2025, 1, 10), &cal, false);
            assert_eq!(after.title, "My run");
            assert_eq!(after.start_at, at(10, 6, 15));
            // End was never touched, so it still follows
            assert_eq!(after.end_at, Some(at(10, 8, 45)));
            assert_eq!(after.planned_title.as_deref(), Some("New"));
            assert_eq!(after.planned_start_at, Some(at(10, 8, 0)));
        }

        #[test]
        fn test_overwrite_forces_actual_values() {
            let cal = Calendar::utc();
            let id = Uuid::now_v7();
            let mut occ = Occurrence::generated(&morning(), id, date(2025, 1, 10), &cal);
            occ.title = "My run".to_string();
            occ.end_at = None;

            let after = merge_snapshot(&occ, id, &edited(), date(2025, 1, 10), &cal, true);
            assert_eq!(after.title, "New");
            assert_eq!(after.end_at, Some(at(10, 8, 45)));
        }

        #[test]
        fn test_legacy_rows_update_on_first_touch() {
            let cal = Calendar::utc();
            let id = Uuid::now_v7();
            let mut occ = Occurrence::generated(&morning(), id, date(2025, 1, 10), &cal);
            occ.title = "Renamed long ago".to_string();
            occ.planned_title = None;
            occ.planned_start_at = None;
            occ.planned_end_at = None;
            occ.end_at = None;

            let after = merge_snapshot(&occ, id, &edited(), date(2025, 1, 10), &cal, false);
            assert_eq!(after.title, "New");
            assert_eq!(after.start_at, at(10, 8, 0));
            assert_eq!(after.end_at, Some(at(10, 8, 45)));
        }

        #[test]
        fn test_session_pins_workout_even_with_overwrite() {
            let cal = Calendar::utc();
            let id = Uuid::now_v7();
            let routine = Uuid::now_v7();
            let mut occ = Occurrence::generated(&morning(), id, date(2025, 1, 10), &cal);
            occ.workout_session_id = Some(Uuid::now_v7());

            let mut draft = edited();
            draft.workout = WorkoutLink::workout(routine);
            let after = merge_snapshot(&occ, id, &draft, date(2025, 1, 10), &cal, true);
            assert_eq!(after.workout, WorkoutLink::Generic);
        }

        #[test]
        fn test_finished_occurrences_keep_workout_unless_overwriting() {
            let cal = Calendar::utc();
            let id = Uuid::now_v7();
            let routine = Uuid::now_v7();
            let mut occ = Occurrence::generated(&morning(), id, date(2025, 1, 10), &cal);
            occ.status = OccurrenceStatus::Done;

            let mut draft = edited();
            draft.workout = WorkoutLink::workout(routine);
            assert_eq!(merge_snapshot(&occ, id, &draft, date(2025, 1, 10), &cal, false).workout, WorkoutLink::Generic);
            assert_eq!(
                merge_snapshot(&occ, id, &draft, date(2025, 1, 10), &cal, true).workout,
                WorkoutLink::workout(routine)
            );
        }

        #[test]
        fn test_detach_keeps_actuals_and_day() {
            let cal = Calendar::utc();
            let mut draft = morning();
            draft.workout = WorkoutLink::workout(Uuid::now_v7());
            let occ = Occurrence::generated(&draft, Uuid::now_v7(), date(2025, 1, 10), &cal);

            let after = detach_snapshot(&occ);
            assert_eq!(after.template_id, None);
            assert_eq!(after.generated_key, None);
            assert_eq!(after.planned_title, None);
            assert_eq!(after.planned_start_at, None);
            assert_eq!(after.planned_end_at, None);
            assert_eq!(after.day_key, occ.day_key);
            assert_eq!(after.title, occ.title);
            assert_eq!(after.start_at, occ.start_at);
            assert_eq!(after.workout, WorkoutLink::Generic);
        }

        #[test]
        fn test_detach_leaves_running_workouts_alone() {
            let cal = Calendar::utc();
            let mut draft = morning();
            draft.workout = WorkoutLink::workout(Uuid::now_v7());
            let mut occ = Occurrence::generated(&draft, Uuid::now_v7(), date(2025, 1, 10), &cal);
            occ.workout_session_id = Some(Uuid::now_v7());

            assert_eq!(detach_snapshot(&occ).workout, draft.workout);
        }
    }

    mod plan_tests {
        use super::*;

        #[tokio::test]
        async fn test_this_and_future_updates_each_materialized_day() {
            let (repo, template) = seeded(&[10, 11, 12]).await;
            let renamed = occurrence_on(&repo, &template, 11).await;
            repo.edit_occurrence(renamed.id, OccurrenceEdit { title: Some("Slow jog".to_string()), ..Default::default() })
                .await
                .unwrap();

            let planner = UpdatePlanner::new(&repo, Calendar::utc());
            let plan = planner
                .make_plan(template.id, &edited(), EditScope::ThisAndFuture, date(2025, 1, 10), future_options())
                .await
                .unwrap();

            assert_eq!(plan.updates.len(), 3);
            assert!(plan.creates.is_empty());
            let starts: Vec<_> = plan.updates.iter().map(|u| u.after.planned_start_at).collect();
            assert_eq!(starts, vec![Some(at(10, 8, 0)), Some(at(11, 8, 0)), Some(at(12, 8, 0))]);
            assert!(plan.updates.iter().all(|u| u.after.planned_title.as_deref() == Some("New")));

            let titles: Vec<_> = plan.updates.iter().map(|u| u.after.title.as_str()).collect();
            assert_eq!(titles, vec!["New", "Slow jog", "New"]);
            assert_eq!(plan.before_snapshots.len(), 3);
            assert_eq!(plan.preview.affected_count, 3);
            assert_eq!(plan.preview.sample_start_dates, vec![at(10, 8, 0), at(11, 8, 0), at(12, 8, 0)]);
        }

        #[tokio::test]
        async fn test_missing_apply_day_becomes_create() {
            let (repo, template) = seeded(&[12]).await;

            let planner = UpdatePlanner::new(&repo, Calendar::utc());
            let plan = planner
                .make_plan(template.id, &edited(), EditScope::ThisAndFuture, date(2025, 1, 10), future_options())
                .await
                .unwrap();

            assert_eq!(plan.creates.len(), 1);
            assert_eq!(plan.creates[0].day(), date(2025, 1, 10));
            assert_eq!(plan.creates[0].start_at, at(10, 8, 0));
            assert_eq!(plan.created_generated_keys, vec![template.key_for(date(2025, 1, 10))]);
            // Jan 11 was never materialized and is not created here
            assert_eq!(plan.updates.len(), 1);
            assert_eq!(plan.updates[0].after.planned_start_at, Some(at(12, 8, 0)));
            assert_eq!(plan.affected_count(), 2);
        }

        #[tokio::test]
        async fn test_apply_day_create_respects_rule_unless_forced() {
            let repo = InMemoryRepository::new();
            let mut draft = morning();
            draft.recurrence = RecurrenceRule::weekly(date(2025, 1, 6), WeekdaySet::single(Weekday::Mon));
            let template = repo.add_template(draft.clone()).await.unwrap();
            let planner = UpdatePlanner::new(&repo, Calendar::utc());

            // 2025-01-10 is a Friday
            let plan = planner
                .make_plan(template.id, &draft, EditScope::ThisInstance, date(2025, 1, 10), PlanOptions::default())
                .await
                .unwrap();
            assert!(plan.is_empty());

            let forced = PlanOptions { force_apply_day_create: true, ..PlanOptions::default() };
            let plan = planner
                .make_plan(template.id, &draft, EditScope::ThisInstance, date(2025, 1, 10), forced)
                .await
                .unwrap();
            assert_eq!(plan.creates.len(), 1);

            let no_create = PlanOptions { include_apply_day_create: false, force_apply_day_create: true, ..PlanOptions::default() };
            let plan = planner
                .make_plan(template.id, &draft, EditScope::ThisInstance, date(2025, 1, 10), no_create)
                .await
                .unwrap();
            assert!(plan.is_empty());
        }

        #[tokio::test]
        async fn test_this_instance_touches_only_apply_day() {
            let (repo, template) = seeded(&[10, 11, 12]).await;
            let planner = UpdatePlanner::new(&repo, Calendar::utc());
            let plan = planner
                .make_plan(template.id, &edited(), EditScope::ThisInstance, date(2025, 1, 11), PlanOptions::default())
                .await
                .unwrap();

            assert_eq!(plan.updates.len(), 1);
            let target = occurrence_on(&repo, &template, 11).await;
            assert_eq!(plan.updates[0].occurrence_id, target.id);
        }

        #[tokio::test]
        async fn test_future_window_excludes_earlier_and_later_days() {
            let (repo, template) = seeded(&[9, 10, 11, 12, 13]).await;
            let planner = UpdatePlanner::new(&repo, Calendar::utc());
            let options = PlanOptions { days_ahead: 1, ..PlanOptions::default() };
            let plan = planner
                .make_plan(template.id, &edited(), EditScope::ThisAndFuture, date(2025, 1, 10), options)
                .await
                .unwrap();

            let days: Vec<_> = plan.updates.iter().map(|u| u.after.day_key.unwrap().day()).collect();
            assert_eq!(days, vec![date(2025, 1, 10), date(2025, 1, 11)]);
        }

        #[tokio::test]
        async fn test_all_instances_reaches_every_linked_row() {
            let (repo, template) = seeded(&[1, 10, 31]).await;
            let planner = UpdatePlanner::new(&repo, Calendar::utc());
            let plan = planner
                .make_plan(template.id, &edited(), EditScope::AllInstances, date(2025, 1, 10), PlanOptions::default())
                .await
                .unwrap();
            assert_eq!(plan.updates.len(), 3);
            assert!(plan.creates.is_empty());
        }

        #[tokio::test]
        async fn test_missing_template_yields_empty_plan() {
            let repo = InMemoryRepository::new();
            let planner = UpdatePlanner::new(&repo, Calendar::utc());
            let plan = planner
                .make_plan(Uuid::now_v7(), &edited(), EditScope::AllInstances, date(2025, 1, 10), PlanOptions::default())
                .await
                .unwrap();
            assert!(plan.is_empty());
            assert_eq!(plan.preview.affected_count, 0);
        }

        #[tokio::test]
        async fn test_unchanged_draft_yields_empty_plan() {
            let (repo, template) = seeded(&[10, 11]).await;
            let planner = UpdatePlanner::new(&repo, Calendar::utc());
            let plan = planner
                .make_plan(template.id, &morning(), EditScope::ThisAndFuture, date(2025, 1, 10), future_options())
                .await
                .unwrap();
            assert!(plan.is_empty());
        }

        #[tokio::test]
        async fn test_overrides_hold_days_back() {
            let (repo, template) = seeded(&[10, 11, 12]).await;
            repo.add_override(template.key_for(date(2025, 1, 11)), OverrideAction::Skipped)
                .await
                .unwrap();
            repo.add_override(template.key_for(date(2025, 1, 13)), OverrideAction::Deleted)
                .await
                .unwrap();

            let planner = UpdatePlanner::new(&repo, Calendar::utc());
            let plan = planner
                .make_plan(template.id, &edited(), EditScope::ThisAndFuture, date(2025, 1, 10), future_options())
                .await
                .unwrap();
            let skipped = occurrence_on(&repo, &template, 11).await;
            assert_eq!(plan.updates.len(), 2);
            assert!(plan.updates.iter().all(|u| u.occurrence_id != skipped.id));

            // An overridden apply day is neither updated nor created
            let plan = planner
                .make_plan(template.id, &edited(), EditScope::ThisInstance, date(2025, 1, 13), PlanOptions::default())
                .await
                .unwrap();
            assert!(plan.is_empty());
        }

        #[tokio::test]
        async fn test_resurrection_lifts_apply_day_override_only() {
            let (repo, template) = seeded(&[]).await;
            for d in [10, 11] {
                repo.add_override(template.key_for(date(2025, 1, d)), OverrideAction::Deleted)
                    .await
                    .unwrap();
            }

            let planner = UpdatePlanner::new(&repo, Calendar::utc());
            let options = PlanOptions { resurrect_overrides_on_apply_day: true, ..future_options() };
            let plan = planner
                .make_plan(template.id, &edited(), EditScope::ThisAndFuture, date(2025, 1, 10), options)
                .await
                .unwrap();

            assert_eq!(plan.override_keys_to_delete, vec![template.key_for(date(2025, 1, 10))]);
            assert_eq!(plan.creates.len(), 1);
            assert_eq!(plan.creates[0].day(), date(2025, 1, 10));
        }

        #[tokio::test]
        async fn test_disabling_detaches_linked_rows() {
            let (repo, template) = seeded(&[10, 11]).await;
            let mut disabled = morning();
            disabled.enabled = false;

            let planner = UpdatePlanner::new(&repo, Calendar::utc());
            let plan = planner
                .make_plan(template.id, &disabled, EditScope::ThisAndFuture, date(2025, 1, 9), future_options())
                .await
                .unwrap();

            assert_eq!(plan.updates.len(), 2);
            for update in &plan.updates {
                assert_eq!(update.after.template_id, None);
                assert_eq!(update.after.planned_title, None);
                assert_eq!(update.after.title, "Morning");
            }

            let keep_linked = PlanOptions { detach_if_no_longer_matches: false, ..future_options() };
            let plan = planner
                .make_plan(template.id, &disabled, EditScope::ThisAndFuture, date(2025, 1, 9), keep_linked)
                .await
                .unwrap();
            assert!(plan.is_empty());
        }

        #[tokio::test]
        async fn test_recurrence_change_detaches_days_that_stop_matching() {
            let (repo, template) = seeded(&[6, 7]).await;
            let mut mondays = edited();
            mondays.recurrence = RecurrenceRule::weekly(date(2025, 1, 1), WeekdaySet::single(Weekday::Mon));

            let planner = UpdatePlanner::new(&repo, Calendar::utc());
            let plan = planner
                .make_plan(template.id, &mondays, EditScope::AllInstances, date(2025, 1, 6), PlanOptions::default())
                .await
                .unwrap();

            let monday = occurrence_on(&repo, &template, 6).await;
            let tuesday = occurrence_on(&repo, &template, 7).await;
            let by_id = |id: Uuid| plan.updates.iter().find(|u| u.occurrence_id == id).unwrap();
            assert_eq!(by_id(monday.id).after.template_id, Some(template.id));
            assert_eq!(by_id(tuesday.id).after.template_id, None);
        }

        #[tokio::test]
        async fn test_legacy_rows_get_keys_backfilled() {
            let repo = InMemoryRepository::new();
            let template = repo.add_template(morning()).await.unwrap();
            let cal = Calendar::utc();
            let mut legacy = Occurrence::generated(&morning(), template.id, date(2025, 1, 11), &cal);
            legacy.generated_key = None;
            legacy.day_key = None;
            legacy.planned_title = None;
            legacy.planned_start_at = None;
            legacy.planned_end_at = None;
            repo.insert_occurrences(&[legacy.clone()]).await.unwrap();

            let planner = UpdatePlanner::new(&repo, cal);
            let plan = planner
                .make_plan(template.id, &edited(), EditScope::AllInstances, date(2025, 1, 10), PlanOptions {
                    include_apply_day_create: false,
                    ..PlanOptions::default()
                })
                .await
                .unwrap();

            assert_eq!(plan.updates.len(), 1);
            let after = &plan.updates[0].after;
            assert_eq!(after.generated_key, Some(template.key_for(date(2025, 1, 11))));
            assert_eq!(after.day_key, Some(DayKey::new(date(2025, 1, 11))));
            assert_eq!(after.title, "New");
        }

        #[tokio::test]
        async fn test_backfill_skips_key_held_outside_window() {
            let (repo, template) = seeded(&[11]).await;
            let cal = Calendar::utc();
            // The keyed Jan 11 row was moved past the look-ahead window
            let keyed = occurrence_on(&repo, &template, 11).await;
            repo.edit_occurrence(keyed.id, OccurrenceEdit { start_at: Some(at(25, 7, 0)), ..Default::default() })
                .await
                .unwrap();

            let mut legacy = Occurrence::generated(&morning(), template.id, date(2025, 1, 11), &cal);
            legacy.generated_key = None;
            legacy.day_key = None;
            legacy.planned_title = None;
            legacy.planned_start_at = None;
            legacy.planned_end_at = None;
            repo.insert_occurrences(&[legacy.clone()]).await.unwrap();

            let planner = UpdatePlanner::new(&repo, cal);
            let plan = planner
                .make_plan(template.id, &edited(), EditScope::ThisAndFuture, date(2025, 1, 10), PlanOptions {
                    include_apply_day_create: false,
                    ..future_options()
                })
                .await
                .unwrap();

            let update = plan.updates.iter().find(|u| u.occurrence_id == legacy.id).unwrap();
            assert_eq!(update.after.generated_key, None);
            assert_eq!(update.after.title, "New");

            UpdateApplier::new(&repo).apply(&plan).await.unwrap();
            let held = repo.find_occurrence_by_generated_key(&template.key_for(date(2025, 1, 11))).await.unwrap();
            assert_eq!(held.map(|o| o.id), Some(keyed.id));
        }

        #[tokio::test]
        async fn test_updates_sorted_by_start_then_id() {
            let (repo, template) = seeded(&[10, 11, 12]).await;
            let last = occurrence_on(&repo, &template, 12).await;
            // Move Jan 12 earlier than everything else; diverged start is kept
            repo.edit_occurrence(last.id, OccurrenceEdit { start_at: Some(at(9, 5, 0)), ..Default::default() })
                .await
                .unwrap();

            let planner = UpdatePlanner::new(&repo, Calendar::utc());
            let plan = planner
                .make_plan(template.id, &edited(), EditScope::AllInstances, date(2025, 1, 10), PlanOptions::default())
                .await
                .unwrap();

            assert_eq!(plan.updates[0].occurrence_id, last.id);
            assert!(plan
                .updates
                .windows(2)
                .all(|w| (w[0].after.start_at, w[0].occurrence_id) <= (w[1].after.start_at, w[1].occurrence_id)));
        }

        #[tokio::test]
        async fn test_planning_never_writes() {
            let (repo, template) = seeded(&[10]).await;
            let before = repo.find_occurrences_by_template(template.id).await.unwrap();

            let planner = UpdatePlanner::new(&repo, Calendar::utc());
            planner
                .make_plan(template.id, &edited(), EditScope::AllInstances, date(2025, 1, 11), PlanOptions::default())
                .await
                .unwrap();

            assert_eq!(repo.find_occurrences_by_template(template.id).await.unwrap(), before);
        }
    }
}
