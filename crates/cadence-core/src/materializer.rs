//! Just-in-time creation of template occurrences for a day.

use chrono::{Duration, NaiveDate};
use std::collections::HashSet;

use crate::calendar::Calendar;
use crate::error::CoreError;
use crate::models::{DayKey, GeneratedKey, Occurrence};
use crate::repository::Repository;

/// What a preload pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializationSummary {
    pub created: usize,
    /// Matching templates whose occurrence already existed
    pub already_present: usize,
    /// Matching templates held back by a day override
    pub suppressed: usize,
}

impl MaterializationSummary {
    fn absorb(&mut self, other: MaterializationSummary) {
        self.created += other.created;
        self.already_present += other.already_present;
        self.suppressed += other.suppressed;
    }
}

/// Creates the occurrences enabled templates owe a day.
pub struct Materializer<'a, R: Repository + ?Sized> {
    repo: &'a R,
    calendar: Calendar,
}

impl<'a, R: Repository + ?Sized> Materializer<'a, R> {
    pub fn new(repo: &'a R, calendar: Calendar) -> Self {
        Self { repo, calendar }
    }

    /// Ensures every enabled template matching `day` without an override
    /// has exactly one occurrence keyed `{template_id}|{day}`.
    ///
    /// Safe to call repeatedly: keys that already exist are skipped, and all
    /// new rows are written in one batch.
    pub async fn ensure_day_is_preloaded(&self, day: NaiveDate) -> Result<MaterializationSummary, CoreError> {
        let day_key = DayKey::new(day);
        let templates = self.repo.find_enabled_templates().await?;
        let overridden: HashSet<GeneratedKey> = self
            .repo
            .find_overrides_for_day(day_key)
            .await?
            .into_iter()
            .map(|o| o.key)
            .collect();
        let existing: HashSet<GeneratedKey> = self
            .repo
            .find_occurrences_for_day(day_key)
            .await?
            .into_iter()
            .filter_map(|o| o.generated_key)
            .collect();

        let mut summary = MaterializationSummary::default();
        let mut batch = Vec::new();

        for template in templates.iter().filter(|t| t.recurrence.matches(day, &self.calendar)) {
            let key = template.key_for(day);
            if overridden.contains(&key) {
                tracing::debug!(key = %key, "Day override suppresses occurrence");
                summary.suppressed += 1;
                continue;
            }
            if existing.contains(&key) {
                summary.already_present += 1;
                continue;
            }
            batch.push(Occurrence::generated(&template.draft(), template.id, day, &self.calendar));
        }

        if !batch.is_empty() {
            self.repo.insert_occurrences(&batch).await?;
            summary.created = batch.len();
            tracing::info!(day = %day_key, created = summary.created, "Materialized occurrences");
        }

        Ok(summary)
    }

    /// Preloads every day in `[from, to]`.
    pub async fn ensure_range_is_preloaded(&self, from: NaiveDate, to: NaiveDate) -> Result<MaterializationSummary, CoreError> {
        let mut total = MaterializationSummary::default();
        let mut day = from;
        while day <= to {
            total.absorb(self.ensure_day_is_preloaded(day).await?);
            day += Duration::days(1);
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OverrideAction, TemplateDraft, WorkoutLink};
    use crate::recurrence::{RecurrenceRule, WeekdaySet};
    use crate::repository::{InMemoryRepository, OccurrenceRepository, OverrideRepository, TemplateRepository};
    use chrono::{TimeZone, Utc, Weekday};
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
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

    mod preload_tests {
        use super::*;

        #[tokio::test]
        async fn test_creates_one_occurrence_per_matching_template() {
            let repo = InMemoryRepository::new();
            let daily = repo.add_template(morning()).await.unwrap();
            let mut weekly = morning();
            weekly.title = "Gym".to_string();
            weekly.recurrence = RecurrenceRule::weekly(date(2025, 1, 1), WeekdaySet::single(Weekday::Mon));
            repo.add_template(weekly).await.unwrap();

            let materializer = Materializer::new(&repo, Calendar::utc());
            // 2025-01-10 is a Friday
            let summary = materializer.ensure_day_is_preloaded(date(2025, 1, 10)).await.unwrap();

            assert_eq!(summary.created, 1);
            let rows = repo.find_occurrences_for_day(DayKey::new(date(2025, 1, 10))).await.unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].generated_key, Some(daily.key_for(date(2025, 1, 10))));
            assert_eq!(rows[0].start_at, Utc.with_ymd_and_hms(2025, 1, 10, 7, 0, 0).unwrap());
            assert_eq!(rows[0].planned_end_at, rows[0].end_at);
        }

        #[tokio::test]
        async fn test_second_call_is_a_no_op() {
            let repo = InMemoryRepository::new();
            repo.add_template(morning()).await.unwrap();
            let materializer = Materializer::new(&repo, Calendar::utc());

            let first = materializer.ensure_day_is_preloaded(date(2025, 1, 10)).await.unwrap();
            let second = materializer.ensure_day_is_preloaded(date(2025, 1, 10)).await.unwrap();

            assert_eq!(first.created, 1);
            assert_eq!(second, MaterializationSummary { created: 0, already_present: 1, suppressed: 0 });
            assert_eq!(repo.occurrence_count(), 1);
        }

        #[tokio::test]
        async fn test_override_suppresses_creation() {
            let repo = InMemoryRepository::new();
            let template = repo.add_template(morning()).await.unwrap();
            repo.add_override(template.key_for(date(2025, 1, 10)), OverrideAction::Skipped)
                .await
                .unwrap();

            let materializer = Materializer::new(&repo, Calendar::utc());
            let summary = materializer.ensure_day_is_preloaded(date(2025, 1, 10)).await.unwrap();

            assert_eq!(summary.suppressed, 1);
            assert_eq!(repo.occurrence_count(), 0);
        }

        #[tokio::test]
        async fn test_disabled_templates_are_ignored() {
            let repo = InMemoryRepository::new();
            let mut draft = morning();
            draft.enabled = false;
            repo.add_template(draft).await.unwrap();

            let materializer = Materializer::new(&repo, Calendar::utc());
            let summary = materializer.ensure_day_is_preloaded(date(2025, 1, 10)).await.unwrap();
            assert_eq!(summary, MaterializationSummary::default());
        }

        #[tokio::test]
        async fn test_workout_link_is_propagated() {
            let repo = InMemoryRepository::new();
            let routine = Uuid::now_v7();
            let mut draft = morning();
            draft.workout = WorkoutLink::workout(routine);
            repo.add_template(draft).await.unwrap();

            Materializer::new(&repo, Calendar::utc())
                .ensure_day_is_preloaded(date(2025, 1, 10))
                .await
                .unwrap();
            let rows = repo.find_occurrences_for_day(DayKey::new(date(2025, 1, 10))).await.unwrap();
            assert_eq!(rows[0].workout, WorkoutLink::workout(routine));
        }

        #[tokio::test]
        async fn test_local_midnight_in_template_timezone() {
            let repo = InMemoryRepository::new();
            repo.add_template(morning()).await.unwrap();
            let calendar = Calendar::from_timezone_name("America/New_York", Weekday::Mon).unwrap();

            Materializer::new(&repo, calendar)
                .ensure_day_is_preloaded(date(2025, 1, 10))
                .await
                .unwrap();
            let rows = repo.find_occurrences_for_day(DayKey::new(date(2025, 1, 10))).await.unwrap();
            assert_eq!(rows[0].start_at, Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap());
        }

        #[tokio::test]
        async fn test_failed_insert_leaves_nothing_behind() {
            let repo = InMemoryRepository::new();
            repo.add_template(morning()).await.unwrap();
            let mut second = morning();
            second.title = "Evening".to_string();
            repo.add_template(second).await.unwrap();
            repo.fail_writes_after(0);

            let result = Materializer::new(&repo, Calendar::utc())
                .ensure_day_is_preloaded(date(2025, 1, 10))
                .await;
            assert!(matches!(result, Err(CoreError::Persistence(_))));
            assert_eq!(repo.occurrence_count(), 0);
        }
    }

    #[tokio::test]
    async fn test_range_preload_sums_days() {
        let repo = InMemoryRepository::new();
        let template = repo.add_template(morning()).await.unwrap();
        repo.add_override(template.key_for(date(2025, 1, 11)), OverrideAction::Deleted)
            .await
            .unwrap();

        let materializer = Materializer::new(&repo, Calendar::utc());
        let summary = materializer
            .ensure_range_is_preloaded(date(2025, 1, 10), date(2025, 1, 12))
            .await
            .unwrap();

        assert_eq!(summary, MaterializationSummary { created: 2, already_present: 0, suppressed: 1 });
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn preloading_twice_equals_preloading_once(
                intervals in proptest::collection::vec(1u32..5, 1..6),
                offset in 0i64..120,
            ) {
                tokio_test::block_on(async {
                    let repo = InMemoryRepository::new();
                    for (i, interval) in intervals.iter().enumerate() {
                        let mut draft = morning();
                        draft.title = format!("Template {}", i);
                        draft.recurrence = RecurrenceRule::daily(date(2025, 1, 1)).with_interval(*interval);
                        repo.add_template(draft).await.unwrap();
                    }
                    let day = date(2025, 1, 1) + Duration::days(offset);
                    let materializer = Materializer::new(&repo, Calendar::utc());

                    materializer.ensure_day_is_preloaded(day).await.unwrap();
                    let once = repo.occurrence_count();
                    materializer.ensure_day_is_preloaded(day).await.unwrap();
                    prop_assert_eq!(repo.occurrence_count(), once);
                    Ok(())
                })?;
            }
        }
    }
}
