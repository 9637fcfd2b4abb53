use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::calendar::Calendar;
use crate::error::CoreError;
use crate::recurrence::RecurrenceRule;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OccurrenceStatus {
    Planned,
    Done,
    Skipped,
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid occurrence status: {0}")]
pub struct ParseOccurrenceStatusError(String);

impl FromStr for OccurrenceStatus {
    type Err = ParseOccurrenceStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "planned" => Ok(OccurrenceStatus::Planned),
            "done" => Ok(OccurrenceStatus::Done),
            "skipped" => Ok(OccurrenceStatus::Skipped),
            _ => Err(ParseOccurrenceStatusError(s.to_string())),
        }
    }
}

impl fmt::Display for OccurrenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OccurrenceStatus::Planned => write!(f, "planned"),
            OccurrenceStatus::Done => write!(f, "done"),
            OccurrenceStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Storage encoding of the activity kind. Domain code works with [`WorkoutLink`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WorkoutKind {
    Generic,
    Workout,
}

/// What kind of activity an occurrence or template describes.
///
/// A routine can only be attached to a workout, so the "generic activity with
/// a routine id" state cannot be expressed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WorkoutLink {
    #[default]
    Generic,
    Workout { routine_id: Option<Uuid> },
}

impl WorkoutLink {
    pub fn workout(routine_id: Uuid) -> Self {
        WorkoutLink::Workout { routine_id: Some(routine_id) }
    }

    /// Rebuilds a link from its stored columns. A routine stored next to a
    /// generic kind is dropped.
    pub fn decode(kind: WorkoutKind, routine_id: Option<Uuid>) -> Self {
        match kind {
            WorkoutKind::Generic => WorkoutLink::Generic,
            WorkoutKind::Workout => WorkoutLink::Workout { routine_id },
        }
    }

    pub fn encode(&self) -> (WorkoutKind, Option<Uuid>) {
        (self.kind(), self.routine_id())
    }

    pub fn kind(&self) -> WorkoutKind {
        match self {
            WorkoutLink::Generic => WorkoutKind::Generic,
            WorkoutLink::Workout { .. } => WorkoutKind::Workout,
        }
    }

    pub fn routine_id(&self) -> Option<Uuid> {
        match self {
            WorkoutLink::Generic => None,
            WorkoutLink::Workout { routine_id } => *routine_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OverrideAction {
    /// The user skipped this day's occurrence
    Skipped,
    /// The user deleted this day's occurrence
    Deleted,
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid override action: {0}")]
pub struct ParseOverrideActionError(String);

impl FromStr for OverrideAction {
    type Err = ParseOverrideActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" | "skipped" => Ok(OverrideAction::Skipped),
            "delete" | "deleted" => Ok(OverrideAction::Deleted),
            _ => Err(ParseOverrideActionError(s.to_string())),
        }
    }
}

impl fmt::Display for OverrideAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverrideAction::Skipped => write!(f, "skipped"),
            OverrideAction::Deleted => write!(f, "deleted"),
        }
    }
}

// ============================================================================
// Keys
// ============================================================================

const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// A local calendar day in its textual `YYYY-MM-DD` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn new(day: NaiveDate) -> Self {
        Self(day)
    }

    pub fn day(&self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for DayKey {
    fn from(day: NaiveDate) -> Self {
        Self(day)
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DAY_KEY_FORMAT))
    }
}

impl FromStr for DayKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s, DAY_KEY_FORMAT)
            .map(DayKey)
            .map_err(|_| CoreError::InvalidKey(format!("Invalid day key: {}", s)))
    }
}

impl From<DayKey> for String {
    fn from(key: DayKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for DayKey {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// `{template_id}|{day_key}`: the idempotency key of a materialized occurrence
/// and the key of a day override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct GeneratedKey {
    pub template_id: Uuid,
    pub day: DayKey,
}

impl GeneratedKey {
    pub fn new(template_id: Uuid, day: impl Into<DayKey>) -> Self {
        Self { template_id, day: day.into() }
    }
}

impl fmt::Display for GeneratedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.template_id, self.day)
    }
}

impl FromStr for GeneratedKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (template, day) = s
            .split_once('|')
            .ok_or_else(|| CoreError::InvalidKey(format!("Missing separator in key: {}", s)))?;
        let template_id = Uuid::parse_str(template)
            .map_err(|_| CoreError::InvalidKey(format!("Invalid template id in key: {}", s)))?;
        Ok(Self { template_id, day: day.parse()? })
    }
}

impl From<GeneratedKey> for String {
    fn from(key: GeneratedKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for GeneratedKey {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ============================================================================
// Templates
// ============================================================================

/// A recurring activity definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Template {
    pub id: Uuid,
    pub title: String,
    pub enabled: bool,
    /// Minutes after local midnight
    pub start_offset_minutes: i32,
    pub duration_minutes: i32,
    pub recurrence: RecurrenceRule,
    pub workout: WorkoutLink,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Template {
    pub fn from_draft(draft: TemplateDraft) -> Result<Self, CoreError> {
        draft.validate()?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(),
            title: draft.title,
            enabled: draft.enabled,
            start_offset_minutes: draft.start_offset_minutes,
            duration_minutes: draft.duration_minutes,
            recurrence: draft.recurrence,
            workout: draft.workout,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn draft(&self) -> TemplateDraft {
        TemplateDraft {
            title: self.title.clone(),
            enabled: self.enabled,
            start_offset_minutes: self.start_offset_minutes,
            duration_minutes: self.duration_minutes,
            recurrence: self.recurrence.clone(),
            workout: self.workout,
        }
    }

    pub fn key_for(&self, day: NaiveDate) -> GeneratedKey {
        GeneratedKey::new(self.id, day)
    }
}

/// A proposed template state. Plans are computed against a draft before the
/// template itself is saved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateDraft {
    pub title: String,
    pub enabled: bool,
    pub start_offset_minutes: i32,
    pub duration_minutes: i32,
    pub recurrence: RecurrenceRule,
    pub workout: WorkoutLink,
}

impl TemplateDraft {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.title.trim().is_empty() {
            return Err(CoreError::InvalidInput("Template title cannot be empty".to_string()));
        }
        if !(0..24 * 60).contains(&self.start_offset_minutes) {
            return Err(CoreError::InvalidInput(format!(
                "Start offset must be within the day, got {} minutes",
                self.start_offset_minutes
            )));
        }
        if self.duration_minutes < 0 {
            return Err(CoreError::InvalidInput("Duration cannot be negative".to_string()));
        }
        if let WorkoutLink::Workout { routine_id: None } = self.workout {
            return Err(CoreError::InvalidInput(
                "Workout templates require a routine".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether this draft generates an occurrence on `day`.
    pub fn applies_on(&self, day: NaiveDate, calendar: &Calendar) -> bool {
        self.enabled && self.recurrence.matches(day, calendar)
    }

    /// Planned (start, end) for an occurrence on `day`.
    pub fn planned_times(&self, day: NaiveDate, calendar: &Calendar) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = calendar.at_offset(day, self.start_offset_minutes as i64);
        (start, start + chrono::Duration::minutes(self.duration_minutes as i64))
    }
}

// ============================================================================
// Occurrences
// ============================================================================

/// A concrete, date-anchored activity.
///
/// Actual fields are what the user sees and edits. Planned fields hold the
/// values last pushed by the template; a field whose actual value differs from
/// its planned value has diverged and is left alone by template updates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Occurrence {
    pub id: Uuid,
    pub title: String,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub planned_title: Option<String>,
    pub planned_start_at: Option<DateTime<Utc>>,
    pub planned_end_at: Option<DateTime<Utc>>,
    /// None for standalone or detached occurrences
    pub template_id: Option<Uuid>,
    pub day_key: Option<DayKey>,
    pub generated_key: Option<GeneratedKey>,
    pub status: OccurrenceStatus,
    pub workout: WorkoutLink,
    /// Set by the workout-session subsystem once a session starts
    pub workout_session_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Occurrence {
    /// A fresh template-derived occurrence whose actual and planned fields agree.
    pub fn generated(template: &TemplateDraft, template_id: Uuid, day: NaiveDate, calendar: &Calendar) -> Self {
        let (start, end) = template.planned_times(day, calendar);
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            title: template.title.clone(),
            start_at: start,
            end_at: Some(end),
            planned_title: Some(template.title.clone()),
            planned_start_at: Some(start),
            planned_end_at: Some(end),
            template_id: Some(template_id),
            day_key: Some(DayKey::new(day)),
            generated_key: Some(GeneratedKey::new(template_id, day)),
            status: OccurrenceStatus::Planned,
            workout: template.workout,
            workout_session_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A user-created occurrence with no template behind it.
    pub fn standalone(title: String, start_at: DateTime<Utc>, end_at: Option<DateTime<Utc>>, calendar: &Calendar) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            title,
            start_at,
            end_at,
            planned_title: None,
            planned_start_at: None,
            planned_end_at: None,
            template_id: None,
            day_key: Some(DayKey::new(calendar.local_day(start_at))),
            generated_key: None,
            status: OccurrenceStatus::Planned,
            workout: WorkoutLink::Generic,
            workout_session_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The day this occurrence belongs to: its day key, or the local day of
    /// its start for rows that never had one.
    pub fn day(&self, calendar: &Calendar) -> NaiveDate {
        self.day_key
            .map(|key| key.day())
            .unwrap_or_else(|| calendar.local_day(self.start_at))
    }

    pub fn snapshot(&self) -> OccurrenceSnapshot {
        OccurrenceSnapshot {
            title: self.title.clone(),
            start_at: self.start_at,
            end_at: self.end_at,
            planned_title: self.planned_title.clone(),
            planned_start_at: self.planned_start_at,
            planned_end_at: self.planned_end_at,
            template_id: self.template_id,
            day_key: self.day_key,
            generated_key: self.generated_key,
            status: self.status,
            workout: self.workout,
            workout_session_id: self.workout_session_id,
        }
    }

    /// Overwrites every mutable field with the snapshot's values.
    pub fn restore(&mut self, snapshot: &OccurrenceSnapshot) {
        self.title = snapshot.title.clone();
        self.start_at = snapshot.start_at;
        self.end_at = snapshot.end_at;
        self.planned_title = snapshot.planned_title.clone();
        self.planned_start_at = snapshot.planned_start_at;
        self.planned_end_at = snapshot.planned_end_at;
        self.template_id = snapshot.template_id;
        self.day_key = snapshot.day_key;
        self.generated_key = snapshot.generated_key;
        self.status = snapshot.status;
        self.workout = snapshot.workout;
        self.workout_session_id = snapshot.workout_session_id;
        self.updated_at = Utc::now();
    }
}

/// Every mutable field of an occurrence, captured by value.
///
/// Plans carry an after-image per update and a before-image per touched
/// occurrence; applying or rolling back is writing one of them back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OccurrenceSnapshot {
    pub title: String,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub planned_title: Option<String>,
    pub planned_start_at: Option<DateTime<Utc>>,
    pub planned_end_at: Option<DateTime<Utc>>,
    pub template_id: Option<Uuid>,
    pub day_key: Option<DayKey>,
    pub generated_key: Option<GeneratedKey>,
    pub status: OccurrenceStatus,
    pub workout: WorkoutLink,
    pub workout_session_id: Option<Uuid>,
}

/// A user edit of an occurrence's actual fields. Planned fields are never
/// touched here, which is what makes the edit register as divergence.
#[derive(Debug, Clone, Default)]
pub struct OccurrenceEdit {
    pub title: Option<String>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<Option<DateTime<Utc>>>,
    pub status: Option<OccurrenceStatus>,
}

impl OccurrenceEdit {
    pub fn apply_to(&self, occurrence: &mut Occurrence) {
        if let Some(title) = &self.title {
            occurrence.title = title.clone();
        }
        if let Some(start_at) = self.start_at {
            occurrence.start_at = start_at;
        }
        if let Some(end_at) = self.end_at {
            occurrence.end_at = end_at;
        }
        if let Some(status) = self.status {
            occurrence.status = status;
        }
        occurrence.updated_at = Utc::now();
    }
}

// ============================================================================
// Overrides
// ============================================================================

/// Suppresses materialization and update propagation for one (template, day).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayOverride {
    pub key: GeneratedKey,
    pub action: OverrideAction,
    pub created_at: DateTime<Utc>,
}

impl DayOverride {
    pub fn new(key: GeneratedKey, action: OverrideAction) -> Self {
        Self { key, action, created_at: Utc::now() }
    }
}

// ============================================================================
// Edit scope and configuration
// ============================================================================

/// Which occurrences a template edit propagates to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditScope {
    /// Only the occurrence on the apply day
    ThisInstance,
    /// The apply day and linked occurrences within the look-ahead window
    ThisAndFuture,
    /// Every occurrence ever linked to the template
    AllInstances,
}

impl fmt::Display for EditScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditScope::ThisInstance => write!(f, "this"),
            EditScope::ThisAndFuture => write!(f, "future"),
            EditScope::AllInstances => write!(f, "all"),
        }
    }
}

impl FromStr for EditScope {
    type Err = ParseEditScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "this" | "instance" | "this_instance" => Ok(EditScope::ThisInstance),
            "future" | "this_and_future" => Ok(EditScope::ThisAndFuture),
            "all" | "series" | "all_instances" => Ok(EditScope::AllInstances),
            _ => Err(ParseEditScopeError(s.to_string())),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid edit scope: {0}")]
pub struct ParseEditScopeError(String);

/// Planner settings that are not per-edit switches
#[derive(Debug, Clone)]
pub struct PlanningConfig {
    /// How many start instants a plan preview carries
    pub preview_sample_size: usize,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self { preview_sample_size: 3 }
    }
}
