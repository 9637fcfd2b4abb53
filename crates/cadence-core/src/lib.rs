//! # Cadence Core Library
//!
//! Recurring activity templates and the date-anchored occurrences they
//! generate, with edits that propagate from a template to its occurrences
//! without trampling what the user changed by hand.
//!
//! ## Features
//!
//! - **Just-in-time materialization**: occurrences are created per day, on
//!   demand, keyed by `{template_id}|{day}` so repeated preloads are no-ops
//! - **Divergence-preserving edits**: planned fields track the template while
//!   actual fields the user changed are left alone
//! - **Declarative plans**: template edits are computed as previewable plans
//!   before anything is written
//! - **All-or-nothing apply**: a failed apply restores every touched occurrence
//!   from its before-image
//! - **Day overrides**: skipped or deleted days stay suppressed until
//!   explicitly resurrected
//!
//! ## Core Modules
//!
//! - [`db`]: Database connection and migration management
//! - [`models`]: Templates, occurrences, keys and overrides
//! - [`recurrence`]: The recurrence predicate
//! - [`calendar`]: Local days, day starts and weeks in a timezone
//! - [`repository`]: Data access traits with SQLite and in-memory implementations
//! - [`materializer`]: Day preloading
//! - [`planner`] and [`plan`]: Update planning
//! - [`applier`]: Plan execution and rollback
//! - [`edit`]: Template edits end to end
//! - [`error`]: Error types
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cadence_core::{
//!     calendar::Calendar,
//!     db,
//!     materializer::Materializer,
//!     models::{TemplateDraft, WorkoutLink},
//!     recurrence::RecurrenceRule,
//!     repository::{SqliteRepository, TemplateRepository},
//! };
//! use chrono::NaiveDate;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), cadence_core::error::CoreError> {
//!     let pool = db::establish_connection("cadence.db").await?;
//!     let repo = SqliteRepository::new(pool);
//!     let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
//!
//!     repo.add_template(TemplateDraft {
//!         title: "Morning run".to_string(),
//!         enabled: true,
//!         start_offset_minutes: 7 * 60,
//!         duration_minutes: 30,
//!         recurrence: RecurrenceRule::daily(start),
//!         workout: WorkoutLink::Generic,
//!     })
//!     .await?;
//!
//!     let summary = Materializer::new(&repo, Calendar::utc())
//!         .ensure_day_is_preloaded(start)
//!         .await?;
//!     println!("Created {} occurrences", summary.created);
//!     Ok(())
//! }
//! ```

pub mod applier;
pub mod calendar;
pub mod db;
pub mod edit;
pub mod error;
pub mod materializer;
pub mod models;
pub mod plan;
pub mod planner;
pub mod recurrence;
pub mod repository;
