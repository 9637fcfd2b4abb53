//! Executes update plans with all-or-nothing semantics.
//!
//! Updates are written first, in plan order, then creates, and override
//! deletions last. Any failure restores every touched occurrence from the
//! plan's before-images and removes the rows this run inserted.

use std::collections::HashSet;

use crate::error::CoreError;
use crate::models::GeneratedKey;
use crate::plan::UpdatePlan;
use crate::repository::Repository;

/// Where an applier is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyState {
    Idle,
    Applying,
    Committed,
    RolledBack,
}

/// What a committed apply did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub updated: usize,
    pub created: usize,
    /// Creates whose generated key already existed at apply time
    pub skipped_creates: usize,
    pub overrides_deleted: usize,
}

pub struct UpdateApplier<'a, R: Repository + ?Sized> {
    repo: &'a R,
    state: ApplyState,
    /// Creates the last run found already present; they are not ours to delete
    preexisting: HashSet<GeneratedKey>,
}

impl<'a, R: Repository + ?Sized> UpdateApplier<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self {
            repo,
            state: ApplyState::Idle,
            preexisting: HashSet::new(),
        }
    }

    pub fn state(&self) -> ApplyState {
        self.state
    }

    /// Applies `plan`. On failure the store is restored and the original
    /// error is returned, or `RollbackIncomplete` if restoring failed too.
    pub async fn apply(&mut self, plan: &UpdatePlan) -> Result<ApplyReport, CoreError> {
        self.state = ApplyState::Applying;
        self.preexisting.clear();

        match self.apply_steps(plan).await {
            Ok(report) => {
                self.state = ApplyState::Committed;
                tracing::info!(
                    template_id = %plan.template_id,
                    updated = report.updated,
                    created = report.created,
                    overrides_deleted = report.overrides_deleted,
                    "Applied update plan"
                );
                Ok(report)
            }
            Err(err) => {
                tracing::warn!(template_id = %plan.template_id, error = %err, "Apply failed, rolling back");
                let failures = self.restore(plan).await;
                self.state = ApplyState::RolledBack;
                if failures.is_empty() {
                    Err(err)
                } else {
                    Err(CoreError::RollbackIncomplete { cause: Box::new(err), failures })
                }
            }
        }
    }

    /// Undoes `plan`: every before-image is written back and every created
    /// occurrence is removed. Overrides are never re-created.
    pub async fn rollback(&mut self, plan: &UpdatePlan) -> Result<(), CoreError> {
        let failures = self.restore(plan).await;
        self.state = ApplyState::RolledBack;
        if failures.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Persistence(format!("Rollback incomplete: {}", failures.join("; "))))
        }
    }

    async fn apply_steps(&mut self, plan: &UpdatePlan) -> Result<ApplyReport, CoreError> {
        let mut report = ApplyReport::default();

        for update in &plan.updates {
            if !self.repo.write_snapshot(update.occurrence_id, &update.after).await? {
                return Err(CoreError::MissingOccurrence(update.occurrence_id));
            }
            report.updated += 1;
        }

        for create in &plan.creates {
            if self
                .repo
                .find_occurrence_by_generated_key(&create.generated_key)
                .await?
                .is_some()
            {
                tracing::debug!(key = %create.generated_key, "Occurrence already exists, skipping create");
                self.preexisting.insert(create.generated_key);
                report.skipped_creates += 1;
                continue;
            }
            self.repo.insert_occurrences(&[create.to_occurrence()]).await?;
            report.created += 1;
        }

        for key in &plan.override_keys_to_delete {
            if self.repo.delete_override(key).await? {
                report.overrides_deleted += 1;
            }
        }

        Ok(report)
    }

    /// Best effort: every step is tried, failures are collected.
    async fn restore(&self, plan: &UpdatePlan) -> Vec<String> {
        let mut failures = Vec::new();

        for key in plan.created_generated_keys.iter().filter(|k| !self.preexisting.contains(k)) {
            if let Err(err) = self.repo.delete_occurrence_by_generated_key(key).await {
                tracing::error!(key = %key, error = %err, "Failed to remove created occurrence");
                failures.push(format!("delete {}: {}", key, err));
            }
        }

        for (id, before) in &plan.before_snapshots {
            match self.repo.write_snapshot(*id, before).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(occurrence_id = %id, "Occurrence vanished, nothing to restore");
                }
                Err(err) => {
                    tracing::error!(occurrence_id = %id, error = %err, "Failed to restore occurrence");
                    failures.push(format!("restore {}: {}", id, err));
                }
            }
        }

        failures
    }
}
