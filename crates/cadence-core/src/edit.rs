//! Committing a template edit end to end: plan, apply, then save.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::applier::{ApplyReport, UpdateApplier};
use crate::calendar::Calendar;
use crate::error::CoreError;
use crate::models::{EditScope, PlanningConfig, Template, TemplateDraft};
use crate::plan::{PlanOptions, UpdatePlan};
use crate::planner::UpdatePlanner;
use crate::repository::Repository;

/// A user's request to change a template.
#[derive(Debug, Clone)]
pub struct TemplateEdit {
    pub template_id: Uuid,
    pub draft: TemplateDraft,
    pub scope: EditScope,
    pub apply_day: NaiveDate,
    pub options: PlanOptions,
}

#[derive(Debug, Clone)]
pub struct CommittedEdit {
    pub template: Template,
    pub plan: UpdatePlan,
    pub report: ApplyReport,
}

/// Plans the edit, applies the plan and saves the draft as the template's
/// new state. If saving fails the applied plan is rolled back.
pub async fn commit_template_edit<R: Repository + ?Sized>(
    repo: &R,
    calendar: Calendar,
    config: PlanningConfig,
    edit: TemplateEdit,
) -> Result<CommittedEdit, CoreError> {
    edit.draft.validate()?;

    let plan = UpdatePlanner::with_config(repo, calendar, config)
        .make_plan(edit.template_id, &edit.draft, edit.scope, edit.apply_day, edit.options)
        .await?;

    commit_plan(repo, plan, edit.draft).await
}

/// Applies an already computed plan and saves `draft` as the state of the
/// plan's template. Used when the plan was shown to the user first.
pub async fn commit_plan<R: Repository + ?Sized>(
    repo: &R,
    plan: UpdatePlan,
    draft: TemplateDraft,
) -> Result<CommittedEdit, CoreError> {
    draft.validate()?;

    let mut applier = UpdateApplier::new(repo);
    let report = applier.apply(&plan).await?;

    match repo.save_template(plan.template_id, draft).await {
        Ok(template) => {
            tracing::info!(template_id = %template.id, scope = %plan.scope, "Committed template edit");
            Ok(CommittedEdit { template, plan, report })
        }
        Err(err) => {
            tracing::warn!(template_id = %plan.template_id, error = %err, "Saving template failed, rolling back");
            match applier.rollback(&plan).await {
                Ok(()) => Err(err),
                Err(rollback_err) => Err(CoreError::RollbackIncomplete {
                    cause: Box::new(err),
                    failures: vec![rollback_err.to_string()],
                }),
            }
        }
    }
}
