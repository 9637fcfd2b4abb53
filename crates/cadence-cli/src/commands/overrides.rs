use anyhow::Result;
use cadence_core::calendar::Calendar;
use cadence_core::edit::{commit_template_edit, TemplateEdit};
use cadence_core::models::{EditScope, OccurrenceEdit, OccurrenceStatus, OverrideAction, PlanningConfig};
use cadence_core::plan::PlanOptions;
use cadence_core::repository::Repository;
use owo_colors::OwoColorize;

use crate::cli::OverrideCommand;
use crate::config::Config;
use crate::parser::parse_day;
use crate::util::resolve_template;

/// Records a skip or delete for one day of a template. A skipped day keeps its
/// occurrence marked as skipped, a deleted day loses it.
pub async fn override_day(
    repo: &impl Repository,
    calendar: &Calendar,
    command: OverrideCommand,
    action: OverrideAction,
) -> Result<()> {
    let template = resolve_template(repo, &command.template).await?;
    let day = parse_day(&command.date, calendar)?;
    let key = template.key_for(day);

    repo.add_override(key, action).await?;

    match action {
        OverrideAction::Skipped => {
            if let Some(occurrence) = repo.find_occurrence_by_generated_key(&key).await? {
                repo.edit_occurrence(
                    occurrence.id,
                    OccurrenceEdit {
                        status: Some(OccurrenceStatus::Skipped),
                        ..Default::default()
                    },
                )
                .await?;
            }
        }
        OverrideAction::Deleted => {
            repo.delete_occurrence_by_generated_key(&key).await?;
        }
    }

    println!(
        "{} {} {} on {}",
        "✓".green().bold(),
        if action == OverrideAction::Skipped { "Skipped" } else { "Deleted" },
        template.title.bold(),
        day
    );
    Ok(())
}

/// Lifts a skip or delete by re-applying the template to that one day. The
/// override is removed by the same plan that brings the occurrence back.
pub async fn restore_day(
    repo: &impl Repository,
    calendar: &Calendar,
    planning: PlanningConfig,
    config: &Config,
    command: OverrideCommand,
) -> Result<()> {
    let template = resolve_template(repo, &command.template).await?;
    let day = parse_day(&command.date, calendar)?;
    let key = template.key_for(day);

    if repo.find_override(&key).await?.is_none() {
        println!("{} was not skipped or deleted on {}", template.title, day);
        return Ok(());
    }

    let committed = commit_template_edit(
        repo,
        *calendar,
        planning,
        TemplateEdit {
            template_id: template.id,
            draft: template.draft(),
            scope: EditScope::ThisInstance,
            apply_day: day,
            options: PlanOptions {
                resurrect_overrides_on_apply_day: true,
                ..config.plan_options()
            },
        },
    )
    .await?;

    // A skipped day kept its row; un-skip it
    if let Some(occurrence) = repo.find_occurrence_by_generated_key(&key).await? {
        if occurrence.status == OccurrenceStatus::Skipped {
            repo.edit_occurrence(
                occurrence.id,
                OccurrenceEdit {
                    status: Some(OccurrenceStatus::Planned),
                    ..Default::default()
                },
            )
            .await?;
        }
    }

    println!("{} Restored {} on {}", "✓".green().bold(), template.title.bold(), day);
    if committed.report.created > 0 {
        println!("  {} {} occurrence(s) recreated", "→".blue(), committed.report.created);
    }
    Ok(())
}
