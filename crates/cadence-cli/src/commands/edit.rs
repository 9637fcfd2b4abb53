use anyhow::Result;
use cadence_core::calendar::Calendar;
use cadence_core::edit::commit_plan;
use cadence_core::models::{EditScope, PlanningConfig, Template, TemplateDraft};
use cadence_core::plan::{PlanOptions, UpdatePlan};
use cadence_core::planner::UpdatePlanner;
use cadence_core::recurrence::RecurrenceKind;
use cadence_core::repository::Repository;
use dialoguer::Confirm;
use owo_colors::OwoColorize;

use crate::cli::EditCommand;
use crate::config::Config;
use crate::parser::{parse_day, parse_duration_minutes, parse_time_of_day, parse_weekdays, today};
use crate::util::resolve_template;
use crate::views::table::display_plan;

/// The template's current state with the command's changes laid over it.
fn build_draft(template: &Template, command: &EditCommand, calendar: &Calendar) -> Result<TemplateDraft> {
    let mut draft = template.draft();

    if let Some(title) = &command.title {
        draft.title = title.clone();
    }
    if let Some(at) = &command.at {
        draft.start_offset_minutes = parse_time_of_day(at)?;
    }
    if let Some(duration) = &command.duration {
        draft.duration_minutes = parse_duration_minutes(duration)?;
    }
    if let Some(every) = command.every {
        draft.recurrence.kind = RecurrenceKind::from(every);
    }
    if let Some(on) = &command.on {
        draft.recurrence.weekdays = parse_weekdays(on)?;
    }
    if let Some(interval) = command.interval {
        draft.recurrence.interval = interval.max(1);
    }
    if let Some(until) = &command.until {
        draft.recurrence.end_date = Some(parse_day(until, calendar)?);
    }
    if command.until_clear {
        draft.recurrence.end_date = None;
    }
    if command.enable {
        draft.enabled = true;
    }
    if command.disable {
        draft.enabled = false;
    }

    Ok(draft)
}

fn plan_options(config: &Config, command: &EditCommand) -> PlanOptions {
    let mut options = config.plan_options();
    options.overwrite_actual |= command.overwrite;
    if command.keep_unmatched {
        options.detach_if_no_longer_matches = false;
    }
    options.force_apply_day_create = command.force_create;
    options.resurrect_overrides_on_apply_day = command.resurrect;
    if let Some(days_ahead) = command.days_ahead {
        options.days_ahead = days_ahead;
    }
    options
}

fn print_preview(plan: &UpdatePlan, template: &Template, calendar: &Calendar) {
    println!(
        "Editing {} ({} scope): {} occurrence(s) affected",
        template.title.bold(),
        plan.scope.to_string().cyan(),
        plan.preview.affected_count
    );
    if !plan.preview.sample_start_dates.is_empty() {
        let samples: Vec<String> = plan
            .preview
            .sample_start_dates
            .iter()
            .map(|start| {
                start
                    .with_timezone(&calendar.timezone())
                    .format("%a %b %-d %H:%M")
                    .to_string()
            })
            .collect();
        println!("  {} Starting {}", "→".blue(), samples.join(", "));
    }
    if !plan.is_empty() {
        display_plan(plan, calendar);
    }
}

pub async fn edit_template(
    repo: &impl Repository,
    calendar: &Calendar,
    planning: PlanningConfig,
    config: &Config,
    command: EditCommand,
) -> Result<()> {
    let template = resolve_template(repo, &command.template).await?;
    let apply_day = match &command.day {
        Some(day) => parse_day(day, calendar)?,
        None => today(calendar),
    };
    let draft = build_draft(&template, &command, calendar)?;
    draft.validate()?;

    let scope = EditScope::from(command.scope);
    let options = plan_options(config, &command);

    let plan = UpdatePlanner::with_config(repo, *calendar, planning)
        .make_plan(template.id, &draft, scope, apply_day, options)
        .await?;
    print_preview(&plan, &template, calendar);

    if command.dry_run {
        println!("Dry run, nothing was changed.");
        return Ok(());
    }

    if !command.yes && !plan.is_empty() {
        let confirmation = Confirm::new()
            .with_prompt(format!("Apply this change to {} occurrence(s)?", plan.preview.affected_count))
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirmation {
            println!("Edit cancelled.");
            return Ok(());
        }
    }

    // Apply exactly what was previewed
    let committed = commit_plan(repo, plan, draft).await?;

    println!("{} Updated template: {}", "✓".green().bold(), committed.template.title.bold());
    let report = committed.report;
    println!(
        "  {} {} updated, {} created, {} restored",
        "→".blue(),
        report.updated,
        report.created,
        report.overrides_deleted
    );
    if report.skipped_creates > 0 {
        println!(
            "  {} {} already existed and were left alone",
            "→".blue(),
            report.skipped_creates
        );
    }
    Ok(())
}
