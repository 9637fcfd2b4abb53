use anyhow::Result;
use cadence_core::calendar::Calendar;
use chrono::Duration;
use cadence_core::models::{TemplateDraft, WorkoutLink};
use cadence_core::recurrence::{RecurrenceKind, RecurrenceRule};
use cadence_core::repository::Repository;
use owo_colors::OwoColorize;

use crate::cli::{TemplateAddCommand, TemplateRef};
use crate::parser::{format_offset, parse_day, parse_duration_minutes, parse_time_of_day, parse_weekdays, today};
use crate::util::resolve_template;
use crate::views::table::display_templates;

const UPCOMING_SHOWN: usize = 3;
const UPCOMING_HORIZON_DAYS: i64 = 60;

pub async fn add_template(repo: &impl Repository, calendar: &Calendar, command: TemplateAddCommand) -> Result<()> {
    let start_date = match &command.from {
        Some(from) => parse_day(from, calendar)?,
        None => today(calendar),
    };
    let end_date = command.until.as_deref().map(|until| parse_day(until, calendar)).transpose()?;

    let kind = RecurrenceKind::from(command.every);
    let mut recurrence = RecurrenceRule::new(kind, start_date)
        .with_interval(command.interval)
        .with_end_date(end_date);
    if let Some(on) = &command.on {
        recurrence.weekdays = parse_weekdays(on)?;
    }

    let draft = TemplateDraft {
        title: command.title,
        enabled: !command.disabled,
        start_offset_minutes: parse_time_of_day(&command.at)?,
        duration_minutes: parse_duration_minutes(&command.duration)?,
        recurrence,
        workout: command.routine.map(WorkoutLink::workout).unwrap_or_default(),
    };
    let template = repo.add_template(draft).await?;

    println!("{} Created template: {}", "✓".green().bold(), template.title.bold());
    println!("  {} ID: {}", "→".blue(), template.id.to_string().dimmed());
    println!(
        "  {} Schedule: {} at {}",
        "→".blue(),
        template.recurrence.to_string().cyan(),
        format_offset(template.start_offset_minutes)
    );
    if !template.enabled {
        println!("  {} Disabled, no occurrences will be generated", "→".blue());
        return Ok(());
    }

    let from = today(calendar);
    let upcoming = template
        .recurrence
        .days_between(from, from + Duration::days(UPCOMING_HORIZON_DAYS), UPCOMING_SHOWN, calendar);
    if !upcoming.is_empty() {
        let days: Vec<String> = upcoming.iter().map(|day| day.format("%a %b %-d").to_string()).collect();
        println!("  {} Next: {}", "→".blue(), days.join(", "));
    }
    Ok(())
}

pub async fn list_templates(repo: &impl Repository) -> Result<()> {
    let templates = repo.find_templates().await?;
    display_templates(&templates);
    Ok(())
}

pub async fn set_enabled(repo: &impl Repository, command: TemplateRef, enabled: bool) -> Result<()> {
    let template = resolve_template(repo, &command.template).await?;
    let template = repo.set_template_enabled(template.id, enabled).await?;
    let state = if enabled { "Enabled" } else { "Disabled" };
    println!("{} {} template: {}", "✓".green().bold(), state, template.title.bold());
    Ok(())
}
