use cadence_core::calendar::Calendar;
use cadence_core::models::{Occurrence, OccurrenceStatus, Template, WorkoutLink};
use cadence_core::plan::UpdatePlan;
use chrono::{DateTime, Utc};
use chrono_humanize::Humanize;
use comfy_table::{Attribute, Cell, Color, Row, Table};

use crate::parser::format_offset;

fn local_time(instant: DateTime<Utc>, calendar: &Calendar) -> String {
    instant.with_timezone(&calendar.timezone()).format("%H:%M").to_string()
}

fn local_date_time(instant: DateTime<Utc>, calendar: &Calendar) -> String {
    instant
        .with_timezone(&calendar.timezone())
        .format("%a %Y-%m-%d %H:%M")
        .to_string()
}

fn workout_label(workout: &WorkoutLink) -> String {
    match workout {
        WorkoutLink::Generic => "Activity".to_string(),
        WorkoutLink::Workout { routine_id: Some(id) } => format!("Workout ({})", &id.to_string()[..8]),
        WorkoutLink::Workout { routine_id: None } => "Workout".to_string(),
    }
}

pub fn display_templates(templates: &[Template]) {
    if templates.is_empty() {
        println!("No templates found.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Title", "Schedule", "At", "Duration", "Kind", "Updated"]);

    for template in templates {
        let mut row = Row::new();
        row.add_cell(Cell::new(template.id.to_string()));

        let mut title_cell = Cell::new(&template.title);
        if !template.enabled {
            title_cell = title_cell
                .add_attribute(Attribute::CrossedOut)
                .fg(Color::DarkGrey);
        }
        row.add_cell(title_cell);
        row.add_cell(Cell::new(template.recurrence.to_string()));
        row.add_cell(Cell::new(format_offset(template.start_offset_minutes)));
        row.add_cell(Cell::new(format!("{}m", template.duration_minutes)));
        row.add_cell(Cell::new(workout_label(&template.workout)));
        row.add_cell(Cell::new(template.updated_at.humanize()));
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_occurrences(occurrences: &[Occurrence], calendar: &Calendar) {
    if occurrences.is_empty() {
        println!("Nothing planned.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["Time", "Title", "Status", "Kind", "Source"]);

    for occurrence in occurrences {
        let mut row = Row::new();

        let mut time = local_time(occurrence.start_at, calendar);
        if let Some(end_at) = occurrence.end_at {
            time = format!("{}-{}", time, local_time(end_at, calendar));
        }
        let time_cell = if occurrence.planned_start_at.is_some_and(|planned| planned != occurrence.start_at) {
            Cell::new(time).fg(Color::Yellow)
        } else {
            Cell::new(time)
        };
        row.add_cell(time_cell);

        let mut title_cell = Cell::new(&occurrence.title);
        title_cell = match occurrence.status {
            OccurrenceStatus::Done => title_cell.fg(Color::Green),
            OccurrenceStatus::Skipped => title_cell
                .add_attribute(Attribute::CrossedOut)
                .fg(Color::DarkGrey),
            OccurrenceStatus::Planned => title_cell,
        };
        row.add_cell(title_cell);

        row.add_cell(Cell::new(occurrence.status.to_string()));
        row.add_cell(Cell::new(workout_label(&occurrence.workout)));

        // ↻ marks template-driven rows, ✎ marks rows changed by hand
        let diverged = occurrence
            .planned_title
            .as_ref()
            .is_some_and(|planned| planned != &occurrence.title)
            || occurrence.planned_start_at.is_some_and(|planned| planned != occurrence.start_at);
        let source = match (occurrence.template_id, diverged) {
            (Some(_), true) => "↻ ✎",
            (Some(_), false) => "↻",
            (None, _) => "",
        };
        row.add_cell(Cell::new(source));
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_plan(plan: &UpdatePlan, calendar: &Calendar) {
    let mut table = Table::new();
    table.set_header(vec!["Change", "When", "Title"]);

    for update in &plan.updates {
        let change = if update.after.template_id.is_none() {
            Cell::new("detach").fg(Color::Yellow)
        } else {
            Cell::new("update").fg(Color::Blue)
        };
        table.add_row(vec![
            change,
            Cell::new(local_date_time(update.after.start_at, calendar)),
            Cell::new(&update.after.title),
        ]);
    }
    for create in &plan.creates {
        table.add_row(vec![
            Cell::new("create").fg(Color::Green),
            Cell::new(local_date_time(create.start_at, calendar)),
            Cell::new(&create.title),
        ]);
    }
    for key in &plan.override_keys_to_delete {
        table.add_row(vec![
            Cell::new("restore").fg(Color::Magenta),
            Cell::new(key.day.to_string()),
            Cell::new(""),
        ]);
    }

    println!("{table}");
}
