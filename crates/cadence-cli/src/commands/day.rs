use anyhow::Result;
use cadence_core::calendar::Calendar;
use cadence_core::materializer::Materializer;
use cadence_core::models::DayKey;
use cadence_core::repository::Repository;
use owo_colors::OwoColorize;

use crate::cli::DayCommand;
use crate::parser::{parse_day, today};
use crate::views::table::display_occurrences;

pub async fn show_day(repo: &impl Repository, calendar: &Calendar, command: DayCommand) -> Result<()> {
    let day = match &command.date {
        Some(date) => parse_day(date, calendar)?,
        None => today(calendar),
    };

    let summary = Materializer::new(repo, *calendar).ensure_day_is_preloaded(day).await?;
    let occurrences = repo.find_occurrences_for_day(DayKey::new(day)).await?;

    println!("{}", day.format("%A, %B %-d %Y").to_string().bold());
    if summary.created > 0 {
        println!("  {} {} new from templates", "→".blue(), summary.created);
    }
    display_occurrences(&occurrences, calendar);
    Ok(())
}
