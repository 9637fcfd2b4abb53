use cadence_core::calendar::Calendar;
use cadence_core::recurrence::WeekdaySet;
use chrono::{NaiveDate, NaiveTime, Timelike, Utc, Weekday};
use chrono_english::{parse_date_string, Dialect};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("Failed to parse date '{0}'")]
    Date(String),
    #[error("Invalid time format: '{0}'\n\nSupported formats:\n  • 24-hour: '14:30', '09:00'\n  • 12-hour: '2:30 PM', '9:00 AM'\n  • Compact: '2pm', '9am'\n  • Special: 'noon', 'midnight'")]
    Time(String),
    #[error("Invalid duration: '{0}' (use minutes like '45' or '45m', or hours like '1h30m')")]
    Duration(String),
    #[error("Invalid day(s): {0}. Use mon,tue,wed,thu,fri,sat,sun or weekdays/weekends")]
    Days(String),
}

/// Parses a day as `YYYY-MM-DD` or in natural language, relative to today in
/// the calendar's timezone.
pub fn parse_day(input: &str, calendar: &Calendar) -> Result<NaiveDate, ParseError> {
    let input = input.trim();
    if let Ok(day) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(day);
    }

    let now = Utc::now().with_timezone(&calendar.timezone());
    parse_date_string(input, now, Dialect::Uk)
        .map(|parsed| parsed.date_naive())
        .map_err(|_| ParseError::Date(input.to_string()))
}

/// Today in the calendar's timezone.
pub fn today(calendar: &Calendar) -> NaiveDate {
    calendar.local_day(Utc::now())
}

/// Parses a time of day into minutes after local midnight.
pub fn parse_time_of_day(time_str: &str) -> Result<i32, ParseError> {
    let input = time_str.trim().to_lowercase();

    let time = match input.as_str() {
        "noon" => NaiveTime::from_hms_opt(12, 0, 0),
        "midnight" => NaiveTime::from_hms_opt(0, 0, 0),
        _ => {
            let formats = [
                "%H:%M",    // 14:30
                "%H:%M:%S", // 14:30:00
                "%I:%M %p", // 9:00 AM
                "%I:%M%p",  // 9:00am
            ];
            formats
                .iter()
                .find_map(|format| NaiveTime::parse_from_str(&input, format).ok())
                .or_else(|| parse_bare_hour(&input))
        }
    };

    time.map(|t| (t.hour() * 60 + t.minute()) as i32)
        .ok_or_else(|| ParseError::Time(time_str.to_string()))
}

/// `14`, `9am`, `9 pm`. chrono cannot parse a time without minutes.
fn parse_bare_hour(input: &str) -> Option<NaiveTime> {
    let (hour, meridiem) = if let Some(hour) = input.strip_suffix("am") {
        (hour.trim(), Some(false))
    } else if let Some(hour) = input.strip_suffix("pm") {
        (hour.trim(), Some(true))
    } else {
        (input, None)
    };
    let hour: u32 = hour.parse().ok()?;

    let hour = match meridiem {
        None => hour,
        Some(_) if !(1..=12).contains(&hour) => return None,
        Some(false) => hour % 12,
        Some(true) => hour % 12 + 12,
    };
    NaiveTime::from_hms_opt(hour, 0, 0)
}

/// Parses a duration like `45`, `45m`, `2h` or `1h30m` into minutes.
pub fn parse_duration_minutes(duration_str: &str) -> Result<i32, ParseError> {
    let input = duration_str.trim().to_lowercase();
    let error = || ParseError::Duration(duration_str.to_string());

    if let Ok(minutes) = input.parse::<i32>() {
        return if minutes >= 0 { Ok(minutes) } else { Err(error()) };
    }

    let mut total = 0i32;
    let mut digits = String::new();
    let mut saw_unit = false;
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let value: i32 = digits.parse().map_err(|_| error())?;
        digits.clear();
        let minutes = match c {
            'h' => value.checked_mul(60).ok_or_else(error)?,
            'm' => {
                // Accept "min" and "mins"
                while chars.peek().is_some_and(|next| matches!(*next, 'i' | 'n' | 's')) {
                    chars.next();
                }
                value
            }
            _ => return Err(error()),
        };
        total = total.checked_add(minutes).ok_or_else(error)?;
        saw_unit = true;
    }

    if !digits.is_empty() || !saw_unit {
        return Err(error());
    }
    Ok(total)
}

/// Parses days like `mon,wed`, `monday,friday`, `weekdays` or `weekends`.
pub fn parse_weekdays(days_str: &str) -> Result<WeekdaySet, ParseError> {
    let input = days_str.trim().to_lowercase();

    match input.as_str() {
        "weekdays" | "workdays" => {
            return Ok([Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri]
                .into_iter()
                .collect())
        }
        "weekends" => return Ok([Weekday::Sat, Weekday::Sun].into_iter().collect()),
        "everyday" => {
            return Ok([
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
                Weekday::Sun,
            ]
            .into_iter()
            .collect())
        }
        _ => {}
    }

    let days: WeekdaySet = input
        .parse()
        .map_err(|_| ParseError::Days(days_str.to_string()))?;
    if days.is_empty() {
        return Err(ParseError::Days(days_str.to_string()));
    }
    Ok(days)
}

/// Formats minutes after midnight as `HH:MM`.
pub fn format_offset(minutes: i32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}
