use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::calendar::Calendar;
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceKind {
    /// A single occurrence on the start date
    None,
    Daily,
    /// On selected weekdays
    Weekly,
}

impl fmt::Display for RecurrenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecurrenceKind::None => write!(f, "none"),
            RecurrenceKind::Daily => write!(f, "daily"),
            RecurrenceKind::Weekly => write!(f, "weekly"),
        }
    }
}

impl FromStr for RecurrenceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "once" => Ok(RecurrenceKind::None),
            "daily" | "day" => Ok(RecurrenceKind::Daily),
            "weekly" | "week" => Ok(RecurrenceKind::Weekly),
            _ => Err(CoreError::InvalidInput(format!("Invalid recurrence kind: {}", s))),
        }
    }
}

/// A set of weekdays, stored as `MO,TU,WE` text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct WeekdaySet(u8);

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

fn parse_weekday(s: &str) -> Option<Weekday> {
    match s.to_uppercase().as_str() {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => s.parse::<Weekday>().ok(),
    }
}

impl WeekdaySet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn single(day: Weekday) -> Self {
        Self::empty().with(day)
    }

    pub fn with(mut self, day: Weekday) -> Self {
        self.0 |= 1 << day.num_days_from_monday();
        self
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        WEEKDAYS.into_iter().filter(move |day| self.contains(*day))
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), WeekdaySet::with)
    }
}

impl fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes: Vec<&str> = self.iter().map(weekday_code).collect();
        write!(f, "{}", codes.join(","))
    }
}

impl FromStr for WeekdaySet {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                parse_weekday(part)
                    .ok_or_else(|| CoreError::InvalidInput(format!("Invalid weekday: {}", part)))
            })
            .collect()
    }
}

impl From<WeekdaySet> for String {
    fn from(set: WeekdaySet) -> Self {
        set.to_string()
    }
}

impl TryFrom<String> for WeekdaySet {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// When a template generates occurrences.
///
/// `matches` is a pure predicate over calendar days; time of day plays no
/// part. Both `start_date` and `end_date` are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub kind: RecurrenceKind,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    /// Every n-th day or week; values below 1 behave as 1
    pub interval: u32,
    /// Used by weekly rules only. Empty means "the start date's weekday".
    pub weekdays: WeekdaySet,
}

impl RecurrenceRule {
    pub fn new(kind: RecurrenceKind, start_date: NaiveDate) -> Self {
        Self {
            kind,
            start_date,
            end_date: None,
            interval: 1,
            weekdays: WeekdaySet::empty(),
        }
    }

    pub fn once(day: NaiveDate) -> Self {
        Self::new(RecurrenceKind::None, day)
    }

    pub fn daily(start_date: NaiveDate) -> Self {
        Self::new(RecurrenceKind::Daily, start_date)
    }

    pub fn weekly(start_date: NaiveDate, weekdays: WeekdaySet) -> Self {
        Self { weekdays, ..Self::new(RecurrenceKind::Weekly, start_date) }
    }

    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = interval.max(1);
        self
    }

    pub fn with_end_date(mut self, end_date: Option<NaiveDate>) -> Self {
        self.end_date = end_date;
        self
    }

    fn step(&self) -> i64 {
        self.interval.max(1) as i64
    }

    fn within_bounds(&self, day: NaiveDate) -> bool {
        day >= self.start_date && self.end_date.map_or(true, |end| day <= end)
    }

    fn effective_weekdays(&self) -> WeekdaySet {
        if self.weekdays.is_empty() {
            WeekdaySet::single(self.start_date.weekday())
        } else {
            self.weekdays
        }
    }

    /// Does this rule produce an occurrence on `day`?
    pub fn matches(&self, day: NaiveDate, calendar: &Calendar) -> bool {
        match self.kind {
            RecurrenceKind::None => day == self.start_date,
            RecurrenceKind::Daily => {
                self.within_bounds(day) && (day - self.start_date).num_days() % self.step() == 0
            }
            RecurrenceKind::Weekly => {
                self.within_bounds(day)
                    && self.effective_weekdays().contains(day.weekday())
                    && calendar.weeks_between(self.start_date, day) % self.step() == 0
            }
        }
    }

    /// Matching days in `[from, to]`, at most `limit` of them.
    pub fn days_between(&self, from: NaiveDate, to: NaiveDate, limit: usize, calendar: &Calendar) -> Vec<NaiveDate> {
        let first = from.max(self.start_date);
        let last = self.end_date.map_or(to, |end| end.min(to));
        let mut days = Vec::new();
        let mut day = first;
        while day <= last && days.len() < limit {
            if self.matches(day, calendar) {
                days.push(day);
            }
            day += Duration::days(1);
        }
        days
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RecurrenceKind::None => write!(f, "once on {}", self.start_date)?,
            RecurrenceKind::Daily if self.step() == 1 => write!(f, "daily")?,
            RecurrenceKind::Daily => write!(f, "every {} days", self.step())?,
            RecurrenceKind::Weekly if self.step() == 1 => {
                write!(f, "weekly on {}", self.effective_weekdays())?
            }
            RecurrenceKind::Weekly => {
                write!(f, "every {} weeks on {}", self.step(), self.effective_weekdays())?
            }
        }
        if self.kind != RecurrenceKind::None {
            write!(f, " from {}", self.start_date)?;
            if let Some(end) = self.end_date {
                write!(f, " until {}", end)?;
            }
        }
        Ok(())
    }
}
