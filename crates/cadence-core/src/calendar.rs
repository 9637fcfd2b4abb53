use crate::error::CoreError;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use std::str::FromStr;

/// Validate IANA timezone name
pub fn validate_timezone(timezone: &str) -> Result<Tz, CoreError> {
    Tz::from_str(timezone)
        .map_err(|_| CoreError::InvalidTimezone(format!("Invalid timezone: {}", timezone)))
}

/// The calendar every day-level computation is performed in.
///
/// Days are local calendar days in `timezone`; weeks begin on `first_weekday`.
/// Instants handed to persistence are always UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    timezone: Tz,
    first_weekday: Weekday,
}

impl Default for Calendar {
    fn default() -> Self {
        Self::utc()
    }
}

impl Calendar {
    pub fn new(timezone: Tz, first_weekday: Weekday) -> Self {
        Self { timezone, first_weekday }
    }

    pub fn utc() -> Self {
        Self::new(Tz::UTC, Weekday::Mon)
    }

    pub fn from_timezone_name(timezone: &str, first_weekday: Weekday) -> Result<Self, CoreError> {
        Ok(Self::new(validate_timezone(timezone)?, first_weekday))
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn first_weekday(&self) -> Weekday {
        self.first_weekday
    }

    /// Local midnight of `day` as a UTC instant.
    ///
    /// Zones that skip midnight on a DST change start the day at the first
    /// local time that exists.
    pub fn day_start(&self, day: NaiveDate) -> DateTime<Utc> {
        let midnight = day.and_time(NaiveTime::MIN);
        for shift in 0..=3 {
            let candidate = midnight + Duration::hours(shift);
            if let Some(local) = self.timezone.from_local_datetime(&candidate).earliest() {
                return local.with_timezone(&Utc);
            }
        }
        midnight.and_utc()
    }

    /// `day_start(day)` shifted by `minutes`. Offsets are applied to the
    /// instant, so a 02:30 offset on a spring-forward day lands at 03:30 local.
    pub fn at_offset(&self, day: NaiveDate, minutes: i64) -> DateTime<Utc> {
        self.day_start(day) + Duration::minutes(minutes)
    }

    /// The local calendar day an instant falls on.
    pub fn local_day(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.timezone).date_naive()
    }

    /// First day of the week containing `day`.
    pub fn week_start(&self, day: NaiveDate) -> NaiveDate {
        let since = (day.weekday().num_days_from_monday() + 7
            - self.first_weekday.num_days_from_monday())
            % 7;
        day - Duration::days(since as i64)
    }

    /// Whole calendar weeks from the week containing `from` to the week containing `to`.
    pub fn weeks_between(&self, from: NaiveDate, to: NaiveDate) -> i64 {
        (self.week_start(to) - self.week_start(from))
            .num_days()
            .div_euclid(7)
    }
}
