use cadence_core::calendar::{validate_timezone, Calendar};
use cadence_core::error::CoreError;
use cadence_core::models::PlanningConfig;
use cadence_core::plan::PlanOptions;
use chrono::Weekday;
use figment::{Figment, providers::{Format, Toml, Env}};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub database_path: String,
    /// IANA timezone that local days are computed in
    pub timezone: String,
    /// Day weeks start on, for weekly intervals
    pub first_weekday: String,
    /// Look-ahead window for this-and-future edits, in days
    pub days_ahead: u32,
    pub overwrite_actual: bool,
    pub detach_if_no_longer_matches: bool,
    /// How many start times an edit preview lists
    pub preview_sample_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "cadence.db".to_string(),
            timezone: detect_system_timezone(),
            first_weekday: "mon".to_string(),
            days_ahead: 30,
            overwrite_actual: false,
            detach_if_no_longer_matches: true,
            preview_sample_size: 3,
        }
    }
}

impl Config {
    pub fn new() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("cadence.toml"))
            .merge(Env::prefixed("CADENCE_"))
            .extract()
    }

    pub fn first_weekday(&self) -> Result<Weekday, CoreError> {
        self.first_weekday
            .parse::<Weekday>()
            .map_err(|_| CoreError::InvalidInput(format!("Invalid first weekday: {}", self.first_weekday)))
    }

    pub fn calendar(&self) -> Result<Calendar, CoreError> {
        Calendar::from_timezone_name(&self.timezone, self.first_weekday()?)
    }

    pub fn planning(&self) -> PlanningConfig {
        PlanningConfig { preview_sample_size: self.preview_sample_size }
    }

    /// Plan options before any command-line switches are applied
    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            overwrite_actual: self.overwrite_actual,
            detach_if_no_longer_matches: self.detach_if_no_longer_matches,
            days_ahead: self.days_ahead,
            ..PlanOptions::default()
        }
    }
}

/// Detects the system timezone, falling back to UTC if detection fails
pub fn detect_system_timezone() -> String {
    if let Ok(tz) = std::env::var("TZ") {
        if validate_timezone(&tz).is_ok() {
            return tz;
        }
    }

    if let Ok(local_tz) = iana_time_zone::get_timezone() {
        if validate_timezone(&local_tz).is_ok() {
            return local_tz;
        }
    }

    "UTC".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_build_a_calendar() {
        let config = Config { timezone: "UTC".to_string(), ..Config::default() };
        let calendar = config.calendar().unwrap();
        assert_eq!(calendar.first_weekday(), Weekday::Mon);
        assert_eq!(config.plan_options().days_ahead, 30);
        assert!(config.plan_options().detach_if_no_longer_matches);
        assert_eq!(config.planning().preview_sample_size, 3);
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let config = Config { timezone: "Mars/Olympus".to_string(), ..Config::default() };
        assert!(matches!(config.calendar(), Err(CoreError::InvalidTimezone(_))));

        let config = Config { first_weekday: "someday".to_string(), ..Config::default() };
        assert!(matches!(config.calendar(), Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn test_first_weekday_accepts_full_names() {
        let config = Config { first_weekday: "Sunday".to_string(), ..Config::default() };
        assert_eq!(config.first_weekday().unwrap(), Weekday::Sun);
    }
}
