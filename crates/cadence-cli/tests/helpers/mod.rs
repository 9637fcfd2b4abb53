use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::TempDir;

/// Test harness for running CLI commands with temporary databases
pub struct CliTestHarness {
    // Keeps the directory alive for the harness's lifetime
    _temp_dir: TempDir,
    db_path: PathBuf,
}

impl CliTestHarness {
    /// Create a new test harness with a temporary database
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");

        Self {
            _temp_dir: temp_dir,
            db_path,
        }
    }

    /// Get a Command instance configured for testing
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("cadence").expect("Failed to find cadence binary");

        cmd.env("CADENCE_DATABASE_PATH", &self.db_path);
        cmd.env("CADENCE_TIMEZONE", "UTC");
        cmd.env_remove("CADENCE_LOG");

        cmd
    }

    /// Helper to run a command and assert success
    pub fn run_success(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().success()
    }

    /// Helper to run a command and assert failure
    pub fn run_failure(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().failure()
    }
}

/// Common test fixtures
pub struct TestFixtures;

impl TestFixtures {
    /// A daily 07:00 template starting on 2025-01-01
    pub fn daily_template_args() -> Vec<&'static str> {
        vec![
            "template", "add", "Morning run",
            "--at", "7:00",
            "--duration", "30m",
            "--every", "daily",
            "--from", "2025-01-01",
        ]
    }

    /// Mondays and Thursdays at 18:00 from 2025-01-06
    pub fn weekly_template_args() -> Vec<&'static str> {
        vec![
            "template", "add", "Climbing",
            "--at", "6:00 PM",
            "--duration", "1h30m",
            "--every", "weekly",
            "--on", "mon,thu",
            "--from", "2025-01-06",
        ]
    }
}

/// Utility functions for test assertions
pub mod assertions {
    use predicates::prelude::*;

    pub fn template_created_successfully() -> impl Predicate<str> {
        predicate::str::contains("✓").and(predicate::str::contains("Created template"))
    }

    pub fn has_template_table_headers() -> impl Predicate<str> {
        predicate::str::contains("Title")
            .and(predicate::str::contains("Schedule"))
            .and(predicate::str::contains("Updated"))
    }

    pub fn empty_day() -> impl Predicate<str> {
        predicate::str::contains("Nothing planned")
    }

    pub fn has_error() -> impl Predicate<str> {
        predicate::str::contains("Error")
    }
}
