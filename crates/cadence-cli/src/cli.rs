use clap::{Parser, Subcommand, ValueEnum};
use cadence_core::models::EditScope;
use cadence_core::recurrence::RecurrenceKind;

#[derive(Parser, Debug)]
#[command(
    name = "cadence",
    author,
    version,
    about = "Recurring activity templates and the days they fill",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Manage templates
    Template(TemplateCommand),
    /// Show a day, creating its occurrences if needed
    Day(DayCommand),
    /// Edit a template and propagate the change to its occurrences
    Edit(EditCommand),
    /// Skip one day of a template
    Skip(OverrideCommand),
    /// Delete one day of a template
    Delete(OverrideCommand),
    /// Lift a skip or delete so the day is generated again
    Restore(OverrideCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct TemplateCommand {
    #[command(subcommand)]
    pub action: TemplateAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TemplateAction {
    /// Add a new template
    Add(TemplateAddCommand),
    /// List all templates
    List,
    /// Enable a template
    Enable(TemplateRef),
    /// Disable a template
    Disable(TemplateRef),
}

#[derive(Parser, Debug, Clone)]
pub struct TemplateAddCommand {
    /// The title of the activity
    pub title: String,
    /// Local start time
    #[clap(long, default_value = "09:00", help = "Local start time (e.g., '7:30 AM', '18:00')")]
    pub at: String,
    /// Duration of each occurrence
    #[clap(long, default_value = "30m", help = "Duration (e.g., '45m', '1h30m', '90')")]
    pub duration: String,
    /// How often the template repeats
    #[clap(long, value_enum, default_value_t = Frequency::Daily)]
    pub every: Frequency,
    /// Days of week for weekly templates
    #[clap(long, help = "Days of week (mon,tue,wed or weekdays/weekends)")]
    pub on: Option<String>,
    /// Repeat every N days or weeks
    #[clap(long, default_value_t = 1)]
    pub interval: u32,
    /// First day of the template
    #[clap(long, help = "First day (e.g., '2025-01-10', 'today', 'next monday')")]
    pub from: Option<String>,
    /// Last day of the template, inclusive
    #[clap(long)]
    pub until: Option<String>,
    /// Link occurrences to a workout routine
    #[clap(long)]
    pub routine: Option<uuid::Uuid>,
    /// Create the template disabled
    #[clap(long)]
    pub disabled: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct TemplateRef {
    /// Template title or ID prefix
    pub template: String,
}

#[derive(Parser, Debug, Clone)]
pub struct DayCommand {
    /// The day to show, defaults to today
    pub date: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct EditCommand {
    /// Template title or ID prefix
    pub template: String,

    /// Which occurrences the change reaches
    #[arg(long, value_enum, default_value_t = ScopeArg::Future)]
    pub scope: ScopeArg,

    /// The day the edit is made from, defaults to today
    #[arg(long)]
    pub day: Option<String>,

    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub at: Option<String>,
    #[arg(long)]
    pub duration: Option<String>,
    #[arg(long, value_enum)]
    pub every: Option<Frequency>,
    #[arg(long)]
    pub on: Option<String>,
    #[arg(long)]
    pub interval: Option<u32>,
    #[arg(long)]
    pub until: Option<String>,
    #[arg(long, conflicts_with = "until")]
    pub until_clear: bool,

    #[arg(long, conflicts_with = "disable")]
    pub enable: bool,
    #[arg(long)]
    pub disable: bool,

    /// Overwrite titles and times even where they were changed by hand
    #[arg(long)]
    pub overwrite: bool,
    /// Keep occurrences linked on days the template no longer applies to
    #[arg(long)]
    pub keep_unmatched: bool,
    /// Create the day's occurrence even if the template does not apply that day
    #[arg(long)]
    pub force_create: bool,
    /// Lift a skip or delete on the edit day
    #[arg(long)]
    pub resurrect: bool,
    /// Look-ahead window for future edits, in days
    #[arg(long)]
    pub days_ahead: Option<u32>,

    /// Show the plan without applying it
    #[arg(long)]
    pub dry_run: bool,
    /// Apply without asking for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct OverrideCommand {
    /// Template title or ID prefix
    pub template: String,
    /// The day to change
    pub date: String,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Frequency {
    Once,
    Daily,
    Weekly,
}

impl From<Frequency> for RecurrenceKind {
    fn from(frequency: Frequency) -> Self {
        match frequency {
            Frequency::Once => RecurrenceKind::None,
            Frequency::Daily => RecurrenceKind::Daily,
            Frequency::Weekly => RecurrenceKind::Weekly,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeArg {
    /// Only the occurrence on the edit day
    This,
    /// The edit day and the days after it
    Future,
    /// Every occurrence of the template
    All,
}

impl From<ScopeArg> for EditScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::This => EditScope::ThisInstance,
            ScopeArg::Future => EditScope::ThisAndFuture,
            ScopeArg::All => EditScope::AllInstances,
        }
    }
}
