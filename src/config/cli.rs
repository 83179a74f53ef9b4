use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use time::Date;

/// Command-line arguments for the dayboard binary.
#[derive(Debug, Parser)]
#[command(name = "dayboard", version, about = "Habits, reminders, projects and tags")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "DAYBOARD_CONFIG_FILE", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the API base URL.
    #[arg(long = "api-base-url", value_name = "URL", global = true)]
    pub api_base_url: Option<String>,

    /// Bearer token forwarded with every request.
    #[arg(long = "api-token", env = "DAYBOARD_API_TOKEN", value_name = "TOKEN", global = true)]
    pub api_token: Option<String>,

    /// Override the request timeout.
    #[arg(long = "api-timeout-ms", value_name = "MILLIS", global = true)]
    pub api_timeout_ms: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the freshness window of cached queries.
    #[arg(long = "cache-freshness-ms", value_name = "MILLIS", global = true)]
    pub cache_freshness_ms: Option<u64>,

    /// Override the retention window of unobserved entries.
    #[arg(long = "cache-retention-ms", value_name = "MILLIS", global = true)]
    pub cache_retention_ms: Option<u64>,

    /// Override the number of read retries after a network error.
    #[arg(long = "cache-query-retry-attempts", value_name = "COUNT", global = true)]
    pub cache_query_retry_attempts: Option<u32>,

    /// Override the UTC offset (hours) used to compute today's date.
    #[arg(
        long = "utc-offset-hours",
        value_name = "HOURS",
        allow_negative_numbers = true,
        global = true
    )]
    pub utc_offset_hours: Option<i8>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Habit queries and mutations.
    #[command(subcommand)]
    Habits(HabitsCommand),
    /// Reminder queries and mutations.
    #[command(subcommand)]
    Reminders(RemindersCommand),
    /// Project queries and mutations.
    #[command(subcommand)]
    Projects(ProjectsCommand),
    /// Tag queries and mutations.
    #[command(subcommand)]
    Tags(TagsCommand),
}

#[derive(Debug, Args, Default, Clone)]
pub struct PageArgs {
    /// Number of list pages to load.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub pages: u32,
}

#[derive(Debug, Subcommand, Clone)]
pub enum HabitsCommand {
    /// List habits.
    List(PageArgs),
    /// Habits due on a date (defaults to today).
    Day {
        #[arg(long, value_parser = parse_date)]
        date: Option<Date>,
    },
    /// Show one habit.
    Show { id: i64 },
    /// Completion statistics.
    Stats,
    /// Habits grouped by tag.
    Grouped,
    /// Create a habit.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        frequency: Option<String>,
    },
    /// Mark a habit done, skipped or undone for a date (defaults to today).
    Mark {
        id: i64,
        #[arg(long, value_enum, default_value_t = MarkArg::Done)]
        mark: MarkArg,
        #[arg(long, value_parser = parse_date)]
        date: Option<Date>,
    },
    /// Attach tags to a habit.
    Tag {
        id: i64,
        #[arg(long = "tag", required = true)]
        tag_ids: Vec<i64>,
        /// Detach instead of attach.
        #[arg(long)]
        detach: bool,
    },
    /// Delete a habit.
    Delete { id: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MarkArg {
    Done,
    Skip,
    Undo,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ReminderFilterArgs {
    /// Quick filter shortcut (all|today|scheduled|completed).
    #[arg(long)]
    pub quick: Option<String>,
    /// Tag chip.
    #[arg(long)]
    pub tag: Option<i64>,
    /// Advanced: status (active|completed|snoozed).
    #[arg(long)]
    pub status: Option<String>,
    /// Advanced: reminder type.
    #[arg(long = "type")]
    pub reminder_type: Option<String>,
    /// Advanced: first day (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    pub from: Option<Date>,
    /// Advanced: last day (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    pub to: Option<Date>,
    /// Advanced: sort field (created_at|remind_at|title).
    #[arg(long = "sort-by")]
    pub sort_by: Option<String>,
    /// Advanced: sort direction (asc|desc).
    #[arg(long = "sort-order")]
    pub sort_order: Option<String>,
    /// Free-text search.
    #[arg(long)]
    pub search: Option<String>,
    /// Filter search text locally instead of sending it to the server.
    #[arg(long = "client-search")]
    pub client_search: bool,
}

#[derive(Debug, Subcommand, Clone)]
pub enum RemindersCommand {
    /// List reminders.
    List {
        #[command(flatten)]
        filter: ReminderFilterArgs,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show one reminder.
    Show { id: i64 },
    /// Reminders coming up.
    Upcoming,
    /// Reminders past due.
    Overdue,
    /// Reminder statistics.
    Stats,
    /// Create a reminder.
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long = "type")]
        reminder_type: Option<String>,
        #[arg(long = "remind-at")]
        remind_at: Option<String>,
        #[arg(long)]
        tag: Option<i64>,
    },
    /// Mark a reminder completed.
    Complete { id: i64 },
    /// Snooze a reminder.
    Snooze {
        id: i64,
        #[arg(long, default_value_t = 10)]
        minutes: u32,
    },
    /// Delete a reminder.
    Delete { id: i64 },
}

#[derive(Debug, Subcommand, Clone)]
pub enum ProjectsCommand {
    /// List projects.
    List(PageArgs),
    /// Show one project.
    Show { id: i64 },
    /// Per-project statistics.
    Stats { id: i64 },
    /// Create a project.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Add an image by URL.
    AddImage {
        id: i64,
        #[arg(long)]
        url: String,
    },
    /// Make an image the primary one.
    PrimaryImage { id: i64, image_id: i64 },
    /// Remove an image.
    RemoveImage { id: i64, image_id: i64 },
    /// Delete a project.
    Delete { id: i64 },
}

#[derive(Debug, Subcommand, Clone)]
pub enum TagsCommand {
    /// List tags.
    List,
    /// Create a tag.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        color: Option<String>,
    },
    /// Rename or recolor a tag.
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },
    /// Delete a tag.
    Delete { id: i64 },
}

fn parse_date(value: &str) -> Result<Date, String> {
    Date::parse(
        value,
        time::macros::format_description!("[year]-[month]-[day]"),
    )
    .map_err(|err| format!("expected YYYY-MM-DD: {err}"))
}
