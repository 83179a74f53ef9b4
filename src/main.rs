use std::process;

use dayboard::{
    api::{self, QuerySpec, habits, projects, reminders, tags},
    application::{SyncClient, error::AppError},
    cache::EntrySnapshot,
    config::{
        self, Command, HabitsCommand, MarkArg, ProjectsCommand, ReminderFilterArgs,
        RemindersCommand, TagsCommand,
    },
    filter::{AdvancedFilter, FilterSpec, QuickFilter, SearchMode},
    infra::telemetry,
    mutation::{HabitMark, Mutation},
};
use dayboard_api_types::{
    HabitCreateRequest, ProjectCreateRequest, Reminder, ReminderCreateRequest, TagCreateRequest,
    TagUpdateRequest,
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{Dispatch, Level, dispatcher, error};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;
    let client = SyncClient::from_settings(&settings)?;

    let output = match cli_args.command {
        Command::Habits(command) => run_habits(&client, command).await?,
        Command::Reminders(command) => run_reminders(&client, command).await?,
        Command::Projects(command) => run_projects(&client, command).await?,
        Command::Tags(command) => run_tags(&client, command).await?,
    };

    let rendered = serde_json::to_string_pretty(&output)?;
    println!("{rendered}");
    Ok(())
}

async fn run_habits(client: &SyncClient, command: HabitsCommand) -> Result<Value, AppError> {
    let transport = client.transport();
    match command {
        HabitsCommand::List(page) => {
            let spec = habits::list_query(transport, &Vec::new());
            list(client, spec, page.pages).await
        }
        HabitsCommand::Day { date } => {
            let date = date.unwrap_or_else(|| client.today());
            document(client, habits::for_date_query(transport, date)).await
        }
        HabitsCommand::Show { id } => document(client, habits::detail_query(transport, id)).await,
        HabitsCommand::Stats => document(client, habits::stats_query(transport)).await,
        HabitsCommand::Grouped => document(client, habits::grouped_query(transport)).await,
        HabitsCommand::Create {
            name,
            description,
            frequency,
        } => {
            let request = HabitCreateRequest {
                name,
                description,
                frequency,
                ..Default::default()
            };
            perform(client, habits::create(&request)?).await
        }
        HabitsCommand::Mark { id, mark, date } => {
            let date = date.unwrap_or_else(|| client.today());
            let mark = match mark {
                MarkArg::Done => HabitMark::Done,
                MarkArg::Skip => HabitMark::Skip,
                MarkArg::Undo => HabitMark::Undo,
            };
            perform(client, habits::mark(id, date, mark)?).await
        }
        HabitsCommand::Tag {
            id,
            tag_ids,
            detach,
        } => {
            let mutation = if detach {
                habits::detach_tags(id, tag_ids)?
            } else {
                habits::attach_tags(id, tag_ids)?
            };
            perform(client, mutation).await
        }
        HabitsCommand::Delete { id } => perform(client, habits::delete(id)).await,
    }
}

async fn run_reminders(client: &SyncClient, command: RemindersCommand) -> Result<Value, AppError> {
    let transport = client.transport();
    match command {
        RemindersCommand::List { filter, page } => {
            let spec = reminder_filter(filter)?;
            let params = spec.compile(client.today());
            let snapshot = client
                .fetch_pages(reminders::list_query(transport, &params), page.pages)
                .await?;
            if let Some(error) = snapshot.error.clone() {
                return Err(error.into());
            }
            let listed: Vec<Reminder> = api::records(&snapshot, reminders::ITEMS_FIELD)?;
            let listed: Vec<&Reminder> = listed
                .iter()
                .filter(|reminder| spec.matches_search(*reminder))
                .collect();
            Ok(json!({
                "key": snapshot.key.to_string(),
                "hasNextPage": snapshot.has_next_page(),
                "reminders": listed,
            }))
        }
        RemindersCommand::Show { id } => {
            document(client, reminders::detail_query(transport, id)).await
        }
        RemindersCommand::Upcoming => document(client, reminders::upcoming_query(transport)).await,
        RemindersCommand::Overdue => document(client, reminders::overdue_query(transport)).await,
        RemindersCommand::Stats => document(client, reminders::stats_query(transport)).await,
        RemindersCommand::Create {
            title,
            description,
            reminder_type,
            remind_at,
            tag,
        } => {
            let request = ReminderCreateRequest {
                title,
                description,
                reminder_type,
                remind_at,
                tag_id: tag,
            };
            perform(client, reminders::create(&request)?).await
        }
        RemindersCommand::Complete { id } => perform(client, reminders::complete(id)).await,
        RemindersCommand::Snooze { id, minutes } => {
            perform(client, reminders::snooze(id, minutes)?).await
        }
        RemindersCommand::Delete { id } => perform(client, reminders::delete(id)).await,
    }
}

async fn run_projects(client: &SyncClient, command: ProjectsCommand) -> Result<Value, AppError> {
    let transport = client.transport();
    match command {
        ProjectsCommand::List(page) => {
            let spec = projects::list_query(transport, &Vec::new());
            list(client, spec, page.pages).await
        }
        ProjectsCommand::Show { id } => {
            document(client, projects::detail_query(transport, id)).await
        }
        ProjectsCommand::Stats { id } => {
            document(client, projects::stats_query(transport, id)).await
        }
        ProjectsCommand::Create { name, description } => {
            let request = ProjectCreateRequest { name, description };
            perform(client, projects::create(&request)?).await
        }
        ProjectsCommand::AddImage { id, url } => {
            perform(client, projects::add_image(id, url)?).await
        }
        ProjectsCommand::PrimaryImage { id, image_id } => {
            perform(client, projects::set_primary_image(id, image_id)).await
        }
        ProjectsCommand::RemoveImage { id, image_id } => {
            perform(client, projects::remove_image(id, image_id)).await
        }
        ProjectsCommand::Delete { id } => perform(client, projects::delete(id)).await,
    }
}

async fn run_tags(client: &SyncClient, command: TagsCommand) -> Result<Value, AppError> {
    match command {
        TagsCommand::List => document(client, tags::list_query(client.transport())).await,
        TagsCommand::Create { name, color } => {
            perform(client, tags::create(&TagCreateRequest { name, color })?).await
        }
        TagsCommand::Update { id, name, color } => {
            if name.is_none() && color.is_none() {
                return Err(AppError::validation(
                    "tags update requires at least one of --name or --color",
                ));
            }
            perform(client, tags::update(id, &TagUpdateRequest { name, color })?).await
        }
        TagsCommand::Delete { id } => perform(client, tags::delete(id)).await,
    }
}

fn reminder_filter(args: ReminderFilterArgs) -> Result<FilterSpec, AppError> {
    let search_mode = if args.client_search {
        SearchMode::Client
    } else {
        SearchMode::Server
    };
    let mut spec = FilterSpec::new(search_mode);

    if let Some(quick) = args.quick.as_deref() {
        let quick: QuickFilter = quick.parse().map_err(AppError::validation)?;
        spec.select_quick(quick);
    }
    spec.select_tag(args.tag);

    let form = AdvancedFilter {
        status: args
            .status
            .map(|value| vocabulary("status", value))
            .transpose()?,
        tag_id: None,
        reminder_type: args.reminder_type,
        date_from: args.from,
        date_to: args.to,
        search: String::new(),
        sort_by: args
            .sort_by
            .map(|value| vocabulary("sort-by", value))
            .transpose()?,
        sort_order: args
            .sort_order
            .map(|value| vocabulary("sort-order", value))
            .transpose()?,
    };
    if !form.is_default() {
        if args.quick.is_some() || args.tag.is_some() {
            return Err(AppError::validation(
                "--quick/--tag cannot be combined with advanced filter options",
            ));
        }
        spec.apply_advanced(form);
    }

    if let Some(search) = args.search {
        spec.set_search(search);
    }
    Ok(spec)
}

fn vocabulary<T: DeserializeOwned>(field: &str, value: String) -> Result<T, AppError> {
    serde_json::from_value(Value::String(value.clone()))
        .map_err(|_| AppError::validation(format!("unsupported --{field} value `{value}`")))
}

async fn document(client: &SyncClient, spec: QuerySpec) -> Result<Value, AppError> {
    let snapshot = client.fetch(spec).await?;
    render(snapshot)
}

async fn list(client: &SyncClient, spec: QuerySpec, pages: u32) -> Result<Value, AppError> {
    let snapshot = client.fetch_pages(spec, pages).await?;
    render(snapshot)
}

fn render(snapshot: EntrySnapshot) -> Result<Value, AppError> {
    if let Some(error) = snapshot.error {
        return Err(error.into());
    }
    Ok(json!({
        "key": snapshot.key.to_string(),
        "hasNextPage": snapshot.has_next_page(),
        "data": snapshot.data.map(|data| data.to_json()).unwrap_or(Value::Null),
    }))
}

async fn perform(client: &SyncClient, mutation: Mutation) -> Result<Value, AppError> {
    Ok(client.perform(mutation).await?)
}
