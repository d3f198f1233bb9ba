use std::{io::Write, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    config::normalize_base_url,
    load_settings,
    validation::draft_from_form,
    ConfirmOutcome, ConfirmationController, HttpTaskGateway, IntentOutcome, SortKey, SortSpec,
    TaskGateway, TaskStore,
};
use shared::{
    domain::{TaskId, TaskStatus},
    protocol::{Task, TaskStats},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "taskctl", about = "Command line client for the task service")]
struct Args {
    /// Overrides the configured service base URL.
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Print tasks as JSON instead of a table.
    #[arg(long)]
    json: bool,
    /// Print request metrics after the command.
    #[arg(long)]
    metrics: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    List {
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, value_enum)]
        sort: Option<SortArg>,
        #[arg(long)]
        desc: bool,
    },
    Show {
        id: i64,
    },
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long, default_value = "PENDING")]
        status: String,
    },
    Update {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },
    Delete {
        id: i64,
        /// Skip the interactive confirmation.
        #[arg(long)]
        yes: bool,
    },
    Status {
        id: i64,
        status: TaskStatus,
        #[arg(long)]
        yes: bool,
    },
    /// Move a task to the next status in the cycle.
    Cycle {
        id: i64,
        #[arg(long)]
        yes: bool,
    },
    Stats,
    Ping,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SortArg {
    Title,
    Created,
    Updated,
}

impl From<SortArg> for SortKey {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Title => SortKey::Title,
            SortArg::Created => SortKey::CreatedAt,
            SortArg::Updated => SortKey::UpdatedAt,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(base_url) = &args.base_url {
        settings.base_url = normalize_base_url(base_url).context("invalid --base-url")?;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        settings.timeout_ms = timeout_ms;
    }
    info!(base_url = %settings.base_url, timeout_ms = settings.timeout_ms, "using task service");

    let gateway = Arc::new(HttpTaskGateway::new(&settings)?);
    let store = Arc::new(TaskStore::new(gateway.clone()));
    let controller = ConfirmationController::new(store.clone());

    let result = run(&args, &gateway, &store, &controller).await;

    if args.metrics {
        print_metrics(&gateway).await;
    }
    result
}

async fn run(
    args: &Args,
    gateway: &HttpTaskGateway,
    store: &TaskStore,
    controller: &ConfirmationController,
) -> Result<()> {
    match &args.command {
        Command::List {
            status,
            search,
            sort,
            desc,
        } => {
            refresh(store).await?;
            store.filter_by_status(*status).await;
            if let Some(term) = search {
                store.search(term).await;
            }
            let sort = sort.map(|key| {
                if *desc {
                    SortSpec::desc(key.into())
                } else {
                    SortSpec::asc(key.into())
                }
            });
            store.sort_by(sort).await;
            print_tasks(&store.tasks().await, args.json)?;
        }
        Command::Show { id } => {
            let task = gateway.get_by_id(TaskId(*id)).await?;
            print_tasks(std::slice::from_ref(&task), args.json)?;
        }
        Command::Create {
            title,
            description,
            status,
        } => {
            let draft = draft_from_form(title, description, status)?;
            match store.create(draft).await {
                Some(task) => println!("created task {}", task.id),
                None => bail!(store_error(store).await),
            }
        }
        Command::Update {
            id,
            title,
            description,
            status,
        } => {
            let current = gateway.get_by_id(TaskId(*id)).await?;
            let draft = draft_from_form(
                title.as_deref().unwrap_or(&current.title),
                description.as_deref().unwrap_or(&current.description),
                status.as_deref().unwrap_or(current.status.as_str()),
            )?;
            match store.update(current.id, draft).await {
                Some(task) => println!("updated task {}", task.id),
                None => bail!(store_error(store).await),
            }
        }
        Command::Delete { id, yes } => {
            refresh(store).await?;
            let outcome = controller.request_delete(TaskId(*id)).await;
            settle_intent(controller, outcome, *yes).await?;
        }
        Command::Status { id, status, yes } => {
            refresh(store).await?;
            let outcome = controller
                .request_status_change(TaskId(*id), *status)
                .await;
            settle_intent(controller, outcome, *yes).await?;
        }
        Command::Cycle { id, yes } => {
            refresh(store).await?;
            let outcome = controller.request_status_cycle(TaskId(*id)).await;
            settle_intent(controller, outcome, *yes).await?;
        }
        Command::Stats => {
            let stats = gateway.get_stats().await?;
            print_stats(&stats);
        }
        Command::Ping => {
            if gateway.ping().await {
                println!("{} is reachable", gateway.base_url());
            } else {
                bail!("{} is not reachable", gateway.base_url());
            }
        }
    }
    Ok(())
}

async fn refresh(store: &TaskStore) -> Result<()> {
    if store.refresh().await {
        Ok(())
    } else {
        bail!(store_error(store).await)
    }
}

async fn store_error(store: &TaskStore) -> String {
    store
        .last_error()
        .await
        .unwrap_or_else(|| "task service request failed".to_string())
}

async fn settle_intent(
    controller: &ConfirmationController,
    outcome: IntentOutcome,
    assume_yes: bool,
) -> Result<()> {
    match outcome {
        IntentOutcome::Prompted | IntentOutcome::Replaced(_) => {}
        IntentOutcome::Unchanged => {
            println!("nothing to do");
            return Ok(());
        }
        IntentOutcome::Busy => bail!("another change is still running"),
    }

    let Some(prompt) = controller.prompt().await else {
        bail!("no confirmation is pending");
    };
    if prompt.message.is_empty() {
        controller.cancel().await;
        bail!("task no longer exists");
    }

    println!("{}: {}", prompt.title, prompt.message);
    if !assume_yes && !ask_yes_no()? {
        controller.cancel().await;
        println!("cancelled");
        return Ok(());
    }

    match controller.confirm().await {
        ConfirmOutcome::Succeeded(action) => {
            println!("done: task {}", action.task_id());
            Ok(())
        }
        ConfirmOutcome::Failed(_) | ConfirmOutcome::Skipped(_) => {
            bail!(store_error(controller.store()).await)
        }
        ConfirmOutcome::NothingPending | ConfirmOutcome::Busy => {
            bail!("confirmation could not be executed")
        }
    }
}

fn ask_yes_no() -> Result<bool> {
    print!("Proceed? [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn print_tasks(tasks: &[Task], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(tasks)?);
        return Ok(());
    }
    if tasks.is_empty() {
        println!("no tasks");
        return Ok(());
    }
    for task in tasks {
        let marker = if task.status.is_final() { "x" } else { " " };
        println!(
            "{:>5} [{marker}] {:<10} {:<40} {}",
            task.id,
            task.status.label(),
            task.title,
            task.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

fn print_stats(stats: &TaskStats) {
    println!("total      {}", stats.total);
    for status in TaskStatus::ALL {
        println!("{:<10} {}", status.label().to_ascii_lowercase(), stats.count(status));
    }
}

async fn print_metrics(gateway: &HttpTaskGateway) {
    let metrics = gateway.metrics().await;
    eprintln!(
        "{} requests, avg {} ms, {}% errors",
        metrics.len(),
        gateway.average_response_time().await.as_millis(),
        gateway.error_rate().await
    );
    for metric in metrics {
        eprintln!(
            "  {} {} -> {} in {} ms",
            metric.method,
            metric.path,
            metric.status,
            metric.duration.as_millis()
        );
    }
}
