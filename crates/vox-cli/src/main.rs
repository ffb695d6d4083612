mod config;
mod executor;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use vox_core::{CoreConfig, CreateRequest, RiskLevel, SessionManager, TaskManager, TaskRuntime};
use vox_store::{SqliteTaskStore, StoreConfig};

use crate::config::{load_config, VoxConfig};
use crate::executor::EchoExecutor;

#[derive(Parser)]
#[command(name = "vox", about = "Task orchestration core for a voice-assistant backend")]
struct Cli {
    /// Override the config file path (defaults to $VOX_CONFIG or ~/.config/vox/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the store's database URL regardless of config file contents.
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a session.
    SessionCreate {
        user_id: String,
        persona_id: String,
        #[arg(long)]
        voice_id: Option<String>,
    },
    /// End a session.
    SessionEnd { session_id: String },
    /// Create a task from an intent, starting or queuing it.
    Create {
        session_id: String,
        user_id: String,
        intent_text: String,
        #[arg(long)]
        summary: Option<String>,
        #[arg(long, default_value = "low")]
        risk: String,
        #[arg(long)]
        requires_approval: bool,
    },
    /// Approve or deny a task awaiting approval.
    Approve {
        task_id: String,
        #[arg(long)]
        deny: bool,
    },
    /// Pause the active task for its session.
    Pause {
        task_id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Resume a paused (or still-planned) task.
    Resume { task_id: String },
    /// Cancel a task.
    Cancel {
        task_id: String,
        #[arg(long, default_value = "cancelled by operator")]
        reason: String,
    },
    /// Fetch a single task.
    Get { task_id: String },
    /// List tasks for a session, newest first.
    List {
        session_id: String,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// List the recorded event history for a task.
    Events {
        task_id: String,
        #[arg(long, default_value_t = 0)]
        limit: i64,
    },
    /// Print aggregate counts: a doctor-style health summary.
    Status,
    /// Print the events a slow subscriber would have missed.
    Reconcile { task_id: String },
}

fn parse_risk(raw: &str) -> RiskLevel {
    match raw.to_lowercase().as_str() {
        "medium" => RiskLevel::Medium,
        "high" => RiskLevel::High,
        "blocked" => RiskLevel::Blocked,
        _ => RiskLevel::Low,
    }
}

struct App {
    sessions: Arc<SessionManager>,
    runtime: Arc<TaskRuntime>,
    manager: Arc<TaskManager>,
}

async fn build_app(cli: &Cli, config: &VoxConfig) -> Result<App> {
    let core = CoreConfig::from_seconds(
        config.session.inactivity_timeout_secs,
        config.session.ended_retention_secs,
        config.task.idempotency_window_secs,
        config.task.event_history_max,
        config.task.task_timeout_secs,
        config.task.runtime_enabled,
    );

    let database_url = cli
        .database_url
        .clone()
        .or_else(|| config.store.database_url.clone());

    let store = match database_url {
        Some(url) => {
            let store_config = StoreConfig { url };
            let store = SqliteTaskStore::connect(&store_config)
                .await
                .context("connecting to the task store")?;
            Some(Arc::new(store) as Arc<dyn vox_core::TaskStore>)
        }
        None => None,
    };

    let sessions = SessionManager::new(core.session);
    let manager = TaskManager::new(core.task, store);
    let runtime = TaskRuntime::new(manager.clone(), Arc::new(EchoExecutor), core.runtime);

    Ok(App {
        sessions,
        runtime,
        manager,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let app = build_app(&cli, &config).await?;

    match cli.command {
        Command::SessionCreate {
            user_id,
            persona_id,
            voice_id,
        } => {
            let session = app.sessions.create(&user_id, &persona_id, voice_id.as_deref());
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        Command::SessionEnd { session_id } => {
            let session = app
                .sessions
                .end(&session_id)
                .context("ending session")?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        Command::Create {
            session_id,
            user_id,
            intent_text,
            summary,
            risk,
            requires_approval,
        } => {
            let req = CreateRequest {
                session_id,
                user_id,
                intent_text,
                mode: None,
                priority: None,
            };
            let outcome = app
                .runtime
                .create(req, summary, parse_risk(&risk), requires_approval)
                .await
                .context("creating task")?;
            println!("{}", serde_json::to_string_pretty(&outcome.task)?);
        }
        Command::Approve { task_id, deny } => {
            let outcome = app
                .runtime
                .approve(&task_id, !deny)
                .await
                .context("approving task")?;
            println!("{}", serde_json::to_string_pretty(&outcome.task)?);
        }
        Command::Pause { task_id, reason } => {
            let outcome = app
                .runtime
                .pause(&task_id, reason)
                .await
                .context("pausing task")?;
            println!("{}", serde_json::to_string_pretty(&outcome.task)?);
        }
        Command::Resume { task_id } => {
            let outcome = app.runtime.resume(&task_id).await.context("resuming task")?;
            println!("{}", serde_json::to_string_pretty(&outcome.task)?);
        }
        Command::Cancel { task_id, reason } => {
            let outcome = app
                .runtime
                .cancel(&task_id, reason)
                .await
                .context("cancelling task")?;
            println!("{}", serde_json::to_string_pretty(&outcome.task)?);
        }
        Command::Get { task_id } => {
            let task = app.manager.get(&task_id).await.context("fetching task")?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        Command::List { session_id, limit } => {
            let tasks = app.manager.list_by_session(&session_id, limit).await;
            println!("{}", serde_json::to_string_pretty(&tasks)?);
        }
        Command::Events { task_id, limit } => {
            let events = app
                .manager
                .list_events(&task_id, limit)
                .await
                .context("listing events")?;
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
        Command::Status => {
            let (running, queued) = app.manager.snapshot_counts();
            let active_sessions = app.sessions.active_count();
            let janitor_ticks = app.sessions.janitor_tick_count();
            let last_run = app.sessions.last_janitor_run();
            println!(
                "store: {}\nactive_sessions: {active_sessions}\nrunning_tasks: {running}\nqueued_tasks: {queued}\njanitor_ticks: {janitor_ticks}\nlast_janitor_run: {last_run:?}",
                app.runtime.store_mode(),
            );
        }
        Command::Reconcile { task_id } => {
            let events = app
                .manager
                .list_events(&task_id, 0)
                .await
                .context("reconciling events")?;
            for event in events {
                println!(
                    "{} [{}] {}",
                    event.timestamp, event.event_type, event.task_id
                );
            }
        }
    }

    Ok(())
}
