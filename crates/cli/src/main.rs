//! Scribe CLI - submit media jobs and follow their progress.

mod terminal;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use scribe_channel::{ApiClient, ClientConfig, SseProgressChannel};
use scribe_core::TaskId;
use scribe_progress::EstimatorConfig;
use scribe_session::{SessionConfig, SessionController, SessionHandle, SessionOutcome};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use terminal::TerminalPresenter;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scribe")]
#[command(about = "Submit transcription jobs and follow their progress", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend base URL
    #[arg(long, global = true, default_value = "http://127.0.0.1:8000")]
    server: String,

    /// Request timeout in seconds
    #[arg(long, global = true, default_value = "30")]
    timeout: u64,

    /// Seconds of silence on the progress stream before it counts as dropped
    #[arg(long, global = true, default_value = "60")]
    idle_timeout: u64,

    /// Estimator tick interval in milliseconds
    #[arg(long, global = true, default_value = "500")]
    tick_ms: u64,

    /// Skip the status fetch when the progress stream drops
    #[arg(long, global = true)]
    no_fallback: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a video URL and follow it to completion
    Submit {
        /// Video URL
        url: String,
        /// Save the transcript into this directory
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Follow an already submitted task
    Watch {
        /// Task ID
        task_id: String,
    },
    /// Print the current status of a task
    Status {
        /// Task ID
        task_id: String,
    },
    /// Save the transcript of a finished task
    Download {
        /// Task ID
        task_id: String,
        /// Output directory
        #[arg(long, default_value = ".")]
        output: PathBuf,
    },
    /// Cancel and delete a task on the server
    Cancel {
        /// Task ID
        task_id: String,
    },
    /// Show backend activity
    Active,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let client = ApiClient::new(
        ClientConfig::default()
            .with_base_url(cli.server.as_str())
            .with_timeout(Duration::from_secs(cli.timeout))
            .with_idle_timeout(Duration::from_secs(cli.idle_timeout.max(1))),
    );
    debug!("Using backend {}", client.base_url());

    let config = SessionConfig::default()
        .with_estimator(
            EstimatorConfig::default().with_tick_interval(Duration::from_millis(cli.tick_ms.max(1))),
        )
        .with_fallback(!cli.no_fallback);

    match cli.command {
        Commands::Submit { url, save } => {
            let controller = controller(&client, config);
            let handle = controller.submit(&url).await.context("Submission failed")?;
            println!("Task: {}", handle.task_id());

            let task_id = handle.task_id().clone();
            follow(&controller, handle).await?;

            if let Some(dir) = save {
                save_transcript(&client, &task_id, &dir).await?;
            }
        }
        Commands::Watch { task_id } => {
            let controller = controller(&client, config);
            let handle = controller.attach(TaskId::new(task_id)).await;
            follow(&controller, handle).await?;
        }
        Commands::Status { task_id } => {
            let status = client
                .fetch_status(&TaskId::new(task_id))
                .await
                .context("Status fetch failed")?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Download { task_id, output } => {
            save_transcript(&client, &TaskId::new(task_id), &output).await?;
        }
        Commands::Cancel { task_id } => {
            let task_id = TaskId::new(task_id);
            let message = client
                .cancel(&task_id)
                .await
                .with_context(|| format!("Could not cancel task {task_id}"))?;
            println!("{message}");
        }
        Commands::Active => {
            let active = client
                .active_tasks()
                .await
                .context("Could not reach backend")?;
            println!("Active tasks: {}", active.active_tasks);
            println!("Processing URLs: {}", active.processing_urls);
            for task_id in active.task_ids {
                println!("  {task_id}");
            }
        }
    }

    Ok(())
}

fn controller(client: &ApiClient, config: SessionConfig) -> SessionController {
    SessionController::with_config(
        Arc::new(client.clone()),
        Arc::new(SseProgressChannel::new(client.clone())),
        Arc::new(TerminalPresenter::new()),
        config,
    )
}

/// Wait for a session, stopping it on Ctrl-C.
async fn follow(controller: &SessionController, handle: SessionHandle) -> Result<()> {
    let task_id = handle.task_id().clone();

    let outcome = tokio::select! {
        outcome = handle.wait() => outcome,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping session for task {}", task_id.short());
            controller.stop(&task_id).await;
            SessionOutcome::Stopped
        }
    };

    match outcome {
        SessionOutcome::Completed(result) => {
            println!();
            println!("{}", result.script);
            Ok(())
        }
        SessionOutcome::Failed(e) => bail!("Task {task_id} failed: {e}"),
        SessionOutcome::Stopped => bail!("Task {task_id} was not followed to completion"),
    }
}

async fn save_transcript(client: &ApiClient, task_id: &TaskId, dir: &Path) -> Result<()> {
    let path = client
        .save_transcript(task_id, dir)
        .await
        .with_context(|| format!("Could not download transcript of task {task_id}"))?;
    println!("Saved {}", path.display());
    Ok(())
}
