use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use postier::config::ServerConfig;
use postier::enhance::{EnhancerConfig, GeminiEnhancer};
use postier::mail::{MailerConfig, SmtpMailer};
use postier::pipeline::{PipelineContext, SendEmailTask};
use postier::queue::{
    MemoryQueue, PgQueue, QueueConfig, QueueProvider, TaskRegistry, Worker, WorkerConfig,
    WorkerHandle,
};
use postier::EnvConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "postier", about = "Queue-backed email delivery service")]
struct Cli {
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbosity: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP intake against the Postgres queue
    Serve,
    /// Run delivery workers against the Postgres queue
    Worker,
    /// Run the HTTP intake and workers in one process over an in-memory queue
    Standalone,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_level = match cli.verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Serve => {
            let queue = connect_queue().await?;
            serve_api(queue).await
        }
        Commands::Worker => {
            let queue = connect_queue().await?;
            let worker = start_worker(queue)?;
            postier::serve::shutdown_signal().await;
            worker.shutdown().await;
            Ok(())
        }
        Commands::Standalone => {
            tracing::warn!("standalone mode: queued tasks are lost on exit");
            let queue = MemoryQueue::new();
            let worker = start_worker(queue.clone())?;
            let served = serve_api(queue).await;
            worker.shutdown().await;
            served
        }
    }
}

async fn connect_queue() -> Result<PgQueue> {
    let config = QueueConfig::from_env().context("invalid queue settings")?;
    let queue = PgQueue::connect(&config)
        .await
        .context("failed to connect to the task queue")?;
    queue
        .ensure_schema()
        .await
        .context("failed to prepare the task table")?;
    Ok(queue)
}

async fn serve_api<Q: QueueProvider>(queue: Q) -> Result<()> {
    let config = ServerConfig::from_env().context("invalid server settings")?;
    let addr = SocketAddr::new(config.host, config.port);
    postier::serve(addr, postier::api::router(queue))
        .await
        .context("HTTP server failed")
}

fn start_worker<Q: QueueProvider>(queue: Q) -> Result<WorkerHandle> {
    let mailer = MailerConfig::from_env().context("invalid SMTP settings")?;
    let enhancer = EnhancerConfig::from_env().context("invalid Gemini settings")?;
    let worker_config = WorkerConfig::from_env().context("invalid worker settings")?;

    let ctx = PipelineContext::new(SmtpMailer::new(mailer), GeminiEnhancer::new(enhancer));
    let registry = TaskRegistry::new().register::<SendEmailTask>();

    Ok(Worker::new(queue, registry, ctx).configure(&worker_config).start())
}
