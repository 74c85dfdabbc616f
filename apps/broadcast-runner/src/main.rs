//! Broadcast Runner
//!
//! Processes bulk SMS broadcast campaigns: claims recipient batches,
//! dispatches through the configured provider, and records billing. Can run
//! as a one-shot pass, an HTTP-triggered service, or a scheduled cron job.

use clap::{Parser, Subcommand};
use core_config::tracing::{init_tracing, install_color_eyre};
use eyre::Result;
use sea_orm::DatabaseConnection;
use sms::SmsProvider;
use tokio::signal;
use tracing::info;
use uuid::Uuid;

mod api;
mod config;
mod runner;
mod state;

use config::Config;
use runner::BroadcastRunner;
use state::AppState;

#[derive(Parser)]
#[command(name = "broadcast-runner")]
#[command(about = "Process bulk SMS broadcast campaigns")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one processing pass and exit
    Run {
        /// Process only this campaign
        #[arg(short, long)]
        campaign_id: Option<Uuid>,
    },

    /// Serve the HTTP trigger API
    Serve,

    /// Run as a scheduled service
    Schedule {
        /// Cron expression for scheduling (default: every minute)
        #[arg(short, long, default_value = "0 * * * * *")]
        cron: String,
    },

    /// Show the processing backlog snapshot
    Status,

    /// Apply pending database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);

    if config.metrics_enabled {
        observability::init_metrics();
    }

    let cli = Cli::parse();

    // Connect to database
    info!("Connecting to database...");
    let db = database::postgres::connect_from_config_with_retry(config.database.clone(), None)
        .await
        .map_err(|e| eyre::eyre!("Database connection failed: {}", e))?;

    match cli.command {
        Commands::Run { campaign_id } => {
            info!("Starting one-shot broadcast run");
            let runner = build_runner(&db, &config)?;
            let summary = runner.run_once(campaign_id).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Commands::Serve => {
            let runner = build_runner(&db, &config)?;
            serve(config, db, runner).await?;
        }

        Commands::Schedule { cron } => {
            let runner = build_runner(&db, &config)?;
            runner.run_scheduled(&cron).await?;
        }

        Commands::Status => {
            let runner = build_runner(&db, &config)?;
            let snapshot = runner.status().await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }

        Commands::Migrate => {
            database::postgres::run_migrations::<migration::Migrator>(&db, "broadcast-runner")
                .await?;
        }
    }

    Ok(())
}

fn build_runner(db: &DatabaseConnection, config: &Config) -> Result<BroadcastRunner> {
    let provider = sms::provider::from_env()?;
    info!(provider = provider.name(), "SMS provider configured");

    Ok(BroadcastRunner::new(
        db.clone(),
        provider,
        config.broadcast.clone(),
    ))
}

async fn serve(config: Config, db: DatabaseConnection, runner: BroadcastRunner) -> Result<()> {
    let address = config.server.address();
    let state = AppState { config, db, runner };
    let app = api::routes(state);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Broadcast runner listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Broadcast runner shutdown complete");
    Ok(())
}

/// Completes on SIGINT or SIGTERM, letting in-flight requests drain.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully");
        },
        _ = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully");
        },
    }
}
