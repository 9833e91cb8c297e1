//! board-sync
//!
//! Pulls tasks and collaborators from Todoist, mirrors them as cards on a
//! Miro board, and completes tasks whose cards were moved into the Done
//! frame. Run once per invocation; periodic execution belongs to cron.

use anyhow::Result;
use board_sync::api::miro::MiroClient;
use board_sync::api::todoist::TodoistClient;
use board_sync::cli::{Cli, Command};
use board_sync::config::{OauthConfig, SyncConfig};
use board_sync::db::Database;
use board_sync::oauth;
use board_sync::sync::SyncEngine;
use clap::Parser;
use std::fs::OpenOptions;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on --log option
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    match cli.log.as_str() {
        "0" | "off" => {
            // No logging
        }
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    match cli.command {
        Some(Command::Oauth) => run_oauth().await,
        Some(Command::Sync) | None => run_sync(cli.database).await,
    }
}

/// Run one sync pass.
async fn run_sync(database_override: Option<String>) -> Result<()> {
    let mut config = SyncConfig::from_env()?;
    if let Some(path) = database_override {
        config.db_path = path.into();
    }

    info!("Starting board-sync v{}", env!("CARGO_PKG_VERSION"));
    info!("Cache database: {:?}", config.db_path);
    info!("Board: {}", config.board_id);
    if let Some(ref project) = config.project_id {
        info!("Project filter: {}", project);
    }

    let db = Database::open(&config.db_path)?;
    let source = TodoistClient::new(&config.todoist_token)?;
    let board = MiroClient::new(&config.miro_token, &config.board_id, &config.done_frame)?;

    let engine = SyncEngine::new(&source, &board, &db, config.project_id.clone());
    let report = engine.run().await?;

    info!(
        tasks = report.tasks_fetched,
        collaborators = report.collaborators_fetched,
        created = report.cards_created,
        updated = report.cards_updated,
        tagged = report.tags_applied,
        completed = report.tasks_completed,
        done_cards = report.done_cards_seen,
        skipped = report.unlinked_done_cards,
        "sync pass finished"
    );

    Ok(())
}

/// Run the OAuth redirect listener.
async fn run_oauth() -> Result<()> {
    let config = OauthConfig::from_env()?;
    oauth::run(config).await
}
