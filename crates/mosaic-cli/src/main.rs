//! Mosaic CLI - clip links, text and images from the terminal
//!
//! Everything is saved locally first; `mosaic sync` pushes queued changes
//! to the remote store.

mod cli;
mod commands;
mod error;
#[cfg(test)]
mod tests;

use clap::{CommandFactory, Parser};

use crate::cli::{Cli, Commands, SyncCommands};
use crate::commands::add::run_add;
use crate::commands::collection::run_collection;
use crate::commands::common::resolve_db_path;
use crate::commands::delete::run_delete;
use crate::commands::edit::{run_move, run_note};
use crate::commands::list::run_list;
use crate::commands::share::run_share;
use crate::commands::sync::{run_sync, run_sync_retry, run_sync_status};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "mosaic=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Some(Commands::Add {
            content,
            image,
            note,
            collection,
        }) => run_add(
            &content,
            image.as_deref(),
            note.as_deref(),
            collection.as_deref(),
            &db_path,
        )?,
        Some(Commands::Share {
            url,
            text,
            image,
            note,
        }) => run_share(
            url.as_deref(),
            text.as_deref(),
            image.as_deref(),
            note.as_deref(),
            &db_path,
        )?,
        Some(Commands::List {
            collection,
            unfiled,
            limit,
            json,
        }) => run_list(collection.as_deref(), unfiled, limit, json, &db_path)?,
        Some(Commands::Move { id, collection }) => {
            run_move(&id, collection.as_deref(), &db_path)?;
        }
        Some(Commands::Note { id, text }) => run_note(&id, &text, &db_path)?,
        Some(Commands::Delete { id }) => run_delete(&id, &db_path)?,
        Some(Commands::Collection { command }) => run_collection(command, &db_path)?,
        Some(Commands::Sync { pull, command }) => match command {
            None => run_sync(pull, &db_path).await?,
            Some(SyncCommands::Status { json }) => run_sync_status(json, &db_path)?,
            Some(SyncCommands::Retry) => run_sync_retry(&db_path)?,
        },
        None => {
            // Quick capture mode: mosaic "https://example.com"
            if cli.content.is_empty() {
                Cli::command().print_help().map_err(CliError::Io)?;
                println!();
            } else {
                run_add(&cli.content, None, None, None, &db_path)?;
            }
        }
    }

    Ok(())
}
