//! Alithia - command-line front end for the world wiki.
//!
//! Browses, searches and edits the shared collections (characters,
//! factions, lore, updates, changelog) through the collection cache.

mod commands;
mod render;

use std::io;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "alithia", version, about = "Browse and edit the Alithia world wiki")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and save the session
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Forget the saved session
    Logout,
    /// List a collection, newest first
    List {
        collection: String,
        /// field=value, repeatable; all must match
        #[arg(short, long = "filter", value_name = "FIELD=VALUE")]
        filters: Vec<String>,
        /// Only records you wrote
        #[arg(long)]
        mine: bool,
        #[arg(short, long)]
        query: Option<String>,
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search a collection and highlight matches
    Search { collection: String, query: String },
    /// Create a record from field=value pairs
    Add {
        collection: String,
        #[arg(value_name = "FIELD=VALUE", required = true)]
        fields: Vec<String>,
    },
    /// Change fields on a record
    Edit {
        collection: String,
        id: String,
        #[arg(value_name = "FIELD=VALUE", required = true)]
        fields: Vec<String>,
    },
    /// Delete a record
    Rm {
        collection: String,
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Facet counts for one collection, or totals for all of them
    Stats { collection: Option<String> },
}

/// Initialize the tracing subscriber for logging.
///
/// Use RUST_LOG to control the level (e.g. RUST_LOG=alithia_core=debug).
/// The returned guard flushes buffered log lines when dropped.
fn init_tracing() -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();
    let cli = Cli::parse();
    info!("alithia starting");

    match cli.command {
        Command::Login { email } => commands::login(email).await,
        Command::Logout => commands::logout(),
        Command::List {
            collection,
            filters,
            mine,
            query,
            json,
        } => commands::list(&collection, &filters, mine, query.as_deref(), json).await,
        Command::Search { collection, query } => commands::search(&collection, &query).await,
        Command::Add { collection, fields } => commands::add(&collection, &fields).await,
        Command::Edit {
            collection,
            id,
            fields,
        } => commands::edit(&collection, &id, &fields).await,
        Command::Rm { collection, id, yes } => commands::remove(&collection, &id, yes).await,
        Command::Stats { collection } => commands::stats(collection.as_deref()).await,
    }
}
