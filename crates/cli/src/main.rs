//! Facturio CLI - Database migrations and session management.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! fio-cli migrate
//!
//! # Store (or rotate) a shop's offline access token
//! fio-cli session put -s demo.myshopify.com -t shpat_... --scope read_orders
//!
//! # Drop a shop's sessions
//! fio-cli session delete -s demo.myshopify.com
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `session put` - Store an offline access token for a shop
//! - `session delete` - Remove a shop's sessions

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "fio-cli")]
#[command(author, version, about = "Facturio bridge CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage shop sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Store or rotate a shop's offline access token
    Put {
        /// Shop domain (e.g. demo.myshopify.com)
        #[arg(short, long)]
        shop: String,

        /// Offline Admin API access token
        #[arg(short, long)]
        token: String,

        /// Granted OAuth scopes
        #[arg(long)]
        scope: Option<String>,
    },
    /// Remove a shop's sessions
    Delete {
        /// Shop domain (e.g. demo.myshopify.com)
        #[arg(short, long)]
        shop: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Session { action } => match action {
            SessionAction::Put { shop, token, scope } => {
                commands::session::put(&shop, &token, scope.as_deref()).await?;
            }
            SessionAction::Delete { shop } => {
                commands::session::delete(&shop).await?;
            }
        },
    }
    Ok(())
}
