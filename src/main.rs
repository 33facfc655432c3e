use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use atelier::config::AtelierConfig;
use atelier::factory::server;

#[derive(Parser)]
#[command(name = "atelier")]
#[command(version, about = "Workspace event routing and factory service for a cloud IDE")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the config file. Defaults to the platform config directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the factory API and event channel bridge
    Serve {
        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Path to the SQLite database
        #[arg(long)]
        db: Option<PathBuf>,

        /// Bind on all interfaces and allow any origin
        #[arg(long)]
        dev: bool,
    },
}

/// Initialize tracing with the ATELIER_LOG environment variable.
///
/// Defaults to "info" ("debug" with --verbose) if ATELIER_LOG is not set.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("ATELIER_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = AtelierConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port, db, dev } => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(db) = db {
                config.db_path = db;
            }
            if dev {
                config.dev_mode = true;
            }
            server::start_server(config).await
        }
    }
}
