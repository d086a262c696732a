use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use swimlane::config::AppConfig;
use swimlane::telemetry;

mod cmd;

#[derive(Parser)]
#[command(name = "swimlane")]
#[command(version, about = "Kanban board server and client")]
pub struct Cli {
    /// Path to a configuration file (defaults to ./swimlane.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the board API server
    Serve {
        /// Port to serve on (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Enable dev mode (permissive CORS, bind on all interfaces)
        #[arg(long)]
        dev: bool,

        /// Do not create the default board on startup
        #[arg(long)]
        no_seed: bool,
    },
    /// Create the local SQLite database and the default board
    Init {
        /// Database path (overrides config and SWIMLANE_DB_PATH)
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// Run the API verification check against a running server
    Verify {
        /// Base URL of the server
        #[arg(long)]
        url: Option<String>,
    },
    /// Print a board's lanes and cards
    Show {
        /// Base URL of the server
        #[arg(long)]
        url: Option<String>,

        /// Board uuid (defaults to the newest board)
        #[arg(long)]
        board: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::resolve(cli.config.as_deref())?;
    telemetry::init_tracing(config.log_format)?;

    match &cli.command {
        Commands::Serve { port, dev, no_seed } => {
            cmd::cmd_serve(config, *port, *dev, *no_seed).await?;
        }
        Commands::Init { db_path } => {
            cmd::cmd_init(config, db_path.clone()).await?;
        }
        Commands::Verify { url } => {
            cmd::cmd_verify(&config, url.as_deref()).await?;
        }
        Commands::Show { url, board } => {
            cmd::cmd_show(&config, url.as_deref(), board.as_deref()).await?;
        }
    }

    Ok(())
}
