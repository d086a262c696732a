//! Server commands: `swimlane serve` and `swimlane init`.

use std::path::PathBuf;

use anyhow::{Context, Result};

use swimlane::board::db::BoardDb;
use swimlane::board::server;
use swimlane::config::{AppConfig, StoreBackend};

pub async fn cmd_serve(mut config: AppConfig, port: Option<u16>, dev: bool, no_seed: bool) -> Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    if dev {
        config.server.dev_mode = true;
    }
    if no_seed {
        config.server.seed_defaults = false;
    }

    let proxy = config.build_proxy()?;
    server::start_server(config.server_config(), proxy).await
}

pub async fn cmd_init(mut config: AppConfig, db_path: Option<PathBuf>) -> Result<()> {
    // Always a local database, whatever the configured backend.
    config.store.backend = StoreBackend::Sqlite;
    if let Some(path) = db_path {
        config.store.db_path = path;
    }

    let db = BoardDb::new(config.build_proxy()?);
    let seeded = db
        .seed_default_board()
        .await
        .context("Failed to create the default board")?;

    println!("Board database initialized at {}", config.store.db_path.display());
    if let Some(board) = seeded {
        println!("Created \"{}\" ({})", board.name, board.uuid);
    }
    Ok(())
}
