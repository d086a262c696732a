//! Client commands: `swimlane verify` and `swimlane show`.

use anyhow::{Context, Result, bail};

use swimlane::client::{ApiClient, BoardApi, BoardStore};
use swimlane::config::AppConfig;

fn api_client(config: &AppConfig, url: Option<&str>) -> Result<ApiClient> {
    let base_url = match url {
        Some(url) => url.to_string(),
        None => format!("http://localhost:{}", config.server.port),
    };
    ApiClient::new(base_url, config.timeout()).context("Failed to build API client")
}

fn check(passed: bool) -> &'static str {
    if passed { "ok" } else { "FAILED" }
}

pub async fn cmd_verify(config: &AppConfig, url: Option<&str>) -> Result<()> {
    let api = api_client(config, url)?;
    let report = api
        .verify()
        .await
        .with_context(|| format!("Could not reach {}", api.base_url()))?;

    println!("{}", report.message);
    println!("  connection: {}", check(report.tests.connection));
    println!("  read:       {}", check(report.tests.read));
    println!("  write:      {}", check(report.tests.write));

    if !report.is_success() {
        bail!(
            "Verification failed: {}",
            report.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

pub async fn cmd_show(config: &AppConfig, url: Option<&str>, board: Option<&str>) -> Result<()> {
    let mut store = BoardStore::new(api_client(config, url)?);
    match board {
        Some(uuid) => {
            store.open_board(uuid).await?;
        }
        None => store.load_all().await?,
    }

    let state = store.state();
    let Some(board) = &state.board else {
        bail!("No board loaded");
    };
    println!("{} ({})", board.name, board.uuid);
    if !board.description.is_empty() {
        println!("{}", board.description);
    }
    for lane in &state.lanes {
        let cards = store.lane_cards(&lane.uuid);
        println!();
        println!("{} [{}]", lane.name, cards.len());
        for card in cards {
            println!("  {:>2}. [{}] {} ({})", card.position, card.priority, card.title, card.uuid);
        }
    }
    Ok(())
}
