use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use monster_wars::config::Config;
use monster_wars::console::{self, ConsoleCommand};
use monster_wars::engine::server::{run_level_headless, EngineCommand, GameServer};
use monster_wars::levels::LevelRegistry;
use monster_wars::metrics;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    metrics::register_metrics();

    let config = Config::load();
    tracing::info!(?config, "Starting Monster Wars");

    let levels = LevelRegistry::from_dir(&config.data_dir);
    if levels.is_empty() {
        tracing::error!(dir = %config.data_dir.display(), "No playable levels found");
        std::process::exit(1);
    }
    for level in levels.iter() {
        match level.validate_placement(config.rows, config.columns) {
            Ok(()) => tracing::info!(id = level.id, name = %level.name, "Level available"),
            Err(e) => tracing::warn!(id = level.id, "Level does not fit the board: {e}"),
        }
    }

    if config.headless {
        let max_ms = config.max_seconds * 1000;
        match run_level_headless(levels, config.level, config.engine_config(), max_ms) {
            Ok(result) => match serde_json::to_string_pretty(&result) {
                Ok(json) => println!("{json}"),
                Err(e) => tracing::error!("Failed to serialize result: {e}"),
            },
            Err(e) => {
                tracing::error!("Headless run failed: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    let server = Arc::new(GameServer::spawn(config.engine_config(), levels));

    // Forward engine messages to the log
    let mut rx = server.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(json) => {
                    if json.contains(r#""event":"game_finished""#) {
                        tracing::info!(%json, "Game finished");
                    } else {
                        tracing::trace!(%json, "Engine message");
                    }
                }
                Err(RecvError::Lagged(n)) => tracing::warn!("Message log lagged by {n}"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    server.start_game(config.level);
    println!("{}", console::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("Failed to read stdin: {e}");
                        break;
                    }
                };
                match console::parse_line(&line) {
                    Ok(Some(ConsoleCommand::Engine(EngineCommand::Shutdown))) => break,
                    Ok(Some(ConsoleCommand::Engine(command))) => {
                        server.send(command);
                    }
                    Ok(Some(ConsoleCommand::Snapshot)) => {
                        println!("{}", server.latest_snapshot().unwrap_or_default());
                    }
                    Ok(Some(ConsoleCommand::Metrics)) => print!("{}", metrics::gather_metrics()),
                    Ok(Some(ConsoleCommand::Help)) => println!("{}", console::HELP),
                    Ok(None) => {}
                    Err(e) => println!("{e}"),
                }
            }
        }
    }

    let server_for_shutdown = server.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || server_for_shutdown.shutdown()).await {
        tracing::warn!("Shutdown task failed: {e}");
    }
    tracing::info!("Bye");
}
