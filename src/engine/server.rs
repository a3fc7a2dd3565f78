// Game server: drives one simulation engine in real time on a dedicated thread
// and broadcasts its notifications to subscribers.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc};

use crate::levels::LevelRegistry;

use super::attack::AttackRequest;
use super::config::EngineConfig;
use super::game::{EngineError, EngineEvent, GameSnapshot, GameState, SimulationEngine};
use super::player::{Player, PlayerId, PlayerType};

/// Longest the loop sleeps before checking for commands again.
const MAX_POLL_MS: u64 = 10;

/// Requests from the presentation layer to the engine thread.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    StartGame(u32),
    Pause,
    Continue,
    Stop,
    Attack(AttackRequest),
    Shutdown,
}

/// Messages sent from the engine thread to subscribers, as JSON.
#[derive(Clone, Serialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full state after anything changed.
    Snapshot { snapshot: GameSnapshot },
    Event { event: EngineEvent },
    /// A command was rejected.
    Error { message: String },
}

/// Owns the engine thread. Commands go in over an unbounded channel,
/// JSON messages come out over a broadcast channel.
pub struct GameServer {
    broadcast_tx: broadcast::Sender<String>,
    command_tx: mpsc::UnboundedSender<EngineCommand>,
    running: Arc<AtomicBool>,
    /// Cached snapshot JSON so late subscribers get the current state.
    latest_snapshot: Arc<Mutex<Option<String>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl GameServer {
    /// Start the engine thread. No game is played until `start_game`.
    pub fn spawn(config: EngineConfig, levels: LevelRegistry) -> Self {
        let (broadcast_tx, _) = broadcast::channel(256);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let running = Arc::new(AtomicBool::new(false));
        let latest_snapshot = Arc::new(Mutex::new(None));

        let tx = broadcast_tx.clone();
        let loop_running = running.clone();
        let loop_snapshot = latest_snapshot.clone();
        let handle = std::thread::spawn(move || {
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
                let engine = SimulationEngine::new(config, levels);
                run_engine_loop(engine, command_rx, &tx, &loop_running, &loop_snapshot);
            }));
            if let Err(panic_info) = result {
                let msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                tracing::error!("Engine thread panicked: {}", msg);
            }
            loop_running.store(false, Ordering::Relaxed);
        });

        Self {
            broadcast_tx,
            command_tx,
            running,
            latest_snapshot,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Subscribe to engine messages. Returns a receiver that yields JSON strings.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.broadcast_tx.subscribe()
    }

    /// Get the cached snapshot JSON for late subscribers.
    pub fn latest_snapshot(&self) -> Option<String> {
        self.latest_snapshot.lock().ok().and_then(|s| s.clone())
    }

    /// Whether a game is currently running (not paused, stopped or finished).
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Queue a command. Returns false once the engine thread has exited.
    pub fn send(&self, command: EngineCommand) -> bool {
        self.command_tx.send(command).is_ok()
    }

    pub fn start_game(&self, level_id: u32) -> bool {
        self.send(EngineCommand::StartGame(level_id))
    }

    pub fn pause_game(&self) -> bool {
        self.send(EngineCommand::Pause)
    }

    pub fn continue_game(&self) -> bool {
        self.send(EngineCommand::Continue)
    }

    pub fn stop_game(&self) -> bool {
        self.send(EngineCommand::Stop)
    }

    pub fn attack(&self, request: AttackRequest) -> bool {
        self.send(EngineCommand::Attack(request))
    }

    /// Stop the game, end the engine thread and wait for it.
    pub fn shutdown(&self) {
        self.send(EngineCommand::Shutdown);
        let handle = self.handle.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::warn!("Engine thread ended abnormally");
            }
        }
    }
}

impl Drop for GameServer {
    fn drop(&mut self) {
        let _ = self.command_tx.send(EngineCommand::Shutdown);
    }
}

fn broadcast_message(tx: &broadcast::Sender<String>, msg: &ServerMessage) -> Option<String> {
    match serde_json::to_string(msg) {
        Ok(json) => {
            // No subscribers is fine
            let _ = tx.send(json.clone());
            Some(json)
        }
        Err(e) => {
            tracing::warn!("Failed to serialize server message: {e}");
            None
        }
    }
}

fn run_engine_loop(
    mut engine: SimulationEngine,
    mut commands: mpsc::UnboundedReceiver<EngineCommand>,
    tx: &broadcast::Sender<String>,
    running: &AtomicBool,
    latest_snapshot: &Mutex<Option<String>>,
) {
    tracing::info!("Engine thread started");
    let mut last = Instant::now();
    let mut carry_us: u128 = 0;

    'outer: loop {
        // Commands first, in arrival order
        loop {
            match commands.try_recv() {
                Ok(EngineCommand::Shutdown) | Err(TryRecvError::Disconnected) => {
                    engine.stop_game();
                    break 'outer;
                }
                Ok(command) => {
                    if let Err(e) = apply_command(&mut engine, command) {
                        tracing::warn!("Command rejected: {e}");
                        broadcast_message(
                            tx,
                            &ServerMessage::Error {
                                message: e.to_string(),
                            },
                        );
                    }
                }
                Err(TryRecvError::Empty) => break,
            }
        }

        // Wall-clock time since the last pass, carried at microsecond precision
        carry_us += last.elapsed().as_micros();
        last = Instant::now();
        if engine.is_running() {
            let delta_ms = (carry_us / 1000) as u64;
            carry_us %= 1000;
            engine.advance(delta_ms);
        } else {
            carry_us = 0;
        }
        running.store(engine.is_running(), Ordering::Relaxed);

        let events = engine.drain_events();
        if !events.is_empty() {
            for event in events {
                broadcast_message(tx, &ServerMessage::Event { event });
            }
            let msg = ServerMessage::Snapshot {
                snapshot: engine.snapshot(),
            };
            if let Some(json) = broadcast_message(tx, &msg) {
                if let Ok(mut cached) = latest_snapshot.lock() {
                    *cached = Some(json);
                }
            }
        }

        let wait_ms = engine
            .next_due_ms()
            .map(|due| due.saturating_sub(engine.now_ms()))
            .unwrap_or(MAX_POLL_MS)
            .clamp(1, MAX_POLL_MS);
        std::thread::sleep(Duration::from_millis(wait_ms));
    }

    for event in engine.drain_events() {
        broadcast_message(tx, &ServerMessage::Event { event });
    }
    running.store(false, Ordering::Relaxed);
    tracing::info!("Engine thread stopped");
}

fn apply_command(engine: &mut SimulationEngine, command: EngineCommand) -> Result<(), EngineError> {
    tracing::debug!(?command, "Engine command");
    match command {
        EngineCommand::StartGame(level_id) => engine.start_game(level_id)?,
        EngineCommand::Pause => engine.pause_game(),
        EngineCommand::Continue => engine.continue_game(),
        EngineCommand::Stop => engine.stop_game(),
        EngineCommand::Attack(request) => {
            engine.start_attack(&request);
        }
        EngineCommand::Shutdown => {}
    }
    Ok(())
}

/// Outcome of a headless run.
#[derive(Debug, Clone, Serialize)]
pub struct HeadlessResult {
    pub level_id: u32,
    pub state: GameState,
    pub winner: Option<PlayerId>,
    pub human_won: bool,
    pub elapsed_ms: u64,
    pub game_time: String,
    pub tick_count: u64,
    pub final_scores: Vec<Player>,
}

/// Run a level without real-time pacing or broadcasting, until a player wins
/// or `max_ms` of game time has passed. Runs synchronously on the calling thread.
pub fn run_level_headless(
    levels: LevelRegistry,
    level_id: u32,
    config: EngineConfig,
    max_ms: u64,
) -> Result<HeadlessResult, EngineError> {
    let step_ms = config.tick_interval_ms();
    let mut engine = SimulationEngine::new(config, levels);
    engine.start_game(level_id)?;

    while engine.is_running() && engine.elapsed_ms() < max_ms {
        engine.advance(step_ms);
        engine.drain_events();
    }

    let snapshot = engine.snapshot();
    let human_won = snapshot
        .winner
        .and_then(|w| snapshot.players.iter().find(|p| p.id == w))
        .is_some_and(|p| p.player_type == PlayerType::Human);
    if snapshot.winner.is_none() {
        tracing::info!(
            level_id,
            elapsed_ms = snapshot.elapsed_ms,
            "Headless game reached its time limit"
        );
    }
    let result = HeadlessResult {
        level_id,
        state: snapshot.state,
        winner: snapshot.winner,
        human_won,
        elapsed_ms: snapshot.elapsed_ms,
        game_time: snapshot.game_time,
        tick_count: snapshot.tick_count,
        final_scores: snapshot.players,
    };
    engine.stop_game();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::monster::MonsterType;
    use crate::levels::{Level, MonsterDescriptor, PlayerDescriptor};

    fn skirmish() -> Level {
        let player = |id, player_type| PlayerDescriptor {
            id,
            player_type,
            color: "c".into(),
            strength: 1,
            speed: 1,
            defense: 1,
            reproduction: 1,
        };
        let monster = |id, x, owner, value| MonsterDescriptor {
            id,
            x,
            y: 5,
            owner: Some(owner),
            monster_type: MonsterType::Normal,
            value,
        };
        Level {
            id: 1,
            name: "skirmish".into(),
            players: vec![player(1, PlayerType::Human), player(2, PlayerType::Ai)],
            monsters: vec![monster(1, 5, 1, 3), monster(2, 8, 2, 60)],
        }
    }

    fn wait_for(deadline_ms: u64, mut check: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_millis(deadline_ms);
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_headless_ai_wins() {
        let levels = LevelRegistry::new(vec![skirmish()]);
        let result = run_level_headless(levels, 1, EngineConfig::default(), 20_000).unwrap();
        assert_eq!(result.winner, Some(2));
        assert!(!result.human_won);
        assert_eq!(result.state, GameState::Finished);
        assert!(result.elapsed_ms < 20_000);
        let ai = result.final_scores.iter().find(|p| p.id == 2).unwrap();
        assert_eq!(ai.percentage, 1.0);
    }

    #[test]
    fn test_headless_time_limit() {
        let mut level = skirmish();
        level.players[1].player_type = PlayerType::Human;
        let levels = LevelRegistry::new(vec![level]);
        let result = run_level_headless(levels, 1, EngineConfig::default(), 2_000).unwrap();
        assert_eq!(result.winner, None);
        assert_eq!(result.state, GameState::Running);
        assert_eq!(result.elapsed_ms, 2_000);
        assert_eq!(result.tick_count, 50);
    }

    #[test]
    fn test_headless_unknown_level() {
        let err = run_level_headless(LevelRegistry::default(), 5, EngineConfig::default(), 1000)
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownLevel(5)));
    }

    #[test]
    fn test_server_lifecycle() {
        let server = GameServer::spawn(
            EngineConfig::default(),
            LevelRegistry::new(vec![skirmish()]),
        );
        let mut rx = server.subscribe();
        assert!(!server.is_running());

        assert!(server.start_game(1));
        assert!(wait_for(2000, || server.is_running()));
        assert!(wait_for(2000, || server.latest_snapshot().is_some()));

        let mut saw_state = false;
        while let Ok(json) = rx.try_recv() {
            if json.contains(r#""state":"running""#) {
                saw_state = true;
            }
        }
        assert!(saw_state);

        assert!(server.pause_game());
        assert!(wait_for(2000, || !server.is_running()));
        assert!(server.continue_game());
        assert!(wait_for(2000, || server.is_running()));

        server.shutdown();
        assert!(!server.is_running());
        assert!(!server.stop_game());
    }

    #[test]
    fn test_server_reports_rejected_start() {
        let server = GameServer::spawn(EngineConfig::default(), LevelRegistry::default());
        let mut rx = server.subscribe();
        server.start_game(42);
        let mut error = None;
        wait_for(2000, || {
            while let Ok(json) = rx.try_recv() {
                if json.contains(r#""type":"error""#) {
                    error = Some(json);
                }
            }
            error.is_some()
        });
        assert!(error.unwrap().contains("unknown level 42"));
        server.shutdown();
    }

    #[test]
    fn test_server_message_json() {
        let msg = ServerMessage::Event {
            event: EngineEvent::PillowsCleared,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"event","event":{"event":"pillows_cleared"}}"#);
    }
}
