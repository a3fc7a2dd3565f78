use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::levels::{LevelError, LevelRegistry};
use crate::metrics;

use super::attack::AttackRequest;
use super::board::Board;
use super::brain::AiBrain;
use super::clock::{format_display_time, format_game_time, GameClock};
use super::config::EngineConfig;
use super::monster::{ImpactOutcome, Monster, MonsterId};
use super::pillow::{AttackPillow, PillowArena, PillowId, PillowLaunch, PillowSnapshot};
use super::player::{Player, PlayerId, PlayerType};
use super::scheduler::{Scheduler, TimerKind};

/// Lifecycle state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
    Stopped,
    Running,
    Paused,
    /// A player owns the whole board. Only `stop_game` leaves this state.
    Finished,
}

/// Misuse of the engine API. Simulation itself never fails.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("a game is already in progress ({0:?})")]
    AlreadyRunning(GameState),
    #[error("unknown level {0}")]
    UnknownLevel(u32),
    #[error(transparent)]
    Level(#[from] LevelError),
}

/// Who asked for an attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackOrigin {
    Player,
    Ai,
    Overflow,
}

impl AttackOrigin {
    fn label(&self) -> &'static str {
        match self {
            AttackOrigin::Player => "player",
            AttackOrigin::Ai => "ai",
            AttackOrigin::Overflow => "overflow",
        }
    }
}

/// Notifications for the presentation layer, queued in the order they happen.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    StateChanged {
        state: GameState,
    },
    /// Topology, counts, ownership or scores changed.
    BoardChanged,
    PillowAdded {
        pillow: PillowSnapshot,
    },
    PillowRemoved {
        id: PillowId,
    },
    PillowsCleared,
    AttackFinished {
        id: PillowId,
        source: MonsterId,
        destination: MonsterId,
        outcome: ImpactOutcome,
    },
    MonsterCaptured {
        monster: MonsterId,
        previous_owner: Option<PlayerId>,
        new_owner: PlayerId,
    },
    GameTimeChanged {
        elapsed_ms: u64,
        game_time: String,
        display_time: String,
    },
    GameFinished {
        winner: PlayerId,
        human_won: bool,
    },
}

/// Full engine state for rendering / API consumers.
#[derive(Clone, Debug, Serialize)]
pub struct GameSnapshot {
    pub session_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub level_id: Option<u32>,
    pub state: GameState,
    pub elapsed_ms: u64,
    pub game_time: String,
    pub tick_count: u64,
    pub winner: Option<PlayerId>,
    pub players: Vec<Player>,
    pub monsters: Vec<Monster>,
    pub pillows: Vec<PillowSnapshot>,
}

#[derive(Debug, Clone)]
struct Session {
    id: Uuid,
    started_at: DateTime<Utc>,
}

/// The tick simulation: owns the board, the in-flight pillows, the AI brains
/// and the three periodic clocks (tick, display refresh, brain decisions).
///
/// All mutation goes through `&mut self`, one handler at a time.
pub struct SimulationEngine {
    config: EngineConfig,
    levels: LevelRegistry,
    board: Board,
    pillows: PillowArena,
    brains: BTreeMap<PlayerId, AiBrain>,
    scheduler: Scheduler,
    clock: GameClock,
    state: GameState,
    level_id: Option<u32>,
    session: Option<Session>,
    winner: Option<PlayerId>,
    tick_count: u64,
    events: Vec<EngineEvent>,
}

impl SimulationEngine {
    pub fn new(config: EngineConfig, levels: LevelRegistry) -> Self {
        let board = Board::new(config.rows, config.columns);
        SimulationEngine {
            config,
            levels,
            board,
            pillows: PillowArena::new(),
            brains: BTreeMap::new(),
            scheduler: Scheduler::new(),
            clock: GameClock::new(),
            state: GameState::Stopped,
            level_id: None,
            session: None,
            winner: None,
            tick_count: 0,
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn levels(&self) -> &LevelRegistry {
        &self.levels
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == GameState::Running
    }

    pub fn level_id(&self) -> Option<u32> {
        self.level_id
    }

    pub fn winner(&self) -> Option<PlayerId> {
        self.winner
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Logical time of the engine's scheduler.
    pub fn now_ms(&self) -> u64 {
        self.scheduler.now_ms()
    }

    /// Logical time of the next due handler, if any clock is running.
    pub fn next_due_ms(&self) -> Option<u64> {
        self.scheduler.next_due_ms()
    }

    pub fn has_brain(&self, player_id: PlayerId) -> bool {
        self.brains.contains_key(&player_id)
    }

    pub fn brain_count(&self) -> usize {
        self.brains.len()
    }

    /// In-flight pillows in launch order.
    pub fn pillows(&self) -> Vec<PillowSnapshot> {
        self.pillows.iter().map(AttackPillow::snapshot).collect()
    }

    pub fn pillow(&self, id: PillowId) -> Option<&AttackPillow> {
        self.pillows.get(id)
    }

    pub fn pillow_count(&self) -> usize {
        self.pillows.len()
    }

    /// Elapsed game time in ms, excluding pauses.
    pub fn elapsed_ms(&self) -> u64 {
        self.clock.elapsed_ms(self.scheduler.now_ms())
    }

    /// Elapsed time as `mm:ss.zzz`.
    pub fn game_time(&self) -> String {
        format_game_time(self.elapsed_ms())
    }

    /// Elapsed time as `mm:ss`.
    pub fn display_game_time(&self) -> String {
        format_display_time(self.elapsed_ms())
    }

    /// Take all queued notifications.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            session_id: self.session.as_ref().map(|s| s.id),
            started_at: self.session.as_ref().map(|s| s.started_at),
            level_id: self.level_id,
            state: self.state,
            elapsed_ms: self.elapsed_ms(),
            game_time: self.game_time(),
            tick_count: self.tick_count,
            winner: self.winner,
            players: self.board.players_list().to_vec(),
            monsters: self.board.monsters_list().to_vec(),
            pillows: self.pillows(),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Load a level and start playing it: Stopped → Running.
    pub fn start_game(&mut self, level_id: u32) -> Result<(), EngineError> {
        if self.state != GameState::Stopped {
            return Err(EngineError::AlreadyRunning(self.state));
        }
        let level = self
            .levels
            .get(level_id)
            .cloned()
            .ok_or(EngineError::UnknownLevel(level_id))?;
        self.board.set_level(&level)?;

        self.scheduler.clear();
        self.scheduler
            .add(TimerKind::Tick, self.config.tick_interval_ms());
        self.scheduler
            .add(TimerKind::Display, self.config.display_interval_ms);

        let ai_players: Vec<PlayerId> = self
            .board
            .players_list()
            .iter()
            .filter(|p| p.is_ai())
            .map(|p| p.id)
            .collect();
        for pid in ai_players {
            tracing::debug!(player_id = pid, "Create AI for player");
            self.brains.insert(pid, AiBrain::new(pid, self.config.seed));
            self.scheduler
                .add(TimerKind::Brain(pid), self.config.brain_interval_ms);
        }

        let session = Session {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
        };
        tracing::info!(
            session = %session.id,
            level_id,
            level_name = %level.name,
            brains = self.brains.len(),
            "Game: start level"
        );
        self.session = Some(session);
        self.level_id = Some(level_id);
        self.winner = None;
        self.tick_count = 0;

        self.scheduler.start_all();
        self.brains.values_mut().for_each(AiBrain::start);
        self.clock.restart(self.scheduler.now_ms());
        self.set_state(GameState::Running);

        metrics::GAMES_STARTED_TOTAL.inc();
        metrics::ACTIVE_GAMES.inc();

        self.calculate_scores();
        self.flush_board_changed();
        self.push_game_time();
        Ok(())
    }

    /// Running → Paused. Any other state: no-op.
    pub fn pause_game(&mut self) {
        if self.state != GameState::Running {
            return;
        }
        self.brains.values_mut().for_each(AiBrain::stop);
        self.scheduler.stop_all();
        self.clock.pause(self.scheduler.now_ms());
        self.set_state(GameState::Paused);
        self.push_game_time();
        tracing::info!(elapsed_ms = self.clock.accumulated_ms(), "Game: pause");
    }

    /// Paused → Running, keeping the elapsed time. Any other state: no-op.
    pub fn continue_game(&mut self) {
        if self.state != GameState::Paused {
            return;
        }
        self.brains.values_mut().for_each(AiBrain::start);
        self.scheduler.start_all();
        self.clock.resume(self.scheduler.now_ms());
        self.set_state(GameState::Running);
        self.push_game_time();
        tracing::info!("Game: continue");
    }

    /// Any → Stopped. Halts every clock, drops brains and in-flight pillows
    /// without resolving them, and restores the level's starting layout.
    pub fn stop_game(&mut self) {
        let was = self.state;
        self.scheduler.stop_all();
        self.brains.values_mut().for_each(AiBrain::stop);
        self.brains.clear();

        self.clock.pause(self.scheduler.now_ms());
        tracing::info!(
            elapsed_ms = self.clock.accumulated_ms(),
            discarded_pillows = self.pillows.len(),
            "Game: stop"
        );
        self.clock.reset();

        metrics::PILLOWS_IN_FLIGHT.sub(self.pillows.len() as i64);
        self.pillows.clear();
        self.events.push(EngineEvent::PillowsCleared);

        self.board.reset_board();
        self.scheduler.clear();
        self.session = None;
        self.winner = None;
        self.tick_count = 0;

        if was != GameState::Stopped {
            metrics::ACTIVE_GAMES.dec();
        }
        self.set_state(GameState::Stopped);
        self.flush_board_changed();
        self.push_game_time();
    }

    /// Advance logical time by `delta_ms`, running every handler that falls
    /// due, one after another. Does nothing unless the game is running.
    pub fn advance(&mut self, delta_ms: u64) {
        if self.state != GameState::Running {
            return;
        }
        let until = self.scheduler.now_ms() + delta_ms;
        while self.state == GameState::Running {
            match self.scheduler.pop_due(until) {
                Some(TimerKind::Tick) => self.tick(),
                Some(TimerKind::Display) => self.refresh_display(),
                Some(TimerKind::Brain(pid)) => self.brain_decision(pid),
                None => break,
            }
        }
    }

    // ── Handlers ─────────────────────────────────────────────────────

    /// One fixed-interval simulation step.
    fn tick(&mut self) {
        let tick_start = Instant::now();
        let interval = self.config.tick_interval_ms();

        // 1. Growth and automatic attacks
        let triggered = self.board.grow(interval, &self.config);
        for request in &triggered {
            self.launch(request, AttackOrigin::Overflow);
        }

        // 2. Move pillows, in launch order
        let mut arrived = Vec::new();
        for id in self.pillows.ids() {
            if let Some(pillow) = self.pillows.get_mut(id) {
                if pillow.advance(interval, &self.config) {
                    arrived.push(id);
                }
            }
        }

        // 3. Resolve arrivals in the same order
        for id in arrived {
            self.resolve(id);
        }

        // 4. Scores and win condition
        self.calculate_scores();
        self.tick_count += 1;
        self.flush_board_changed();

        let elapsed_ms = tick_start.elapsed().as_secs_f64() * 1000.0;
        metrics::TICK_DURATION_MS.observe(elapsed_ms);
        if elapsed_ms > interval as f64 {
            tracing::warn!(
                tick = self.tick_count,
                elapsed_ms,
                pillows = self.pillows.len(),
                "Tick exceeded its interval"
            );
        }
    }

    fn refresh_display(&mut self) {
        self.clock.fold(self.scheduler.now_ms());
        self.push_game_time();
    }

    fn brain_decision(&mut self, player_id: PlayerId) {
        let mut incoming: HashMap<MonsterId, u32> = HashMap::new();
        for pillow in self.pillows.iter().filter(|p| p.player == player_id) {
            *incoming.entry(pillow.destination).or_default() += pillow.count;
        }
        let Some(brain) = self.brains.get_mut(&player_id) else {
            return;
        };
        if let Some(request) = brain.think(&self.board, &self.config, &incoming) {
            self.launch(&request, AttackOrigin::Ai);
            self.flush_board_changed();
        }
    }

    // ── Attacks ──────────────────────────────────────────────────────

    /// Launch one pillow per source at the destination. Sources that cannot
    /// attack are skipped individually. Only accepted while running.
    pub fn start_attack(&mut self, request: &AttackRequest) -> Vec<PillowId> {
        if self.state != GameState::Running {
            tracing::debug!(state = ?self.state, "Ignoring attack while not running");
            return Vec::new();
        }
        let ids = self.launch(request, AttackOrigin::Player);
        self.flush_board_changed();
        ids
    }

    fn launch(&mut self, request: &AttackRequest, origin: AttackOrigin) -> Vec<PillowId> {
        tracing::debug!(
            sources = ?request.source_ids,
            destination = request.destination_id,
            origin = origin.label(),
            "Start attack"
        );
        let mut launched = Vec::new();
        for &source_id in &request.source_ids {
            match self.launch_one(source_id, request.destination_id) {
                Ok(id) => {
                    metrics::PILLOWS_LAUNCHED_TOTAL
                        .with_label_values(&[origin.label()])
                        .inc();
                    launched.push(id);
                }
                Err(reason) => {
                    tracing::debug!(
                        source = source_id,
                        destination = request.destination_id,
                        reason,
                        "Skipping attack source"
                    );
                    metrics::ATTACK_SOURCES_SKIPPED_TOTAL
                        .with_label_values(&[reason])
                        .inc();
                }
            }
        }
        launched
    }

    /// Split the source and create its pillow. The error names the skip reason.
    fn launch_one(
        &mut self,
        source_id: MonsterId,
        destination_id: MonsterId,
    ) -> Result<PillowId, &'static str> {
        let destination_position = self
            .board
            .monster(destination_id)
            .ok_or("unknown_destination")?
            .position;
        if source_id == destination_id {
            return Err("self_target");
        }
        let source = self.board.monster(source_id).ok_or("unknown_source")?;
        let owner = source.owner.ok_or("neutral_source")?;
        let player = self.board.player(owner).ok_or("unknown_player")?;

        let strength = player.strength + source.strength_bonus();
        let speed = player.speed + source.speed_bonus();
        let color = player.color.clone();
        let source_position = source.position;

        let count = self
            .board
            .monster_mut(source_id)
            .and_then(Monster::split)
            .ok_or("insufficient_count")?;
        self.board.mark_changed();

        let id = self.pillows.insert(PillowLaunch {
            player: owner,
            color,
            source: source_id,
            destination: destination_id,
            source_position,
            destination_position,
            count,
            strength,
            speed,
        });
        metrics::PILLOWS_IN_FLIGHT.inc();
        if let Some(pillow) = self.pillows.get(id) {
            self.events.push(EngineEvent::PillowAdded {
                pillow: pillow.snapshot(),
            });
        }
        Ok(id)
    }

    /// Resolve a pillow against its destination right away.
    /// Unknown or already resolved ids are a no-op returning false.
    pub fn finish_attack(&mut self, id: PillowId) -> bool {
        let resolved = self.resolve(id);
        self.flush_board_changed();
        resolved
    }

    fn resolve(&mut self, id: PillowId) -> bool {
        let Some(pillow) = self.pillows.remove(id) else {
            tracing::debug!(pillow = %id, "Attack already finished");
            return false;
        };
        metrics::PILLOWS_IN_FLIGHT.dec();
        self.events.push(EngineEvent::PillowRemoved { id });

        let Some(outcome) = self.board.impact(&pillow, &self.config) else {
            tracing::debug!(
                pillow = %id,
                destination = pillow.destination,
                "Pillow destination vanished"
            );
            return true;
        };
        tracing::debug!(
            source = pillow.source,
            destination = pillow.destination,
            count = pillow.count,
            outcome = outcome.label(),
            "Attack finished"
        );
        metrics::PILLOW_IMPACTS_TOTAL
            .with_label_values(&[outcome.label()])
            .inc();

        self.events.push(EngineEvent::AttackFinished {
            id,
            source: pillow.source,
            destination: pillow.destination,
            outcome,
        });
        if let ImpactOutcome::Captured { previous_owner, .. } = outcome {
            self.events.push(EngineEvent::MonsterCaptured {
                monster: pillow.destination,
                previous_owner,
                new_owner: pillow.player,
            });
        }
        true
    }

    // ── Scoring ──────────────────────────────────────────────────────

    /// Recompute every player's points and share of the board, then check
    /// whether one player owns everything.
    pub fn calculate_scores(&mut self) {
        let mut points: BTreeMap<PlayerId, u64> = self
            .board
            .players_list()
            .iter()
            .map(|p| (p.id, 0))
            .collect();
        for monster in self.board.monsters_list() {
            if let Some(total) = monster.owner.and_then(|o| points.get_mut(&o)) {
                *total += monster.count as u64;
            }
        }
        for pillow in self.pillows.iter() {
            if let Some(total) = points.get_mut(&pillow.player) {
                *total += pillow.count as u64;
            }
        }
        let total: u64 = points.values().sum();

        let mut changed = false;
        let mut winner = None;
        for player in self.board.players_mut() {
            let point_count = points.get(&player.id).copied().unwrap_or(0);
            let percentage = if total == 0 {
                0.0
            } else {
                (point_count as f64 / total as f64 * 100.0).round() / 100.0
            };
            let previous = (player.point_count, player.percentage);
            player.reset_score();
            player.add_points(point_count);
            player.percentage = percentage;
            if previous != (player.point_count, player.percentage) {
                changed = true;
            }
            if total > 0 && point_count == total {
                winner = Some((player.id, player.player_type));
            }
        }
        if changed {
            self.board.mark_changed();
        }

        if let Some((winner_id, winner_type)) = winner {
            if self.state == GameState::Running {
                self.on_game_over(winner_id, winner_type);
            }
        }
    }

    fn on_game_over(&mut self, winner: PlayerId, winner_type: PlayerType) {
        let human_won = winner_type == PlayerType::Human;
        if human_won {
            tracing::info!(player_id = winner, "Game Over!! You are the winner!");
        } else {
            tracing::info!(player_id = winner, "Game Over!! You lost the game.");
        }

        self.brains.values_mut().for_each(AiBrain::stop);
        self.scheduler.stop_all();
        self.clock.pause(self.scheduler.now_ms());
        self.winner = Some(winner);

        metrics::GAMES_FINISHED_TOTAL
            .with_label_values(&[if human_won { "human" } else { "ai" }])
            .inc();

        self.events.push(EngineEvent::GameFinished { winner, human_won });
        self.set_state(GameState::Finished);
        self.push_game_time();
    }

    // ── Notifications ────────────────────────────────────────────────

    fn set_state(&mut self, state: GameState) {
        self.state = state;
        self.events.push(EngineEvent::StateChanged { state });
    }

    fn push_game_time(&mut self) {
        let elapsed_ms = self.elapsed_ms();
        self.events.push(EngineEvent::GameTimeChanged {
            elapsed_ms,
            game_time: format_game_time(elapsed_ms),
            display_time: format_display_time(elapsed_ms),
        });
    }

    fn flush_board_changed(&mut self) {
        if self.board.take_changed() {
            self.events.push(EngineEvent::BoardChanged);
        }
    }
}
