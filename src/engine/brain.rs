// AI decision making for computer-controlled players.
//
// A brain only reads the board. Its decisions come back to the engine as
// attack requests, so every mutation stays on the engine's tick path.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::attack::AttackRequest;
use super::board::Board;
use super::config::EngineConfig;
use super::monster::{Monster, MonsterId};
use super::player::PlayerId;

/// A capturable target and the sources needed to take it.
#[derive(Debug, Clone)]
struct Plan {
    sources: Vec<u32>,
    destination: u32,
    distance: f64,
}

/// Decision maker for one AI player.
pub struct AiBrain {
    player_id: PlayerId,
    running: bool,
    rng: StdRng,
}

impl AiBrain {
    pub fn new(player_id: PlayerId, seed: u64) -> Self {
        AiBrain {
            player_id,
            running: false,
            rng: StdRng::seed_from_u64(seed ^ (player_id as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)),
        }
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Pick the next attack, if any target can be captured right now.
    ///
    /// `incoming` holds the payload of this player's pillows already in flight,
    /// by destination. Targets that payload already takes are left alone.
    pub fn think(
        &mut self,
        board: &Board,
        config: &EngineConfig,
        incoming: &HashMap<MonsterId, u32>,
    ) -> Option<AttackRequest> {
        if !self.running {
            return None;
        }
        board.player(self.player_id)?;

        let sources: Vec<&Monster> = board
            .monsters_list()
            .iter()
            .filter(|m| m.is_owned_by(self.player_id) && m.count >= config.ai_min_source_count)
            .collect();
        if sources.is_empty() {
            return None;
        }

        let mut best: Vec<Plan> = Vec::new();
        for target in board
            .monsters_list()
            .iter()
            .filter(|m| !m.is_owned_by(self.player_id))
        {
            let defender = target.owner.and_then(|owner| board.player(owner));
            let defense = target.defense_level(defender);

            let mut by_distance: Vec<(f64, &Monster)> = sources
                .iter()
                .map(|s| (s.position.distance(&target.position), *s))
                .collect();
            by_distance.sort_by(|(da, a), (db, b)| da.total_cmp(db).then(a.id.cmp(&b.id)));

            let pending = incoming.get(&target.id).copied().unwrap_or(0);
            let mut damage = config.damage(pending, defense);
            if damage > target.count {
                continue;
            }
            let mut plan = Plan {
                sources: Vec::new(),
                destination: target.id,
                distance: 0.0,
            };
            for (distance, source) in by_distance {
                damage += config.damage(source.count / 2, defense);
                plan.sources.push(source.id);
                plan.distance += distance;
                if damage > target.count {
                    break;
                }
            }
            if damage <= target.count {
                continue;
            }

            match best.first() {
                None => best.push(plan),
                Some(current) => {
                    let key = (plan.sources.len(), plan.distance);
                    let current_key = (current.sources.len(), current.distance);
                    if key.0 < current_key.0 || (key.0 == current_key.0 && key.1 < current_key.1) {
                        best.clear();
                        best.push(plan);
                    } else if key == current_key {
                        best.push(plan);
                    }
                }
            }
        }

        let plan = best.choose(&mut self.rng)?;
        tracing::debug!(
            player_id = self.player_id,
            sources = ?plan.sources,
            destination = plan.destination,
            "AI attack decision"
        );
        Some(AttackRequest::new(plan.sources.clone(), plan.destination))
    }
}
