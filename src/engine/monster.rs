use serde::{Deserialize, Serialize};

use super::config::{EngineConfig, MONSTER_TYPE_BONUS};
use super::pillow::AttackPillow;
use super::player::{Player, PlayerId};

pub type MonsterId = u32;

/// A cell on the board: `x` is the column, `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub fn new(x: usize, y: usize) -> Self {
        Position { x, y }
    }

    /// Euclidean distance in cells.
    pub fn distance(&self, other: &Position) -> f64 {
        let dx = self.x as f64 - other.x as f64;
        let dy = self.y as f64 - other.y as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Monster type. Each non-normal type adds a flat bonus to one stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonsterType {
    #[default]
    Normal,
    Strength,
    Speed,
    Defense,
}

impl MonsterType {
    pub fn label(&self) -> &'static str {
        match self {
            MonsterType::Normal => "normal",
            MonsterType::Strength => "strength",
            MonsterType::Speed => "speed",
            MonsterType::Defense => "defense",
        }
    }
}

/// How an impact changed its destination monster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImpactOutcome {
    Reinforced { added: u32 },
    Damaged { damage: u32 },
    Captured { damage: u32, previous_owner: Option<PlayerId> },
    /// Damage matched the count exactly: the monster is left neutral at zero.
    Neutralized { damage: u32, previous_owner: Option<PlayerId> },
}

impl ImpactOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ImpactOutcome::Reinforced { .. } => "reinforced",
            ImpactOutcome::Damaged { .. } => "damaged",
            ImpactOutcome::Captured { .. } => "captured",
            ImpactOutcome::Neutralized { .. } => "neutralized",
        }
    }
}

/// A unit occupying one board cell.
#[derive(Debug, Clone, Serialize)]
pub struct Monster {
    pub id: MonsterId,
    pub owner: Option<PlayerId>,
    pub position: Position,
    pub monster_type: MonsterType,
    pub count: u32,
    /// Milliseconds of growth accumulated toward the next unit.
    #[serde(skip)]
    pub(crate) growth_ms: f64,
}

impl Monster {
    pub fn new(
        id: MonsterId,
        owner: Option<PlayerId>,
        position: Position,
        monster_type: MonsterType,
        count: u32,
    ) -> Self {
        Monster {
            id,
            owner,
            position,
            monster_type,
            count,
            growth_ms: 0.0,
        }
    }

    pub fn is_owned_by(&self, player_id: PlayerId) -> bool {
        self.owner == Some(player_id)
    }

    /// Bonus this monster adds to the attack strength of pillows it launches.
    pub fn strength_bonus(&self) -> u32 {
        if self.monster_type == MonsterType::Strength {
            MONSTER_TYPE_BONUS
        } else {
            0
        }
    }

    /// Bonus this monster adds to the speed of pillows it launches.
    pub fn speed_bonus(&self) -> u32 {
        if self.monster_type == MonsterType::Speed {
            MONSTER_TYPE_BONUS
        } else {
            0
        }
    }

    pub fn defense_bonus(&self) -> u32 {
        if self.monster_type == MonsterType::Defense {
            MONSTER_TYPE_BONUS
        } else {
            0
        }
    }

    /// Defense level against incoming pillows. Neutral monsters only have their type bonus.
    pub fn defense_level(&self, defender: Option<&Player>) -> u32 {
        defender.map(|p| p.defense).unwrap_or(0) + self.defense_bonus()
    }

    /// Split off half of the count as an attack payload.
    /// Returns None when the payload would be empty.
    pub fn split(&mut self) -> Option<u32> {
        let payload = self.count / 2;
        if payload == 0 {
            return None;
        }
        self.count -= payload;
        Some(payload)
    }

    /// Resolve an arriving pillow against this monster.
    ///
    /// `defender` is the current owner (None for a neutral monster). Friendly
    /// pillows reinforce; hostile pillows deal defense-scaled damage and capture
    /// the monster when the damage exceeds its count.
    pub fn impact(
        &mut self,
        pillow: &AttackPillow,
        defender: Option<&Player>,
        config: &EngineConfig,
    ) -> ImpactOutcome {
        if self.owner == Some(pillow.player) {
            self.count += pillow.count;
            return ImpactOutcome::Reinforced {
                added: pillow.count,
            };
        }

        let damage = config.damage(pillow.count, self.defense_level(defender));
        let previous_owner = self.owner;
        if damage < self.count {
            self.count -= damage;
            ImpactOutcome::Damaged { damage }
        } else if damage > self.count {
            self.count = damage - self.count;
            self.owner = Some(pillow.player);
            self.growth_ms = 0.0;
            ImpactOutcome::Captured {
                damage,
                previous_owner,
            }
        } else {
            self.count = 0;
            self.owner = None;
            self.growth_ms = 0.0;
            ImpactOutcome::Neutralized {
                damage,
                previous_owner,
            }
        }
    }
}
