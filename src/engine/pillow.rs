// Attack pillows and the arena that owns them while they are in flight.

use std::fmt;

use serde::Serialize;

use super::config::EngineConfig;
use super::monster::{MonsterId, Position};
use super::player::PlayerId;

/// Stable identity of one attack instance: arena slot plus generation.
/// A stale id (its slot reused by a later pillow) never resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PillowId {
    index: u32,
    generation: u32,
}

impl PillowId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        PillowId { index, generation }
    }
}

impl fmt::Display for PillowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

impl Serialize for PillowId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A packet of monsters travelling from a source to a destination monster.
///
/// Everything except `progress` is fixed at launch.
#[derive(Debug, Clone)]
pub struct AttackPillow {
    pub id: PillowId,
    pub player: PlayerId,
    pub color: String,
    pub source: MonsterId,
    pub destination: MonsterId,
    pub source_position: Position,
    pub destination_position: Position,
    /// Payload split off the source monster.
    pub count: u32,
    pub strength: u32,
    pub speed: u32,
    /// Cells between source and destination.
    pub distance: f64,
    /// Cells travelled so far.
    pub progress: f64,
}

impl AttackPillow {
    /// Move the pillow forward. Returns true once it has reached its destination.
    pub fn advance(&mut self, delta_ms: u64, config: &EngineConfig) -> bool {
        self.progress += config.pillow_travel(self.speed, delta_ms);
        self.has_arrived()
    }

    pub fn has_arrived(&self) -> bool {
        self.progress >= self.distance
    }

    pub fn snapshot(&self) -> PillowSnapshot {
        PillowSnapshot {
            id: self.id,
            count: self.count,
            color: self.color.clone(),
            speed: self.speed,
            source_x: self.source_position.x,
            source_y: self.source_position.y,
            destination_x: self.destination_position.x,
            destination_y: self.destination_position.y,
        }
    }
}

/// Read-only view of a pillow for the presentation layer.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PillowSnapshot {
    pub id: PillowId,
    pub count: u32,
    pub color: String,
    pub speed: u32,
    pub source_x: usize,
    pub source_y: usize,
    pub destination_x: usize,
    pub destination_y: usize,
}

/// Launch parameters of a pillow, before the arena assigns its id.
#[derive(Debug, Clone)]
pub struct PillowLaunch {
    pub player: PlayerId,
    pub color: String,
    pub source: MonsterId,
    pub destination: MonsterId,
    pub source_position: Position,
    pub destination_position: Position,
    pub count: u32,
    pub strength: u32,
    pub speed: u32,
}

struct Slot {
    generation: u32,
    pillow: Option<AttackPillow>,
}

/// Generational arena of in-flight pillows, iterated in launch order.
#[derive(Default)]
pub struct PillowArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    /// Live ids in launch order.
    order: Vec<PillowId>,
}

impl PillowArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Store a new pillow and return its id.
    pub fn insert(&mut self, launch: PillowLaunch) -> PillowId {
        let (index, generation) = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.generation += 1;
                (index, slot.generation)
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    pillow: None,
                });
                ((self.slots.len() - 1) as u32, 0)
            }
        };
        let id = PillowId::new(index, generation);
        let distance = launch.source_position.distance(&launch.destination_position);
        self.slots[index as usize].pillow = Some(AttackPillow {
            id,
            player: launch.player,
            color: launch.color,
            source: launch.source,
            destination: launch.destination,
            source_position: launch.source_position,
            destination_position: launch.destination_position,
            count: launch.count,
            strength: launch.strength,
            speed: launch.speed,
            distance,
            progress: 0.0,
        });
        self.order.push(id);
        id
    }

    pub fn get(&self, id: PillowId) -> Option<&AttackPillow> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.pillow.as_ref())
    }

    pub fn get_mut(&mut self, id: PillowId) -> Option<&mut AttackPillow> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.pillow.as_mut())
    }

    /// Take a pillow out of the arena. Unknown or stale ids return None.
    pub fn remove(&mut self, id: PillowId) -> Option<AttackPillow> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let pillow = slot.pillow.take()?;
        self.free.push(id.index);
        self.order.retain(|&live| live != id);
        Some(pillow)
    }

    /// Ids of live pillows in launch order.
    pub fn ids(&self) -> Vec<PillowId> {
        self.order.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttackPillow> {
        self.order.iter().filter_map(|&id| self.get(id))
    }

    /// Drop every pillow. Slots keep their generation so old ids stay stale.
    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.pillow.take().is_some() {
                self.free.push(index as u32);
            }
        }
        self.order.clear();
    }
}
