// Level descriptors and the data-directory loader.
//
// Each level lives in its own `level*` directory as a `level.json` file.
// Broken levels are logged and skipped; they never stop the loader.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::monster::{MonsterId, MonsterType};
use crate::engine::player::{PlayerId, PlayerType};
use crate::metrics;

/// Why a level could not be loaded or placed on a board.
#[derive(Debug, Error)]
pub enum LevelError {
    #[error("level file {0} does not exist")]
    Missing(PathBuf),
    #[error("cannot read level file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse level file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("level {level}: {reason}")]
    Invalid { level: u32, reason: String },
}

fn default_stat() -> u32 {
    1
}

fn default_color() -> String {
    "#808080".to_string()
}

/// A player as described by a level file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerDescriptor {
    pub id: PlayerId,
    #[serde(rename = "type")]
    pub player_type: PlayerType,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_stat")]
    pub strength: u32,
    #[serde(default = "default_stat")]
    pub speed: u32,
    #[serde(default = "default_stat")]
    pub defense: u32,
    #[serde(default = "default_stat")]
    pub reproduction: u32,
}

/// A monster's starting state as described by a level file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonsterDescriptor {
    pub id: MonsterId,
    pub x: usize,
    pub y: usize,
    /// Owning player; absent or 0 means neutral.
    #[serde(default)]
    pub owner: Option<PlayerId>,
    #[serde(rename = "type", default)]
    pub monster_type: MonsterType,
    pub value: u32,
}

impl MonsterDescriptor {
    pub fn owner_id(&self) -> Option<PlayerId> {
        self.owner.filter(|&id| id != 0)
    }
}

/// A complete level: ordered players and monsters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Level {
    pub id: u32,
    pub name: String,
    pub players: Vec<PlayerDescriptor>,
    pub monsters: Vec<MonsterDescriptor>,
}

impl Level {
    pub fn from_json(json: &str) -> Result<Self, LevelError> {
        let level: Level = serde_json::from_str(json)?;
        level.validate_ids()?;
        Ok(level)
    }

    fn invalid(&self, reason: String) -> LevelError {
        LevelError::Invalid {
            level: self.id,
            reason,
        }
    }

    /// Check ids are unique and every owner refers to a listed player.
    pub fn validate_ids(&self) -> Result<(), LevelError> {
        let mut player_ids = HashSet::new();
        for p in &self.players {
            if p.id == 0 {
                return Err(self.invalid("player id 0 is reserved for neutral".into()));
            }
            if !player_ids.insert(p.id) {
                return Err(self.invalid(format!("duplicate player id {}", p.id)));
            }
        }
        let mut monster_ids = HashSet::new();
        for m in &self.monsters {
            if !monster_ids.insert(m.id) {
                return Err(self.invalid(format!("duplicate monster id {}", m.id)));
            }
            if let Some(owner) = m.owner_id() {
                if !player_ids.contains(&owner) {
                    return Err(self.invalid(format!(
                        "monster {} owned by unknown player {}",
                        m.id, owner
                    )));
                }
            }
        }
        Ok(())
    }

    /// Check every monster fits on a board of the given size, one per cell.
    pub fn validate_placement(&self, rows: usize, columns: usize) -> Result<(), LevelError> {
        let mut occupied = HashSet::new();
        for m in &self.monsters {
            if m.x >= columns || m.y >= rows {
                return Err(self.invalid(format!(
                    "monster {} at ({}, {}) is outside the {}x{} board",
                    m.id, m.x, m.y, rows, columns
                )));
            }
            if !occupied.insert((m.x, m.y)) {
                return Err(self.invalid(format!(
                    "monster {} shares cell ({}, {}) with another monster",
                    m.id, m.x, m.y
                )));
            }
        }
        Ok(())
    }
}

/// Load and parse a single level file.
pub fn load_level_file(path: &Path) -> Result<Level, LevelError> {
    if !path.exists() {
        return Err(LevelError::Missing(path.to_path_buf()));
    }
    let contents = std::fs::read_to_string(path).map_err(|source| LevelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Level::from_json(&contents)
}

/// Scan `data_dir` for `level*/level.json` files. Returns the loadable levels
/// sorted by id; every failure is logged and skipped.
pub fn load_levels(data_dir: &Path) -> Vec<Level> {
    tracing::info!(dir = %data_dir.display(), "Searching level data");

    let entries = match std::fs::read_dir(data_dir) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(dir = %data_dir.display(), "Cannot read level directory: {e}");
            return Vec::new();
        }
    };

    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("level"))
        })
        .collect();
    dirs.sort();

    let mut levels: Vec<Level> = Vec::new();
    for dir in dirs {
        let file = dir.join("level.json");
        match load_level_file(&file) {
            Ok(level) => {
                if levels.iter().any(|l| l.id == level.id) {
                    tracing::warn!(level_id = level.id, path = %file.display(), "Duplicate level id, skipping");
                    metrics::LEVEL_LOAD_FAILURES_TOTAL.inc();
                    continue;
                }
                tracing::info!(level_id = level.id, name = %level.name, "Loaded level");
                metrics::LEVELS_LOADED_TOTAL.inc();
                levels.push(level);
            }
            Err(e) => {
                tracing::warn!(path = %file.display(), "Skipping level: {e}");
                metrics::LEVEL_LOAD_FAILURES_TOTAL.inc();
            }
        }
    }

    levels.sort_by_key(|l| l.id);
    levels
}

/// Loaded levels addressable by id, kept in id order.
#[derive(Debug, Clone, Default)]
pub struct LevelRegistry {
    levels: BTreeMap<u32, Level>,
}

impl LevelRegistry {
    pub fn new(levels: Vec<Level>) -> Self {
        LevelRegistry {
            levels: levels.into_iter().map(|l| (l.id, l)).collect(),
        }
    }

    pub fn from_dir(data_dir: &Path) -> Self {
        Self::new(load_levels(data_dir))
    }

    pub fn get(&self, id: u32) -> Option<&Level> {
        self.levels.get(&id)
    }

    pub fn ids(&self) -> Vec<u32> {
        self.levels.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Level> {
        self.levels.values()
    }
}
