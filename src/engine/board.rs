// The board: grid topology, player roster and monster roster.

use std::collections::HashMap;

use crate::levels::{Level, LevelError};

use super::attack::AttackRequest;
use super::config::EngineConfig;
use super::monster::{Monster, MonsterId, Position};
use super::player::{Player, PlayerId};

/// Grid of `rows * columns` cells, each holding at most one monster.
pub struct Board {
    pub rows: usize,
    pub columns: usize,
    players: Vec<Player>,
    monsters: Vec<Monster>,
    /// Monster id -> index into `monsters`.
    index: HashMap<MonsterId, usize>,
    level: Option<Level>,
    changed: bool,
}

impl Board {
    pub fn new(rows: usize, columns: usize) -> Self {
        Board {
            rows,
            columns,
            players: Vec::new(),
            monsters: Vec::new(),
            index: HashMap::new(),
            level: None,
            changed: false,
        }
    }

    /// Replace the board contents with the starting layout of `level`.
    /// On error the board is left untouched.
    pub fn set_level(&mut self, level: &Level) -> Result<(), LevelError> {
        level.validate_ids()?;
        level.validate_placement(self.rows, self.columns)?;
        self.level = Some(level.clone());
        self.reset_board();
        Ok(())
    }

    /// Restore the starting layout of the current level (or an empty board).
    pub fn reset_board(&mut self) {
        self.players.clear();
        self.monsters.clear();
        self.index.clear();

        if let Some(level) = &self.level {
            for pd in &level.players {
                let mut player = Player::new(pd.id, pd.player_type, &pd.color);
                player.strength = pd.strength;
                player.speed = pd.speed;
                player.defense = pd.defense;
                player.reproduction = pd.reproduction;
                self.players.push(player);
            }
            for md in &level.monsters {
                let position = Position::new(md.x, md.y);
                let monster =
                    Monster::new(md.id, md.owner_id(), position, md.monster_type, md.value);
                self.index.insert(md.id, self.monsters.len());
                self.monsters.push(monster);
            }
        }
        self.changed = true;
    }

    pub fn monster(&self, id: MonsterId) -> Option<&Monster> {
        self.index.get(&id).map(|&i| &self.monsters[i])
    }

    pub fn monster_mut(&mut self, id: MonsterId) -> Option<&mut Monster> {
        match self.index.get(&id) {
            Some(&i) => Some(&mut self.monsters[i]),
            None => None,
        }
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn players_list(&self) -> &[Player] {
        &self.players
    }

    pub(crate) fn players_mut(&mut self) -> &mut [Player] {
        &mut self.players
    }

    pub fn monsters_list(&self) -> &[Monster] {
        &self.monsters
    }

    /// Resolve a pillow against its destination. Unknown destinations are ignored.
    pub(crate) fn impact(
        &mut self,
        pillow: &super::pillow::AttackPillow,
        config: &EngineConfig,
    ) -> Option<super::monster::ImpactOutcome> {
        let i = *self.index.get(&pillow.destination)?;
        let monster = &mut self.monsters[i];
        let defender = monster
            .owner
            .and_then(|owner| self.players.iter().find(|p| p.id == owner));
        let outcome = monster.impact(pillow, defender, config);
        self.changed = true;
        Some(outcome)
    }

    pub(crate) fn mark_changed(&mut self) {
        self.changed = true;
    }

    /// Report and clear the board-changed notification.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    /// Grow every owned monster by `delta_ms` worth of reproduction and return
    /// the automatic attacks triggered by monsters reaching the overflow count.
    pub fn grow(&mut self, delta_ms: u64, config: &EngineConfig) -> Vec<AttackRequest> {
        let players = &self.players;
        let mut grew = false;
        for monster in self.monsters.iter_mut() {
            let Some(owner) = monster.owner else {
                continue;
            };
            let reproduction = players
                .iter()
                .find(|p| p.id == owner)
                .map(|p| p.reproduction)
                .unwrap_or(0);
            let interval = config.growth_interval_ms(reproduction);
            monster.growth_ms += delta_ms as f64;
            while monster.growth_ms >= interval {
                monster.growth_ms -= interval;
                monster.count += 1;
                grew = true;
            }
        }
        if grew {
            self.changed = true;
        }

        self.monsters
            .iter()
            .filter(|m| m.owner.is_some() && m.count >= config.overflow_count)
            .filter_map(|m| {
                self.nearest_foreign(m, config.auto_attack_range)
                    .map(|target| AttackRequest::single(m.id, target.id))
            })
            .collect()
    }

    /// Nearest monster not owned by `monster`'s owner within `range` cells.
    /// Equal distances go to the lower monster id.
    pub fn nearest_foreign(&self, monster: &Monster, range: f64) -> Option<&Monster> {
        self.monsters
            .iter()
            .filter(|other| other.id != monster.id && other.owner != monster.owner)
            .map(|other| (monster.position.distance(&other.position), other))
            .filter(|(d, _)| *d <= range)
            .min_by(|(da, a), (db, b)| da.total_cmp(db).then(a.id.cmp(&b.id)))
            .map(|(_, other)| other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::monster::MonsterType;
    use crate::engine::player::PlayerType;
    use crate::levels::{MonsterDescriptor, PlayerDescriptor};

    fn player(id: PlayerId, player_type: PlayerType) -> PlayerDescriptor {
        PlayerDescriptor {
            id,
            player_type,
            color: format!("color{id}"),
            strength: 1,
            speed: 1,
            defense: 1,
            reproduction: 0,
        }
    }

    fn monster(id: MonsterId, x: usize, y: usize, owner: Option<PlayerId>, value: u32) -> MonsterDescriptor {
        MonsterDescriptor {
            id,
            x,
            y,
            owner,
            monster_type: MonsterType::Normal,
            value,
        }
    }

    fn make_level() -> Level {
        Level {
            id: 1,
            name: "test".into(),
            players: vec![player(1, PlayerType::Human), player(2, PlayerType::Ai)],
            monsters: vec![
                monster(1, 1, 1, Some(1), 10),
                monster(2, 5, 1, Some(2), 10),
                monster(3, 3, 3, None, 4),
            ],
        }
    }

    #[test]
    fn test_set_level() {
        let mut board = Board::new(10, 10);
        board.set_level(&make_level()).unwrap();
        assert_eq!(board.players_list().len(), 2);
        assert_eq!(board.monsters_list().len(), 3);
        assert_eq!(board.monster(2).unwrap().owner, Some(2));
        assert_eq!(board.monster(3).unwrap().position, Position::new(3, 3));
        assert!(board.monster(99).is_none());
        assert!(board.take_changed());
        assert!(!board.take_changed());
    }

    #[test]
    fn test_set_level_rejects_off_board() {
        let mut board = Board::new(4, 4);
        let err = board.set_level(&make_level()).unwrap_err();
        assert!(matches!(err, LevelError::Invalid { .. }));
        assert!(board.monsters_list().is_empty());
        board.reset_board();
        assert!(board.players_list().is_empty());
    }

    #[test]
    fn test_reset_board_restores_layout() {
        let mut board = Board::new(10, 10);
        board.set_level(&make_level()).unwrap();
        {
            let m = board.monster_mut(1).unwrap();
            m.count = 99;
            m.owner = Some(2);
        }
        board.players_mut()[0].add_points(50);
        board.reset_board();
        let m = board.monster(1).unwrap();
        assert_eq!(m.count, 10);
        assert_eq!(m.owner, Some(1));
        assert_eq!(board.players_list()[0].point_count, 0);
    }

    #[test]
    fn test_growth_only_for_owned_monsters() {
        let cfg = EngineConfig::default();
        let mut board = Board::new(10, 10);
        board.set_level(&make_level()).unwrap();
        board.take_changed();
        // Reproduction 0 grows one unit per second
        for _ in 0..25 {
            board.grow(40, &cfg);
        }
        assert_eq!(board.monster(1).unwrap().count, 11);
        assert_eq!(board.monster(2).unwrap().count, 11);
        assert_eq!(board.monster(3).unwrap().count, 4);
        assert!(board.take_changed());
    }

    #[test]
    fn test_growth_faster_with_reproduction() {
        let cfg = EngineConfig::default();
        let mut level = make_level();
        level.players[0].reproduction = 10; // 500 ms per unit
        let mut board = Board::new(10, 10);
        board.set_level(&level).unwrap();
        board.grow(1000, &cfg);
        assert_eq!(board.monster(1).unwrap().count, 12);
        assert_eq!(board.monster(2).unwrap().count, 11);
    }

    #[test]
    fn test_overflow_triggers_attack_on_nearest_foreign() {
        let cfg = EngineConfig::default();
        let mut level = make_level();
        level.monsters[0].value = cfg.overflow_count;
        let mut board = Board::new(10, 10);
        board.set_level(&level).unwrap();
        let triggers = board.grow(40, &cfg);
        // Neutral monster 3 at distance ~2.83 is closer than monster 2 at 4
        assert_eq!(triggers, vec![AttackRequest::single(1, 3)]);
    }

    #[test]
    fn test_overflow_out_of_range_does_nothing() {
        let mut cfg = EngineConfig::default();
        cfg.auto_attack_range = 1.0;
        let mut level = make_level();
        level.monsters[0].value = cfg.overflow_count;
        let mut board = Board::new(10, 10);
        board.set_level(&level).unwrap();
        assert!(board.grow(40, &cfg).is_empty());
    }
}
