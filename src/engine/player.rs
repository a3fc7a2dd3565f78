use serde::{Deserialize, Serialize};

pub type PlayerId = u32;

/// Who controls a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerType {
    Human,
    Ai,
}

/// A participant owning monsters on the board.
#[derive(Debug, Clone, Serialize)]
pub struct Player {
    pub id: PlayerId,
    pub player_type: PlayerType,
    /// Display key shared by the player's monsters and pillows.
    pub color: String,
    pub strength: u32,
    pub speed: u32,
    pub defense: u32,
    pub reproduction: u32,
    pub point_count: u64,
    /// Share of the total board value, rounded to two decimals.
    pub percentage: f64,
}

impl Player {
    pub fn new(id: PlayerId, player_type: PlayerType, color: &str) -> Self {
        Player {
            id,
            player_type,
            color: color.to_string(),
            strength: 1,
            speed: 1,
            defense: 1,
            reproduction: 1,
            point_count: 0,
            percentage: 0.0,
        }
    }

    pub fn is_ai(&self) -> bool {
        self.player_type == PlayerType::Ai
    }

    pub fn reset_score(&mut self) {
        self.point_count = 0;
        self.percentage = 0.0;
    }

    pub fn add_points(&mut self, points: u64) {
        self.point_count += points;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_player() {
        let player = Player::new(1, PlayerType::Human, "#00ff00");
        assert_eq!(player.id, 1);
        assert!(!player.is_ai());
        assert_eq!(player.strength, 1);
        assert_eq!(player.point_count, 0);
    }

    #[test]
    fn test_points() {
        let mut player = Player::new(2, PlayerType::Ai, "red");
        assert!(player.is_ai());
        player.add_points(10);
        player.add_points(5);
        player.percentage = 0.5;
        assert_eq!(player.point_count, 15);
        player.reset_score();
        assert_eq!(player.point_count, 0);
        assert_eq!(player.percentage, 0.0);
    }

    #[test]
    fn test_player_type_serde() {
        let t: PlayerType = serde_json::from_str("\"ai\"").unwrap();
        assert_eq!(t, PlayerType::Ai);
        assert_eq!(serde_json::to_string(&PlayerType::Human).unwrap(), "\"human\"");
    }
}
