// Simulation tuning: fixed game constants plus the per-engine configuration.

use serde::{Deserialize, Serialize};

/// Flat stat bonus granted by a monster's type (Strength, Speed, Defense).
pub const MONSTER_TYPE_BONUS: u32 = 4;

pub const DEFAULT_TICKS_PER_SECOND: u32 = 25;
pub const DEFAULT_ROWS: usize = 40;
pub const DEFAULT_COLUMNS: usize = 70;

pub const DEFAULT_STRENGTH_STEP_WIDTH: f64 = 0.05;
pub const DEFAULT_REPRODUCTION_STEP_WIDTH: f64 = 50.0;
pub const DEFAULT_DEFENSE_STEP_WIDTH: f64 = 0.05;
pub const DEFAULT_SPEED_STEP_WIDTH: f64 = 0.08;

/// Display refresh period for the elapsed-time readout.
pub const DISPLAY_INTERVAL_MS: u64 = 500;
/// Decision cadence of an AI brain.
pub const BRAIN_INTERVAL_MS: u64 = 1500;

/// Growth interval before reproduction upgrades are applied.
pub const BASE_GROWTH_INTERVAL_MS: f64 = 1000.0;
/// Fastest growth any player can reach.
pub const MIN_GROWTH_INTERVAL_MS: f64 = 100.0;

/// Pillow speed in cells per second before speed upgrades are applied.
pub const BASE_PILLOW_SPEED: f64 = 4.0;

/// A monster reaching this count spills over onto a nearby foreign monster.
pub const OVERFLOW_COUNT: u32 = 100;
/// Maximum distance (in cells) of an automatic overflow attack.
pub const AUTO_ATTACK_RANGE: f64 = 8.0;

/// Own monsters below this count are never used as AI attack sources.
pub const AI_MIN_SOURCE_COUNT: u32 = 10;

/// Tunable parameters of one simulation engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    pub ticks_per_second: u32,
    pub rows: usize,
    pub columns: usize,
    /// Carried with the other step widths; pillow strength does not scale damage.
    pub strength_step_width: f64,
    pub reproduction_step_width: f64,
    pub defense_step_width: f64,
    pub speed_step_width: f64,
    pub display_interval_ms: u64,
    pub brain_interval_ms: u64,
    pub base_growth_interval_ms: f64,
    pub min_growth_interval_ms: f64,
    pub base_pillow_speed: f64,
    pub overflow_count: u32,
    pub auto_attack_range: f64,
    pub ai_min_source_count: u32,
    /// Seed for the AI brains' tie-breaking RNG. Each brain mixes in its player id.
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
            rows: DEFAULT_ROWS,
            columns: DEFAULT_COLUMNS,
            strength_step_width: DEFAULT_STRENGTH_STEP_WIDTH,
            reproduction_step_width: DEFAULT_REPRODUCTION_STEP_WIDTH,
            defense_step_width: DEFAULT_DEFENSE_STEP_WIDTH,
            speed_step_width: DEFAULT_SPEED_STEP_WIDTH,
            display_interval_ms: DISPLAY_INTERVAL_MS,
            brain_interval_ms: BRAIN_INTERVAL_MS,
            base_growth_interval_ms: BASE_GROWTH_INTERVAL_MS,
            min_growth_interval_ms: MIN_GROWTH_INTERVAL_MS,
            base_pillow_speed: BASE_PILLOW_SPEED,
            overflow_count: OVERFLOW_COUNT,
            auto_attack_range: AUTO_ATTACK_RANGE,
            ai_min_source_count: AI_MIN_SOURCE_COUNT,
            seed: 0,
        }
    }
}

impl EngineConfig {
    /// Milliseconds between two simulation ticks (40 ms at 25 ticks/s).
    pub fn tick_interval_ms(&self) -> u64 {
        (1000 / self.ticks_per_second.max(1)) as u64
    }

    /// Growth interval for a player with the given reproduction level.
    pub fn growth_interval_ms(&self, reproduction: u32) -> f64 {
        (self.base_growth_interval_ms - reproduction as f64 * self.reproduction_step_width)
            .max(self.min_growth_interval_ms)
    }

    /// Divisor applied to incoming damage by the defending side.
    pub fn defense_factor(&self, defense: u32) -> f64 {
        1.0 + defense as f64 * self.defense_step_width
    }

    /// Distance in cells a pillow with the given speed covers in `delta_ms`.
    pub fn pillow_travel(&self, speed: u32, delta_ms: u64) -> f64 {
        self.base_pillow_speed * (1.0 + speed as f64 * self.speed_step_width) * delta_ms as f64
            / 1000.0
    }

    /// Damage a payload deals against a defender: the payload reduced by the
    /// defense factor, at least one unit per non-empty payload.
    pub fn damage(&self, payload: u32, defense: u32) -> u32 {
        if payload == 0 {
            return 0;
        }
        let raw = payload as f64 / self.defense_factor(defense);
        (raw.round() as u32).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.ticks_per_second, 25);
        assert_eq!(cfg.tick_interval_ms(), 40);
        assert_eq!(cfg.rows, 40);
        assert_eq!(cfg.columns, 70);
        assert_eq!(cfg.display_interval_ms, 500);
    }

    #[test]
    fn test_growth_interval_clamped() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.growth_interval_ms(0), 1000.0);
        assert_eq!(cfg.growth_interval_ms(2), 900.0);
        assert_eq!(cfg.growth_interval_ms(100), 100.0);
    }

    #[test]
    fn test_damage_scaling() {
        let cfg = EngineConfig::default();
        // No defense: payload passes through unchanged
        assert_eq!(cfg.damage(20, 0), 20);
        // 20 / 1.25
        assert_eq!(cfg.damage(20, 5), 16);
        // 25 / 1.05 = 23.8
        assert_eq!(cfg.damage(25, 1), 24);
        // Tiny payload against heavy defense still hurts
        assert_eq!(cfg.damage(1, 100), 1);
        assert_eq!(cfg.damage(0, 0), 0);
    }

    #[test]
    fn test_pillow_travel() {
        let cfg = EngineConfig::default();
        let d = cfg.pillow_travel(0, 1000);
        assert!((d - 4.0).abs() < 1e-9);
        let fast = cfg.pillow_travel(5, 1000);
        assert!((fast - 5.6).abs() < 1e-9);
    }
}
