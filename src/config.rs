// Application configuration, loaded from environment variables and CLI flags.

use std::path::PathBuf;

use crate::engine::config::{
    EngineConfig, DEFAULT_COLUMNS, DEFAULT_DEFENSE_STEP_WIDTH, DEFAULT_REPRODUCTION_STEP_WIDTH,
    DEFAULT_ROWS, DEFAULT_SPEED_STEP_WIDTH, DEFAULT_STRENGTH_STEP_WIDTH, DEFAULT_TICKS_PER_SECOND,
};

/// Game time a headless run may take before giving up, in seconds.
const DEFAULT_MAX_SECONDS: u64 = 600;

/// Application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory containing `level*/level.json` files.
    pub data_dir: PathBuf,
    /// Level started at launch.
    pub level: u32,
    /// Simulation ticks per second.
    pub ticks_per_second: u32,
    /// Seed for the AI brains. Random when not given.
    pub seed: u64,
    /// Run one level as fast as possible and print the result.
    pub headless: bool,
    /// Game-time limit of a headless run.
    pub max_seconds: u64,
    /// Board dimensions in cells.
    pub rows: usize,
    pub columns: usize,
    /// Per-level effect of each player stat.
    pub strength_step_width: f64,
    pub reproduction_step_width: f64,
    pub defense_step_width: f64,
    pub speed_step_width: f64,
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Environment variables:
    /// - `MW_DATA_DIR` - Path to the levels directory (default: `data/levels`)
    /// - `MW_LEVEL` - Level id to start (default: 1)
    /// - `MW_TICKS_PER_SECOND` - Simulation rate (default: 25)
    /// - `MW_SEED` - AI seed (default: random)
    /// - `MW_ROWS`, `MW_COLUMNS` - Board size (default: 40 x 70)
    /// - `MW_STRENGTH_STEP`, `MW_REPRODUCTION_STEP`, `MW_DEFENSE_STEP`,
    ///   `MW_SPEED_STEP` - Stat step widths (default: 0.05, 50, 0.05, 0.08)
    ///
    /// CLI flags take precedence:
    /// - `--data-dir <DIR>`, `--level <ID>`, `--tps <N>`, `--seed <N>`
    /// - `--rows <N>`, `--columns <N>`
    /// - `--strength-step <X>`, `--reproduction-step <X>`, `--defense-step <X>`,
    ///   `--speed-step <X>`
    /// - `--headless` - Run without real-time pacing
    /// - `--max-seconds <N>` - Headless time limit (default: 600)
    pub fn load() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |key| std::env::var(key).ok())
    }

    /// Build the configuration from explicit arguments and an env lookup.
    pub fn from_sources(args: &[String], env: impl Fn(&str) -> Option<String>) -> Self {
        let value = |flag: &str, var: &str| Self::parse_cli_value(args, flag).or_else(|| env(var));

        let data_dir = value("--data-dir", "MW_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/levels"));

        let level = value("--level", "MW_LEVEL")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);

        let ticks_per_second = value("--tps", "MW_TICKS_PER_SECOND")
            .and_then(|v| v.parse().ok())
            .filter(|&tps: &u32| tps > 0)
            .unwrap_or(DEFAULT_TICKS_PER_SECOND);

        let seed = value("--seed", "MW_SEED")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(rand::random);

        let dimension = |flag: &str, var: &str, default: usize| {
            value(flag, var)
                .and_then(|v| v.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(default)
        };
        let rows = dimension("--rows", "MW_ROWS", DEFAULT_ROWS);
        let columns = dimension("--columns", "MW_COLUMNS", DEFAULT_COLUMNS);

        let step = |flag: &str, var: &str, default: f64| {
            value(flag, var)
                .and_then(|v| v.parse().ok())
                .filter(|w: &f64| w.is_finite() && *w >= 0.0)
                .unwrap_or(default)
        };
        let strength_step_width =
            step("--strength-step", "MW_STRENGTH_STEP", DEFAULT_STRENGTH_STEP_WIDTH);
        let reproduction_step_width = step(
            "--reproduction-step",
            "MW_REPRODUCTION_STEP",
            DEFAULT_REPRODUCTION_STEP_WIDTH,
        );
        let defense_step_width =
            step("--defense-step", "MW_DEFENSE_STEP", DEFAULT_DEFENSE_STEP_WIDTH);
        let speed_step_width = step("--speed-step", "MW_SPEED_STEP", DEFAULT_SPEED_STEP_WIDTH);

        let headless = args.iter().any(|a| a == "--headless");

        let max_seconds = Self::parse_cli_value(args, "--max-seconds")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_SECONDS);

        Config {
            data_dir,
            level,
            ticks_per_second,
            seed,
            headless,
            max_seconds,
            rows,
            columns,
            strength_step_width,
            reproduction_step_width,
            defense_step_width,
            speed_step_width,
        }
    }

    /// Engine parameters derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            ticks_per_second: self.ticks_per_second,
            seed: self.seed,
            rows: self.rows,
            columns: self.columns,
            strength_step_width: self.strength_step_width,
            reproduction_step_width: self.reproduction_step_width,
            defense_step_width: self.defense_step_width,
            speed_step_width: self.speed_step_width,
            ..EngineConfig::default()
        }
    }

    /// Parse a CLI flag value like `--level 3`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(&args(&["monster-wars"]), |_| None);
        assert_eq!(config.data_dir, PathBuf::from("data/levels"));
        assert_eq!(config.level, 1);
        assert_eq!(config.ticks_per_second, 25);
        assert!(!config.headless);
        assert_eq!(config.max_seconds, 600);
        assert_eq!((config.rows, config.columns), (40, 70));
        assert_eq!(config.reproduction_step_width, 50.0);
    }

    #[test]
    fn test_cli_overrides_env() {
        let config = Config::from_sources(
            &args(&["monster-wars", "--level", "3", "--seed", "9", "--headless"]),
            |key| match key {
                "MW_LEVEL" => Some("2".into()),
                "MW_DATA_DIR" => Some("/srv/levels".into()),
                "MW_SEED" => Some("1".into()),
                _ => None,
            },
        );
        assert_eq!(config.level, 3);
        assert_eq!(config.seed, 9);
        assert_eq!(config.data_dir, PathBuf::from("/srv/levels"));
        assert!(config.headless);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = Config::from_sources(&args(&["mw", "--tps", "0", "--level", "x"]), |_| None);
        assert_eq!(config.ticks_per_second, 25);
        assert_eq!(config.level, 1);
    }

    #[test]
    fn test_engine_config() {
        let config = Config::from_sources(&args(&["mw", "--tps", "50", "--seed", "4"]), |_| None);
        let engine = config.engine_config();
        assert_eq!(engine.tick_interval_ms(), 20);
        assert_eq!(engine.seed, 4);
        assert_eq!(engine.rows, 40);
    }

    #[test]
    fn test_board_and_step_overrides() {
        let config = Config::from_sources(
            &args(&["mw", "--rows", "12", "--defense-step", "0.1", "--speed-step", "-1"]),
            |key| match key {
                "MW_ROWS" => Some("30".into()),
                "MW_COLUMNS" => Some("20".into()),
                "MW_STRENGTH_STEP" => Some("0.2".into()),
                "MW_REPRODUCTION_STEP" => Some("NaN".into()),
                _ => None,
            },
        );
        assert_eq!(config.rows, 12);
        assert_eq!(config.columns, 20);
        assert_eq!(config.strength_step_width, 0.2);
        assert_eq!(config.reproduction_step_width, 50.0);
        assert_eq!(config.defense_step_width, 0.1);
        assert_eq!(config.speed_step_width, 0.08);

        let engine = config.engine_config();
        assert_eq!((engine.rows, engine.columns), (12, 20));
        assert!((engine.defense_factor(5) - 1.5).abs() < 1e-9);
        assert_eq!(engine.damage(30, 5), 20);
    }

    #[test]
    fn test_zero_board_size_falls_back() {
        let config = Config::from_sources(&args(&["mw", "--columns", "0"]), |_| None);
        assert_eq!(config.columns, 70);
    }
}
