// Integration tests for loading level data from a directory tree.

use std::path::PathBuf;

use monster_wars::engine::config::EngineConfig;
use monster_wars::engine::server::run_level_headless;
use monster_wars::levels::{load_level_file, load_levels, LevelError, LevelRegistry};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/levels")
}

fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data/levels")
}

#[test]
fn test_broken_levels_are_skipped() {
    // level2 is malformed, level3 repeats id 1, level4 has no file,
    // notalevel does not match the directory pattern
    let levels = load_levels(&fixtures_dir());
    assert_eq!(levels.len(), 1);
    assert_eq!(levels[0].id, 1);
    assert_eq!(levels[0].name, "Fixture Duel");
    assert_eq!(levels[0].monsters.len(), 3);
}

#[test]
fn test_load_single_files() {
    let ok = load_level_file(&fixtures_dir().join("level1/level.json")).unwrap();
    assert_eq!(ok.players.len(), 2);

    let broken = load_level_file(&fixtures_dir().join("level2/level.json")).unwrap_err();
    assert!(matches!(broken, LevelError::Parse(_)));

    let missing = load_level_file(&fixtures_dir().join("level4/level.json")).unwrap_err();
    assert!(matches!(missing, LevelError::Missing(_)));
}

#[test]
fn test_shipped_levels_fit_the_default_board() {
    let config = EngineConfig::default();
    let registry = LevelRegistry::from_dir(&data_dir());
    assert!(registry.len() >= 2);
    for level in registry.iter() {
        level
            .validate_placement(config.rows, config.columns)
            .unwrap_or_else(|e| panic!("level {} does not fit: {e}", level.id));
    }
}

#[test]
fn test_shipped_levels_run_headless() {
    for id in LevelRegistry::from_dir(&data_dir()).ids() {
        let registry = LevelRegistry::from_dir(&data_dir());
        let config = EngineConfig {
            seed: 3,
            ..EngineConfig::default()
        };
        let result = run_level_headless(registry, id, config, 30_000).unwrap();
        assert!(result.tick_count > 0);
        assert!(result.elapsed_ms <= 30_000);
        let sum: f64 = result.final_scores.iter().map(|p| p.percentage).sum();
        assert!(sum <= 1.0 + 0.01 * result.final_scores.len() as f64);
    }
}
