// Prometheus metrics definitions for the Monster Wars engine.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Gauges ───────────────────────────────────────────────────────

    /// Games started and not yet stopped.
    pub static ref ACTIVE_GAMES: IntGauge =
        IntGauge::new("monsterwars_active_games", "Games started and not yet stopped").unwrap();

    /// Attack pillows currently in flight.
    pub static ref PILLOWS_IN_FLIGHT: IntGauge =
        IntGauge::new("monsterwars_pillows_in_flight", "Attack pillows currently in flight").unwrap();

    // ── Counters ─────────────────────────────────────────────────────

    /// Total games started.
    pub static ref GAMES_STARTED_TOTAL: IntCounter =
        IntCounter::new("monsterwars_games_started_total", "Total games started").unwrap();

    /// Total games finished with a winner, by winner type (human, ai).
    pub static ref GAMES_FINISHED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("monsterwars_games_finished_total", "Total games finished with a winner"),
        &["winner"],
    )
    .unwrap();

    /// Total pillows launched, by origin (player, ai, overflow).
    pub static ref PILLOWS_LAUNCHED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("monsterwars_pillows_launched_total", "Total attack pillows launched"),
        &["origin"],
    )
    .unwrap();

    /// Total pillow impacts, by outcome.
    pub static ref PILLOW_IMPACTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("monsterwars_pillow_impacts_total", "Total attack pillow impacts"),
        &["outcome"],
    )
    .unwrap();

    /// Attack sources dropped from a request, by reason.
    pub static ref ATTACK_SOURCES_SKIPPED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("monsterwars_attack_sources_skipped_total", "Attack sources dropped from a request"),
        &["reason"],
    )
    .unwrap();

    /// Levels successfully loaded from disk.
    pub static ref LEVELS_LOADED_TOTAL: IntCounter =
        IntCounter::new("monsterwars_levels_loaded_total", "Levels loaded").unwrap();

    /// Level files that were skipped because they could not be loaded.
    pub static ref LEVEL_LOAD_FAILURES_TOTAL: IntCounter =
        IntCounter::new("monsterwars_level_load_failures_total", "Level files skipped").unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// Per-tick processing time in milliseconds.
    pub static ref TICK_DURATION_MS: Histogram = Histogram::with_opts(
        HistogramOpts::new("monsterwars_tick_duration_ms", "Per-tick processing time in ms")
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 40.0]),
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Call once at startup.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(ACTIVE_GAMES.clone()),
        Box::new(PILLOWS_IN_FLIGHT.clone()),
        Box::new(GAMES_STARTED_TOTAL.clone()),
        Box::new(GAMES_FINISHED_TOTAL.clone()),
        Box::new(PILLOWS_LAUNCHED_TOTAL.clone()),
        Box::new(PILLOW_IMPACTS_TOTAL.clone()),
        Box::new(ATTACK_SOURCES_SKIPPED_TOTAL.clone()),
        Box::new(LEVELS_LOADED_TOTAL.clone()),
        Box::new(LEVEL_LOAD_FAILURES_TOTAL.clone()),
        Box::new(TICK_DURATION_MS.clone()),
    ];

    for c in collectors {
        // Already registered (e.g. a second call from tests) is fine
        if let Err(e) = REGISTRY.register(c) {
            tracing::debug!("metric registration skipped: {e}");
        }
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("failed to encode metrics: {e}");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_metrics_returns_string() {
        register_metrics();
        register_metrics();
        GAMES_STARTED_TOTAL.inc();
        let output = gather_metrics();
        assert!(output.contains("monsterwars_games_started_total"));
    }

    #[test]
    fn test_metric_increments() {
        let launched = PILLOWS_LAUNCHED_TOTAL.with_label_values(&["ai"]).get();
        PILLOWS_LAUNCHED_TOTAL.with_label_values(&["ai"]).inc();
        PILLOW_IMPACTS_TOTAL.with_label_values(&["captured"]).inc();
        ATTACK_SOURCES_SKIPPED_TOTAL
            .with_label_values(&["insufficient_count"])
            .inc();
        GAMES_FINISHED_TOTAL.with_label_values(&["human"]).inc();
        TICK_DURATION_MS.observe(0.2);
        assert!(PILLOWS_LAUNCHED_TOTAL.with_label_values(&["ai"]).get() > launched);
    }
}
