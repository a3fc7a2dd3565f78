// Elapsed game time: an accumulator plus a stopwatch over the engine's logical clock.

/// Tracks how long a game has been running, excluding paused periods.
#[derive(Debug, Default, Clone)]
pub struct GameClock {
    accumulated_ms: u64,
    /// Logical time the stopwatch was last (re)started, if running.
    started_at: Option<u64>,
}

impl GameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero the accumulator and start the stopwatch at `now_ms`.
    pub fn restart(&mut self, now_ms: u64) {
        self.accumulated_ms = 0;
        self.started_at = Some(now_ms);
    }

    /// Start the stopwatch without touching the accumulator.
    pub fn resume(&mut self, now_ms: u64) {
        self.started_at = Some(now_ms);
    }

    /// Fold the running stopwatch into the accumulator, keep it running.
    pub fn fold(&mut self, now_ms: u64) {
        if let Some(started) = self.started_at {
            self.accumulated_ms += now_ms.saturating_sub(started);
            self.started_at = Some(now_ms);
        }
    }

    /// Fold and stop the stopwatch. Calling it again is a no-op.
    pub fn pause(&mut self, now_ms: u64) {
        self.fold(now_ms);
        self.started_at = None;
    }

    pub fn reset(&mut self) {
        self.accumulated_ms = 0;
        self.started_at = None;
    }

    /// Accumulated time as last folded.
    pub fn accumulated_ms(&self) -> u64 {
        self.accumulated_ms
    }

    /// Exact elapsed time at `now_ms`, including the running stopwatch.
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        self.accumulated_ms
            + self
                .started_at
                .map(|s| now_ms.saturating_sub(s))
                .unwrap_or(0)
    }
}

/// Format as `mm:ss.zzz` (minutes within the hour).
pub fn format_game_time(ms: u64) -> String {
    let minutes = (ms / 60_000) % 60;
    let seconds = (ms / 1000) % 60;
    let millis = ms % 1000;
    format!("{minutes:02}:{seconds:02}.{millis:03}")
}

/// Format as `mm:ss` (minutes within the hour).
pub fn format_display_time(ms: u64) -> String {
    let minutes = (ms / 60_000) % 60;
    let seconds = (ms / 1000) % 60;
    format!("{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_resume() {
        let mut clock = GameClock::new();
        clock.restart(100);
        assert_eq!(clock.elapsed_ms(600), 500);
        clock.pause(600);
        assert_eq!(clock.accumulated_ms(), 500);
        // Paused: time does not move
        assert_eq!(clock.elapsed_ms(5000), 500);
        clock.pause(5000);
        assert_eq!(clock.accumulated_ms(), 500);
        clock.resume(5000);
        assert_eq!(clock.elapsed_ms(5250), 750);
    }

    #[test]
    fn test_fold_keeps_running() {
        let mut clock = GameClock::new();
        clock.restart(0);
        clock.fold(500);
        assert_eq!(clock.accumulated_ms(), 500);
        assert_eq!(clock.elapsed_ms(700), 700);
        clock.fold(1000);
        assert_eq!(clock.accumulated_ms(), 1000);
        assert_eq!(clock.elapsed_ms(1200), 1200);
    }

    #[test]
    fn test_reset() {
        let mut clock = GameClock::new();
        clock.restart(0);
        clock.pause(700);
        clock.reset();
        assert_eq!(clock.elapsed_ms(10_000), 0);
        clock.fold(20_000);
        assert_eq!(clock.accumulated_ms(), 0);
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format_game_time(0), "00:00.000");
        assert_eq!(format_game_time(83_456), "01:23.456");
        assert_eq!(format_display_time(83_456), "01:23");
        // Hours are not shown
        assert_eq!(format_display_time(3_600_000 + 5_000), "00:05");
    }
}
