// Logical-time scheduler for the engine's periodic handlers.
//
// Timers fire one at a time in due-time order; a handler may stop timers
// (e.g. on game over) and the stopped timers never fire afterwards, even if
// they were already due within the same `advance` window.

use super::player::PlayerId;

/// The periodic handlers driven by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Tick,
    Display,
    Brain(PlayerId),
}

#[derive(Debug, Clone)]
struct Timer {
    kind: TimerKind,
    period_ms: u64,
    next_due_ms: u64,
    active: bool,
}

/// A set of periodic timers over a shared logical clock.
#[derive(Debug, Default)]
pub struct Scheduler {
    now_ms: u64,
    /// Registration order doubles as the tie-break between equal due times.
    timers: Vec<Timer>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Register a timer (inactive). Re-registering a kind updates its period.
    pub fn add(&mut self, kind: TimerKind, period_ms: u64) {
        let period_ms = period_ms.max(1);
        match self.timers.iter_mut().find(|t| t.kind == kind) {
            Some(timer) => timer.period_ms = period_ms,
            None => self.timers.push(Timer {
                kind,
                period_ms,
                next_due_ms: 0,
                active: false,
            }),
        }
    }

    /// Activate every timer; each first fires one full period from now.
    pub fn start_all(&mut self) {
        let now = self.now_ms;
        for timer in &mut self.timers {
            timer.active = true;
            timer.next_due_ms = now + timer.period_ms;
        }
    }

    pub fn stop_all(&mut self) {
        for timer in &mut self.timers {
            timer.active = false;
        }
    }

    /// Remove every timer and rewind the clock.
    pub fn clear(&mut self) {
        self.timers.clear();
        self.now_ms = 0;
    }

    /// Time of the earliest pending firing.
    pub fn next_due_ms(&self) -> Option<u64> {
        self.timers
            .iter()
            .filter(|t| t.active)
            .map(|t| t.next_due_ms)
            .min()
    }

    /// Pop the earliest timer due at or before `until_ms`, moving the clock to
    /// its due time and scheduling its next firing. Returns None (and moves the
    /// clock to `until_ms`) when nothing else is due.
    pub fn pop_due(&mut self, until_ms: u64) -> Option<TimerKind> {
        let mut earliest: Option<usize> = None;
        for (i, timer) in self.timers.iter().enumerate() {
            if !timer.active || timer.next_due_ms > until_ms {
                continue;
            }
            match earliest {
                Some(e) if self.timers[e].next_due_ms <= timer.next_due_ms => {}
                _ => earliest = Some(i),
            }
        }

        match earliest {
            Some(i) => {
                let timer = &mut self.timers[i];
                self.now_ms = self.now_ms.max(timer.next_due_ms);
                timer.next_due_ms += timer.period_ms;
                Some(timer.kind)
            }
            None => {
                self.now_ms = self.now_ms.max(until_ms);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(s: &mut Scheduler, until: u64) -> Vec<(u64, TimerKind)> {
        let mut fired = Vec::new();
        while let Some(kind) = s.pop_due(until) {
            fired.push((s.now_ms(), kind));
        }
        fired
    }

    #[test]
    fn test_inactive_timers_never_fire() {
        let mut s = Scheduler::new();
        s.add(TimerKind::Tick, 40);
        assert!(drain(&mut s, 1000).is_empty());
        assert_eq!(s.now_ms(), 1000);
    }

    #[test]
    fn test_fires_at_period() {
        let mut s = Scheduler::new();
        s.add(TimerKind::Tick, 40);
        s.start_all();
        let fired = drain(&mut s, 100);
        assert_eq!(fired, vec![(40, TimerKind::Tick), (80, TimerKind::Tick)]);
        assert_eq!(s.now_ms(), 100);
        assert_eq!(s.next_due_ms(), Some(120));
    }

    #[test]
    fn test_interleaving_and_tie_order() {
        let mut s = Scheduler::new();
        s.add(TimerKind::Tick, 40);
        s.add(TimerKind::Display, 80);
        s.add(TimerKind::Brain(2), 80);
        s.start_all();
        let fired = drain(&mut s, 80);
        assert_eq!(
            fired,
            vec![
                (40, TimerKind::Tick),
                (80, TimerKind::Tick),
                (80, TimerKind::Display),
                (80, TimerKind::Brain(2)),
            ]
        );
    }

    #[test]
    fn test_stop_during_drain() {
        let mut s = Scheduler::new();
        s.add(TimerKind::Tick, 40);
        s.add(TimerKind::Display, 40);
        s.start_all();
        assert_eq!(s.pop_due(40), Some(TimerKind::Tick));
        s.stop_all();
        assert_eq!(s.pop_due(40), None);
        assert_eq!(s.next_due_ms(), None);
    }

    #[test]
    fn test_restart_resets_phase() {
        let mut s = Scheduler::new();
        s.add(TimerKind::Tick, 40);
        s.start_all();
        drain(&mut s, 50);
        s.stop_all();
        assert!(drain(&mut s, 70).is_empty());
        s.start_all();
        assert_eq!(s.next_due_ms(), Some(110));
    }

    #[test]
    fn test_clear() {
        let mut s = Scheduler::new();
        s.add(TimerKind::Tick, 40);
        s.start_all();
        drain(&mut s, 100);
        s.clear();
        assert_eq!(s.now_ms(), 0);
        assert_eq!(s.next_due_ms(), None);
    }
}
