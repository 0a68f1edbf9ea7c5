use keyfall_ports::types::Seconds;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Timer<K> {
    kind: K,
    due: Seconds,
    interval: Option<Seconds>,
}

/// Every pending timeout and interval of a session in one place, so leaving a
/// phase can cancel them all at once. Time is whatever clock the owner polls
/// with; sessions use host seconds.
#[derive(Clone, Debug)]
pub struct TimerSet<K> {
    timers: Vec<Timer<K>>,
}

impl<K: Copy + PartialEq> TimerSet<K> {
    pub fn new() -> Self {
        Self { timers: Vec::new() }
    }

    /// One-shot timer. Replaces any pending timer of the same kind.
    pub fn schedule(&mut self, kind: K, due: Seconds) {
        self.cancel(kind);
        self.timers.push(Timer {
            kind,
            due,
            interval: None,
        });
    }

    /// Repeating timer first firing at `first_due`.
    pub fn schedule_interval(&mut self, kind: K, first_due: Seconds, interval: Seconds) {
        self.cancel(kind);
        self.timers.push(Timer {
            kind,
            due: first_due,
            interval: Some(interval.max(1e-3)),
        });
    }

    pub fn cancel(&mut self, kind: K) {
        self.timers.retain(|timer| timer.kind != kind);
    }

    pub fn cancel_all(&mut self) {
        self.timers.clear();
    }

    pub fn is_pending(&self, kind: K) -> bool {
        self.timers.iter().any(|timer| timer.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn due_at(&self, kind: K) -> Option<Seconds> {
        self.timers
            .iter()
            .find(|timer| timer.kind == kind)
            .map(|timer| timer.due)
    }

    /// Pops every firing up to `now` in due order. Intervals re-arm and may
    /// fire several times if the poll came late.
    pub fn due(&mut self, now: Seconds) -> Vec<(K, Seconds)> {
        let mut fired = Vec::new();
        let mut idx = 0;
        while idx < self.timers.len() {
            let timer = &mut self.timers[idx];
            if timer.due > now {
                idx += 1;
                continue;
            }
            match timer.interval {
                Some(interval) => {
                    while timer.due <= now {
                        fired.push((timer.kind, timer.due));
                        timer.due += interval;
                    }
                    idx += 1;
                }
                None => {
                    fired.push((timer.kind, timer.due));
                    self.timers.swap_remove(idx);
                }
            }
        }
        fired.sort_by(|a, b| a.1.total_cmp(&b.1));
        fired
    }
}

impl<K: Copy + PartialEq> Default for TimerSet<K> {
    fn default() -> Self {
        Self::new()
    }
}
