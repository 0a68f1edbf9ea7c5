use keyfall_ports::types::Seconds;
use serde::{Deserialize, Serialize};

pub type Tick = i64;

/// 120 bpm, the SMF default until the first tempo event.
pub const DEFAULT_US_PER_QUARTER: u32 = 500_000;

/// A tempo event: from `tick` on, a quarter note lasts `us_per_quarter`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoPoint {
    pub tick: Tick,
    pub us_per_quarter: u32,
}

#[derive(Clone, Copy, Debug)]
struct Span {
    from_tick: Tick,
    from_secs: Seconds,
    secs_per_tick: Seconds,
}

/// Tick to seconds conversion across tempo changes. Each span knows the
/// seconds elapsed at its first tick, so a lookup is one binary search.
#[derive(Clone, Debug)]
pub struct TempoMap {
    ppq: u16,
    spans: Vec<Span>,
}

impl TempoMap {
    pub fn new(ppq: u16, mut points: Vec<TempoPoint>) -> Self {
        let ppq = ppq.max(1);
        points.retain(|p| p.tick >= 0);
        points.sort_by_key(|p| p.tick);
        points.dedup_by_key(|p| p.tick);

        let secs_per_tick =
            |us_per_quarter: u32| f64::from(us_per_quarter.max(1)) / 1_000_000.0 / f64::from(ppq);
        let mut spans = vec![Span {
            from_tick: 0,
            from_secs: 0.0,
            secs_per_tick: secs_per_tick(DEFAULT_US_PER_QUARTER),
        }];
        for point in points {
            let Some(last) = spans.last_mut() else {
                break;
            };
            if point.tick == last.from_tick {
                last.secs_per_tick = secs_per_tick(point.us_per_quarter);
                continue;
            }
            let from_secs = last.from_secs + (point.tick - last.from_tick) as f64 * last.secs_per_tick;
            spans.push(Span {
                from_tick: point.tick,
                from_secs,
                secs_per_tick: secs_per_tick(point.us_per_quarter),
            });
        }

        Self { ppq, spans }
    }

    pub fn ppq(&self) -> u16 {
        self.ppq
    }

    pub fn tick_to_secs(&self, tick: Tick) -> Seconds {
        let index = self
            .spans
            .partition_point(|span| span.from_tick <= tick)
            .saturating_sub(1);
        match self.spans.get(index) {
            Some(span) => span.from_secs + (tick - span.from_tick) as f64 * span.secs_per_tick,
            None => 0.0,
        }
    }
}
