use crate::model::{Note, Timeline, TimelineSource};
use keyfall_ports::types::{Lane, Seconds};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Picks lanes uniformly in `[0, lanes)`. Seeded generators replay the same sequence.
#[derive(Clone, Debug)]
pub struct LaneGenerator {
    rng: StdRng,
    lanes: Lane,
}

impl LaneGenerator {
    pub fn new(lanes: Lane, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            lanes: lanes.max(1),
        }
    }

    pub fn lanes(&self) -> Lane {
        self.lanes
    }

    pub fn next_lane(&mut self) -> Lane {
        self.rng.gen_range(0..self.lanes)
    }

    /// One generated note whose onset is the current transport time.
    pub fn spawn(&mut self, onset: Seconds, duration: Seconds) -> Note {
        Note::new(self.next_lane(), onset, duration)
    }

    pub fn chance(&mut self, probability: f64) -> bool {
        self.rng.gen::<f64>() < probability
    }
}

/// Fixed-length chart on a half-beat grid: each slot holds a note with
/// probability `density * beat`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridPattern {
    pub bpm: f64,
    /// Notes per second.
    pub density: f64,
}

impl GridPattern {
    pub const BEGINNER: GridPattern = GridPattern {
        bpm: 90.0,
        density: 0.7,
    };
    pub const MEDIUM: GridPattern = GridPattern {
        bpm: 110.0,
        density: 1.1,
    };
    pub const EXPERT: GridPattern = GridPattern {
        bpm: 140.0,
        density: 1.6,
    };

    pub fn beat_secs(&self) -> Seconds {
        60.0 / self.bpm.max(1.0)
    }
}

pub const GRID_START_SECS: Seconds = 1.0;

pub fn grid_beatmap(
    pattern: GridPattern,
    generator: &mut LaneGenerator,
    length_secs: Seconds,
    lead_secs: Seconds,
) -> Timeline {
    let beat = pattern.beat_secs();
    let step = beat / 2.0;
    let probability = pattern.density * beat;
    let mut timeline = Timeline::new(TimelineSource::Generated, lead_secs);
    let mut t = GRID_START_SECS;
    while t < length_secs {
        if generator.chance(probability) {
            timeline.push(generator.spawn(t, step));
        }
        t += step;
    }
    timeline
}
