use crate::difficulty::{DifficultyConfig, ScoreFormula};
use keyfall_domain_timeline::Timeline;
use keyfall_ports::types::{Lane, Seconds};
use serde::{Deserialize, Serialize};

/// Float slack applied to the tolerance so a tap exactly on the boundary counts.
const BOUNDARY_EPSILON: Seconds = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct JudgeConfig {
    pub tolerance_secs: Seconds,
    pub health_max: f32,
    pub damage_per_miss: f32,
    pub heal_per_hit: f32,
    pub base_value: u32,
    pub score_multiplier: u32,
    pub formula: ScoreFormula,
}

impl From<&DifficultyConfig> for JudgeConfig {
    fn from(cfg: &DifficultyConfig) -> Self {
        Self {
            tolerance_secs: cfg.tolerance_secs,
            health_max: cfg.health_max,
            damage_per_miss: cfg.damage_per_miss,
            heal_per_hit: cfg.heal_per_hit,
            base_value: cfg.base_value,
            score_multiplier: cfg.score_multiplier,
            formula: cfg.formula,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissReason {
    /// Activation with no note in range.
    EmptyTap,
    /// A note's window closed without an activation.
    Expired,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum JudgeEvent {
    Hit {
        lane: Lane,
        /// Index into the timeline at the time of judging.
        note_index: usize,
        /// Activation time minus impact time.
        delta_secs: Seconds,
        points: i64,
    },
    Miss {
        lane: Lane,
        reason: MissReason,
    },
    Stats(JudgeStats),
    /// Health reached zero. Emitted once.
    Depleted,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JudgeStats {
    pub score: i64,
    pub combo: u32,
    pub max_combo: u32,
    pub health: f32,
    pub hits: u32,
    pub misses: u32,
}

/// Matches lane activations against a timeline and keeps score, combo and
/// health. Once health is depleted every further call is a no-op.
pub struct HitJudge {
    cfg: JudgeConfig,
    stats: JudgeStats,
}

impl HitJudge {
    pub fn new(cfg: JudgeConfig) -> Self {
        Self {
            cfg,
            stats: JudgeStats {
                health: cfg.health_max,
                ..JudgeStats::default()
            },
        }
    }

    pub fn config(&self) -> &JudgeConfig {
        &self.cfg
    }

    pub fn stats(&self) -> JudgeStats {
        self.stats
    }

    pub fn is_depleted(&self) -> bool {
        self.stats.health <= 0.0
    }

    pub fn reset(&mut self) {
        self.stats = JudgeStats {
            health: self.cfg.health_max,
            ..JudgeStats::default()
        };
    }

    /// Judges an activation of `lane` at transport time `now` against the
    /// nearest unconsumed note in that lane.
    pub fn on_activation(
        &mut self,
        timeline: &mut Timeline,
        lane: Lane,
        now: Seconds,
    ) -> Vec<JudgeEvent> {
        let mut events = Vec::new();
        if self.is_depleted() {
            return events;
        }

        let window = self.cfg.tolerance_secs + BOUNDARY_EPSILON;
        let nearest = timeline
            .notes()
            .iter()
            .enumerate()
            .filter(|(_, note)| note.lane == lane && !note.consumed)
            .map(|(idx, note)| (idx, now - timeline.impact_time(note)))
            .filter(|(_, delta)| delta.abs() <= window)
            .min_by(|a, b| a.1.abs().total_cmp(&b.1.abs()));

        match nearest {
            Some((note_index, delta_secs)) if timeline.consume(note_index) => {
                let points = self.register_hit();
                events.push(JudgeEvent::Hit {
                    lane,
                    note_index,
                    delta_secs,
                    points,
                });
                events.push(JudgeEvent::Stats(self.stats));
            }
            _ => {
                events.push(JudgeEvent::Miss {
                    lane,
                    reason: MissReason::EmptyTap,
                });
                self.register_miss(&mut events);
            }
        }

        events
    }

    /// Consumes every note whose window closed before `now` and charges a miss
    /// for each.
    pub fn expire(&mut self, timeline: &mut Timeline, now: Seconds) -> Vec<JudgeEvent> {
        let mut events = Vec::new();
        if self.is_depleted() {
            return events;
        }

        let tolerance = self.cfg.tolerance_secs + BOUNDARY_EPSILON;
        let expired: Vec<(usize, Lane)> = timeline
            .notes()
            .iter()
            .enumerate()
            .filter(|(_, note)| !note.consumed && now - timeline.impact_time(note) > tolerance)
            .map(|(idx, note)| (idx, note.lane))
            .collect();

        for (idx, lane) in expired {
            if self.is_depleted() {
                break;
            }
            if !timeline.consume(idx) {
                continue;
            }
            events.push(JudgeEvent::Miss {
                lane,
                reason: MissReason::Expired,
            });
            self.register_miss(&mut events);
        }

        events
    }

    fn register_hit(&mut self) -> i64 {
        self.stats.hits += 1;
        self.stats.combo += 1;
        self.stats.max_combo = self.stats.max_combo.max(self.stats.combo);
        let points =
            self.cfg
                .formula
                .points(self.cfg.base_value, self.cfg.score_multiplier, self.stats.combo);
        self.stats.score = self.stats.score.saturating_add(points);
        self.stats.health = (self.stats.health + self.cfg.heal_per_hit).min(self.cfg.health_max);
        points
    }

    fn register_miss(&mut self, events: &mut Vec<JudgeEvent>) {
        self.stats.misses += 1;
        self.stats.combo = 0;
        self.stats.health = (self.stats.health - self.cfg.damage_per_miss).max(0.0);
        events.push(JudgeEvent::Stats(self.stats));
        if self.is_depleted() {
            log::info!(
                "health depleted: score={} max_combo={}",
                self.stats.score,
                self.stats.max_combo
            );
            events.push(JudgeEvent::Depleted);
        }
    }
}
