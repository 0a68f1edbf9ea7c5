use keyfall_ports::types::{Lane, Seconds};
use serde::{Deserialize, Serialize};

/// How a hit's points grow with the combo.
///
/// Earlier game iterations disagreed (some scored `mult * combo`, others
/// `mult * 2^combo`), so the curve is chosen per difficulty instead of fixed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreFormula {
    /// `base * mult * combo`
    Linear,
    /// `base * mult * 2^combo`
    Exponential,
    /// `base * mult + (combo - 1) * per_combo`
    ComboBonus { per_combo: u32 },
}

/// Exponent cap so long streaks saturate instead of overflowing.
const MAX_EXPONENT: u32 = 40;

impl ScoreFormula {
    /// Points for a hit that brought the combo to `combo` (already incremented).
    pub fn points(self, base: u32, multiplier: u32, combo: u32) -> i64 {
        let scale = base as i64 * multiplier as i64;
        match self {
            ScoreFormula::Linear => scale.saturating_mul(combo as i64),
            ScoreFormula::Exponential => {
                scale.saturating_mul(1i64 << combo.min(MAX_EXPONENT))
            }
            ScoreFormula::ComboBonus { per_combo } => {
                scale + combo.saturating_sub(1) as i64 * per_combo as i64
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
    Expert,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Easy,
        Difficulty::Normal,
        Difficulty::Hard,
        Difficulty::Expert,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Normal => "Normal",
            Difficulty::Hard => "Hard",
            Difficulty::Expert => "Expert",
        }
    }

    pub fn config(self) -> DifficultyConfig {
        match self {
            Difficulty::Easy => DifficultyConfig {
                lanes: 4,
                spawn_interval_ms: 1200,
                fall_secs: 2.5,
                note_secs: 0.3,
                health_max: 100.0,
                damage_per_miss: 20.0,
                heal_per_hit: 2.0,
                score_multiplier: 1,
                base_value: 10,
                tolerance_secs: 0.25,
                countdown_secs: 3.0,
                formula: ScoreFormula::Linear,
            },
            Difficulty::Normal => DifficultyConfig {
                lanes: 4,
                spawn_interval_ms: 800,
                fall_secs: 2.0,
                note_secs: 0.25,
                health_max: 100.0,
                damage_per_miss: 20.0,
                heal_per_hit: 2.0,
                score_multiplier: 3,
                base_value: 10,
                tolerance_secs: 0.2,
                countdown_secs: 3.0,
                formula: ScoreFormula::Linear,
            },
            Difficulty::Hard => DifficultyConfig {
                lanes: 5,
                spawn_interval_ms: 500,
                fall_secs: 1.6,
                note_secs: 0.2,
                health_max: 100.0,
                damage_per_miss: 25.0,
                heal_per_hit: 1.0,
                score_multiplier: 7,
                base_value: 10,
                tolerance_secs: 0.18,
                countdown_secs: 3.0,
                formula: ScoreFormula::Linear,
            },
            Difficulty::Expert => DifficultyConfig {
                lanes: 6,
                spawn_interval_ms: 300,
                fall_secs: 1.2,
                note_secs: 0.15,
                health_max: 100.0,
                damage_per_miss: 25.0,
                heal_per_hit: 1.0,
                score_multiplier: 11,
                base_value: 10,
                tolerance_secs: 0.15,
                countdown_secs: 3.0,
                formula: ScoreFormula::Linear,
            },
        }
    }
}

/// One constant set per rhythm variant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DifficultyConfig {
    pub lanes: Lane,
    pub spawn_interval_ms: u64,
    /// Seconds a note falls before reaching the hit line.
    pub fall_secs: Seconds,
    /// Length of each generated note.
    pub note_secs: Seconds,
    pub health_max: f32,
    pub damage_per_miss: f32,
    pub heal_per_hit: f32,
    pub score_multiplier: u32,
    pub base_value: u32,
    /// Half-width of the hit window, inclusive.
    pub tolerance_secs: Seconds,
    pub countdown_secs: Seconds,
    pub formula: ScoreFormula,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Difficulty::Easy.config()
    }
}
