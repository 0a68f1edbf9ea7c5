use keyfall_ports::types::Lane;
use serde::{Deserialize, Serialize};

pub const MEMORY_LIVES: u8 = 3;
pub const INTERMISSION_MS: u64 = 700;
/// Extra pause between the last demonstrated pad and the start of input.
pub const SHOW_TO_INPUT_EXTRA_MS: u64 = 200;
/// Pads stay lit this much shorter than the demo delay.
pub const HIGHLIGHT_GAP_MS: u64 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryDifficulty {
    Easy,
    Normal,
    Hard,
    Harder,
    Insane,
}

impl MemoryDifficulty {
    pub const ALL: [MemoryDifficulty; 5] = [
        MemoryDifficulty::Easy,
        MemoryDifficulty::Normal,
        MemoryDifficulty::Hard,
        MemoryDifficulty::Harder,
        MemoryDifficulty::Insane,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MemoryDifficulty::Easy => "Easy",
            MemoryDifficulty::Normal => "Normal",
            MemoryDifficulty::Hard => "Hard",
            MemoryDifficulty::Harder => "Harder",
            MemoryDifficulty::Insane => "Insane",
        }
    }

    pub fn preset(self) -> MemoryPreset {
        let (lanes, demo_delay_ms, input_factor, multiplier) = match self {
            MemoryDifficulty::Easy => (3, 900, None, 1),
            MemoryDifficulty::Normal => (5, 650, None, 3),
            MemoryDifficulty::Hard => (10, 480, Some(3.0), 7),
            MemoryDifficulty::Harder => (20, 420, Some(2.5), 11),
            MemoryDifficulty::Insane => (50, 360, Some(2.0), 15),
        };
        MemoryPreset {
            difficulty: self,
            lanes,
            demo_delay_ms,
            input_factor,
            multiplier,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryPreset {
    pub difficulty: MemoryDifficulty,
    pub lanes: Lane,
    /// Spacing between demonstrated pads.
    pub demo_delay_ms: u64,
    /// When set, input is timed: `len * demo_delay * factor`.
    pub input_factor: Option<f64>,
    pub multiplier: u32,
}

impl MemoryPreset {
    pub fn highlight_ms(&self) -> u64 {
        self.demo_delay_ms.saturating_sub(HIGHLIGHT_GAP_MS)
    }

    /// Delay from the start of a demonstration until input opens.
    pub fn show_duration_ms(&self, len: usize) -> u64 {
        len as u64 * self.demo_delay_ms + SHOW_TO_INPUT_EXTRA_MS
    }

    pub fn input_time_limit_ms(&self, len: usize) -> Option<u64> {
        self.input_factor
            .map(|factor| (len as f64 * self.demo_delay_ms as f64 * factor).round() as u64)
    }

    /// Points for a correct press at `index` within the sequence.
    pub fn points_for(&self, index: usize) -> i64 {
        let exponent = (index as u32 + 1).min(40);
        (self.multiplier as i64).saturating_mul(1i64 << exponent)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TapOutcome {
    /// Correct press, more to go.
    Correct { points: i64 },
    /// Correct press that finished the sequence.
    RoundComplete { points: i64 },
    /// Wrong pad or timeout; the same sequence is replayed.
    Wrong { lives_left: u8 },
    GameOver,
    /// Input arrived while not accepting it.
    Ignored,
}

/// Sequence bookkeeping for the Simon-style game. Lane choice and timing live
/// with the caller.
#[derive(Clone, Debug)]
pub struct MemoryRules {
    preset: MemoryPreset,
    sequence: Vec<Lane>,
    cursor: usize,
    lives: u8,
    score: i64,
    accepting: bool,
}

impl MemoryRules {
    pub fn new(preset: MemoryPreset) -> Self {
        Self {
            preset,
            sequence: Vec::new(),
            cursor: 0,
            lives: MEMORY_LIVES,
            score: 0,
            accepting: false,
        }
    }

    pub fn preset(&self) -> &MemoryPreset {
        &self.preset
    }

    pub fn sequence(&self) -> &[Lane] {
        &self.sequence
    }

    pub fn lives(&self) -> u8 {
        self.lives
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn is_over(&self) -> bool {
        self.lives == 0
    }

    /// Rounds fully completed; the card reports it as the longest combo.
    pub fn longest_combo(&self) -> usize {
        self.sequence.len().saturating_sub(1)
    }

    /// Starts a round with one more pad; `lane` is wrapped into range.
    pub fn extend(&mut self, lane: Lane) {
        let lanes = self.preset.lanes.max(1);
        self.sequence.push(lane % lanes);
        self.cursor = 0;
        self.accepting = false;
    }

    pub fn open_input(&mut self) {
        self.cursor = 0;
        self.accepting = !self.is_over() && !self.sequence.is_empty();
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting
    }

    /// Progress through the current sequence in [0, 1].
    pub fn progress(&self) -> f64 {
        if self.sequence.is_empty() {
            return 0.0;
        }
        self.cursor as f64 / self.sequence.len() as f64
    }

    pub fn tap(&mut self, lane: Lane) -> TapOutcome {
        if !self.accepting {
            return TapOutcome::Ignored;
        }
        let Some(&expected) = self.sequence.get(self.cursor) else {
            return TapOutcome::Ignored;
        };
        if lane != expected {
            return self.fail();
        }

        let points = self.preset.points_for(self.cursor);
        self.score = self.score.saturating_add(points);
        self.cursor += 1;
        if self.cursor == self.sequence.len() {
            self.accepting = false;
            TapOutcome::RoundComplete { points }
        } else {
            TapOutcome::Correct { points }
        }
    }

    /// The input timer ran out.
    pub fn timeout(&mut self) -> TapOutcome {
        if !self.accepting {
            return TapOutcome::Ignored;
        }
        self.fail()
    }

    fn fail(&mut self) -> TapOutcome {
        self.accepting = false;
        self.cursor = 0;
        self.lives = self.lives.saturating_sub(1);
        if self.lives == 0 {
            log::info!("memory game over: score={} rounds={}", self.score, self.longest_combo());
            TapOutcome::GameOver
        } else {
            TapOutcome::Wrong {
                lives_left: self.lives,
            }
        }
    }
}
