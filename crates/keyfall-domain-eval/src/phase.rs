use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GamePhase {
    Menu,
    Countdown,
    Active,
    Paused,
    Over,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum PhaseError {
    #[error("illegal phase transition {from:?} -> {to:?}")]
    Illegal { from: GamePhase, to: GamePhase },
}

/// `menu -> (countdown ->) active -> (paused ->) active | over`; any phase may
/// return to the menu, and a finished game may restart.
#[derive(Clone, Copy, Debug)]
pub struct PhaseMachine {
    phase: GamePhase,
}

impl PhaseMachine {
    pub fn new() -> Self {
        Self {
            phase: GamePhase::Menu,
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn is(&self, phase: GamePhase) -> bool {
        self.phase == phase
    }

    pub fn can_transition(from: GamePhase, to: GamePhase) -> bool {
        use GamePhase::*;
        matches!(
            (from, to),
            (_, Menu)
                | (Menu | Over, Countdown | Active)
                | (Countdown, Active)
                | (Active, Paused | Over)
                | (Paused, Active | Over)
        )
    }

    /// Returns the phase that was left.
    pub fn transition(&mut self, to: GamePhase) -> Result<GamePhase, PhaseError> {
        let from = self.phase;
        if !Self::can_transition(from, to) {
            return Err(PhaseError::Illegal { from, to });
        }
        log::debug!("phase {:?} -> {:?}", from, to);
        self.phase = to;
        Ok(from)
    }
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new()
    }
}
