use crate::input_router::{InputRouter, KeyBindings, MidiLaneMap, RawInput, Routed};
use crate::ipc::{GameEvent, SoundCue};
use crate::layout::LaneLayout;
use crate::scroll::{FrameInput, FrameReport, ScrollRenderer};
use crate::score_card::ScoreCard;
use crate::theme::ThemeState;
use crate::timers::TimerSet;
use keyfall_domain_eval::{MemoryDifficulty, MemoryPreset, MemoryRules, TapOutcome, INTERMISSION_MS};
use keyfall_domain_timeline::LaneGenerator;
use keyfall_ports::render::RenderSurface;
use keyfall_ports::types::{Lane, Seconds};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryPhase {
    Menu,
    /// The sequence is being demonstrated.
    Show,
    /// The player repeats it.
    Input,
    /// Pause between rounds or before a replay.
    Intermission,
    Over,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MemoryTimer {
    DemoStep,
    DemoOff,
    OpenInput,
    InputDeadline,
    NextRound,
    Replay,
}

fn ms(value: u64) -> Seconds {
    value as f64 / 1000.0
}

/// Simon-style memory game over a row of pads.
pub struct MemorySession {
    preset: MemoryPreset,
    rules: MemoryRules,
    generator: LaneGenerator,
    phase: MemoryPhase,
    timers: TimerSet<MemoryTimer>,
    demo_index: usize,
    demo_lit: Option<Lane>,
    input_started: Option<Seconds>,
    router: InputRouter,
    renderer: ScrollRenderer,
    theme: ThemeState,
    events: VecDeque<GameEvent>,
}

impl MemorySession {
    pub fn new(difficulty: MemoryDifficulty, seed: Option<u64>) -> Self {
        let preset = difficulty.preset();
        let lanes = preset.lanes.max(1);
        Self {
            rules: MemoryRules::new(preset),
            generator: LaneGenerator::new(lanes, seed),
            phase: MemoryPhase::Menu,
            timers: TimerSet::new(),
            demo_index: 0,
            demo_lit: None,
            input_started: None,
            router: InputRouter::new(KeyBindings::numbered(lanes), MidiLaneMap::Wrap(lanes)),
            renderer: ScrollRenderer::new(LaneLayout::rhythm(lanes, 720.0, 720.0)),
            theme: ThemeState::default(),
            events: VecDeque::new(),
            preset,
        }
    }

    pub fn phase(&self) -> MemoryPhase {
        self.phase
    }

    pub fn rules(&self) -> &MemoryRules {
        &self.rules
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn lit_pad(&self) -> Option<Lane> {
        self.demo_lit
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.events.drain(..).collect()
    }

    pub fn start(&mut self, now: Seconds) {
        self.timers.cancel_all();
        self.rules = MemoryRules::new(self.preset);
        self.demo_lit = None;
        self.input_started = None;
        self.events.push_back(GameEvent::LivesChanged {
            lives: self.rules.lives(),
        });
        self.next_round(now);
    }

    /// Cancels every pending timeout before leaving.
    pub fn quit_to_menu(&mut self) {
        self.timers.cancel_all();
        self.router.handle(RawInput::FocusLost, self.renderer.layout());
        self.demo_lit = None;
        self.input_started = None;
        self.phase = MemoryPhase::Menu;
    }

    pub fn handle_input(&mut self, input: RawInput, now: Seconds) {
        let routed = self.router.handle(input, self.renderer.layout());
        for routed in routed {
            match routed {
                Routed::Lane(change) => self.events.push_back(GameEvent::PadLit {
                    lane: change.lane,
                    lit: change.active,
                }),
                Routed::Source(change) if change.active && self.phase == MemoryPhase::Input => {
                    let outcome = self.rules.tap(change.lane);
                    self.apply_outcome(outcome, change.lane, now);
                }
                Routed::Source(_) | Routed::Pedal { .. } => {}
            }
        }
    }

    pub fn tick(&mut self, now: Seconds) {
        for (timer, due) in self.timers.due(now) {
            self.on_timer(timer, due);
        }

        if self.phase == MemoryPhase::Input {
            if let Some(fraction) = self.timer_progress(now) {
                self.events.push_back(GameEvent::TimerProgress { fraction });
            }
        }
    }

    /// Elapsed share of the input time limit, in [0, 1]. `None` when untimed.
    pub fn timer_progress(&self, now: Seconds) -> Option<f64> {
        let started = self.input_started?;
        let limit = self.preset.input_time_limit_ms(self.rules.sequence().len())?;
        if limit == 0 {
            return Some(1.0);
        }
        Some(((now - started) / ms(limit)).clamp(0.0, 1.0))
    }

    pub fn render(&mut self, surface: &mut dyn RenderSurface) -> Option<FrameReport> {
        let mut active: HashSet<Lane> = self.router.active_lanes();
        active.extend(self.demo_lit);
        let palette = self.theme.palette();
        self.renderer.render(
            surface,
            FrameInput {
                timeline: None,
                now: 0.0,
                active: &active,
                palette: &palette,
                live_heights: None,
                damage: 0.0,
            },
        )
    }

    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.renderer
            .set_layout(LaneLayout::rhythm(self.preset.lanes.max(1), width, height));
    }

    pub fn score_card(&self) -> ScoreCard {
        ScoreCard {
            title: "Piano Memory".to_string(),
            score: self.rules.score(),
            longest_combo: self.rules.longest_combo() as u32,
            difficulty: self.preset.difficulty.name().to_string(),
        }
    }

    fn next_round(&mut self, now: Seconds) {
        let lane = self.generator.next_lane();
        self.rules.extend(lane);
        self.begin_show(now);
    }

    fn begin_show(&mut self, now: Seconds) {
        self.phase = MemoryPhase::Show;
        self.demo_index = 0;
        self.input_started = None;
        self.events.push_back(GameEvent::RoundStarted {
            length: self.rules.sequence().len(),
        });
        self.timers.schedule(MemoryTimer::DemoStep, now);
        let open_at = now + ms(self.preset.show_duration_ms(self.rules.sequence().len()));
        self.timers.schedule(MemoryTimer::OpenInput, open_at);
    }

    fn on_timer(&mut self, timer: MemoryTimer, due: Seconds) {
        match timer {
            MemoryTimer::DemoStep => {
                if self.phase != MemoryPhase::Show {
                    return;
                }
                let Some(&lane) = self.rules.sequence().get(self.demo_index) else {
                    return;
                };
                self.light_demo(Some(lane));
                self.events
                    .push_back(GameEvent::Sound(SoundCue::LaneHit { lane }));
                self.timers
                    .schedule(MemoryTimer::DemoOff, due + ms(self.preset.highlight_ms()));
                self.demo_index += 1;
                if self.demo_index < self.rules.sequence().len() {
                    self.timers
                        .schedule(MemoryTimer::DemoStep, due + ms(self.preset.demo_delay_ms));
                }
            }
            MemoryTimer::DemoOff => {
                if self.phase == MemoryPhase::Show {
                    self.light_demo(None);
                }
            }
            MemoryTimer::OpenInput => {
                if self.phase != MemoryPhase::Show {
                    return;
                }
                self.light_demo(None);
                self.phase = MemoryPhase::Input;
                self.rules.open_input();
                let len = self.rules.sequence().len();
                if let Some(limit) = self.preset.input_time_limit_ms(len) {
                    self.input_started = Some(due);
                    self.timers
                        .schedule(MemoryTimer::InputDeadline, due + ms(limit));
                    self.events
                        .push_back(GameEvent::TimerProgress { fraction: 0.0 });
                }
            }
            MemoryTimer::InputDeadline => {
                if self.phase != MemoryPhase::Input {
                    return;
                }
                let outcome = self.rules.timeout();
                self.apply_failure(outcome, due);
            }
            MemoryTimer::NextRound => {
                if self.phase == MemoryPhase::Intermission {
                    self.next_round(due);
                }
            }
            MemoryTimer::Replay => {
                if self.phase == MemoryPhase::Intermission {
                    self.begin_show(due);
                }
            }
        }
    }

    fn apply_outcome(&mut self, outcome: TapOutcome, lane: Lane, now: Seconds) {
        match outcome {
            TapOutcome::Correct { points } => {
                self.events.push_back(GameEvent::Hit { lane, points });
                self.events
                    .push_back(GameEvent::Sound(SoundCue::LaneHit { lane }));
            }
            TapOutcome::RoundComplete { points } => {
                self.events.push_back(GameEvent::Hit { lane, points });
                self.events.push_back(GameEvent::Sound(SoundCue::Success));
                self.timers.cancel(MemoryTimer::InputDeadline);
                self.input_started = None;
                self.phase = MemoryPhase::Intermission;
                self.timers
                    .schedule(MemoryTimer::NextRound, now + ms(INTERMISSION_MS));
            }
            TapOutcome::Wrong { .. } | TapOutcome::GameOver => {
                self.events.push_back(GameEvent::Miss { lane });
                self.apply_failure(outcome, now);
            }
            TapOutcome::Ignored => {}
        }
    }

    fn apply_failure(&mut self, outcome: TapOutcome, now: Seconds) {
        self.timers.cancel(MemoryTimer::InputDeadline);
        self.input_started = None;
        self.events.push_back(GameEvent::Sound(SoundCue::Failure));
        self.events.push_back(GameEvent::LivesChanged {
            lives: self.rules.lives(),
        });
        match outcome {
            TapOutcome::GameOver => {
                self.timers.cancel_all();
                self.phase = MemoryPhase::Over;
                self.events.push_back(GameEvent::GameOver {
                    score: self.rules.score(),
                    longest_combo: self.rules.longest_combo() as u32,
                });
            }
            _ => {
                self.phase = MemoryPhase::Intermission;
                self.timers
                    .schedule(MemoryTimer::Replay, now + ms(INTERMISSION_MS));
            }
        }
    }

    fn light_demo(&mut self, lane: Option<Lane>) {
        if let Some(previous) = self.demo_lit.take() {
            self.events.push_back(GameEvent::PadLit {
                lane: previous,
                lit: false,
            });
        }
        if let Some(lane) = lane {
            self.demo_lit = Some(lane);
            self.events.push_back(GameEvent::PadLit { lane, lit: true });
        }
    }
}
