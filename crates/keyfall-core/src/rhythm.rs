use crate::input_router::{InputRouter, KeyBindings, MidiLaneMap, RawInput, Routed};
use crate::ipc::{GameEvent, SoundCue};
use crate::layout::LaneLayout;
use crate::scroll::{FrameInput, FrameReport, ScrollRenderer};
use crate::score_card::ScoreCard;
use crate::theme::ThemeState;
use crate::timers::TimerSet;
use crate::transport::Transport;
use keyfall_domain_eval::{
    Difficulty, DifficultyConfig, GamePhase, HitJudge, JudgeConfig, JudgeEvent, JudgeStats,
    PhaseError, PhaseMachine,
};
use keyfall_domain_timeline::{LaneGenerator, Timeline, TimelineSource};
use keyfall_ports::render::RenderSurface;
use keyfall_ports::types::{Lane, Seconds};
use std::collections::VecDeque;

/// How long the red damage wash takes to fade.
pub const DAMAGE_PULSE_SECS: Seconds = 0.4;
const COUNTDOWN_STEP_SECS: Seconds = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RhythmTimer {
    Countdown,
    Spawn,
}

#[derive(Clone, Debug)]
pub struct RhythmOptions {
    pub seed: Option<u64>,
    /// Also pause spawning when the window loses focus. Lane holds are
    /// released either way.
    pub pause_on_focus_loss: bool,
    /// Added to the transport time when judging, to offset input latency.
    pub input_offset_secs: Seconds,
    pub label: String,
}

impl Default for RhythmOptions {
    fn default() -> Self {
        Self {
            seed: None,
            pause_on_focus_loss: false,
            input_offset_secs: 0.0,
            label: "Custom".to_string(),
        }
    }
}

/// Piano-tiles style game: notes spawn on a fixed interval in random lanes and
/// must be tapped as they cross the hit line.
///
/// All methods take the host time so the owner decides which clock drives the
/// game; timers fire from `tick`.
pub struct RhythmSession {
    cfg: DifficultyConfig,
    options: RhythmOptions,
    phase: PhaseMachine,
    judge: HitJudge,
    generator: LaneGenerator,
    timeline: Timeline,
    transport: Transport,
    timers: TimerSet<RhythmTimer>,
    router: InputRouter,
    renderer: ScrollRenderer,
    theme: ThemeState,
    countdown_remaining: u32,
    damage_started: Option<Seconds>,
    events: VecDeque<GameEvent>,
}

impl RhythmSession {
    pub fn new(cfg: DifficultyConfig, options: RhythmOptions) -> Self {
        let lanes = cfg.lanes.max(1);
        Self {
            judge: HitJudge::new(JudgeConfig::from(&cfg)),
            generator: LaneGenerator::new(lanes, options.seed),
            timeline: Timeline::new(TimelineSource::Generated, cfg.fall_secs),
            transport: Transport::new(0.0),
            timers: TimerSet::new(),
            router: InputRouter::new(KeyBindings::rhythm(lanes), MidiLaneMap::Wrap(lanes)),
            renderer: ScrollRenderer::new(LaneLayout::rhythm(lanes, 480.0, 720.0)),
            theme: ThemeState::default(),
            phase: PhaseMachine::new(),
            countdown_remaining: 0,
            damage_started: None,
            events: VecDeque::new(),
            cfg,
            options,
        }
    }

    pub fn with_difficulty(difficulty: Difficulty, seed: Option<u64>) -> Self {
        Self::new(
            difficulty.config(),
            RhythmOptions {
                seed,
                label: difficulty.name().to_string(),
                ..RhythmOptions::default()
            },
        )
    }

    pub fn phase(&self) -> GamePhase {
        self.phase.phase()
    }

    pub fn stats(&self) -> JudgeStats {
        self.judge.stats()
    }

    pub fn config(&self) -> &DifficultyConfig {
        &self.cfg
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn position(&self) -> Seconds {
        self.transport.position()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn is_lane_active(&self, lane: Lane) -> bool {
        self.router.activation().is_active(lane)
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.events.drain(..).collect()
    }

    /// Starts a fresh game from the menu or after game over.
    pub fn start(&mut self, now: Seconds) -> Result<(), PhaseError> {
        let countdown = self.cfg.countdown_secs.max(0.0).ceil() as u32;
        let next = if countdown > 0 {
            GamePhase::Countdown
        } else {
            GamePhase::Active
        };
        self.phase.transition(next)?;
        self.timers.cancel_all();
        self.reset();
        self.emit_phase();

        if countdown > 0 {
            self.countdown_remaining = countdown;
            self.events
                .push_back(GameEvent::CountdownTick { remaining: countdown });
            self.timers.schedule_interval(
                RhythmTimer::Countdown,
                now + COUNTDOWN_STEP_SECS,
                COUNTDOWN_STEP_SECS,
            );
        } else {
            self.begin_play(now);
        }
        Ok(())
    }

    pub fn pause(&mut self, now: Seconds) -> Result<(), PhaseError> {
        self.phase.transition(GamePhase::Paused)?;
        self.timers.cancel(RhythmTimer::Spawn);
        self.transport.pause(now);
        self.emit_phase();
        Ok(())
    }

    pub fn resume(&mut self, now: Seconds) -> Result<(), PhaseError> {
        if !self.phase.is(GamePhase::Paused) {
            return Err(PhaseError::Illegal {
                from: self.phase.phase(),
                to: GamePhase::Active,
            });
        }
        self.phase.transition(GamePhase::Active)?;
        self.transport.start(None, now);
        self.timers.schedule_interval(
            RhythmTimer::Spawn,
            now + self.spawn_interval(),
            self.spawn_interval(),
        );
        self.emit_phase();
        Ok(())
    }

    /// Cancels every pending timer, then returns to the menu.
    pub fn quit_to_menu(&mut self) {
        self.timers.cancel_all();
        self.transport.stop();
        self.router.handle(RawInput::FocusLost, self.renderer.layout());
        if self.phase.transition(GamePhase::Menu).is_ok() {
            self.emit_phase();
        }
    }

    pub fn handle_input(&mut self, input: RawInput, now: Seconds) {
        let focus_lost = matches!(input, RawInput::FocusLost);
        let routed = self.router.handle(input, self.renderer.layout());

        if focus_lost && self.options.pause_on_focus_loss && self.phase.is(GamePhase::Active) {
            if let Err(err) = self.pause(now) {
                log::warn!("pause on focus loss failed: {err}");
            }
        }
        if !self.phase.is(GamePhase::Active) {
            return;
        }

        let position = self.transport.sync(now) + self.options.input_offset_secs;
        // every source's press is judged, even on a lane another source holds
        for change in routed.into_iter().filter_map(|routed| match routed {
            Routed::Source(change) if change.active => Some(change),
            _ => None,
        }) {
            let judged = self.judge.on_activation(&mut self.timeline, change.lane, position);
            self.apply_judge_events(judged, now);
            if !self.phase.is(GamePhase::Active) {
                break;
            }
        }
    }

    pub fn tick(&mut self, now: Seconds) {
        for (timer, due) in self.timers.due(now) {
            match timer {
                RhythmTimer::Countdown => self.on_countdown(due),
                RhythmTimer::Spawn => self.on_spawn(due, now),
            }
        }

        if self.phase.is(GamePhase::Active) {
            let position = self.transport.sync(now);
            let expired = self.judge.expire(&mut self.timeline, position);
            self.apply_judge_events(expired, now);
            self.timeline.prune_consumed(position);
        }

        if let Some(started) = self.damage_started {
            if now - started >= DAMAGE_PULSE_SECS {
                self.damage_started = None;
            }
        }
    }

    /// Damage wash intensity, decaying from 1 to 0.
    pub fn damage_level(&self, now: Seconds) -> f32 {
        match self.damage_started {
            Some(started) => (1.0 - (now - started) / DAMAGE_PULSE_SECS).clamp(0.0, 1.0) as f32,
            None => 0.0,
        }
    }

    pub fn render(&mut self, surface: &mut dyn RenderSurface, now: Seconds) -> Option<FrameReport> {
        let active = self.router.active_lanes();
        let palette = self.theme.palette();
        let damage = self.damage_level(now);
        self.renderer.render(
            surface,
            FrameInput {
                timeline: Some(&self.timeline),
                now: self.transport.position(),
                active: &active,
                palette: &palette,
                live_heights: None,
                damage,
            },
        )
    }

    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.renderer
            .set_layout(LaneLayout::rhythm(self.cfg.lanes.max(1), width, height));
    }

    pub fn layout(&self) -> &LaneLayout {
        self.renderer.layout()
    }

    pub fn score_card(&self) -> ScoreCard {
        let stats = self.judge.stats();
        ScoreCard {
            title: "Rhythm".to_string(),
            score: stats.score,
            longest_combo: stats.max_combo,
            difficulty: self.options.label.clone(),
        }
    }

    fn spawn_interval(&self) -> Seconds {
        self.cfg.spawn_interval_ms.max(1) as f64 / 1000.0
    }

    fn reset(&mut self) {
        self.judge.reset();
        self.timeline = Timeline::new(TimelineSource::Generated, self.cfg.fall_secs);
        self.transport.stop();
        self.damage_started = None;
        self.countdown_remaining = 0;
    }

    fn begin_play(&mut self, at: Seconds) {
        self.transport.start(Some(0.0), at);
        self.timers
            .schedule_interval(RhythmTimer::Spawn, at, self.spawn_interval());
    }

    fn on_countdown(&mut self, due: Seconds) {
        if !self.phase.is(GamePhase::Countdown) {
            return;
        }
        self.countdown_remaining = self.countdown_remaining.saturating_sub(1);
        self.events.push_back(GameEvent::CountdownTick {
            remaining: self.countdown_remaining,
        });
        if self.countdown_remaining == 0 {
            self.timers.cancel(RhythmTimer::Countdown);
            if self.phase.transition(GamePhase::Active).is_ok() {
                self.emit_phase();
                self.begin_play(due);
            }
        }
    }

    fn on_spawn(&mut self, due: Seconds, now: Seconds) {
        if !self.phase.is(GamePhase::Active) {
            return;
        }
        // a late poll spawns at the position the timer was due
        let position = (self.transport.sync(now) - (now - due)).max(0.0);
        let note = self.generator.spawn(position, self.cfg.note_secs);
        self.timeline.push(note);
    }

    fn apply_judge_events(&mut self, events: Vec<JudgeEvent>, now: Seconds) {
        for event in events {
            match event {
                JudgeEvent::Hit { lane, points, .. } => {
                    self.events.push_back(GameEvent::Hit { lane, points });
                    self.events
                        .push_back(GameEvent::Sound(SoundCue::LaneHit { lane }));
                }
                JudgeEvent::Miss { lane, .. } => {
                    self.damage_started = Some(now);
                    self.events.push_back(GameEvent::Miss { lane });
                    self.events.push_back(GameEvent::Sound(SoundCue::Damage));
                }
                JudgeEvent::Stats(stats) => self.events.push_back(GameEvent::Stats(stats)),
                JudgeEvent::Depleted => self.finish(now),
            }
        }
    }

    fn finish(&mut self, now: Seconds) {
        self.timers.cancel_all();
        self.transport.pause(now);
        if let Err(err) = self.phase.transition(GamePhase::Over) {
            log::warn!("could not end game: {err}");
            return;
        }
        self.emit_phase();
        let stats = self.judge.stats();
        self.events.push_back(GameEvent::GameOver {
            score: stats.score,
            longest_combo: stats.max_combo,
        });
    }

    fn emit_phase(&mut self) {
        self.events.push_back(GameEvent::PhaseChanged {
            phase: self.phase.phase(),
        });
    }
}
