use keyfall_core::{GameEvent, RawInput, RhythmOptions, RhythmSession};
use keyfall_domain_eval::{Difficulty, DifficultyConfig, GamePhase};
use keyfall_ports::midi::MidiLikeEvent;
use pretty_assertions::assert_eq;

const RHYTHM_KEYS: [&str; 4] = ["KeyD", "KeyF", "KeyJ", "KeyK"];

fn tap(lane: u8) -> RawInput {
    RawInput::Key {
        code: RHYTHM_KEYS[lane as usize].to_string(),
        down: true,
        repeat: false,
    }
}

fn release(lane: u8) -> RawInput {
    RawInput::Key {
        code: RHYTHM_KEYS[lane as usize].to_string(),
        down: false,
        repeat: false,
    }
}

fn no_countdown(seed: u64) -> RhythmSession {
    RhythmSession::new(
        DifficultyConfig {
            countdown_secs: 0.0,
            ..Difficulty::Easy.config()
        },
        RhythmOptions {
            seed: Some(seed),
            ..RhythmOptions::default()
        },
    )
}

#[test]
fn countdown_ticks_down_then_play_starts() {
    let mut session = RhythmSession::with_difficulty(Difficulty::Easy, Some(1));
    session.start(0.0).expect("menu to countdown");
    assert_eq!(session.phase(), GamePhase::Countdown);

    session.tick(1.0);
    session.tick(2.0);
    assert_eq!(session.phase(), GamePhase::Countdown);
    session.tick(3.0);
    assert_eq!(session.phase(), GamePhase::Active);

    let ticks: Vec<u32> = session
        .drain_events()
        .into_iter()
        .filter_map(|event| match event {
            GameEvent::CountdownTick { remaining } => Some(remaining),
            _ => None,
        })
        .collect();
    assert_eq!(ticks, vec![3, 2, 1, 0]);

    session.tick(3.0);
    assert_eq!(session.timeline().len(), 1);
    assert_eq!(session.timeline().notes()[0].onset, 0.0);
}

#[test]
fn pausing_during_countdown_is_rejected() {
    let mut session = RhythmSession::with_difficulty(Difficulty::Normal, Some(1));
    session.start(0.0).expect("start");
    assert!(session.pause(0.5).is_err());
    assert_eq!(session.phase(), GamePhase::Countdown);
}

#[test]
fn tapping_at_impact_scores_a_hit() {
    let mut session = no_countdown(11);
    session.start(0.0).expect("start");
    session.tick(0.0);
    let lane = session.timeline().notes()[0].lane;

    session.handle_input(tap(lane), 2.5);
    let stats = session.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.combo, 1);
    assert_eq!(stats.score, 10);
    assert!(session.is_lane_active(lane));
    assert!(session
        .drain_events()
        .iter()
        .any(|event| matches!(event, GameEvent::Hit { points: 10, .. })));

    // the note is consumed, a second tap is an empty tap
    session.handle_input(release(lane), 2.55);
    session.handle_input(tap(lane), 2.6);
    let stats = session.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.combo, 0);
    assert_eq!(stats.health, 80.0);
    assert!(session.damage_level(2.6) > 0.99);
    assert_eq!(session.damage_level(3.1), 0.0);
}

#[test]
fn a_second_source_on_a_held_lane_is_judged() {
    let mut session = no_countdown(11);
    session.start(0.0).expect("start");
    session.tick(0.0);
    let lane = session.timeline().notes()[0].lane;

    session.handle_input(tap(lane), 2.5);
    assert_eq!(session.stats().hits, 1);

    // the key stays down while a controller strikes the same lane
    session.handle_input(
        RawInput::Midi(MidiLikeEvent::NoteOn {
            note: lane,
            velocity: 90,
        }),
        2.6,
    );
    let stats = session.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.combo, 0);
    assert!(session.is_lane_active(lane));
}

#[test]
fn five_expired_notes_end_an_easy_game() {
    let mut session = RhythmSession::with_difficulty(Difficulty::Easy, Some(5));
    session.start(0.0).expect("start");

    let mut now = 0.0;
    while session.phase() != GamePhase::Over && now < 60.0 {
        now += 0.05;
        session.tick(now);
    }

    assert_eq!(session.phase(), GamePhase::Over);
    let stats = session.stats();
    assert_eq!(stats.misses, 5);
    assert_eq!(stats.health, 0.0);
    assert_eq!(session.pending_timers(), 0);

    let events = session.drain_events();
    assert!(events
        .iter()
        .any(|event| matches!(event, GameEvent::GameOver { score: 0, .. })));

    // nothing changes once the game is over
    let frozen = session.position();
    session.tick(now + 5.0);
    session.handle_input(tap(0), now + 5.0);
    assert_eq!(session.position(), frozen);
    assert_eq!(session.stats(), stats);
}

#[test]
fn quitting_cancels_every_timer() {
    let mut session = RhythmSession::with_difficulty(Difficulty::Hard, Some(2));
    session.start(0.0).expect("start");
    assert_eq!(session.pending_timers(), 1);

    session.quit_to_menu();
    assert_eq!(session.pending_timers(), 0);
    assert_eq!(session.phase(), GamePhase::Menu);

    session.tick(10.0);
    assert_eq!(session.phase(), GamePhase::Menu);
    assert!(session.timeline().is_empty());
}

#[test]
fn pause_stops_spawning_and_resume_restarts_it() {
    let mut session = no_countdown(3);
    session.start(0.0).expect("start");
    session.tick(0.0);
    session.pause(0.5).expect("pause");
    assert_eq!(session.pending_timers(), 0);

    session.tick(5.0);
    assert_eq!(session.timeline().len(), 1);
    assert!((session.position() - 0.5).abs() < 1e-9);
    session.handle_input(tap(0), 5.0);
    assert_eq!(session.stats().misses, 0);

    session.resume(5.0).expect("resume");
    session.tick(6.2);
    assert_eq!(session.timeline().len(), 2);
    assert!((session.position() - 1.7).abs() < 1e-9);
}

#[test]
fn focus_loss_releases_lanes_and_optionally_pauses() {
    let mut session = RhythmSession::new(
        DifficultyConfig {
            countdown_secs: 0.0,
            ..Difficulty::Easy.config()
        },
        RhythmOptions {
            seed: Some(4),
            pause_on_focus_loss: true,
            ..RhythmOptions::default()
        },
    );
    session.start(0.0).expect("start");
    session.handle_input(tap(2), 0.1);
    assert!(session.is_lane_active(2));

    session.handle_input(RawInput::FocusLost, 0.2);
    assert!(!session.is_lane_active(2));
    assert_eq!(session.phase(), GamePhase::Paused);
}

#[test]
fn seeded_games_spawn_the_same_lanes() {
    let lanes = |seed: u64| {
        let mut session = no_countdown(seed);
        session.start(0.0).expect("start");
        let mut now = 0.0;
        while now < 2.4 {
            session.tick(now);
            now += 0.1;
        }
        session
            .timeline()
            .notes()
            .iter()
            .map(|note| note.lane)
            .collect::<Vec<_>>()
    };
    let first = lanes(99);
    assert_eq!(first.len(), 2);
    assert_eq!(first, lanes(99));
}

#[test]
fn score_card_reports_the_best_combo() {
    let mut session = no_countdown(8);
    session.start(0.0).expect("start");
    session.tick(0.0);
    let lane = session.timeline().notes()[0].lane;
    session.handle_input(tap(lane), 2.5);

    let card = session.score_card();
    assert_eq!(card.title, "Rhythm");
    assert_eq!(card.longest_combo, 1);
    assert_eq!(card.score, 10);
}
