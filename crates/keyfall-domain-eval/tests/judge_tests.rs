use keyfall_domain_eval::{
    Difficulty, HitJudge, JudgeConfig, JudgeEvent, MissReason, ScoreFormula,
};
use keyfall_domain_timeline::{Note, Timeline, TimelineSource};
use pretty_assertions::assert_eq;

fn easy_judge() -> HitJudge {
    HitJudge::new(JudgeConfig::from(&Difficulty::Easy.config()))
}

fn single_note(lane: u8, onset: f64, lead: f64) -> Timeline {
    Timeline::from_notes(TimelineSource::Generated, lead, vec![Note::new(lane, onset, 0.2)])
}

fn hits(events: &[JudgeEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, JudgeEvent::Hit { .. }))
        .count()
}

#[test]
fn hit_on_inclusive_boundary() {
    let mut judge = easy_judge();
    let mut timeline = single_note(1, 2.0, 1.0);

    // impact at 3.0, easy tolerance 0.25
    let events = judge.on_activation(&mut timeline, 1, 3.25);
    assert_eq!(hits(&events), 1);
    assert!(timeline.notes()[0].consumed);

    let mut judge = easy_judge();
    let mut timeline = single_note(1, 2.0, 1.0);
    let events = judge.on_activation(&mut timeline, 1, 2.75);
    assert_eq!(hits(&events), 1);
}

#[test]
fn second_activation_cannot_rehit() {
    let mut judge = easy_judge();
    let mut timeline = single_note(0, 1.0, 1.0);

    let first = judge.on_activation(&mut timeline, 0, 2.0);
    assert_eq!(hits(&first), 1);
    assert_eq!(judge.stats().combo, 1);

    let second = judge.on_activation(&mut timeline, 0, 2.01);
    assert_eq!(hits(&second), 0);
    assert!(second.iter().any(|event| matches!(
        event,
        JudgeEvent::Miss {
            reason: MissReason::EmptyTap,
            ..
        }
    )));
    assert_eq!(judge.stats().combo, 0);
    assert_eq!(judge.stats().hits, 1);
}

#[test]
fn outside_tolerance_is_a_miss() {
    let mut judge = easy_judge();
    let mut timeline = single_note(2, 1.0, 1.0);

    judge.on_activation(&mut timeline, 2, 1.0);
    let events = judge.on_activation(&mut timeline, 2, 2.2);
    assert_eq!(hits(&events), 1);
    assert_eq!(judge.stats().combo, 1);

    let mut timeline = single_note(2, 1.0, 1.0);
    let events = judge.on_activation(&mut timeline, 2, 2.26);
    assert_eq!(hits(&events), 0);
    assert_eq!(judge.stats().combo, 0);
    assert!(!timeline.notes()[0].consumed);
}

#[test]
fn wrong_lane_does_not_hit() {
    let mut judge = easy_judge();
    let mut timeline = single_note(1, 0.0, 1.0);
    let events = judge.on_activation(&mut timeline, 3, 1.0);
    assert_eq!(hits(&events), 0);
    assert!(!timeline.notes()[0].consumed);
}

#[test]
fn nearest_note_in_lane_wins() {
    let mut judge = easy_judge();
    let mut timeline = Timeline::from_notes(
        TimelineSource::Generated,
        0.0,
        vec![Note::new(0, 1.0, 0.1), Note::new(0, 1.2, 0.1)],
    );
    let events = judge.on_activation(&mut timeline, 0, 1.15);
    assert!(events.iter().any(|event| matches!(
        event,
        JudgeEvent::Hit { note_index: 1, .. }
    )));
    assert!(!timeline.notes()[0].consumed);
}

#[test]
fn easy_session_depletes_after_five_misses() {
    let mut judge = easy_judge();
    let mut timeline = Timeline::new(TimelineSource::Generated, 1.0);

    let mut healths = Vec::new();
    for _ in 0..4 {
        judge.on_activation(&mut timeline, 0, 1.0);
        healths.push(judge.stats().health);
        assert!(!judge.is_depleted());
    }
    assert_eq!(healths, vec![80.0, 60.0, 40.0, 20.0]);

    let events = judge.on_activation(&mut timeline, 0, 1.0);
    assert!(events.contains(&JudgeEvent::Depleted));
    assert_eq!(judge.stats().health, 0.0);

    // inputs after depletion are ignored
    timeline.push(Note::new(0, 0.0, 0.2));
    assert!(judge.on_activation(&mut timeline, 0, 1.0).is_empty());
    assert!(!timeline.notes()[0].consumed);
}

#[test]
fn heal_is_capped_at_max() {
    let mut judge = easy_judge();
    let mut timeline = single_note(0, 0.0, 1.0);
    judge.on_activation(&mut timeline, 0, 1.0);
    assert_eq!(judge.stats().health, 100.0);

    let mut timeline = Timeline::from_notes(
        TimelineSource::Generated,
        1.0,
        vec![Note::new(0, 1.0, 0.2)],
    );
    judge.on_activation(&mut timeline, 3, 0.0);
    assert_eq!(judge.stats().health, 80.0);
    judge.on_activation(&mut timeline, 0, 2.0);
    assert_eq!(judge.stats().health, 82.0);
}

#[test]
fn expired_notes_charge_one_miss_each() {
    let mut judge = easy_judge();
    let mut timeline = Timeline::from_notes(
        TimelineSource::Generated,
        1.0,
        vec![Note::new(0, 0.0, 0.2), Note::new(1, 0.5, 0.2), Note::new(2, 3.0, 0.2)],
    );

    let events = judge.expire(&mut timeline, 1.6);
    let expired = events
        .iter()
        .filter(|event| matches!(event, JudgeEvent::Miss { reason: MissReason::Expired, .. }))
        .count();
    assert_eq!(expired, 1);

    let events = judge.expire(&mut timeline, 2.0);
    assert_eq!(
        events
            .iter()
            .filter(|event| matches!(event, JudgeEvent::Miss { .. }))
            .count(),
        1
    );
    assert!(judge.expire(&mut timeline, 2.0).is_empty());
    assert_eq!(judge.stats().misses, 2);
    assert!(!timeline.notes()[2].consumed);
}

#[test]
fn score_formulas() {
    assert_eq!(ScoreFormula::Linear.points(10, 3, 4), 120);
    assert_eq!(ScoreFormula::Exponential.points(1, 3, 4), 48);
    assert_eq!(ScoreFormula::ComboBonus { per_combo: 10 }.points(100, 1, 1), 100);
    assert_eq!(ScoreFormula::ComboBonus { per_combo: 10 }.points(100, 1, 5), 140);
    assert_eq!(ScoreFormula::Exponential.points(10, 10, 200), 100 * (1i64 << 40));
}

#[test]
fn linear_score_accumulates_with_combo() {
    let mut judge = HitJudge::new(JudgeConfig::from(&Difficulty::Normal.config()));
    let mut timeline = Timeline::from_notes(
        TimelineSource::Generated,
        0.0,
        vec![Note::new(0, 1.0, 0.1), Note::new(1, 2.0, 0.1), Note::new(2, 3.0, 0.1)],
    );
    judge.on_activation(&mut timeline, 0, 1.0);
    judge.on_activation(&mut timeline, 1, 2.0);
    judge.on_activation(&mut timeline, 2, 3.0);

    // 10 * 3 * (1 + 2 + 3)
    let stats = judge.stats();
    assert_eq!(stats.score, 180);
    assert_eq!(stats.max_combo, 3);
}
