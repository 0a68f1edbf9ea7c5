use keyfall_core::{Command, Event, GameEvent, RawInput, SoundCue, TimelineRequest};
use keyfall_domain_eval::GamePhase;
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn commands_use_type_and_payload() {
    let seek = serde_json::to_value(Command::Seek { position: 2.5 }).unwrap();
    assert_eq!(seek, json!({"type": "Seek", "payload": {"position": 2.5}}));

    let play = serde_json::to_value(Command::Play).unwrap();
    assert_eq!(play, json!({"type": "Play"}));
}

#[test]
fn host_lines_decode_into_commands() {
    let line = r#"{"type":"LoadTimeline","payload":{"request":{"type":"Demo","payload":"Bad Apple!!.mid"}}}"#;
    match serde_json::from_str::<Command>(line).unwrap() {
        Command::LoadTimeline {
            request: TimelineRequest::Demo(name),
        } => assert_eq!(name, "Bad Apple!!.mid"),
        other => panic!("unexpected {other:?}"),
    }

    let key = r#"{"type":"Input","payload":{"input":{"Key":{"code":"KeyA","down":true,"repeat":false}}}}"#;
    match serde_json::from_str::<Command>(key).unwrap() {
        Command::Input { input } => assert_eq!(
            input,
            RawInput::Key {
                code: "KeyA".to_string(),
                down: true,
                repeat: false,
            }
        ),
        other => panic!("unexpected {other:?}"),
    }

    assert!(serde_json::from_str::<Command>(r#"{"type":"Rewind"}"#).is_err());
}

#[test]
fn events_encode_for_the_host() {
    let update = serde_json::to_value(Event::TransportUpdated {
        position: 1.0,
        duration: 4.0,
        progress: 0.25,
        playing: true,
    })
    .unwrap();
    assert_eq!(
        update,
        json!({
            "type": "TransportUpdated",
            "payload": {"position": 1.0, "duration": 4.0, "progress": 0.25, "playing": true}
        })
    );

    let phase = serde_json::to_value(GameEvent::PhaseChanged {
        phase: GamePhase::Countdown,
    })
    .unwrap();
    assert_eq!(
        phase,
        json!({"type": "PhaseChanged", "payload": {"phase": "Countdown"}})
    );

    let cue = serde_json::to_value(GameEvent::Sound(SoundCue::LaneHit { lane: 2 })).unwrap();
    assert_eq!(
        cue,
        json!({"type": "Sound", "payload": {"LaneHit": {"lane": 2}}})
    );
}
