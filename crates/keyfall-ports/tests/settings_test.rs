use keyfall_ports::settings::{EngineSettings, SettingsError};
use keyfall_ports::types::Volume01;
use pretty_assertions::assert_eq;

#[test]
fn partial_json_keeps_defaults() {
    let settings = EngineSettings::from_json(r#"{ "theme": "Ocean", "sustain": true }"#)
        .expect("valid json");
    assert_eq!(settings.theme, "Ocean");
    assert!(settings.sustain);
    assert_eq!(settings.lead_secs, 8.0);
    assert_eq!(settings.lookahead_ms, 30);
    assert_eq!(settings.master_volume, Volume01::new(0.8));
}

#[test]
fn nonsense_lead_falls_back_to_default() {
    let settings = EngineSettings::from_json(r#"{ "lead_secs": -3.0, "start_delay_secs": -1.0 }"#)
        .expect("valid json");
    assert_eq!(settings.lead_secs, 8.0);
    assert_eq!(settings.start_delay_secs, 0.1);
}

#[test]
fn input_offset_is_reported_in_seconds() {
    let settings = EngineSettings {
        input_offset_ms: -40,
        ..EngineSettings::default()
    };
    assert_eq!(settings.input_offset_secs(), -0.04);
}

#[test]
fn malformed_json_is_an_error() {
    let err = EngineSettings::from_json("{ lead_secs: ").expect_err("not json");
    assert!(matches!(err, SettingsError::Json(_)));
}

#[test]
fn missing_file_is_an_io_error() {
    let err = EngineSettings::load(std::path::Path::new("/no/such/settings.json"))
        .expect_err("missing");
    assert!(matches!(err, SettingsError::Io(_)));
}
