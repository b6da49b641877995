use super::*;

#[test]
fn defaults_are_internally_valid() {
    let settings = SeatingSettings::default();
    assert!(validate_patch(&settings).is_ok());
    assert_eq!(settings.allocation_mode, "auto");
    assert_eq!(settings.allocation_strategy, "balanced");
    assert_eq!(settings.version, 1);
}

#[test]
fn unknown_mode_is_rejected() {
    let settings = SeatingSettings { allocation_mode: "psychic".into(), ..SeatingSettings::default() };
    assert!(matches!(validate_patch(&settings), Err(SettingsError::Validation(_))));
}

#[test]
fn unknown_strategy_is_rejected() {
    let settings = SeatingSettings { allocation_strategy: "chaos".into(), ..SeatingSettings::default() };
    assert!(matches!(validate_patch(&settings), Err(SettingsError::Validation(_))));
}

#[test]
fn every_documented_mode_and_strategy_passes() {
    for mode in ALLOCATION_MODES {
        for strategy in ALLOCATION_STRATEGIES {
            let settings = SeatingSettings {
                allocation_mode: mode.into(),
                allocation_strategy: strategy.into(),
                ..SeatingSettings::default()
            };
            assert!(validate_patch(&settings).is_ok(), "{mode}/{strategy}");
        }
    }
}

#[test]
fn negative_buffers_are_rejected() {
    let settings = SeatingSettings { buffer_before_min: -5, ..SeatingSettings::default() };
    assert!(matches!(validate_patch(&settings), Err(SettingsError::Validation(_))));
}

#[test]
fn emergency_occupancy_must_be_a_percentage() {
    let low = SeatingSettings { emergency_min_occupancy_pct: -1, ..SeatingSettings::default() };
    assert!(validate_patch(&low).is_err());

    let high = SeatingSettings { emergency_min_occupancy_pct: 101, ..SeatingSettings::default() };
    assert!(validate_patch(&high).is_err());

    let edge = SeatingSettings { emergency_min_occupancy_pct: 100, ..SeatingSettings::default() };
    assert!(validate_patch(&edge).is_ok());
}

#[test]
fn errors_map_to_wire_codes() {
    use crate::frame::ErrorCode;
    assert_eq!(SettingsError::Validation("x".into()).error_code(), "E_VALIDATION");
}
