use orbit::config::{ConfigError, SettingsFile};
use orbit::{BufferPolicy, Settings};
use std::time::Duration;
use tempfile::TempDir;

/// A missing file yields the defaults.
#[test]
fn test_missing_file_uses_defaults() {
    let dir = TempDir::new().expect("temp dir");
    let settings = SettingsFile::load_from(&dir.path().join("orbit.toml")).expect("defaults");
    assert_eq!(settings, SettingsFile::default());
}

/// Values from disk are applied onto a builder.
#[test]
fn test_file_values_are_applied() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("orbit.toml");
    std::fs::write(
        &path,
        "side_effect_buffer = { drop_oldest = 8 }\nrepeat_on_subscription_stop_timeout_ms = 500\n",
    )
    .expect("write settings");

    let file = SettingsFile::load_from(&path).expect("valid file");
    let settings: Settings = file.apply(Settings::builder()).build();

    assert_eq!(settings.side_effect_buffer(), BufferPolicy::DropOldest(8));
    assert_eq!(
        settings.repeat_on_subscription_stop_timeout(),
        Duration::from_millis(500)
    );
    assert!(settings.register_idling());
    assert!(settings.exception_handler().is_none());
}

/// Malformed TOML reports the file it came from.
#[test]
fn test_parse_error_names_the_file() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("orbit.toml");
    std::fs::write(&path, "side_effect_buffer = [").expect("write settings");

    match SettingsFile::load_from(&path) {
        Err(ConfigError::ParseError { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("Expected ParseError, got {other:?}"),
    }
}

/// A zero-capacity buffer is rejected by validation.
#[test]
fn test_zero_capacity_is_rejected() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("orbit.toml");
    std::fs::write(&path, "side_effect_buffer = { drop_oldest = 0 }").expect("write settings");

    let err = SettingsFile::load_from(&path).expect_err("invalid");
    assert!(err.to_string().contains("at least 1"));
}

/// A directory in place of the file is a read error.
#[test]
fn test_unreadable_path_is_a_read_error() {
    let dir = TempDir::new().expect("temp dir");
    let err = SettingsFile::load_from(dir.path()).expect_err("directory is not a file");
    assert!(matches!(err, ConfigError::ReadError { .. }));
}
