use std::io::Write;
use std::time::Duration;

use console_operator::settings::loader::load_settings;

fn write_settings(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("create temp settings file");
    file.write_all(contents.as_bytes())
        .expect("write temp settings file");
    file
}

#[test]
fn test_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let settings = load_settings(path.to_str()).unwrap();

    assert_eq!(settings.logging.level, "info");
    assert_eq!(settings.controller.resync_interval_secs, 600);
    assert_eq!(settings.kube.field_manager, "console-operator");
}

#[test]
fn test_file_overrides_defaults() {
    let file = write_settings(
        r#"
[logging]
level = "debug"

[controller]
resync_interval_secs = 0
backoff_base_ms = 250
backoff_max_ms = 8000

[kube]
field_manager = "console-operator-test"
"#,
    );

    let settings = load_settings(file.path().to_str()).unwrap();

    assert_eq!(settings.logging.level, "debug");
    assert_eq!(settings.controller.resync_interval(), None);
    let backoff = settings.controller.backoff();
    assert_eq!(backoff.delay(1), Duration::from_millis(250));
    assert_eq!(backoff.delay(10), Duration::from_millis(8000));
    assert_eq!(settings.kube.field_manager, "console-operator-test");
}

#[test]
fn test_invalid_file_is_rejected() {
    let file = write_settings(
        r#"
[controller]
backoff_base_ms = 0
"#,
    );

    let err = load_settings(file.path().to_str()).unwrap_err();

    assert!(err.contains("backoff_base_ms"), "unexpected error: {err}");
}
