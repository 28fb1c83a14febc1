use postmerge_settings::{Settings, SettingsError};
use tempfile::TempDir;

#[test]
fn test_toml_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("postmerge.toml");

    let mut settings = Settings::default();
    settings.merge.tool_change = "N M9|G30 G91 Z0.|G90".to_string();
    settings.rapid.enabled = true;
    settings.post.numeric_name = true;
    settings.engine.program = "fusion-post".to_string();
    settings.engine.args = vec!["--out".to_string(), "{output}".to_string()];

    settings.save_to_file(&path).unwrap();
    let loaded = Settings::load_from_file(&path).unwrap();
    assert_eq!(loaded, settings);
}

#[test]
fn test_json_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("postmerge.json");

    let mut settings = Settings::default();
    settings.output.two_digits = true;
    settings.merge.line_number_start = 100;

    settings.save_to_file(&path).unwrap();
    let loaded = Settings::load_from_file(&path).unwrap();
    assert_eq!(loaded.output.two_digits, true);
    assert_eq!(loaded.merge.line_number_start, 100);
}

#[test]
fn test_unsupported_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("postmerge.yaml");
    std::fs::write(&path, "merge: {}").unwrap();

    let err = Settings::load_from_file(&path).unwrap_err();
    assert!(matches!(err, SettingsError::Config(_)));
}

#[test]
fn test_invalid_file_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("postmerge.toml");
    std::fs::write(&path, "[merge]\nline_number_step = 0\n").unwrap();

    let err = Settings::load_from_file(&path).unwrap_err();
    assert!(matches!(err, SettingsError::InvalidSetting { .. }));
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let err = Settings::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, SettingsError::LoadError(_)));
}

#[test]
fn test_load_or_default_without_path() {
    let settings = Settings::load_or_default(None).unwrap();
    assert_eq!(settings, Settings::default());
}
