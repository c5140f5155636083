//! Integration tests for run configuration loading
//!
//! Tests TOML parsing, validation and command-line overrides

use multigrep::config::{
    load_from_path, load_from_str, load_or_default, ConfigError, Overrides, RunConfig,
    ValidationIssue, DEFAULT_CONFIG_FILE,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_load_full_config() {
    let toml = r#"
quote = "'"
backup = true
extensions = ["cs", "txt"]
threads = 4
monitor_interval_ms = 100
split_lines = false
log_path = "out/matches.log"
syntax = true
max_edits = 2
"#;

    let config = load_from_str(toml).expect("Failed to parse config");

    assert_eq!(config.quote, '\'');
    assert!(config.backup);
    assert_eq!(config.extensions, vec!["cs", "txt"]);
    assert_eq!(config.threads, 4);
    assert_eq!(config.monitor_interval_ms, 100);
    assert!(!config.split_lines);
    assert_eq!(config.log_path, PathBuf::from("out/matches.log"));
    assert!(config.syntax);
    assert_eq!(config.max_edits, 2);
}

#[test]
fn test_empty_config_is_default() {
    let config = load_from_str("").unwrap();
    assert_eq!(config, RunConfig::default());
}

#[test]
fn test_unknown_field_rejected() {
    let result = load_from_str("colour = true\n");
    assert!(matches!(result, Err(ConfigError::Toml { path: None, .. })));
}

#[test]
fn test_validation_collects_all_issues() {
    let toml = r#"
quote = " "
monitor_interval_ms = 0
log_path = ""
"#;

    let err = load_from_str(toml).unwrap_err();
    let ConfigError::Validation { source, .. } = err else {
        panic!("expected a validation error, got {err}");
    };
    assert_eq!(source.issues.len(), 3);
    assert!(source
        .issues
        .contains(&ValidationIssue::MissingField { field: "log_path" }));
}

#[test]
fn test_load_from_path_reports_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "monitor_interval_ms = 0\n").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Validation { path: Some(_), .. }));
    assert!(err.to_string().contains("bad.toml"));
}

#[test]
fn test_toml_error_names_its_origin() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("typo.toml");
    fs::write(&path, "backup = maybe\n").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Toml { path: Some(_), .. }));
    let message = err.to_string();
    assert!(message.starts_with("failed to parse config TOML ("));
    assert!(message.contains("typo.toml"));

    let message = load_from_str("backup = maybe\n").unwrap_err().to_string();
    assert!(message.starts_with("failed to parse config TOML: "));
}

#[test]
fn test_load_missing_file() {
    let err = load_from_path("/nonexistent/multigrep.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn test_load_or_default_discovery() {
    let dir = TempDir::new().unwrap();
    assert_eq!(
        load_or_default(None, dir.path()).unwrap(),
        RunConfig::default()
    );

    fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "backup = true\n").unwrap();
    assert!(load_or_default(None, dir.path()).unwrap().backup);

    let explicit = dir.path().join("other.toml");
    fs::write(&explicit, "threads = 3\n").unwrap();
    let config = load_or_default(Some(&explicit), dir.path()).unwrap();
    assert_eq!(config.threads, 3);
    assert!(!config.backup);
}

#[test]
fn test_overrides_win_over_file() {
    let config = load_from_str("quote = \"'\"\nlog_path = \"a.log\"\nextensions = [\"cs\"]\n")
        .unwrap()
        .merge(Overrides {
            quote: Some('|'),
            no_split_lines: true,
            log_path: Some(PathBuf::from("b.log")),
            ..Overrides::default()
        })
        .unwrap();

    assert_eq!(config.quote, '|');
    assert!(!config.split_lines);
    assert_eq!(config.log_path, PathBuf::from("b.log"));
    assert_eq!(config.extensions, vec!["cs"]);
}
