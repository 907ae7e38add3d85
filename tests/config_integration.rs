use serial_test::serial;
use std::fs;
use tempfile::TempDir;
use vault_task_sync::cli::{AppConfig, ConfigDiscovery, ConfigError};
use vault_task_sync::env;
use vault_task_sync::{ConflictStrategy, SyncDirection};

const SAMPLE: &str = r##"
[vault]
root = "/home/me/notes"
task_file_patterns = ["Daily/**/*.md", "Projects/*.md"]
include_completed_tasks = true
global_task_filter = "#task"
required_tag_for_sync = "#sked"
inbox_file = "Inbox/Scheduler.md"

[scheduler]
base_url = "https://scheduler.example/api"
api_key = "file-key"
workspace_id = "ws-file"
timeout_secs = 10

[sync]
conflict_strategy = "remote_wins"
direction = "from_remote"
interval_secs = 60
debounce_ms = 250

[sync.priority_to_remote]
A = "URGENT"
B = "HIGH"

[email]
to = "intake@scheduler.example"
auto_send_on_save = true
"##;

fn write_sample() -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().expect("Should create temp dir");
    let path = dir.path().join(env::LOCAL_CONFIG_FILE_NAME);
    fs::write(&path, SAMPLE).expect("Should write sample config");
    (dir, path)
}

fn clear_overrides() {
    // SAFETY: every test touching these variables runs under #[serial]
    unsafe {
        std::env::remove_var(env::vars::API_KEY);
        std::env::remove_var(env::vars::WORKSPACE_ID);
    }
}

#[test]
#[serial]
fn test_full_config_file_is_loaded() {
    clear_overrides();
    let (_dir, path) = write_sample();

    let config = ConfigDiscovery::discover_config(Some(path.as_path())).expect("Config should load");

    assert_eq!(config.vault.task_file_patterns.len(), 2);
    assert!(config.vault.filter.include_completed_tasks);
    assert_eq!(config.vault.filter.required_tag_for_sync, "#sked");
    assert_eq!(config.vault.inbox_file, "Inbox/Scheduler.md");
    assert_eq!(config.scheduler.api_key, "file-key");
    assert_eq!(config.scheduler.timeout_secs, 10);
    assert_eq!(config.sync.conflict_strategy, ConflictStrategy::RemoteWins);
    assert_eq!(config.sync.direction, SyncDirection::FromRemote);
    assert_eq!(config.sync.debounce().as_millis(), 250);
    assert_eq!(
        config.sync.priority_to_remote.translate("a").as_deref(),
        Some("URGENT")
    );
    assert_eq!(config.sync.priority_to_remote.translate("C"), None);
    assert!(config.email.auto_send_on_save);
}

#[test]
#[serial]
fn test_environment_overrides_credentials() {
    let (_dir, path) = write_sample();
    // SAFETY: serialized with the other environment tests
    unsafe {
        std::env::set_var(env::vars::API_KEY, "env-key");
        std::env::set_var(env::vars::WORKSPACE_ID, "ws-env");
    }

    let config = ConfigDiscovery::discover_config(Some(path.as_path())).expect("Config should load");
    clear_overrides();

    assert_eq!(config.scheduler.api_key, "env-key");
    assert_eq!(config.scheduler.workspace_id, "ws-env");
    assert_eq!(config.scheduler.base_url, "https://scheduler.example/api");
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let result = ConfigDiscovery::discover_config(Some(dir.path().join("absent.toml").as_path()));
    assert!(matches!(result, Err(ConfigError::Io { .. })));
}

#[test]
fn test_written_defaults_load_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    AppConfig::default()
        .to_toml_file(&path)
        .expect("Defaults should serialize");
    let loaded = AppConfig::from_toml_file(&path).expect("Defaults should load");

    assert_eq!(loaded, AppConfig::default());
    assert_eq!(loaded.sync.interval_secs, 300);
    assert_eq!(loaded.vault.task_file_patterns, vec!["**/*.md"]);
}
