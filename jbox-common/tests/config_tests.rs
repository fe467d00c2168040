//! Configuration resolution and graceful degradation
//!
//! Tests that touch `JBOX_CONFIG` are marked `#[serial]` so they never race
//! on the process environment.

use jbox_common::config::{CompiledDefaults, ConfigResolver, TomlConfig, CONFIG_ENV_VAR};
use jbox_common::{OperationKind, QuotaRule};
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_config(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("write config");
    path
}

#[test]
fn test_compiled_defaults() {
    let defaults = CompiledDefaults::for_current_platform();
    assert_eq!(defaults.log_level, "info");
    assert_eq!(defaults.promote_history_limit, 100);
    assert!(defaults.quota_cleanup_interval_secs > 0);
}

#[test]
#[serial]
fn test_no_file_uses_defaults() {
    env::remove_var(CONFIG_ENV_VAR);
    let resolver = ConfigResolver::with_candidates(None, vec![PathBuf::from("/nonexistent/jbox.toml")]);

    let (config, source) = resolver.resolve();

    assert!(source.is_none());
    assert_eq!(config.port, CompiledDefaults::for_current_platform().port);
}

#[test]
#[serial]
fn test_explicit_path_wins_over_env_and_candidates() {
    let dir = TempDir::new().unwrap();
    let explicit = write_config(&dir, "explicit.toml", "port = 4001");
    let from_env = write_config(&dir, "env.toml", "port = 4002");
    let candidate = write_config(&dir, "candidate.toml", "port = 4003");
    env::set_var(CONFIG_ENV_VAR, &from_env);

    let resolver = ConfigResolver::with_candidates(Some(explicit.clone()), vec![candidate]);
    let (config, source) = resolver.resolve();

    assert_eq!(config.port, 4001);
    assert_eq!(source, Some(explicit));
    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_wins_over_candidates() {
    let dir = TempDir::new().unwrap();
    let from_env = write_config(&dir, "env.toml", "port = 4002");
    let candidate = write_config(&dir, "candidate.toml", "port = 4003");
    env::set_var(CONFIG_ENV_VAR, &from_env);

    let resolver = ConfigResolver::with_candidates(None, vec![candidate]);
    let (config, _) = resolver.resolve();

    assert_eq!(config.port, 4002);
    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_first_existing_candidate_is_used() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = TempDir::new().unwrap();
    let second = write_config(&dir, "second.toml", "port = 4004");

    let resolver = ConfigResolver::with_candidates(None, vec![dir.path().join("missing.toml"), second.clone()]);

    assert_eq!(resolver.locate(), Some(second));
    assert_eq!(resolver.resolve().0.port, 4004);
}

#[test]
#[serial]
fn test_malformed_file_degrades_to_defaults() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = TempDir::new().unwrap();
    let broken = write_config(&dir, "broken.toml", "port = \"not a number\"");

    let resolver = ConfigResolver::with_candidates(Some(broken), vec![]);
    let (config, source) = resolver.resolve();

    assert!(source.is_none());
    assert_eq!(config.port, 3000);
}

#[test]
#[serial]
fn test_missing_explicit_file_degrades_to_defaults() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = TempDir::new().unwrap();

    let resolver = ConfigResolver::with_candidates(Some(dir.path().join("gone.toml")), vec![]);
    let (config, source) = resolver.resolve();

    assert!(source.is_none());
    assert_eq!(config.history_limit, 500);
}

#[test]
fn test_full_document() {
    let config = TomlConfig::from_toml_str(
        r#"
        bind_addr = "192.168.1.20"
        port = 8080
        host_ip = "192.168.1.20"
        trust_proxy_headers = true
        log_level = "debug"
        history_limit = 50
        promote_history_limit = 20
        quota_cleanup_interval_secs = 60
        event_buffer = 32

        [quota.promote]
        window_secs = 600
        max_operations = 2
        "#,
    )
    .unwrap();

    assert_eq!(config.host_ip.as_deref(), Some("192.168.1.20"));
    assert!(config.trust_proxy_headers);
    assert_eq!(config.history_limit, 50);
    assert_eq!(config.quota_rules()[&OperationKind::Promote], QuotaRule::new(600, 2));
}
