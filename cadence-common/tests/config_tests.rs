//! Configuration resolution tests
//!
//! Tests that touch `CADENCE_CONFIG` are marked `#[serial]` so they never
//! observe each other's environment.

use cadence_common::config::{read_toml_config, resolve_config_path, TomlConfig, CONFIG_ENV_VAR};
use cadence_common::Error;
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_env_var_used_when_no_cli_arg() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/cadence-env.toml");

    let resolved = resolve_config_path(None);

    env::remove_var(CONFIG_ENV_VAR);
    assert_eq!(resolved, Some(PathBuf::from("/tmp/cadence-env.toml")));
}

#[test]
#[serial]
fn test_cli_arg_beats_env_var() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/cadence-env.toml");
    let cli = PathBuf::from("/tmp/cadence-cli.toml");

    let resolved = resolve_config_path(Some(&cli));

    env::remove_var(CONFIG_ENV_VAR);
    assert_eq!(resolved, Some(cli));
}

#[test]
#[serial]
fn test_blank_env_var_is_ignored() {
    env::set_var(CONFIG_ENV_VAR, "   ");

    let resolved = resolve_config_path(None);

    env::remove_var(CONFIG_ENV_VAR);
    assert_ne!(resolved, Some(PathBuf::from("   ")));
}

#[test]
#[serial]
fn test_load_reads_file_named_by_env_var() {
    let file = write_config(
        r#"
        bind_address = "0.0.0.0:9000"

        [database]
        path = "/var/lib/cadence/test.db"

        [scheduling]
        window_days = 14
        min_batch = 2

        [dataforseo]
        login = "ops@example.com"
        password = "secret"
        "#,
    );
    env::set_var(CONFIG_ENV_VAR, file.path());

    let config = TomlConfig::load(None);

    env::remove_var(CONFIG_ENV_VAR);
    let config = config.unwrap();
    assert_eq!(config.bind_address(), "0.0.0.0:9000");
    assert_eq!(config.database_path(), PathBuf::from("/var/lib/cadence/test.db"));
    assert_eq!(config.scheduling.window_days, 14);
    assert_eq!(config.scheduling.min_batch, 2);
    assert_eq!(config.dataforseo.login.as_deref(), Some("ops@example.com"));
    assert_eq!(config.dataforseo.location_code, 2840);
}

#[test]
fn test_explicit_missing_file_is_an_error() {
    let missing = PathBuf::from("/nonexistent/cadence/config.toml");
    let result = TomlConfig::load(Some(&missing));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_malformed_toml_is_a_config_error() {
    let file = write_config("[scheduling\nwindow_days = ");
    let result = read_toml_config(file.path());
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_default_bind_address() {
    assert_eq!(TomlConfig::default().bind_address(), "127.0.0.1:5780");
}
