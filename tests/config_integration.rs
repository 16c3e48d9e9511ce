//! Integration tests for configuration parsing and handling.
//!
//! These tests verify that `keel.toml` maps onto the synthesis engine
//! settings the way the CLI uses it.

use std::path::PathBuf;

use keel::migrate::SynthesisConfig;
use keel::schema::{Dialect, KeelConfig};
use pretty_assertions::assert_eq;

/// Test minimal configuration
#[test]
fn test_config_minimal() {
    let config = KeelConfig::from_str("").expect("Failed to parse config");
    assert_eq!(config.dialect(), Dialect::Sqlite);
    assert_eq!(config.paths.migrations, "./migrations");
}

/// Test full configuration with all options
#[test]
fn test_config_full() {
    let config_str = r#"
        [database]
        dialect = "mysql"

        [paths]
        models = "app/models"
        migrations = "db/migrations"
        snapshots = "db/.snapshots"

        [migrations]
        ledger = "history.json"
        allow_narrowing = true
        dry_run = false

        [debug]
        log_level = "debug"

        [environments.ci.migrations]
        dry_run = true
    "#;

    let config = KeelConfig::from_str(config_str).expect("Failed to parse config");
    assert_eq!(config.dialect(), Dialect::MySql);
    assert_eq!(config.paths.models, "app/models");
    assert_eq!(config.migrations.ledger, "history.json");
    assert_eq!(config.debug.log_level, "debug");

    let synthesis = SynthesisConfig::from_keel_config(&config, "/srv/app");
    assert_eq!(synthesis.models_dir, PathBuf::from("/srv/app/app/models"));
    assert_eq!(synthesis.migrations_dir, PathBuf::from("/srv/app/db/migrations"));
    assert_eq!(synthesis.snapshots_dir, PathBuf::from("/srv/app/db/.snapshots"));
    assert_eq!(
        synthesis.ledger_file,
        PathBuf::from("/srv/app/db/migrations/history.json")
    );
    assert!(synthesis.allow_narrowing);
    assert!(!synthesis.dry_run);
}

/// Test environment overrides
#[test]
fn test_config_environment() {
    let config_str = r#"
        [database]
        dialect = "sqlite"

        [environments.production.database]
        dialect = "postgres"

        [environments.production.migrations]
        dry_run = true
    "#;

    let config = KeelConfig::from_str(config_str)
        .expect("Failed to parse config")
        .with_environment("production");
    assert_eq!(config.dialect(), Dialect::Postgres);
    assert!(config.migrations.dry_run);
}

/// Test that an unknown environment leaves the configuration untouched
#[test]
fn test_config_unknown_environment() {
    let config = KeelConfig::from_str("[database]\ndialect = \"mysql\"\n")
        .expect("Failed to parse config")
        .with_environment("staging");
    assert_eq!(config.dialect(), Dialect::MySql);
}

/// Test environment variable interpolation syntax
#[test]
fn test_config_unset_env_var_is_kept() {
    let config_str = r#"
        [paths]
        models = "${KEEL_TEST_SURELY_UNSET_VAR}/models"
    "#;

    let config = KeelConfig::from_str(config_str).expect("Failed to parse config");
    assert_eq!(config.paths.models, "${KEEL_TEST_SURELY_UNSET_VAR}/models");
}

/// Test dialect aliases
#[test]
fn test_config_dialect_aliases() {
    for (alias, expected) in [
        ("sqlite3", Dialect::Sqlite),
        ("mariadb", Dialect::MySql),
        ("postgresql", Dialect::Postgres),
        ("pg", Dialect::Postgres),
    ] {
        let config = KeelConfig::from_str(&format!("[database]\ndialect = \"{}\"\n", alias))
            .expect("Failed to parse config");
        assert_eq!(config.dialect(), expected);
    }
}

/// Test that unknown sections are rejected
#[test]
fn test_config_rejects_unknown_fields() {
    assert!(KeelConfig::from_str("[migrations]\ntable_name = \"_migrations\"\n").is_err());
}

/// Test configuration file loading
#[test]
fn test_config_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keel.toml");
    std::fs::write(&path, "[database]\ndialect = \"postgres\"\n").unwrap();

    let config = KeelConfig::from_file(&path).expect("Failed to load config");
    assert_eq!(config.dialect(), Dialect::Postgres);
    assert!(KeelConfig::from_file(dir.path().join("missing.toml")).is_err());
}
