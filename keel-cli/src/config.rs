//! CLI configuration handling.

use std::path::{Path, PathBuf};

use keel_migrate::SynthesisConfig;
use keel_schema::{Dialect, KeelConfig};
use tracing::debug;

use crate::cli::GenerateArgs;
use crate::error::CliResult;

/// Default config file name (lives in project root)
pub const CONFIG_FILE_NAME: &str = "keel.toml";

/// Load `keel.toml` from a project root.
///
/// A missing file yields the defaults. The named environment override is
/// applied afterwards.
pub fn load(root: &Path, env: Option<&str>) -> CliResult<KeelConfig> {
    let path = root.join(CONFIG_FILE_NAME);
    let config = if path.exists() {
        debug!(path = %path.display(), "loading configuration");
        KeelConfig::from_file(&path)?
    } else {
        debug!(root = %root.display(), "no keel.toml, using defaults");
        KeelConfig::default()
    };

    Ok(match env {
        Some(env) => config.with_environment(env),
        None => config,
    })
}

/// Save configuration to a file
pub fn save(config: &KeelConfig, path: &Path) -> CliResult<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Create a default config for a specific dialect
pub fn default_for_dialect(dialect: Dialect) -> KeelConfig {
    let mut config = KeelConfig::default();
    config.database.dialect = dialect;
    config
}

/// Engine configuration for `keel generate`, command-line flags taking
/// precedence over `keel.toml`.
pub fn synthesis_config(config: &KeelConfig, args: &GenerateArgs) -> SynthesisConfig {
    let mut synthesis = SynthesisConfig::from_keel_config(config, &args.root);

    if let Some(dialect) = args.dialect {
        synthesis = synthesis.dialect(dialect.into());
    }
    if let Some(models) = &args.models {
        synthesis = synthesis.models_dir(models.clone());
    }
    if let Some(migrations) = &args.migrations {
        synthesis = synthesis.migrations_dir(migrations.clone());
    }
    if args.allow_narrowing {
        synthesis = synthesis.allow_narrowing(true);
    }
    if args.dry_run {
        synthesis = synthesis.dry_run(true);
    }
    synthesis
}

/// Migrations directory for `keel status`.
pub fn migrations_dir(config: &KeelConfig, root: &Path, overridden: Option<&PathBuf>) -> PathBuf {
    match overridden {
        Some(dir) => dir.clone(),
        None => config.resolve_paths(root).migrations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::DialectArg;

    fn generate_args(root: &Path) -> GenerateArgs {
        GenerateArgs {
            model: None,
            root: root.to_path_buf(),
            dialect: None,
            models: None,
            migrations: None,
            allow_narrowing: false,
            dry_run: false,
        }
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(dir.path(), None).unwrap();
        assert_eq!(config.dialect(), Dialect::Sqlite);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        save(&default_for_dialect(Dialect::MySql), &dir.path().join(CONFIG_FILE_NAME)).unwrap();

        let config = load(dir.path(), None).unwrap();
        assert_eq!(config.dialect(), Dialect::MySql);
        assert_eq!(config.paths.models, "./models");
    }

    #[test]
    fn test_environment_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[database]\ndialect = \"sqlite\"\n\n[environments.production.database]\ndialect = \"postgres\"\n",
        )
        .unwrap();

        assert_eq!(load(dir.path(), None).unwrap().dialect(), Dialect::Sqlite);
        assert_eq!(
            load(dir.path(), Some("production")).unwrap().dialect(),
            Dialect::Postgres
        );
    }

    #[test]
    fn test_flags_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = generate_args(dir.path());
        args.dialect = Some(DialectArg::Postgres);
        args.migrations = Some(PathBuf::from("/tmp/out"));
        args.dry_run = true;

        let synthesis = synthesis_config(&KeelConfig::default(), &args);
        assert_eq!(synthesis.dialect, Dialect::Postgres);
        assert_eq!(synthesis.migrations_dir, PathBuf::from("/tmp/out"));
        assert_eq!(synthesis.ledger_file, PathBuf::from("/tmp/out/ledger.json"));
        assert!(synthesis.dry_run);
    }
}
