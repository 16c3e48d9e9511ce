//! Configuration file parsing for `keel.toml`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{SchemaError, SchemaResult};

/// Main configuration structure for `keel.toml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KeelConfig {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Input and output locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Migration synthesis settings.
    #[serde(default)]
    pub migrations: MigrationConfig,

    /// Debug/logging settings.
    #[serde(default)]
    pub debug: DebugConfig,

    /// Environment-specific overrides.
    #[serde(default)]
    pub environments: HashMap<String, EnvironmentOverride>,
}

impl KeelConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SchemaError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> SchemaResult<Self> {
        let expanded = expand_env_vars(content)?;
        toml::from_str(&expanded).map_err(|e| SchemaError::TomlError { source: e })
    }

    /// The configured dialect.
    pub fn dialect(&self) -> Dialect {
        self.database.dialect
    }

    /// Apply environment-specific overrides.
    pub fn with_environment(mut self, env: &str) -> Self {
        if let Some(overrides) = self.environments.remove(env) {
            if let Some(dialect) = overrides.database.and_then(|db| db.dialect) {
                self.database.dialect = dialect;
            }
            if let Some(migrations) = overrides.migrations {
                if let Some(allow_narrowing) = migrations.allow_narrowing {
                    self.migrations.allow_narrowing = allow_narrowing;
                }
                if let Some(dry_run) = migrations.dry_run {
                    self.migrations.dry_run = dry_run;
                }
            }
            if let Some(level) = overrides.debug.and_then(|d| d.log_level) {
                self.debug.log_level = level;
            }
        }
        self
    }

    /// Resolve the configured paths against a project root.
    pub fn resolve_paths(&self, root: impl AsRef<Path>) -> ResolvedPaths {
        let root = root.as_ref();
        ResolvedPaths {
            models: root.join(&self.paths.models),
            migrations: root.join(&self.paths.migrations),
            snapshots: root.join(&self.paths.snapshots),
        }
    }
}

/// Paths from [`PathsConfig`] joined onto a project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    /// Model description directory.
    pub models: PathBuf,
    /// Migration artifact directory.
    pub migrations: PathBuf,
    /// Attribute snapshot directory.
    pub snapshots: PathBuf,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Target SQL dialect.
    #[serde(default = "default_dialect")]
    pub dialect: Dialect,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dialect: default_dialect(),
        }
    }
}

fn default_dialect() -> Dialect {
    Dialect::Sqlite
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// SQLite.
    #[serde(alias = "sqlite3")]
    Sqlite,
    /// MySQL / MariaDB.
    #[serde(alias = "mariadb")]
    MySql,
    /// PostgreSQL.
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
}

impl Dialect {
    /// Every dialect.
    pub const ALL: [Dialect; 3] = [Dialect::Sqlite, Dialect::MySql, Dialect::Postgres];

    /// Get the dialect name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
        }
    }

    /// Whether foreign keys must be declared inline with the column.
    pub fn inline_foreign_keys(&self) -> bool {
        matches!(self, Self::Sqlite)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "mysql" | "mariadb" => Ok(Self::MySql),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            other => Err(SchemaError::config(format!(
                "unknown dialect `{}` (expected sqlite, mysql or postgres)",
                other
            ))),
        }
    }
}

/// Input and output locations, relative to the project root.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Model description directory.
    #[serde(default = "default_models_dir")]
    pub models: String,

    /// Migration artifact directory.
    #[serde(default = "default_migrations_dir")]
    pub migrations: String,

    /// Attribute snapshot directory.
    #[serde(default = "default_snapshots_dir")]
    pub snapshots: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            models: default_models_dir(),
            migrations: default_migrations_dir(),
            snapshots: default_snapshots_dir(),
        }
    }
}

fn default_models_dir() -> String { "./models".to_string() }
fn default_migrations_dir() -> String { "./migrations".to_string() }
fn default_snapshots_dir() -> String { "./.keel/snapshots".to_string() }

/// Migration synthesis configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationConfig {
    /// Ledger file name, inside the migrations directory.
    #[serde(default = "default_ledger")]
    pub ledger: String,

    /// Emit narrowing column changes as-is instead of widening them.
    #[serde(default)]
    pub allow_narrowing: bool,

    /// Plan and render without writing anything.
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            ledger: default_ledger(),
            allow_narrowing: false,
            dry_run: false,
        }
    }
}

fn default_ledger() -> String { "ledger.json".to_string() }

/// Debug/logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DebugConfig {
    /// Default log filter when `KEEL_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String { "warn".to_string() }

/// Environment-specific configuration overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentOverride {
    /// Database overrides.
    pub database: Option<DatabaseOverride>,

    /// Migration overrides.
    pub migrations: Option<MigrationOverride>,

    /// Debug overrides.
    pub debug: Option<DebugOverride>,
}

/// Database configuration overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseOverride {
    /// Override the dialect.
    pub dialect: Option<Dialect>,
}

/// Migration configuration overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationOverride {
    /// Override allow_narrowing.
    pub allow_narrowing: Option<bool>,

    /// Override dry_run.
    pub dry_run: Option<bool>,
}

/// Debug configuration overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DebugOverride {
    /// Override log_level.
    pub log_level: Option<String>,
}

/// Expand environment variables in the format `${VAR_NAME}`.
///
/// Unset variables are left untouched.
fn expand_env_vars(content: &str) -> SchemaResult<String> {
    let re = match regex_lite::Regex::new(r"\$\{([^}]+)\}") {
        Ok(re) => re,
        Err(e) => return Err(SchemaError::config(e.to_string())),
    };

    let expanded = re.replace_all(content, |caps: &regex_lite::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    });
    Ok(expanded.into_owned())
}
