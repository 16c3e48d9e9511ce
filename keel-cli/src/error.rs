//! CLI error types and result alias.

use keel_migrate::MigrationError;
use keel_schema::SchemaError;
use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// IO error
    #[error("IO error: {0}")]
    #[diagnostic(code(keel::cli::io))]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    #[diagnostic(code(keel::cli::config))]
    Config(String),

    /// Model loading error
    #[error("Schema error: {0}")]
    #[diagnostic(code(keel::cli::schema))]
    Schema(String),

    /// Migration synthesis error
    #[error("Migration error: {0}")]
    #[diagnostic(code(keel::cli::migration))]
    Migration(String),

    /// Some models could not be synthesized
    #[error("{0} model(s) failed")]
    #[diagnostic(code(keel::cli::failed_models))]
    FailedModels(usize),
}

impl From<SchemaError> for CliError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::ConfigError { .. } | SchemaError::TomlError { .. } => {
                CliError::Config(err.to_string())
            }
            other => CliError::Schema(other.to_string()),
        }
    }
}

impl From<MigrationError> for CliError {
    fn from(err: MigrationError) -> Self {
        match err {
            MigrationError::Schema(schema) => schema.into(),
            other => CliError::Migration(other.to_string()),
        }
    }
}

impl From<toml::ser::Error> for CliError {
    fn from(err: toml::ser::Error) -> Self {
        CliError::Config(format!("Failed to serialize TOML: {}", err))
    }
}
