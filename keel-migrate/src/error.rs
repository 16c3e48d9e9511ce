//! Error types for migration synthesis.

use keel_schema::SchemaError;
use thiserror::Error;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur while synthesizing migrations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Model loading or configuration error.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A model description that cannot be planned.
    #[error("Invalid model description '{model}': {message}")]
    InvalidModelDescription {
        /// Model name.
        model: String,
        /// What is wrong with it.
        message: String,
    },

    /// A relation points at a model that cannot be loaded.
    #[error("Unresolved relation on '{model}': {relation} references unknown model '{target}'")]
    UnresolvedRelation {
        /// Model declaring the relation.
        model: String,
        /// Relation label, e.g. `belongsToMany(Tag)`.
        relation: String,
        /// Missing model.
        target: String,
    },

    /// An operation has no safe rendering in the target dialect.
    #[error("{dialect} cannot {operation}")]
    DialectUnsupportedOperation {
        /// Target dialect.
        dialect: String,
        /// The operation that was degraded.
        operation: String,
    },

    /// An artifact could not be durably recorded.
    #[error("Failed to record migration '{name}': {message}")]
    LedgerWriteFailure {
        /// Artifact name.
        name: String,
        /// Underlying failure.
        message: String,
    },

    /// Snapshot or ledger serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid migration artifact on disk.
    #[error("Invalid migration: {0}")]
    InvalidMigration(String),

    /// General migration error.
    #[error("Migration error: {0}")]
    Other(String),
}

impl MigrationError {
    /// Create an invalid model description error.
    pub fn invalid_model(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidModelDescription {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Create an unresolved relation error.
    pub fn unresolved_relation(
        model: impl Into<String>,
        relation: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self::UnresolvedRelation {
            model: model.into(),
            relation: relation.into(),
            target: target.into(),
        }
    }

    /// Create a dialect unsupported operation error.
    pub fn unsupported(dialect: impl std::fmt::Display, operation: impl Into<String>) -> Self {
        Self::DialectUnsupportedOperation {
            dialect: dialect.to_string(),
            operation: operation.into(),
        }
    }

    /// Create a ledger write failure.
    pub fn ledger_write(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LedgerWriteFailure {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// The model this error is about, if any.
    pub fn model(&self) -> Option<&str> {
        match self {
            Self::InvalidModelDescription { model, .. } | Self::UnresolvedRelation { model, .. } => {
                Some(model)
            }
            Self::Schema(err) => err.model(),
            _ => None,
        }
    }

    /// Check if the run can continue past this error.
    ///
    /// Unresolved relations abort the whole run; everything else is scoped
    /// to one model or artifact.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::UnresolvedRelation { .. })
    }
}
