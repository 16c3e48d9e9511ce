//! Error types for model loading and configuration.

// These warnings are false positives - the fields are used by derive macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur while loading model descriptions or configuration.
#[derive(Error, Debug, Diagnostic)]
pub enum SchemaError {
    /// Error reading a file.
    #[error("failed to read file: {path}")]
    #[diagnostic(code(keel::schema::io_error))]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The model description is malformed.
    #[error("invalid model description `{model}`: {message}")]
    #[diagnostic(
        code(keel::schema::invalid_model),
        help("attributes must be an object, or a string holding a JSON object")
    )]
    InvalidModelDescription { model: String, message: String },

    /// An attribute declares a type outside the supported set.
    #[error("unknown attribute type `{type_name}` in `{model}.{attribute}`")]
    #[diagnostic(code(keel::schema::unknown_type))]
    UnknownAttributeType {
        model: String,
        attribute: String,
        type_name: String,
    },

    /// A relation declaration is malformed.
    #[error("invalid relation `{model}.{relation}`: {message}")]
    #[diagnostic(code(keel::schema::invalid_relation))]
    InvalidRelation {
        model: String,
        relation: String,
        message: String,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    #[diagnostic(code(keel::schema::config_error))]
    ConfigError { message: String },

    /// TOML parsing error.
    #[error("failed to parse TOML")]
    #[diagnostic(code(keel::schema::toml_error))]
    TomlError {
        #[source]
        source: toml::de::Error,
    },

    /// JSON parsing error.
    #[error("failed to parse JSON")]
    #[diagnostic(code(keel::schema::json_error))]
    JsonError {
        #[source]
        source: serde_json::Error,
    },
}

impl SchemaError {
    /// Create an invalid model description error.
    pub fn invalid_model(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidModelDescription {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Create an unknown attribute type error.
    pub fn unknown_type(
        model: impl Into<String>,
        attribute: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        Self::UnknownAttributeType {
            model: model.into(),
            attribute: attribute.into(),
            type_name: type_name.into(),
        }
    }

    /// Create an invalid relation error.
    pub fn invalid_relation(
        model: impl Into<String>,
        relation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidRelation {
            model: model.into(),
            relation: relation.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// The model name this error is about, if any.
    pub fn model(&self) -> Option<&str> {
        match self {
            Self::InvalidModelDescription { model, .. }
            | Self::UnknownAttributeType { model, .. }
            | Self::InvalidRelation { model, .. } => Some(model),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(unused_assignments)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_model_display() {
        let err = SchemaError::invalid_model("Order", "attributes must be an object");
        let msg = err.to_string();
        assert!(msg.contains("Order"));
        assert!(msg.contains("attributes must be an object"));
    }

    #[test]
    fn test_unknown_type_display() {
        let err = SchemaError::unknown_type("Order", "total", "money");
        assert_eq!(
            err.to_string(),
            "unknown attribute type `money` in `Order.total`"
        );
    }

    #[test]
    fn test_error_model_accessor() {
        assert_eq!(
            SchemaError::invalid_relation("Post", "hasMany", "missing model").model(),
            Some("Post")
        );
        assert_eq!(SchemaError::config("bad").model(), None);
    }

    #[test]
    fn test_diagnostic_code() {
        let err = SchemaError::invalid_model("User", "bad");
        let code = err.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("keel::schema::invalid_model"));
    }
}
