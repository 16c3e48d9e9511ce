//! Attribute definitions for model descriptions.

use serde::{Deserialize, Serialize};

/// The semantic type of an attribute.
///
/// Decided once while a model is parsed, so later stages branch on a closed
/// set instead of probing the raw description.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttributeKind {
    /// Bounded string. `None` means the dialect default length (255).
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<u32>,
    },
    /// Unbounded text.
    Text,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInteger,
    /// Floating point number.
    Float,
    /// Fixed precision decimal.
    Decimal {
        /// Total number of digits.
        precision: u8,
        /// Digits after the decimal point.
        scale: u8,
    },
    /// Boolean flag.
    Boolean,
    /// Calendar date.
    Date,
    /// Date and time.
    DateTime,
    /// One of a fixed set of string values.
    Enum {
        /// Allowed values, in declaration order.
        choices: Vec<String>,
    },
    /// Structured JSON payload.
    Json,
    /// UUID value.
    Uuid,
}

impl AttributeKind {
    /// Default length used for strings without an explicit maximum.
    pub const DEFAULT_STRING_LENGTH: u32 = 255;

    /// A bounded string with the given maximum length.
    pub fn string(max_length: u32) -> Self {
        Self::String {
            max_length: Some(max_length),
        }
    }

    /// A bounded string using the default length.
    pub fn default_string() -> Self {
        Self::String { max_length: None }
    }

    /// Effective length of a bounded string.
    pub fn string_length(&self) -> Option<u32> {
        match self {
            Self::String { max_length } => {
                Some(max_length.unwrap_or(Self::DEFAULT_STRING_LENGTH))
            }
            _ => None,
        }
    }

    /// Whether the kind stores free-form character data without a bound.
    pub fn is_unbounded_text(&self) -> bool {
        matches!(self, Self::Text | Self::Json)
    }

    /// Whether the kind is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Integer | Self::BigInteger | Self::Float | Self::Decimal { .. }
        )
    }

    /// Short name used in logs and warnings.
    pub fn name(&self) -> &'static str {
        match self {
            Self::String { .. } => "string",
            Self::Text => "text",
            Self::Integer => "integer",
            Self::BigInteger => "bigint",
            Self::Float => "float",
            Self::Decimal { .. } => "decimal",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Enum { .. } => "enum",
            Self::Json => "json",
            Self::Uuid => "uuid",
        }
    }
}

impl std::fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String { .. } => write!(f, "string({})", self.string_length().unwrap_or(0)),
            Self::Decimal { precision, scale } => write!(f, "decimal({}, {})", precision, scale),
            Self::Enum { choices } => write!(f, "enum({})", choices.join(", ")),
            other => f.write_str(other.name()),
        }
    }
}

/// A column default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DefaultValue {
    /// String literal.
    String(String),
    /// Integer literal.
    Integer(i64),
    /// Float literal.
    Float(f64),
    /// Boolean literal.
    Boolean(bool),
    /// Explicit `NULL`.
    Null,
    /// The dialect's current-timestamp expression.
    CurrentTimestamp,
    /// The dialect's UUID generator, where one exists.
    GeneratedUuid,
}

/// A normalized model attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Semantic type.
    pub kind: AttributeKind,
    /// Whether the column is `NOT NULL`.
    #[serde(default)]
    pub required: bool,
    /// Whether the column is unique.
    #[serde(default)]
    pub unique: bool,
    /// Default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    /// Explicit column position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

impl Attribute {
    /// Create a nullable, non-unique attribute of the given kind.
    pub fn new(kind: AttributeKind) -> Self {
        Self {
            kind,
            required: false,
            unique: false,
            default: None,
            order: None,
        }
    }

    /// Mark the attribute as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark the attribute as unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Set the default value.
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Set the explicit column position.
    pub fn with_order(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }
}
