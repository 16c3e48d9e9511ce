//! Model description parser.
//!
//! Model files are JSON or TOML documents. Both are read into a
//! [`serde_json::Value`] first and then normalized into a
//! [`ModelDescription`], so every format accepts the same shapes:
//!
//! - `attributes` may be an object, or a string holding a serialized object
//! - relations may be a model name, an object, or a list of either
//! - trait flags may be booleans, arrays or option objects

mod raw;
mod traits;

use std::path::Path;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use smol_str::SmolStr;
use tracing::debug;

use crate::ast::{
    Attribute, AttributeKind, DefaultValue, IndexDeclaration, ModelDescription,
    RelationDeclaration, RelationKind,
};
use crate::error::{SchemaError, SchemaResult};

use raw::{RawAttribute, RawModel, RawRelation, RawRelations};

/// Supported model file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// `*.json`
    Json,
    /// `*.toml`
    Toml,
}

impl ModelFormat {
    /// Detect the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Some(Self::Json),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Some(Self::Toml),
            _ => None,
        }
    }
}

/// Parse a model description file.
///
/// The file stem is used as the model name when the description does not
/// declare one.
pub fn parse_model_file(path: impl AsRef<Path>) -> SchemaResult<ModelDescription> {
    let path = path.as_ref();
    let fallback = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();

    let format = ModelFormat::from_path(path).ok_or_else(|| {
        SchemaError::invalid_model(&fallback, format!("unsupported model file {}", path.display()))
    })?;

    let content = std::fs::read_to_string(path).map_err(|e| SchemaError::IoError {
        path: path.display().to_string(),
        source: e,
    })?;

    let mut model = parse_model_str(&content, format, &fallback)?;
    model.source = Some(path.to_path_buf());
    Ok(model)
}

/// Parse a model description from a string.
pub fn parse_model_str(
    content: &str,
    format: ModelFormat,
    fallback_name: &str,
) -> SchemaResult<ModelDescription> {
    let value: Value = match format {
        ModelFormat::Json => serde_json::from_str(content)
            .map_err(|e| SchemaError::invalid_model(fallback_name, format!("malformed JSON: {}", e)))?,
        ModelFormat::Toml => toml::from_str(content)
            .map_err(|e| SchemaError::invalid_model(fallback_name, format!("malformed TOML: {}", e)))?,
    };

    if !value.is_object() {
        return Err(SchemaError::invalid_model(
            fallback_name,
            "a model description must be an object",
        ));
    }

    let raw: RawModel = serde_json::from_value(value)
        .map_err(|e| SchemaError::invalid_model(fallback_name, e.to_string()))?;

    normalize(raw, fallback_name)
}

fn normalize(raw: RawModel, fallback_name: &str) -> SchemaResult<ModelDescription> {
    let name = match raw.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => fallback_name.to_string(),
    };
    if name.is_empty() {
        return Err(SchemaError::invalid_model("<unnamed>", "model has no name"));
    }

    let mut model = ModelDescription::new(name.as_str());
    if let Some(table) = raw.table.filter(|t| !t.is_empty()) {
        model.table = SmolStr::new(table);
    }
    if let Some(pk) = raw.primary_key.filter(|p| !p.is_empty()) {
        model.primary_key = SmolStr::new(pk);
    }
    if let Some(strategy) = raw.primary_key_strategy {
        model.primary_key_strategy = strategy;
    }

    model.attributes = normalize_attributes(&name, raw.attributes)?;

    let declared = [
        (RelationKind::HasOne, raw.has_one),
        (RelationKind::HasMany, raw.has_many),
        (RelationKind::BelongsTo, raw.belongs_to),
        (RelationKind::BelongsToMany, raw.belongs_to_many),
        (RelationKind::HasOneThrough, raw.has_one_through),
        (RelationKind::MorphOne, raw.morph_one),
    ];
    for (kind, relations) in declared {
        for relation in relations.map(RawRelations::into_vec).unwrap_or_default() {
            model.relations.push(normalize_relation(&name, kind, relation)?);
        }
    }

    model.traits = traits::normalize_traits(&name, raw.traits)?;

    for index in raw.indexes {
        if index.columns.is_empty() {
            return Err(SchemaError::invalid_model(
                &name,
                format!("index `{}` has no columns", index.name),
            ));
        }
        model.indexes.push(IndexDeclaration {
            name: SmolStr::new(index.name),
            columns: index.columns.into_iter().map(SmolStr::new).collect(),
        });
    }

    debug!(
        model = %model.name,
        table = %model.table,
        attributes = model.attributes.len(),
        relations = model.relations.len(),
        "normalized model description"
    );

    Ok(model)
}

/// Normalize the attribute map.
///
/// Accepts a plain object or a string containing a serialized object.
fn normalize_attributes(model: &str, value: Value) -> SchemaResult<IndexMap<SmolStr, Attribute>> {
    let map: Map<String, Value> = match value {
        Value::Null => Map::new(),
        Value::Object(map) => map,
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => map,
            _ => {
                return Err(SchemaError::invalid_model(
                    model,
                    "attributes string is not a serialized JSON object",
                ));
            }
        },
        other => {
            return Err(SchemaError::invalid_model(
                model,
                format!(
                    "attributes must be an object or a serialized JSON object, found {}",
                    value_type(&other)
                ),
            ));
        }
    };

    let mut attributes = IndexMap::with_capacity(map.len());
    for (name, value) in map {
        let raw = match value {
            // Shorthand: `"status": "string"`
            Value::String(type_name) => RawAttribute::of_type(type_name),
            value @ Value::Object(_) => serde_json::from_value(value).map_err(|e| {
                SchemaError::invalid_model(model, format!("attribute `{}`: {}", name, e))
            })?,
            other => {
                return Err(SchemaError::invalid_model(
                    model,
                    format!(
                        "attribute `{}` must be an object or a type name, found {}",
                        name,
                        value_type(&other)
                    ),
                ));
            }
        };
        let attribute = normalize_attribute(model, &name, raw)?;
        attributes.insert(SmolStr::new(name), attribute);
    }
    Ok(attributes)
}

fn normalize_attribute(model: &str, name: &str, raw: RawAttribute) -> SchemaResult<Attribute> {
    let max_length = length_bound(model, name, "max", raw.max)?;
    let min_length = length_bound(model, name, "min", raw.min)?;
    let type_name = raw.kind.as_deref().unwrap_or("string").to_ascii_lowercase();

    let kind = match type_name.as_str() {
        "string" | "varchar" => match (&raw.choices, max_length, min_length) {
            (Some(choices), _, _) => enum_kind(model, name, choices)?,
            (None, Some(max), _) => AttributeKind::string(max),
            // A minimum without a maximum must not be truncated.
            (None, None, Some(_)) => AttributeKind::Text,
            (None, None, None) => AttributeKind::default_string(),
        },
        "text" | "longtext" => AttributeKind::Text,
        "number" | "integer" | "int" => AttributeKind::Integer,
        "bigint" | "biginteger" => AttributeKind::BigInteger,
        "float" | "double" => AttributeKind::Float,
        "decimal" => AttributeKind::Decimal {
            precision: raw.precision.unwrap_or(10),
            scale: raw.scale.unwrap_or(2),
        },
        "boolean" | "bool" => AttributeKind::Boolean,
        "date" => AttributeKind::Date,
        "datetime" | "timestamp" => AttributeKind::DateTime,
        "enum" => match &raw.choices {
            Some(choices) => enum_kind(model, name, choices)?,
            None => {
                return Err(SchemaError::invalid_model(
                    model,
                    format!("enum attribute `{}` declares no choices", name),
                ));
            }
        },
        "json" | "object" | "array" => AttributeKind::Json,
        "uuid" => AttributeKind::Uuid,
        _ => return Err(SchemaError::unknown_type(model, name, type_name)),
    };

    let default = match raw.default {
        Some(value) => Some(normalize_default(model, name, &kind, value)?),
        None => None,
    };

    Ok(Attribute {
        kind,
        required: raw.required,
        unique: raw.unique,
        default,
        order: raw.order,
    })
}

fn enum_kind(model: &str, name: &str, choices: &[String]) -> SchemaResult<AttributeKind> {
    if choices.is_empty() {
        return Err(SchemaError::invalid_model(
            model,
            format!("enum attribute `{}` declares no choices", name),
        ));
    }
    Ok(AttributeKind::Enum {
        choices: choices.to_vec(),
    })
}

fn length_bound(model: &str, name: &str, key: &str, value: Option<f64>) -> SchemaResult<Option<u32>> {
    match value {
        None => Ok(None),
        Some(v) if v >= 0.0 && v.fract() == 0.0 && v <= f64::from(u32::MAX) => Ok(Some(v as u32)),
        Some(v) => Err(SchemaError::invalid_model(
            model,
            format!("attribute `{}` has an invalid `{}` length {}", name, key, v),
        )),
    }
}

fn normalize_default(
    model: &str,
    name: &str,
    kind: &AttributeKind,
    value: Value,
) -> SchemaResult<DefaultValue> {
    let invalid = |message: String| SchemaError::invalid_model(model, message);

    let default = match value {
        Value::Null => DefaultValue::Null,
        Value::Bool(b) => DefaultValue::Boolean(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => DefaultValue::Integer(i),
            None => DefaultValue::Float(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => {
            let upper = s.to_ascii_uppercase();
            match kind {
                AttributeKind::Date | AttributeKind::DateTime
                    if matches!(upper.as_str(), "CURRENT_TIMESTAMP" | "NOW" | "NOW()") =>
                {
                    DefaultValue::CurrentTimestamp
                }
                AttributeKind::Uuid if matches!(upper.as_str(), "UUID" | "UUID()") => {
                    DefaultValue::GeneratedUuid
                }
                _ => DefaultValue::String(s),
            }
        }
        value @ (Value::Array(_) | Value::Object(_)) => {
            if *kind != AttributeKind::Json {
                return Err(invalid(format!(
                    "attribute `{}` has a structured default but is not json",
                    name
                )));
            }
            DefaultValue::String(value.to_string())
        }
    };

    if let (AttributeKind::Enum { choices }, DefaultValue::String(s)) = (kind, &default) {
        if !choices.contains(s) {
            return Err(invalid(format!(
                "default `{}` of `{}` is not one of its choices",
                s, name
            )));
        }
    }

    Ok(default)
}

fn normalize_relation(
    model: &str,
    kind: RelationKind,
    raw: RawRelation,
) -> SchemaResult<RelationDeclaration> {
    let relation = match raw {
        RawRelation::Name(name) => RelationDeclaration::new(kind, name.as_str()),
        RawRelation::Detailed(detail) => RelationDeclaration {
            kind,
            model: SmolStr::new(detail.model),
            foreign_key: detail.foreign_key.map(SmolStr::new),
            relation_name: detail.relation_name.map(SmolStr::new),
            pivot_table: detail.pivot_table.map(SmolStr::new),
            first_foreign_key: detail.first_foreign_key.map(SmolStr::new),
            second_foreign_key: detail.second_foreign_key.map(SmolStr::new),
            through: detail.through.map(SmolStr::new),
            through_foreign_key: detail.through_foreign_key.map(SmolStr::new),
            morph_name: detail.morph_name.map(SmolStr::new),
        },
    };

    if relation.model.trim().is_empty() {
        return Err(SchemaError::invalid_relation(model, kind.as_str(), "related model is empty"));
    }
    if kind == RelationKind::HasOneThrough && relation.through.is_none() {
        return Err(SchemaError::invalid_relation(
            model,
            relation.label(),
            "hasOneThrough requires a `through` model",
        ));
    }
    Ok(relation)
}

fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
