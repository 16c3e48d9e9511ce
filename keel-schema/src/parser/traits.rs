//! Trait flag normalization.

use serde_json::{Map, Value};
use smol_str::SmolStr;
use tracing::debug;

use crate::ast::{AuthOptions, LikeableOptions, ModelTraits, TimestampColumns};
use crate::error::{SchemaError, SchemaResult};

pub(super) fn normalize_traits(model: &str, raw: Map<String, Value>) -> SchemaResult<ModelTraits> {
    let mut traits = ModelTraits::default();

    for (key, value) in raw {
        match key.as_str() {
            "useTimestamps" | "timestampable" => {
                traits.timestamps = match value {
                    Value::Bool(true) => Some(TimestampColumns::default()),
                    Value::Bool(false) => None,
                    Value::Object(opts) => Some(TimestampColumns {
                        created_at: column_option(&opts, "createdAt", "created_at"),
                        updated_at: column_option(&opts, "updatedAt", "updated_at"),
                    }),
                    _ => return Err(shape_error(model, &key, "a boolean or an object")),
                };
            }
            "useSoftDeletes" | "softDeletable" => {
                traits.soft_deletes = match value {
                    Value::Bool(true) => Some(SmolStr::new_static("deleted_at")),
                    Value::Bool(false) => None,
                    Value::Object(opts) => Some(column_option(&opts, "deletedAt", "deleted_at")),
                    _ => return Err(shape_error(model, &key, "a boolean or an object")),
                };
            }
            "useUuid" => traits.uuid = flag(model, &key, &value)?,
            "useAuth" | "authenticatable" => {
                traits.auth = match value {
                    Value::Bool(true) => Some(AuthOptions::default()),
                    Value::Bool(false) => None,
                    Value::Object(opts) => Some(AuthOptions {
                        two_factor: bool_option(&opts, "useTwoFactor"),
                        passkey: bool_option(&opts, "usePasskey"),
                    }),
                    _ => return Err(shape_error(model, &key, "a boolean or an object")),
                };
            }
            "billable" | "useBillable" => traits.billable = flag(model, &key, &value)?,
            "useSocials" => {
                traits.socials = string_list(&value)
                    .ok_or_else(|| shape_error(model, &key, "a list of provider names"))?;
            }
            "likeable" | "useLikeable" => {
                traits.likeable = match value {
                    Value::Bool(true) => Some(LikeableOptions::default()),
                    Value::Bool(false) => None,
                    value @ Value::Array(_) => Some(LikeableOptions {
                        counters: string_list(&value)
                            .ok_or_else(|| shape_error(model, &key, "a list of counter names"))?,
                        ..LikeableOptions::default()
                    }),
                    Value::Object(opts) => Some(LikeableOptions {
                        counters: opts.get("counters").and_then(string_list).unwrap_or_default(),
                        table: string_option(&opts, "table"),
                        foreign_key: string_option(&opts, "foreignKey"),
                    }),
                    _ => return Err(shape_error(model, &key, "a boolean, a list or an object")),
                };
            }
            "categorizable" | "useCategorizable" => {
                traits.categorizable = flag(model, &key, &value)?
            }
            "taggable" | "useTaggable" => traits.taggable = flag(model, &key, &value)?,
            "commentables" | "commentable" => traits.commentables = flag(model, &key, &value)?,
            _ => {
                debug!(model, trait_name = %key, "ignoring unknown trait");
                traits.ignored.push(SmolStr::new(&key));
            }
        }
    }

    Ok(traits)
}

fn flag(model: &str, key: &str, value: &Value) -> SchemaResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        // An options object enables the trait.
        Value::Object(_) => Ok(true),
        _ => Err(shape_error(model, key, "a boolean")),
    }
}

fn column_option(opts: &Map<String, Value>, key: &str, default: &'static str) -> SmolStr {
    string_option(opts, key).unwrap_or_else(|| SmolStr::new_static(default))
}

fn string_option(opts: &Map<String, Value>, key: &str) -> Option<SmolStr> {
    opts.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(SmolStr::new)
}

fn bool_option(opts: &Map<String, Value>, key: &str) -> bool {
    opts.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn string_list(value: &Value) -> Option<Vec<SmolStr>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(SmolStr::new))
        .collect()
}

fn shape_error(model: &str, key: &str, expected: &str) -> SchemaError {
    SchemaError::invalid_model(model, format!("trait `{}` expects {}", key, expected))
}
