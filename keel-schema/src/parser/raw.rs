//! Raw, serde-facing shapes of a model description file.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::ast::PrimaryKeyStrategy;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RawModel {
    pub name: Option<String>,
    pub table: Option<String>,
    pub primary_key: Option<String>,
    pub primary_key_strategy: Option<PrimaryKeyStrategy>,
    #[serde(default)]
    pub attributes: Value,
    pub has_one: Option<RawRelations>,
    pub has_many: Option<RawRelations>,
    pub belongs_to: Option<RawRelations>,
    pub belongs_to_many: Option<RawRelations>,
    pub has_one_through: Option<RawRelations>,
    pub morph_one: Option<RawRelations>,
    #[serde(default)]
    pub traits: Map<String, Value>,
    #[serde(default)]
    pub indexes: Vec<RawIndex>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum RawRelations {
    Many(Vec<RawRelation>),
    One(RawRelation),
}

impl RawRelations {
    pub fn into_vec(self) -> Vec<RawRelation> {
        match self {
            Self::Many(relations) => relations,
            Self::One(relation) => vec![relation],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum RawRelation {
    Name(String),
    Detailed(RawRelationDetail),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RawRelationDetail {
    pub model: String,
    pub foreign_key: Option<String>,
    pub relation_name: Option<String>,
    pub pivot_table: Option<String>,
    pub first_foreign_key: Option<String>,
    pub second_foreign_key: Option<String>,
    pub through: Option<String>,
    pub through_foreign_key: Option<String>,
    pub morph_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RawAttribute {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    pub default: Option<Value>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub precision: Option<u8>,
    pub scale: Option<u8>,
    pub choices: Option<Vec<String>>,
    pub order: Option<u32>,
}

impl RawAttribute {
    pub fn of_type(type_name: String) -> Self {
        Self {
            kind: Some(type_name),
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct RawIndex {
    pub name: String,
    pub columns: Vec<String>,
}
