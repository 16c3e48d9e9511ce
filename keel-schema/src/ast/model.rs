//! Model descriptions.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::{Attribute, ModelTraits, RelationDeclaration, RelationKind};

/// How primary key values are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryKeyStrategy {
    /// Auto-incrementing integer.
    #[default]
    #[serde(alias = "autoincrement", alias = "increments")]
    AutoIncrement,
    /// UUID, generated by the database where the dialect allows it.
    Uuid,
}

/// A named composite index declared on a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDeclaration {
    /// Index name.
    pub name: SmolStr,
    /// Indexed columns, in order.
    pub columns: Vec<SmolStr>,
}

/// A fully normalized model description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescription {
    /// Model name (`Order`).
    pub name: SmolStr,
    /// Table name (`orders`).
    pub table: SmolStr,
    /// Primary key column.
    pub primary_key: SmolStr,
    /// Primary key strategy.
    pub primary_key_strategy: PrimaryKeyStrategy,
    /// Attributes in declaration order.
    pub attributes: IndexMap<SmolStr, Attribute>,
    /// Relation declarations.
    pub relations: Vec<RelationDeclaration>,
    /// Trait flags.
    pub traits: ModelTraits,
    /// Composite index declarations.
    pub indexes: Vec<IndexDeclaration>,
    /// File the description was loaded from.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl ModelDescription {
    /// Create an empty model with a derived table name.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        let name = name.into();
        let table = SmolStr::new(crate::naming::table_name(&name));
        Self {
            name,
            table,
            primary_key: SmolStr::new_static("id"),
            primary_key_strategy: PrimaryKeyStrategy::default(),
            attributes: IndexMap::new(),
            relations: Vec::new(),
            traits: ModelTraits::default(),
            indexes: Vec::new(),
            source: None,
        }
    }

    /// Get the model name as a string.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, name: impl Into<SmolStr>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    /// Add a relation declaration.
    pub fn with_relation(mut self, relation: RelationDeclaration) -> Self {
        self.relations.push(relation);
        self
    }

    /// Replace the trait flags.
    pub fn with_traits(mut self, traits: ModelTraits) -> Self {
        self.traits = traits;
        self
    }

    /// Override the table name.
    pub fn with_table(mut self, table: impl Into<SmolStr>) -> Self {
        self.table = table.into();
        self
    }

    /// Get an attribute by name.
    pub fn get_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Attributes in column order.
    ///
    /// Attributes with an explicit `order` come first, sorted by it; the rest
    /// keep declaration order.
    pub fn ordered_attributes(&self) -> Vec<(&SmolStr, &Attribute)> {
        let mut attrs: Vec<_> = self.attributes.iter().collect();
        attrs.sort_by_key(|(_, attr)| attr.order.unwrap_or(u32::MAX));
        attrs
    }

    /// Relation declarations of one kind.
    pub fn relations_of(&self, kind: RelationKind) -> impl Iterator<Item = &RelationDeclaration> {
        self.relations.iter().filter(move |r| r.kind == kind)
    }

    /// Names of every model this model points at.
    pub fn related_models(&self) -> Vec<&str> {
        let mut names = Vec::new();
        for relation in &self.relations {
            names.push(relation.model.as_str());
            if let Some(through) = &relation.through {
                names.push(through.as_str());
            }
        }
        names
    }
}
