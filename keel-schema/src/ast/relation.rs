//! Relation declarations.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// The kind of a declared relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationKind {
    /// One-to-one, foreign key on the related table.
    HasOne,
    /// One-to-many, foreign key on the related table.
    HasMany,
    /// Inverse side of `hasOne`/`hasMany`; owns no column.
    BelongsTo,
    /// Many-to-many through a pivot table.
    BelongsToMany,
    /// One-to-one through an intermediate model.
    HasOneThrough,
    /// Polymorphic one-to-one.
    MorphOne,
}

impl RelationKind {
    /// All kinds, in the order they appear in model files.
    pub const ALL: [RelationKind; 6] = [
        Self::HasOne,
        Self::HasMany,
        Self::BelongsTo,
        Self::BelongsToMany,
        Self::HasOneThrough,
        Self::MorphOne,
    ];

    /// The key used for this kind in model description files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HasOne => "hasOne",
            Self::HasMany => "hasMany",
            Self::BelongsTo => "belongsTo",
            Self::BelongsToMany => "belongsToMany",
            Self::HasOneThrough => "hasOneThrough",
            Self::MorphOne => "morphOne",
        }
    }

    /// Whether this kind places a foreign key on the related table.
    pub fn annotates_related(&self) -> bool {
        matches!(self, Self::HasOne | Self::HasMany | Self::HasOneThrough)
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A relation declared on a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDeclaration {
    /// Relation kind.
    pub kind: RelationKind,
    /// Related model name.
    pub model: SmolStr,
    /// Explicit foreign key column.
    pub foreign_key: Option<SmolStr>,
    /// Relation name, used for reporting.
    pub relation_name: Option<SmolStr>,
    /// Explicit pivot table (`belongsToMany`).
    pub pivot_table: Option<SmolStr>,
    /// Explicit pivot key pointing at the owner (`belongsToMany`).
    pub first_foreign_key: Option<SmolStr>,
    /// Explicit pivot key pointing at the related model (`belongsToMany`).
    pub second_foreign_key: Option<SmolStr>,
    /// Intermediate model (`hasOneThrough`).
    pub through: Option<SmolStr>,
    /// Explicit key on the related table pointing at the intermediate model.
    pub through_foreign_key: Option<SmolStr>,
    /// Polymorphic column prefix (`morphOne`).
    pub morph_name: Option<SmolStr>,
}

impl RelationDeclaration {
    /// Create a relation with every override unset.
    pub fn new(kind: RelationKind, model: impl Into<SmolStr>) -> Self {
        Self {
            kind,
            model: model.into(),
            foreign_key: None,
            relation_name: None,
            pivot_table: None,
            first_foreign_key: None,
            second_foreign_key: None,
            through: None,
            through_foreign_key: None,
            morph_name: None,
        }
    }

    /// Set the foreign key column.
    pub fn foreign_key(mut self, column: impl Into<SmolStr>) -> Self {
        self.foreign_key = Some(column.into());
        self
    }

    /// Set the pivot table.
    pub fn pivot_table(mut self, table: impl Into<SmolStr>) -> Self {
        self.pivot_table = Some(table.into());
        self
    }

    /// Set both pivot keys.
    pub fn pivot_keys(mut self, first: impl Into<SmolStr>, second: impl Into<SmolStr>) -> Self {
        self.first_foreign_key = Some(first.into());
        self.second_foreign_key = Some(second.into());
        self
    }

    /// Set the intermediate model.
    pub fn through(mut self, model: impl Into<SmolStr>) -> Self {
        self.through = Some(model.into());
        self
    }

    /// Set the polymorphic column prefix.
    pub fn morph_name(mut self, name: impl Into<SmolStr>) -> Self {
        self.morph_name = Some(name.into());
        self
    }

    /// Human-readable label, e.g. `belongsToMany(Tag)`.
    pub fn label(&self) -> String {
        match &self.relation_name {
            Some(name) => format!("{}({}) as {}", self.kind, self.model, name),
            None => format!("{}({})", self.kind, self.model),
        }
    }
}
