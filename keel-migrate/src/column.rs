//! Dialect-neutral column and table plans.

use indexmap::IndexMap;
use keel_schema::{Attribute, AttributeKind, DefaultValue, PrimaryKeyStrategy};
use serde::{Deserialize, Serialize};

/// What happens to referencing rows when the referenced row is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferentialAction {
    /// Delete referencing rows.
    #[default]
    Cascade,
    /// Null out the referencing column.
    SetNull,
    /// Refuse the delete.
    Restrict,
    /// Leave it to the database.
    NoAction,
}

impl ReferentialAction {
    /// SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::Restrict => "RESTRICT",
            Self::NoAction => "NO ACTION",
        }
    }
}

/// A foreign key target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    /// Referenced table.
    pub table: String,
    /// Referenced column.
    pub column: String,
    /// Delete behaviour.
    #[serde(default)]
    pub on_delete: ReferentialAction,
}

impl ForeignKeyRef {
    /// Reference `table(column)` with `ON DELETE CASCADE`.
    pub fn cascade(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            on_delete: ReferentialAction::Cascade,
        }
    }
}

/// A planned column.
///
/// This is also the unit stored in attribute snapshots, so its serialized
/// form must stay stable: two equal specs always serialize identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// Semantic type.
    pub kind: AttributeKind,
    /// Set on the primary key column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<PrimaryKeyStrategy>,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Whether the column is unique.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unique: bool,
    /// Default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    /// Foreign key target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<ForeignKeyRef>,
}

impl ColumnSpec {
    /// A nullable column without constraints.
    pub fn new(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            primary_key: None,
            nullable: true,
            unique: false,
            default: None,
            references: None,
        }
    }

    /// A primary key column.
    pub fn primary(name: impl Into<String>, strategy: PrimaryKeyStrategy) -> Self {
        let kind = match strategy {
            PrimaryKeyStrategy::AutoIncrement => AttributeKind::Integer,
            PrimaryKeyStrategy::Uuid => AttributeKind::Uuid,
        };
        Self {
            primary_key: Some(strategy),
            nullable: false,
            ..Self::new(name, kind)
        }
    }

    /// A column planned from a model attribute.
    pub fn from_attribute(name: impl Into<String>, attribute: &Attribute) -> Self {
        Self {
            nullable: !attribute.required,
            unique: attribute.unique,
            default: attribute.default.clone(),
            ..Self::new(name, attribute.kind.clone())
        }
    }

    /// Mark the column `NOT NULL`.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Mark the column unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Set the default value.
    pub fn default_value(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Reference another table.
    pub fn references(mut self, target: ForeignKeyRef) -> Self {
        self.references = Some(target);
        self
    }

    /// Whether this is the primary key.
    pub fn is_primary_key(&self) -> bool {
        self.primary_key.is_some()
    }

    /// The column with its type replaced.
    pub fn with_kind(&self, kind: AttributeKind) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }
}

/// A planned index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index name.
    pub name: String,
    /// Indexed columns, in order.
    pub columns: Vec<String>,
    /// Whether the index is unique.
    #[serde(default)]
    pub unique: bool,
    /// Indexed columns holding unbounded text, which some dialects can only
    /// index by prefix.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unbounded_columns: Vec<String>,
}

impl IndexSpec {
    /// A non-unique index.
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            unique: false,
            unbounded_columns: Vec::new(),
        }
    }

    /// A non-unique single-column index named `{table}_{column}_index`.
    pub fn for_column(table: &str, column: &str) -> Self {
        Self::new(format!("{}_{}_index", table, column), vec![column.to_string()])
    }

    /// Make the index unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// A composite unique constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueConstraint {
    /// Constraint name.
    pub name: String,
    /// Constrained columns.
    pub columns: Vec<String>,
}

impl UniqueConstraint {
    /// The unique index enforcing the constraint.
    pub fn as_index(&self) -> IndexSpec {
        IndexSpec::new(self.name.clone(), self.columns.clone()).unique()
    }
}

/// Everything needed to create one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TablePlan {
    /// Table name.
    pub table: String,
    /// Columns in creation order.
    pub columns: IndexMap<String, ColumnSpec>,
    /// Indexes created with the table.
    pub indexes: Vec<IndexSpec>,
    /// Composite unique constraints added after the table.
    pub unique_constraints: Vec<UniqueConstraint>,
    /// Model the table was planned from, if any.
    pub model: Option<String>,
}

impl TablePlan {
    /// An empty plan.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: IndexMap::new(),
            indexes: Vec::new(),
            unique_constraints: Vec::new(),
            model: None,
        }
    }

    /// Add a column unless one with the same name is already planned.
    ///
    /// Returns whether the column was added.
    pub fn push_column(&mut self, column: ColumnSpec) -> bool {
        if self.columns.contains_key(&column.name) {
            return false;
        }
        self.columns.insert(column.name.clone(), column);
        true
    }

    /// Builder form of [`push_column`](Self::push_column).
    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.push_column(column);
        self
    }

    /// Add an index, filling in its unbounded columns from the plan.
    pub fn push_index(&mut self, mut index: IndexSpec) {
        if self.indexes.iter().any(|i| i.name == index.name) {
            return;
        }
        index.unbounded_columns = index
            .columns
            .iter()
            .filter(|c| {
                self.columns
                    .get(c.as_str())
                    .is_some_and(|col| col.kind.is_unbounded_text())
            })
            .cloned()
            .collect();
        self.indexes.push(index);
    }

    /// Builder form of [`push_index`](Self::push_index).
    pub fn index(mut self, index: IndexSpec) -> Self {
        self.push_index(index);
        self
    }

    /// Add a composite unique constraint named `{table}_{cols}_unique`.
    pub fn unique_together(mut self, columns: &[&str]) -> Self {
        let name = format!("{}_{}_unique", self.table, columns.join("_"));
        self.unique_constraints.push(UniqueConstraint {
            name,
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    /// Columns with a foreign key.
    pub fn foreign_keys(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.values().filter(|c| c.references.is_some())
    }

    /// Tables this table references, excluding itself.
    pub fn referenced_tables(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = Vec::new();
        for column in self.foreign_keys() {
            if let Some(target) = &column.references {
                if target.table != self.table && !tables.contains(&target.table.as_str()) {
                    tables.push(&target.table);
                }
            }
        }
        tables
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }
}

/// Common companion-table columns.
pub(crate) mod presets {
    use super::*;

    /// Auto-increment `id`.
    pub fn id() -> ColumnSpec {
        ColumnSpec::primary("id", PrimaryKeyStrategy::AutoIncrement)
    }

    /// `varchar(255)`.
    pub fn string(name: &str) -> ColumnSpec {
        ColumnSpec::new(name, AttributeKind::default_string())
    }

    /// Nullable integer.
    pub fn integer(name: &str) -> ColumnSpec {
        ColumnSpec::new(name, AttributeKind::Integer)
    }

    /// Boolean with a default.
    pub fn flag(name: &str, default: bool) -> ColumnSpec {
        ColumnSpec::new(name, AttributeKind::Boolean).default_value(DefaultValue::Boolean(default))
    }

    /// `NOT NULL` timestamp defaulting to the current time.
    pub fn created_at(name: &str) -> ColumnSpec {
        ColumnSpec::new(name, AttributeKind::DateTime)
            .not_null()
            .default_value(DefaultValue::CurrentTimestamp)
    }

    /// Nullable timestamp.
    pub fn timestamp(name: &str) -> ColumnSpec {
        ColumnSpec::new(name, AttributeKind::DateTime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_attribute() {
        let attr = Attribute::new(AttributeKind::string(100)).required().unique();
        let column = ColumnSpec::from_attribute("email", &attr);
        assert_eq!(column.name, "email");
        assert!(!column.nullable);
        assert!(column.unique);
        assert!(!column.is_primary_key());
    }

    #[test]
    fn test_serialization_skips_unset_fields() {
        let column = ColumnSpec::new("status", AttributeKind::default_string());
        let json = serde_json::to_string(&column).unwrap();
        assert_eq!(
            json,
            r#"{"name":"status","kind":{"type":"string"},"nullable":true}"#
        );
    }

    #[test]
    fn test_push_column_keeps_first() {
        let mut plan = TablePlan::new("posts");
        assert!(plan.push_column(ColumnSpec::new("title", AttributeKind::Text)));
        assert!(!plan.push_column(ColumnSpec::new("title", AttributeKind::Integer)));
        assert_eq!(plan.columns["title"].kind, AttributeKind::Text);
    }

    #[test]
    fn test_index_records_unbounded_columns() {
        let plan = TablePlan::new("posts")
            .column(ColumnSpec::new("body", AttributeKind::Text))
            .column(ColumnSpec::new("slug", AttributeKind::default_string()))
            .index(IndexSpec::new("posts_body_slug_index", vec!["body".into(), "slug".into()]));
        assert_eq!(plan.indexes[0].unbounded_columns, vec!["body".to_string()]);
    }

    #[test]
    fn test_referenced_tables_skip_self() {
        let plan = TablePlan::new("categories")
            .column(presets::id())
            .column(presets::integer("parent_id").references(ForeignKeyRef::cascade("categories", "id")))
            .column(presets::integer("user_id").references(ForeignKeyRef::cascade("users", "id")));
        assert_eq!(plan.referenced_tables(), vec!["users"]);
    }
}
