//! The dialect-neutral schema operation IR.
//!
//! The diff engine and the planner only ever produce [`SchemaOperation`]s;
//! turning them into SQL is the job of a [`SqlRenderer`](crate::sql::SqlRenderer).

use keel_schema::AttributeKind;
use serde::{Deserialize, Serialize};

use crate::column::{ColumnSpec, ForeignKeyRef, IndexSpec, TablePlan};

/// A single schema change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SchemaOperation {
    /// Create a table with its columns and indexes.
    CreateTable {
        /// Table name.
        table: String,
        /// Columns in creation order.
        columns: Vec<ColumnSpec>,
        /// Indexes created right after the table.
        indexes: Vec<IndexSpec>,
    },
    /// Change the columns of an existing table.
    AlterTable {
        /// Table name.
        table: String,
        /// Columns to add.
        add_columns: Vec<ColumnSpec>,
        /// Columns to drop (their previous definition).
        drop_columns: Vec<ColumnSpec>,
        /// Columns whose definition changed.
        alter_columns: Vec<ColumnAlteration>,
        /// New column order when it changed; reordering is never applied.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        reordered: Vec<String>,
    },
    /// Recreate a table with a new layout, copying the rows of the columns
    /// both layouts share.
    ///
    /// Planned for dialects that cannot alter a column in place.
    RebuildTable {
        /// Table name.
        table: String,
        /// Columns before the rebuild.
        from: Vec<ColumnSpec>,
        /// Columns after the rebuild.
        to: Vec<ColumnSpec>,
        /// Indexes before the rebuild, restored on revert.
        from_indexes: Vec<IndexSpec>,
        /// Indexes recreated after the rebuild.
        to_indexes: Vec<IndexSpec>,
    },
    /// Create an index on an existing table.
    CreateIndex {
        /// Table name.
        table: String,
        /// The index.
        index: IndexSpec,
    },
    /// Drop an index (its previous definition).
    DropIndex {
        /// Table name.
        table: String,
        /// The index.
        index: IndexSpec,
    },
    /// Add a foreign key constraint to an existing column.
    AddForeignKey {
        /// Table name.
        table: String,
        /// Referencing column.
        column: String,
        /// Referenced table and column.
        references: ForeignKeyRef,
    },
    /// Add a composite unique constraint.
    AddUniqueConstraint {
        /// Constraint name.
        name: String,
        /// Table name.
        table: String,
        /// Constrained columns.
        columns: Vec<String>,
    },
    /// Drop a composite unique constraint.
    DropUniqueConstraint {
        /// Constraint name.
        name: String,
        /// Table name.
        table: String,
        /// Previously constrained columns.
        columns: Vec<String>,
    },
}

impl SchemaOperation {
    /// The table this operation touches.
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable { table, .. }
            | Self::AlterTable { table, .. }
            | Self::RebuildTable { table, .. }
            | Self::CreateIndex { table, .. }
            | Self::DropIndex { table, .. }
            | Self::AddForeignKey { table, .. }
            | Self::AddUniqueConstraint { table, .. }
            | Self::DropUniqueConstraint { table, .. } => table,
        }
    }

    /// Whether this operation creates a table.
    pub fn is_create(&self) -> bool {
        matches!(self, Self::CreateTable { .. })
    }

    /// One-line description for logs and dry-run output.
    pub fn describe(&self) -> String {
        match self {
            Self::CreateTable { table, columns, .. } => {
                format!("create table {} ({} columns)", table, columns.len())
            }
            Self::AlterTable {
                table,
                add_columns,
                drop_columns,
                alter_columns,
                reordered,
            } => {
                let mut parts = Vec::new();
                if !add_columns.is_empty() {
                    parts.push(format!("+{}", add_columns.len()));
                }
                if !drop_columns.is_empty() {
                    parts.push(format!("-{}", drop_columns.len()));
                }
                if !alter_columns.is_empty() {
                    parts.push(format!("~{}", alter_columns.len()));
                }
                if !reordered.is_empty() {
                    parts.push("reordered".to_string());
                }
                format!("alter table {} ({})", table, parts.join(", "))
            }
            Self::RebuildTable { table, to, .. } => {
                format!("rebuild table {} ({} columns)", table, to.len())
            }
            Self::CreateIndex { table, index } => format!("create index {} on {}", index.name, table),
            Self::DropIndex { table, index } => format!("drop index {} on {}", index.name, table),
            Self::AddForeignKey { table, column, references } => format!(
                "add foreign key {}.{} -> {}.{}",
                table, column, references.table, references.column
            ),
            Self::AddUniqueConstraint { name, table, .. } => {
                format!("add unique constraint {} on {}", name, table)
            }
            Self::DropUniqueConstraint { name, table, .. } => {
                format!("drop unique constraint {} on {}", name, table)
            }
        }
    }

    /// The in-place alteration a rebuild amounts to.
    ///
    /// Returns `None` for anything but [`RebuildTable`](Self::RebuildTable).
    pub fn as_alter(&self) -> Option<SchemaOperation> {
        let Self::RebuildTable { table, from, to, .. } = self else {
            return None;
        };
        let find = |columns: &[ColumnSpec], name: &str| columns.iter().find(|c| c.name == name).cloned();

        let add_columns = to.iter().filter(|c| find(from, &c.name).is_none()).cloned().collect();
        let drop_columns = from.iter().filter(|c| find(to, &c.name).is_none()).cloned().collect();
        let alter_columns = to
            .iter()
            .filter_map(|column| {
                let previous = find(from, &column.name)?;
                let change = ColumnChange::classify(&previous, column)?;
                Some(ColumnAlteration {
                    from: previous,
                    to: column.clone(),
                    change,
                })
            })
            .collect();

        Some(Self::AlterTable {
            table: table.clone(),
            add_columns,
            drop_columns,
            alter_columns,
            reordered: Vec::new(),
        })
    }

    /// Operations creating a planned table: the table itself, then its
    /// composite unique constraints.
    pub fn create(plan: &TablePlan) -> Vec<SchemaOperation> {
        let mut ops = vec![Self::CreateTable {
            table: plan.table.clone(),
            columns: plan.columns.values().cloned().collect(),
            indexes: plan.indexes.clone(),
        }];
        for constraint in &plan.unique_constraints {
            ops.push(Self::AddUniqueConstraint {
                name: constraint.name.clone(),
                table: plan.table.clone(),
                columns: constraint.columns.clone(),
            });
        }
        ops
    }
}

/// How a column definition changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnChange {
    /// The new type holds every value of the old one.
    Widened,
    /// The new type may not hold every value of the old one.
    Narrowed,
    /// The type changed to an unrelated one.
    Retyped,
    /// Only nullability changed.
    NullabilityChanged,
    /// Same type; uniqueness, default or reference changed.
    Redefined,
}

impl ColumnChange {
    /// Classify the change between two definitions of a column.
    ///
    /// Returns `None` when the definitions are identical.
    pub fn classify(from: &ColumnSpec, to: &ColumnSpec) -> Option<Self> {
        if from == to {
            return None;
        }
        if from.kind == to.kind {
            let only_nullability = ColumnSpec {
                nullable: to.nullable,
                ..from.clone()
            } == *to;
            return Some(if only_nullability {
                Self::NullabilityChanged
            } else {
                Self::Redefined
            });
        }
        Some(classify_kinds(&from.kind, &to.kind))
    }

    /// Whether applying the change may lose data.
    pub fn is_lossy(&self) -> bool {
        matches!(self, Self::Narrowed | Self::Retyped)
    }
}

fn classify_kinds(from: &AttributeKind, to: &AttributeKind) -> ColumnChange {
    use AttributeKind as K;

    let widened = match (from, to) {
        (_, K::Text) => true,
        (K::String { .. }, K::String { .. }) => to.string_length() >= from.string_length(),
        (K::Enum { choices: old }, K::Enum { choices: new }) => {
            old.iter().all(|choice| new.contains(choice))
        }
        (K::Enum { choices }, K::String { .. }) => {
            let longest = choices.iter().map(|c| c.len()).max().unwrap_or(0);
            to.string_length().unwrap_or(0) as usize >= longest
        }
        (K::Integer, K::BigInteger | K::Float | K::Decimal { .. }) => true,
        (K::BigInteger, K::Decimal { .. }) => true,
        (
            K::Decimal {
                precision: p1,
                scale: s1,
            },
            K::Decimal {
                precision: p2,
                scale: s2,
            },
        ) => p2 >= p1 && s2 >= s1,
        (K::Date, K::DateTime) => true,
        _ => false,
    };

    if widened {
        return ColumnChange::Widened;
    }

    let narrowed = match (from, to) {
        (K::Text | K::Json, K::String { .. } | K::Enum { .. }) => true,
        (K::String { .. } | K::Enum { .. }, K::String { .. } | K::Enum { .. }) => true,
        (K::BigInteger | K::Float | K::Decimal { .. }, K::Integer) => true,
        (K::Float | K::Decimal { .. }, K::BigInteger | K::Decimal { .. }) => true,
        (K::DateTime, K::Date) => true,
        _ => false,
    };

    if narrowed {
        ColumnChange::Narrowed
    } else {
        ColumnChange::Retyped
    }
}

/// A changed column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnAlteration {
    /// Previous definition.
    pub from: ColumnSpec,
    /// Definition to apply.
    pub to: ColumnSpec,
    /// Kind of change.
    pub change: ColumnChange,
}

impl ColumnAlteration {
    /// Whether the column type changes.
    pub fn type_changed(&self) -> bool {
        self.from.kind != self.to.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_schema::DefaultValue;

    fn col(kind: AttributeKind) -> ColumnSpec {
        ColumnSpec::new("c", kind)
    }

    #[test]
    fn test_classify_identical() {
        let c = col(AttributeKind::Integer);
        assert_eq!(ColumnChange::classify(&c, &c), None);
    }

    #[test]
    fn test_classify_string_lengths() {
        let short = col(AttributeKind::string(50));
        let long = col(AttributeKind::string(200));
        assert_eq!(ColumnChange::classify(&short, &long), Some(ColumnChange::Widened));
        assert_eq!(ColumnChange::classify(&long, &short), Some(ColumnChange::Narrowed));
    }

    #[test]
    fn test_classify_to_text_is_widening() {
        let s = col(AttributeKind::default_string());
        let t = col(AttributeKind::Text);
        assert_eq!(ColumnChange::classify(&s, &t), Some(ColumnChange::Widened));
        assert_eq!(ColumnChange::classify(&t, &s), Some(ColumnChange::Narrowed));
    }

    #[test]
    fn test_classify_enum_choices() {
        let ab = col(AttributeKind::Enum {
            choices: vec!["a".into(), "b".into()],
        });
        let abc = col(AttributeKind::Enum {
            choices: vec!["a".into(), "b".into(), "c".into()],
        });
        assert_eq!(ColumnChange::classify(&ab, &abc), Some(ColumnChange::Widened));
        assert_eq!(ColumnChange::classify(&abc, &ab), Some(ColumnChange::Narrowed));
    }

    #[test]
    fn test_classify_unrelated_types() {
        let b = col(AttributeKind::Boolean);
        let d = col(AttributeKind::Date);
        let change = ColumnChange::classify(&b, &d).unwrap();
        assert_eq!(change, ColumnChange::Retyped);
        assert!(change.is_lossy());
    }

    #[test]
    fn test_classify_nullability_and_redefinition() {
        let nullable = col(AttributeKind::Integer);
        let required = col(AttributeKind::Integer).not_null();
        assert_eq!(
            ColumnChange::classify(&nullable, &required),
            Some(ColumnChange::NullabilityChanged)
        );

        let defaulted = col(AttributeKind::Integer).default_value(DefaultValue::Integer(0));
        assert_eq!(
            ColumnChange::classify(&nullable, &defaulted),
            Some(ColumnChange::Redefined)
        );
    }

    #[test]
    fn test_create_includes_unique_constraints() {
        let plan = TablePlan::new("posts_likes")
            .column(ColumnSpec::new("user_id", AttributeKind::Integer))
            .column(ColumnSpec::new("post_id", AttributeKind::Integer))
            .unique_together(&["user_id", "post_id"]);
        let ops = SchemaOperation::create(&plan);
        assert_eq!(ops.len(), 2);
        assert!(ops[0].is_create());
        assert!(matches!(
            &ops[1],
            SchemaOperation::AddUniqueConstraint { name, .. } if name == "posts_likes_user_id_post_id_unique"
        ));
    }

    #[test]
    fn test_rebuild_as_alter() {
        let title = ColumnSpec::new("title", AttributeKind::default_string());
        let rebuild = SchemaOperation::RebuildTable {
            table: "posts".into(),
            from: vec![title.clone(), ColumnSpec::new("legacy", AttributeKind::Text)],
            to: vec![title.clone().not_null(), ColumnSpec::new("body", AttributeKind::Text)],
            from_indexes: vec![],
            to_indexes: vec![],
        };
        let Some(SchemaOperation::AlterTable {
            add_columns,
            drop_columns,
            alter_columns,
            ..
        }) = rebuild.as_alter()
        else {
            panic!("expected alter table");
        };
        assert_eq!(add_columns[0].name, "body");
        assert_eq!(drop_columns[0].name, "legacy");
        assert_eq!(alter_columns.len(), 1);
        assert_eq!(alter_columns[0].change, ColumnChange::NullabilityChanged);
        assert!(SchemaOperation::create(&TablePlan::new("t"))[0].as_alter().is_none());
    }
}
