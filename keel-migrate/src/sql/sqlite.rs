//! SQLite rendering.
//!
//! SQLite cannot add foreign keys or alter columns after the fact, so
//! references are always inline and column changes rebuild the table: the
//! new layout is created beside the old one, the rows are copied across and
//! the new table takes the old one's name.

use keel_schema::{AttributeKind, DefaultValue, Dialect, PrimaryKeyStrategy};

use super::{default_literal, reorder_comment, sql_string_list, SqlRenderer, Statements};
use crate::column::{ColumnSpec, IndexSpec};
use crate::operation::{ColumnAlteration, SchemaOperation};

/// SQL renderer for SQLite.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteRenderer;

impl SqlRenderer for SqliteRenderer {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn quote(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn column_type(&self, _table: &str, column: &ColumnSpec) -> String {
        match &column.kind {
            AttributeKind::String { .. } => {
                format!("varchar({})", column.kind.string_length().unwrap_or(255))
            }
            AttributeKind::Text | AttributeKind::Json => "text".to_string(),
            AttributeKind::Integer => "integer".to_string(),
            AttributeKind::BigInteger => "bigint".to_string(),
            AttributeKind::Float => "float".to_string(),
            AttributeKind::Decimal { precision, scale } => {
                format!("decimal({}, {})", precision, scale)
            }
            AttributeKind::Boolean => "boolean".to_string(),
            AttributeKind::Date => "date".to_string(),
            AttributeKind::DateTime => "timestamp".to_string(),
            AttributeKind::Enum { choices } => format!(
                "varchar(255) CHECK ({} IN ({}))",
                self.quote(&column.name),
                sql_string_list(choices)
            ),
            AttributeKind::Uuid => "varchar(36)".to_string(),
        }
    }

    fn render_operation(&self, operation: &SchemaOperation, out: &mut Statements) {
        match operation {
            SchemaOperation::CreateTable {
                table,
                columns,
                indexes,
            } => {
                let definitions: Vec<String> = columns
                    .iter()
                    .map(|c| self.column_definition(table, c))
                    .collect();
                out.up(format!(
                    "CREATE TABLE {} (\n    {}\n);",
                    self.quote(table),
                    definitions.join(",\n    ")
                ));
                for index in indexes {
                    out.up(self.create_index(table, index));
                }
                out.down(format!("DROP TABLE IF EXISTS {};", self.quote(table)));
            }
            SchemaOperation::AlterTable {
                table,
                add_columns,
                drop_columns,
                alter_columns,
                reordered,
            } => {
                let mut down = Vec::new();

                for column in add_columns {
                    let addable = self.addable(table, column, Some(&mut *out));
                    out.up(format!(
                        "ALTER TABLE {} ADD COLUMN {};",
                        self.quote(table),
                        self.column_definition(table, &addable)
                    ));
                    let mut revert = Vec::new();
                    if column.unique {
                        let index = IndexSpec::new(
                            format!("{}_{}_unique", table, column.name),
                            vec![column.name.clone()],
                        )
                        .unique();
                        out.up(self.create_index(table, &index));
                        revert.push(self.drop_index(&index));
                    }
                    revert.push(self.drop_column(table, &column.name));
                    down.push(revert);
                }

                for column in drop_columns {
                    out.up(self.drop_column(table, &column.name));
                    let addable = self.addable(table, column, None);
                    down.push(vec![format!(
                        "ALTER TABLE {} ADD COLUMN {};",
                        self.quote(table),
                        self.column_definition(table, &addable)
                    )]);
                }

                for alteration in alter_columns {
                    self.alter_column(table, alteration, out);
                }

                if !reordered.is_empty() {
                    out.up(reorder_comment(reordered));
                }

                for statement in down.into_iter().rev().flatten() {
                    out.down(statement);
                }
            }
            SchemaOperation::RebuildTable {
                table,
                from,
                to,
                from_indexes,
                to_indexes,
            } => {
                for statement in self.rebuild(table, from, to, to_indexes) {
                    out.up(statement);
                }
                for statement in self.rebuild(table, to, from, from_indexes) {
                    out.down(statement);
                }
            }
            SchemaOperation::CreateIndex { table, index } => {
                out.up(self.create_index(table, index));
                out.down(self.drop_index(index));
            }
            SchemaOperation::DropIndex { table, index } => {
                out.up(self.drop_index(index));
                out.down(self.create_index(table, index));
            }
            SchemaOperation::AddForeignKey {
                table,
                column,
                references,
            } => {
                out.up(format!(
                    "-- SQLite cannot add a foreign key to an existing table: {}.{} -> {}.{}",
                    table, column, references.table, references.column
                ));
                out.warn(format!(
                    "add foreign key {}.{} to an existing table",
                    table, column
                ));
            }
            SchemaOperation::AddUniqueConstraint {
                name,
                table,
                columns,
            } => {
                let index = IndexSpec::new(name.clone(), columns.clone()).unique();
                out.up(self.create_index(table, &index));
                out.down(self.drop_index(&index));
            }
            SchemaOperation::DropUniqueConstraint {
                name,
                table,
                columns,
            } => {
                let index = IndexSpec::new(name.clone(), columns.clone()).unique();
                out.up(self.drop_index(&index));
                out.down(self.create_index(table, &index));
            }
        }
    }
}

impl SqliteRenderer {
    fn column_definition(&self, table: &str, column: &ColumnSpec) -> String {
        let name = self.quote(&column.name);
        match column.primary_key {
            Some(PrimaryKeyStrategy::AutoIncrement) => {
                return format!("{} integer PRIMARY KEY AUTOINCREMENT", name);
            }
            Some(PrimaryKeyStrategy::Uuid) => {
                return format!("{} varchar(36) NOT NULL PRIMARY KEY", name);
            }
            None => {}
        }

        let mut parts = vec![name, self.column_type(table, column)];
        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }
        if column.unique {
            parts.push("UNIQUE".to_string());
        }
        if let Some(default) = column
            .default
            .as_ref()
            .and_then(|d| default_literal(Dialect::Sqlite, d))
        {
            parts.push(format!("DEFAULT {}", default));
        }
        if let Some(target) = &column.references {
            parts.push(format!(
                "REFERENCES {}({}) ON DELETE {}",
                self.quote(&target.table),
                self.quote(&target.column),
                target.on_delete.as_sql()
            ));
        }
        parts.join(" ")
    }

    /// The column as SQLite can add it to an existing table.
    ///
    /// `ADD COLUMN` rejects unique columns, non-constant defaults and
    /// `NOT NULL` without a default.
    fn addable(&self, table: &str, column: &ColumnSpec, mut out: Option<&mut Statements>) -> ColumnSpec {
        let mut addable = ColumnSpec {
            unique: false,
            ..column.clone()
        };

        if matches!(addable.default, Some(DefaultValue::CurrentTimestamp)) {
            addable.default = None;
            if let Some(out) = out.as_deref_mut() {
                out.warn(format!(
                    "add column {}.{} with a non-constant default; added without it",
                    table, column.name
                ));
            }
        }

        let has_default = addable
            .default
            .as_ref()
            .and_then(|d| default_literal(Dialect::Sqlite, d))
            .is_some();
        if !addable.nullable && !has_default {
            addable.nullable = true;
            if let Some(out) = out.as_deref_mut() {
                out.warn(format!(
                    "add NOT NULL column {}.{} without a default; added as nullable",
                    table, column.name
                ));
            }
        }
        addable
    }

    /// Statements moving `table` from one layout to another.
    ///
    /// Foreign key enforcement is off while the old table is dropped, so
    /// rows referencing it are not cascaded away.
    fn rebuild(
        &self,
        table: &str,
        from: &[ColumnSpec],
        to: &[ColumnSpec],
        indexes: &[IndexSpec],
    ) -> Vec<String> {
        let t = self.quote(table);
        let staging = self.quote(&format!("{}_rebuild", table));
        let definitions: Vec<String> = to.iter().map(|c| self.column_definition(table, c)).collect();

        let (targets, sources): (Vec<String>, Vec<String>) = to
            .iter()
            .filter_map(|column| {
                let previous = from.iter().find(|c| c.name == column.name)?;
                Some((self.quote(&column.name), self.copy_expression(previous, column)))
            })
            .unzip();

        let mut statements = vec![
            "PRAGMA foreign_keys = OFF;".to_string(),
            format!(
                "CREATE TABLE {} (\n    {}\n);",
                staging,
                definitions.join(",\n    ")
            ),
        ];
        if !targets.is_empty() {
            statements.push(format!(
                "INSERT INTO {} ({}) SELECT {} FROM {};",
                staging,
                targets.join(", "),
                sources.join(", "),
                t
            ));
        }
        statements.push(format!("DROP TABLE {};", t));
        statements.push(format!("ALTER TABLE {} RENAME TO {};", staging, t));
        statements.extend(indexes.iter().map(|index| self.create_index(table, index)));
        statements.push("PRAGMA foreign_keys = ON;".to_string());
        statements
    }

    /// Value copied into a rebuilt column. Nulls become the default when
    /// the column turns `NOT NULL`.
    fn copy_expression(&self, from: &ColumnSpec, to: &ColumnSpec) -> String {
        let name = self.quote(&to.name);
        let fallback = to
            .default
            .as_ref()
            .and_then(|d| default_literal(Dialect::Sqlite, d));
        match fallback {
            Some(default) if from.nullable && !to.nullable => {
                format!("COALESCE({}, {})", name, default)
            }
            _ => name,
        }
    }

    /// Note for an alteration handed over without the rest of the table.
    /// The diff engine plans a rebuild instead.
    fn alter_column(&self, table: &str, alteration: &ColumnAlteration, out: &mut Statements) {
        let column = &alteration.to.name;
        let new_name = format!("{}_new", column);
        out.up(format!(
            "-- SQLite cannot alter {}.{} in place ({} -> {}).\n\
             -- To apply: ALTER TABLE {} ADD COLUMN {}; copy the data; drop {}; rename {} to {}.",
            self.quote(table),
            self.quote(column),
            describe(&alteration.from),
            describe(&alteration.to),
            self.quote(table),
            self.column_definition(table, &renamed(&alteration.to, &new_name)),
            self.quote(column),
            self.quote(&new_name),
            self.quote(column)
        ));
        out.warn(format!("alter column {}.{} in place", table, column));
    }

    fn drop_column(&self, table: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {};",
            self.quote(table),
            self.quote(column)
        )
    }

    fn create_index(&self, table: &str, index: &IndexSpec) -> String {
        let columns: Vec<String> = index.columns.iter().map(|c| self.quote(c)).collect();
        format!(
            "CREATE {}INDEX {} ON {} ({});",
            if index.unique { "UNIQUE " } else { "" },
            self.quote(&index.name),
            self.quote(table),
            columns.join(", ")
        )
    }

    fn drop_index(&self, index: &IndexSpec) -> String {
        format!("DROP INDEX IF EXISTS {};", self.quote(&index.name))
    }
}

fn describe(column: &ColumnSpec) -> String {
    if column.nullable {
        format!("{} null", column.kind)
    } else {
        format!("{} not null", column.kind)
    }
}

fn renamed(column: &ColumnSpec, name: &str) -> ColumnSpec {
    ColumnSpec {
        name: name.to_string(),
        ..column.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{presets, ForeignKeyRef, TablePlan};
    use crate::operation::ColumnChange;
    use pretty_assertions::assert_eq;

    fn orders() -> TablePlan {
        TablePlan::new("orders")
            .column(presets::id())
            .column(ColumnSpec::new("status", AttributeKind::default_string()))
            .column(ColumnSpec::new("total", AttributeKind::Integer))
            .column(presets::created_at("created_at"))
            .column(presets::timestamp("updated_at"))
    }

    #[test]
    fn test_create_orders() {
        let sql = SqliteRenderer.render(&SchemaOperation::create(&orders()));
        assert_eq!(
            sql.up,
            "CREATE TABLE \"orders\" (\n    \
             \"id\" integer PRIMARY KEY AUTOINCREMENT,\n    \
             \"status\" varchar(255),\n    \
             \"total\" integer,\n    \
             \"created_at\" timestamp NOT NULL DEFAULT CURRENT_TIMESTAMP,\n    \
             \"updated_at\" timestamp\n);\n"
        );
        assert_eq!(sql.down, "DROP TABLE IF EXISTS \"orders\";\n");
        assert!(sql.warnings.is_empty());
    }

    #[test]
    fn test_enum_renders_check() {
        let column = ColumnSpec::new(
            "status",
            AttributeKind::Enum {
                choices: vec!["pending".into(), "paid".into()],
            },
        );
        assert_eq!(
            SqliteRenderer.column_type("orders", &column),
            "varchar(255) CHECK (\"status\" IN ('pending', 'paid'))"
        );
    }

    #[test]
    fn test_add_column_inlines_reference() {
        let op = SchemaOperation::AlterTable {
            table: "posts".into(),
            add_columns: vec![ColumnSpec::new("user_id", AttributeKind::Integer)
                .references(ForeignKeyRef::cascade("users", "id"))],
            drop_columns: vec![],
            alter_columns: vec![],
            reordered: vec![],
        };
        let sql = SqliteRenderer.render(&[op]);
        assert_eq!(
            sql.up,
            "ALTER TABLE \"posts\" ADD COLUMN \"user_id\" integer REFERENCES \"users\"(\"id\") ON DELETE CASCADE;\n"
        );
        assert_eq!(sql.down, "ALTER TABLE \"posts\" DROP COLUMN \"user_id\";\n");
    }

    #[test]
    fn test_add_column_degrades_unsupported_constraints() {
        let op = SchemaOperation::AlterTable {
            table: "users".into(),
            add_columns: vec![
                ColumnSpec::new("email", AttributeKind::default_string())
                    .not_null()
                    .unique(),
                presets::created_at("verified_at"),
            ],
            drop_columns: vec![],
            alter_columns: vec![],
            reordered: vec![],
        };
        let sql = SqliteRenderer.render(&[op]);
        assert!(sql.up.contains("ADD COLUMN \"email\" varchar(255);"));
        assert!(sql
            .up
            .contains("CREATE UNIQUE INDEX \"users_email_unique\" ON \"users\" (\"email\");"));
        assert!(sql.up.contains("ADD COLUMN \"verified_at\" timestamp;"));
        assert_eq!(sql.warnings.len(), 3);
    }

    #[test]
    fn test_alter_column_is_a_note() {
        let from = ColumnSpec::new("code", AttributeKind::string(20));
        let op = SchemaOperation::AlterTable {
            table: "orders".into(),
            add_columns: vec![],
            drop_columns: vec![],
            alter_columns: vec![ColumnAlteration {
                to: from.with_kind(AttributeKind::string(40)),
                from,
                change: ColumnChange::Widened,
            }],
            reordered: vec![],
        };
        let sql = SqliteRenderer.render(&[op]);
        assert!(sql.up.starts_with("-- SQLite cannot alter \"orders\".\"code\" in place"));
        assert!(sql.up.contains("\"code_new\" varchar(40)"));
        assert_eq!(sql.warnings.len(), 1);
        assert!(!sql.has_down());
    }

    #[test]
    fn test_reorder_comment() {
        let op = SchemaOperation::AlterTable {
            table: "orders".into(),
            add_columns: vec![ColumnSpec::new("note", AttributeKind::Text)],
            drop_columns: vec![],
            alter_columns: vec![],
            reordered: vec!["id".into(), "note".into(), "status".into()],
        };
        let sql = SqliteRenderer.render(&[op]);
        assert!(sql
            .up
            .contains("-- column order changed (id, note, status); reordering is not applied"));
    }

    #[test]
    fn test_unique_constraint_becomes_index() {
        let op = SchemaOperation::AddUniqueConstraint {
            name: "posts_likes_user_id_post_id_unique".into(),
            table: "posts_likes".into(),
            columns: vec!["user_id".into(), "post_id".into()],
        };
        let sql = SqliteRenderer.render(&[op]);
        assert_eq!(
            sql.up,
            "CREATE UNIQUE INDEX \"posts_likes_user_id_post_id_unique\" ON \"posts_likes\" (\"user_id\", \"post_id\");\n"
        );
    }

    #[test]
    fn test_rebuild_applies_column_changes() {
        let title = ColumnSpec::new("title", AttributeKind::default_string());
        let views = ColumnSpec::new("views", AttributeKind::Integer);
        let op = SchemaOperation::RebuildTable {
            table: "posts".into(),
            from: vec![presets::id(), title.clone(), views.clone()],
            to: vec![
                presets::id(),
                title.not_null(),
                views.not_null().default_value(DefaultValue::Integer(0)),
            ],
            from_indexes: vec![],
            to_indexes: vec![IndexSpec::for_column("posts", "title")],
        };
        let sql = SqliteRenderer.render(&[op]);
        assert_eq!(
            sql.up,
            "PRAGMA foreign_keys = OFF;\n\n\
             CREATE TABLE \"posts_rebuild\" (\n    \
             \"id\" integer PRIMARY KEY AUTOINCREMENT,\n    \
             \"title\" varchar(255) NOT NULL,\n    \
             \"views\" integer NOT NULL DEFAULT 0\n);\n\n\
             INSERT INTO \"posts_rebuild\" (\"id\", \"title\", \"views\") \
             SELECT \"id\", \"title\", COALESCE(\"views\", 0) FROM \"posts\";\n\n\
             DROP TABLE \"posts\";\n\n\
             ALTER TABLE \"posts_rebuild\" RENAME TO \"posts\";\n\n\
             CREATE INDEX \"posts_title_index\" ON \"posts\" (\"title\");\n\n\
             PRAGMA foreign_keys = ON;\n"
        );
        assert!(sql
            .up
            .lines()
            .any(|line| !line.trim().is_empty() && !line.starts_with("--")));
        assert!(sql.down.contains("\"title\" varchar(255),"));
        assert!(!sql.down.contains("posts_title_index"));
        assert!(sql.warnings.is_empty());
    }

    #[test]
    fn test_rebuild_skips_columns_new_to_the_layout() {
        let op = SchemaOperation::RebuildTable {
            table: "posts".into(),
            from: vec![presets::id(), ColumnSpec::new("legacy", AttributeKind::Text)],
            to: vec![presets::id(), ColumnSpec::new("body", AttributeKind::Text)],
            from_indexes: vec![],
            to_indexes: vec![],
        };
        let sql = SqliteRenderer.render(&[op]);
        assert!(sql
            .up
            .contains("INSERT INTO \"posts_rebuild\" (\"id\") SELECT \"id\" FROM \"posts\";"));
        assert!(sql
            .down
            .contains("INSERT INTO \"posts_rebuild\" (\"id\") SELECT \"id\" FROM \"posts\";"));
    }

    #[test]
    fn test_drop_index_reverts_to_create() {
        let op = SchemaOperation::DropIndex {
            table: "orders".into(),
            index: IndexSpec::for_column("orders", "status"),
        };
        let sql = SqliteRenderer.render(&[op]);
        assert_eq!(sql.up, "DROP INDEX IF EXISTS \"orders_status_index\";\n");
        assert_eq!(
            sql.down,
            "CREATE INDEX \"orders_status_index\" ON \"orders\" (\"status\");\n"
        );
    }
}
