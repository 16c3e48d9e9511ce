//! PostgreSQL rendering.
//!
//! Enum columns get a named type per column, `{table}_{column}_enum`,
//! created before the table and dropped after it.

use keel_schema::{AttributeKind, Dialect, PrimaryKeyStrategy};

use super::{
    default_literal, note_reference_change, reorder_comment, sql_string, sql_string_list,
    SqlRenderer, Statements,
};
use crate::column::{ColumnSpec, IndexSpec};
use crate::operation::SchemaOperation;

/// SQL renderer for PostgreSQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresRenderer;

impl SqlRenderer for PostgresRenderer {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn quote(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn column_type(&self, table: &str, column: &ColumnSpec) -> String {
        match &column.kind {
            AttributeKind::String { .. } => {
                format!("varchar({})", column.kind.string_length().unwrap_or(255))
            }
            AttributeKind::Text => "text".to_string(),
            AttributeKind::Integer => "integer".to_string(),
            AttributeKind::BigInteger => "bigint".to_string(),
            AttributeKind::Float => "float".to_string(),
            AttributeKind::Decimal { precision, scale } => {
                format!("decimal({}, {})", precision, scale)
            }
            AttributeKind::Boolean => "boolean".to_string(),
            AttributeKind::Date => "date".to_string(),
            AttributeKind::DateTime => "timestamp with time zone".to_string(),
            AttributeKind::Enum { .. } => self.quote(&enum_type_name(table, &column.name)),
            AttributeKind::Json => "jsonb".to_string(),
            AttributeKind::Uuid => "uuid".to_string(),
        }
    }

    fn render_operation(&self, operation: &SchemaOperation, out: &mut Statements) {
        match operation {
            SchemaOperation::CreateTable {
                table,
                columns,
                indexes,
            } => {
                let mut types = Vec::new();
                for column in columns {
                    if let AttributeKind::Enum { choices } = &column.kind {
                        out.up(self.create_type(table, &column.name, choices));
                        types.push(self.drop_type(table, &column.name));
                    }
                }

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

                out.down(format!("DROP TABLE IF EXISTS {} CASCADE;", self.quote(table)));
                for statement in types {
                    out.down(statement);
                }
            }
            SchemaOperation::AlterTable {
                table,
                add_columns,
                drop_columns,
                alter_columns,
                reordered,
            } => {
                let mut down = Vec::new();
                let t = self.quote(table);

                for column in add_columns {
                    let mut revert = vec![format!(
                        "ALTER TABLE {} DROP COLUMN IF EXISTS {};",
                        t,
                        self.quote(&column.name)
                    )];
                    if let AttributeKind::Enum { choices } = &column.kind {
                        out.up(self.create_type(table, &column.name, choices));
                        revert.push(self.drop_type(table, &column.name));
                    }
                    out.up(format!(
                        "ALTER TABLE {} ADD COLUMN {};",
                        t,
                        self.column_definition(table, column)
                    ));
                    down.push(revert);
                }

                for column in drop_columns {
                    out.up(format!(
                        "ALTER TABLE {} DROP COLUMN IF EXISTS {};",
                        t,
                        self.quote(&column.name)
                    ));
                    let mut revert = Vec::new();
                    if let AttributeKind::Enum { choices } = &column.kind {
                        out.up(self.drop_type(table, &column.name));
                        revert.push(self.create_type(table, &column.name, choices));
                    }
                    revert.push(format!(
                        "ALTER TABLE {} ADD COLUMN {};",
                        t,
                        self.column_definition(table, column)
                    ));
                    down.push(revert);
                }

                for alteration in alter_columns {
                    for statement in self.alter_column(table, &alteration.from, &alteration.to) {
                        out.up(statement);
                    }
                    note_reference_change(table, alteration, out);
                    down.push(self.alter_column(table, &alteration.to, &alteration.from));
                }

                if !reordered.is_empty() {
                    out.up(reorder_comment(reordered));
                }

                for statement in down.into_iter().rev().flatten() {
                    out.down(statement);
                }
            }
            SchemaOperation::RebuildTable { .. } => {
                if let Some(alter) = operation.as_alter() {
                    self.render_operation(&alter, out);
                }
            }
            SchemaOperation::DropIndex { table, index } => {
                out.up(format!("DROP INDEX IF EXISTS {};", self.quote(&index.name)));
                out.down(self.create_index(table, index));
            }
            SchemaOperation::CreateIndex { table, index } => {
                out.up(self.create_index(table, index));
                out.down(format!("DROP INDEX IF EXISTS {};", self.quote(&index.name)));
            }
            SchemaOperation::AddForeignKey {
                table,
                column,
                references,
            } => {
                let name = format!("{}_{}_foreign", table, column);
                out.up(format!(
                    "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {};",
                    self.quote(table),
                    self.quote(&name),
                    self.quote(column),
                    self.quote(&references.table),
                    self.quote(&references.column),
                    references.on_delete.as_sql()
                ));
                out.down(format!(
                    "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {};",
                    self.quote(table),
                    self.quote(&name)
                ));
            }
            SchemaOperation::AddUniqueConstraint {
                name,
                table,
                columns,
            } => {
                let cols: Vec<String> = columns.iter().map(|c| self.quote(c)).collect();
                out.up(format!(
                    "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({});",
                    self.quote(table),
                    self.quote(name),
                    cols.join(", ")
                ));
                out.down(format!(
                    "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {};",
                    self.quote(table),
                    self.quote(name)
                ));
            }
            SchemaOperation::DropUniqueConstraint {
                name,
                table,
                columns,
            } => {
                let cols: Vec<String> = columns.iter().map(|c| self.quote(c)).collect();
                out.up(format!(
                    "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {};",
                    self.quote(table),
                    self.quote(name)
                ));
                out.down(format!(
                    "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({});",
                    self.quote(table),
                    self.quote(name),
                    cols.join(", ")
                ));
            }
        }
    }
}

fn enum_type_name(table: &str, column: &str) -> String {
    format!("{}_{}_enum", table, column)
}

impl PostgresRenderer {
    fn column_definition(&self, table: &str, column: &ColumnSpec) -> String {
        let name = self.quote(&column.name);
        match column.primary_key {
            Some(PrimaryKeyStrategy::AutoIncrement) => {
                return format!("{} serial PRIMARY KEY", name);
            }
            Some(PrimaryKeyStrategy::Uuid) => {
                return format!("{} uuid NOT NULL DEFAULT gen_random_uuid() PRIMARY KEY", name);
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
            .and_then(|d| default_literal(Dialect::Postgres, d))
        {
            parts.push(format!("DEFAULT {}", default));
        }
        parts.join(" ")
    }

    fn create_type(&self, table: &str, column: &str, choices: &[String]) -> String {
        format!(
            "CREATE TYPE {} AS ENUM ({});",
            self.quote(&enum_type_name(table, column)),
            sql_string_list(choices)
        )
    }

    fn drop_type(&self, table: &str, column: &str) -> String {
        format!(
            "DROP TYPE IF EXISTS {};",
            self.quote(&enum_type_name(table, column))
        )
    }

    /// Statements turning `from` into `to`.
    fn alter_column(&self, table: &str, from: &ColumnSpec, to: &ColumnSpec) -> Vec<String> {
        let t = self.quote(table);
        let c = self.quote(&to.name);
        let mut statements = Vec::new();

        if from.kind != to.kind {
            let type_name = self.quote(&enum_type_name(table, &to.name));
            match (&from.kind, &to.kind) {
                (AttributeKind::Enum { choices: old }, AttributeKind::Enum { choices: new })
                    if old.iter().all(|v| new.contains(v)) =>
                {
                    for value in new.iter().filter(|v| !old.contains(v)) {
                        statements.push(format!(
                            "ALTER TYPE {} ADD VALUE IF NOT EXISTS {};",
                            type_name,
                            sql_string(value)
                        ));
                    }
                }
                (AttributeKind::Enum { .. }, AttributeKind::Enum { choices }) => {
                    let old_name = self.quote(&format!("{}_{}_enum_old", table, to.name));
                    statements.push(format!("ALTER TYPE {} RENAME TO {};", type_name, old_name));
                    statements.push(self.create_type(table, &to.name, choices));
                    statements.push(format!(
                        "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::text::{};",
                        t, c, type_name, c, type_name
                    ));
                    statements.push(format!("DROP TYPE {};", old_name));
                }
                (_, AttributeKind::Enum { choices }) => {
                    statements.push(self.create_type(table, &to.name, choices));
                    statements.push(format!(
                        "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::text::{};",
                        t, c, type_name, c, type_name
                    ));
                }
                (AttributeKind::Enum { .. }, _) => {
                    let ty = self.column_type(table, to);
                    statements.push(format!(
                        "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::text::{};",
                        t, c, ty, c, ty
                    ));
                    statements.push(self.drop_type(table, &to.name));
                }
                _ => {
                    let ty = self.column_type(table, to);
                    statements.push(format!(
                        "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{};",
                        t, c, ty, c, ty
                    ));
                }
            }
        }

        if from.nullable != to.nullable {
            statements.push(format!(
                "ALTER TABLE {} ALTER COLUMN {} {} NOT NULL;",
                t,
                c,
                if to.nullable { "DROP" } else { "SET" }
            ));
        }

        if from.default != to.default {
            match to
                .default
                .as_ref()
                .and_then(|d| default_literal(Dialect::Postgres, d))
            {
                Some(literal) => statements.push(format!(
                    "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {};",
                    t, c, literal
                )),
                None => statements.push(format!("ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT;", t, c)),
            }
        }

        // Inline UNIQUE constraints are named `{table}_{column}_key`.
        let key = self.quote(&format!("{}_{}_key", table, to.name));
        match (from.unique, to.unique) {
            (false, true) => statements.push(format!(
                "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({});",
                t, key, c
            )),
            (true, false) => {
                statements.push(format!("ALTER TABLE {} DROP CONSTRAINT IF EXISTS {};", t, key))
            }
            _ => {}
        }

        statements
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
}
