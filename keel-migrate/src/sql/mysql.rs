//! MySQL rendering.

use keel_schema::{AttributeKind, DefaultValue, Dialect, PrimaryKeyStrategy};

use super::{
    default_literal, note_reference_change, reorder_comment, sql_string, sql_string_list,
    SqlRenderer, Statements,
};
use crate::column::{ColumnSpec, IndexSpec};
use crate::operation::SchemaOperation;

/// Prefix length for indexes over unbounded text columns.
///
/// 191 characters of utf8mb4 fit the 767-byte key limit of older InnoDB
/// row formats.
pub const TEXT_INDEX_PREFIX: u32 = 191;

/// SQL renderer for MySQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlRenderer;

impl SqlRenderer for MySqlRenderer {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn quote(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    fn column_type(&self, _table: &str, column: &ColumnSpec) -> String {
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
            AttributeKind::DateTime => "timestamp".to_string(),
            AttributeKind::Enum { choices } => format!("enum({})", sql_string_list(choices)),
            AttributeKind::Json => "json".to_string(),
            AttributeKind::Uuid => "char(36)".to_string(),
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
                    "CREATE TABLE {} (\n    {}\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;",
                    self.quote(table),
                    definitions.join(",\n    ")
                ));
                for column in columns.iter().filter(|c| c.unique && c.kind.is_unbounded_text()) {
                    out.up(self.add_unique(table, column));
                }
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
                let t = self.quote(table);

                for column in add_columns {
                    out.up(format!(
                        "ALTER TABLE {} ADD COLUMN {};",
                        t,
                        self.column_definition(table, column)
                    ));
                    if column.unique && column.kind.is_unbounded_text() {
                        out.up(self.add_unique(table, column));
                    }
                    down.push(vec![format!(
                        "ALTER TABLE {} DROP COLUMN {};",
                        t,
                        self.quote(&column.name)
                    )]);
                }

                for column in drop_columns {
                    out.up(format!("ALTER TABLE {} DROP COLUMN {};", t, self.quote(&column.name)));
                    let mut revert = vec![format!(
                        "ALTER TABLE {} ADD COLUMN {};",
                        t,
                        self.column_definition(table, column)
                    )];
                    if column.unique && column.kind.is_unbounded_text() {
                        revert.push(self.add_unique(table, column));
                    }
                    down.push(revert);
                }

                for alteration in alter_columns {
                    for statement in self.modify(table, &alteration.from, &alteration.to) {
                        out.up(statement);
                    }
                    note_reference_change(table, alteration, out);
                    down.push(self.modify(table, &alteration.to, &alteration.from));
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
                out.up(format!(
                    "DROP INDEX {} ON {};",
                    self.quote(&index.name),
                    self.quote(table)
                ));
                out.down(self.create_index(table, index));
            }
            SchemaOperation::CreateIndex { table, index } => {
                out.up(self.create_index(table, index));
                out.down(format!(
                    "DROP INDEX {} ON {};",
                    self.quote(&index.name),
                    self.quote(table)
                ));
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
                    "ALTER TABLE {} DROP FOREIGN KEY {};",
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
                    "ALTER TABLE {} DROP INDEX {};",
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
                    "ALTER TABLE {} DROP INDEX {};",
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

impl MySqlRenderer {
    fn column_definition(&self, table: &str, column: &ColumnSpec) -> String {
        let name = self.quote(&column.name);
        match column.primary_key {
            Some(PrimaryKeyStrategy::AutoIncrement) => {
                return format!("{} integer NOT NULL AUTO_INCREMENT PRIMARY KEY", name);
            }
            Some(PrimaryKeyStrategy::Uuid) => {
                return format!("{} char(36) NOT NULL DEFAULT (UUID()) PRIMARY KEY", name);
            }
            None => {}
        }

        let mut parts = vec![name, self.column_type(table, column)];
        if !column.nullable {
            parts.push("NOT NULL".to_string());
        } else if column.kind == AttributeKind::DateTime {
            // Without explicit_defaults_for_timestamp a bare timestamp is NOT NULL.
            parts.push("NULL".to_string());
        }
        if column.unique && !column.kind.is_unbounded_text() {
            parts.push("UNIQUE".to_string());
        }
        if let Some(default) = &column.default {
            parts.push(format!("DEFAULT {}", self.default_clause(&column.kind, default)));
        }
        parts.join(" ")
    }

    /// Text and JSON columns only take expression defaults.
    fn default_clause(&self, kind: &AttributeKind, default: &DefaultValue) -> String {
        match (kind.is_unbounded_text(), default) {
            (true, DefaultValue::String(s)) => format!("({})", sql_string(s)),
            _ => default_literal(Dialect::MySql, default).unwrap_or_else(|| "NULL".to_string()),
        }
    }

    /// Statements turning `from` into `to`.
    ///
    /// Uniqueness is handled apart from `MODIFY COLUMN`, which would add a
    /// second unique index instead of keeping the first. A unique index is
    /// rebuilt when the column moves between bounded and unbounded types,
    /// since only the latter take a prefix.
    fn modify(&self, table: &str, from: &ColumnSpec, to: &ColumnSpec) -> Vec<String> {
        let t = self.quote(table);
        let mut statements = Vec::new();
        let rebuild = from.kind.is_unbounded_text() != to.kind.is_unbounded_text();

        if from.unique && (!to.unique || rebuild) {
            statements.push(format!(
                "ALTER TABLE {} DROP INDEX {};",
                t,
                self.quote(&self.unique_index_name(table, from))
            ));
        }

        let plain = |c: &ColumnSpec| ColumnSpec {
            unique: false,
            references: None,
            ..c.clone()
        };
        if plain(from) != plain(to) {
            statements.push(format!(
                "ALTER TABLE {} MODIFY COLUMN {};",
                t,
                self.column_definition(table, &plain(to))
            ));
        }

        if to.unique && (!from.unique || rebuild) {
            statements.push(self.add_unique(table, to));
        }
        statements
    }

    /// Name of the unique index of a single column.
    ///
    /// MySQL names an inline `UNIQUE` index after its column.
    fn unique_index_name(&self, table: &str, column: &ColumnSpec) -> String {
        if column.kind.is_unbounded_text() {
            format!("{}_{}_unique", table, column.name)
        } else {
            column.name.clone()
        }
    }

    /// Unique index over one column, prefixed for unbounded text.
    fn add_unique(&self, table: &str, column: &ColumnSpec) -> String {
        let name = self.unique_index_name(table, column);
        if column.kind.is_unbounded_text() {
            let mut index = IndexSpec::new(name, vec![column.name.clone()]).unique();
            index.unbounded_columns = index.columns.clone();
            self.create_index(table, &index)
        } else {
            format!(
                "ALTER TABLE {} ADD UNIQUE INDEX {} ({});",
                self.quote(table),
                self.quote(&name),
                self.quote(&column.name)
            )
        }
    }

    fn create_index(&self, table: &str, index: &IndexSpec) -> String {
        let columns: Vec<String> = index
            .columns
            .iter()
            .map(|c| {
                if index.unbounded_columns.contains(c) {
                    format!("{}({})", self.quote(c), TEXT_INDEX_PREFIX)
                } else {
                    self.quote(c)
                }
            })
            .collect();
        format!(
            "CREATE {}INDEX {} ON {} ({});",
            if index.unique { "UNIQUE " } else { "" },
            self.quote(&index.name),
            self.quote(table),
            columns.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{presets, ForeignKeyRef, TablePlan};
    use crate::operation::{ColumnAlteration, ColumnChange};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_create_table() {
        let plan = TablePlan::new("users")
            .column(presets::id())
            .column(ColumnSpec::new("email", AttributeKind::default_string()).not_null().unique())
            .column(presets::flag("active", true));
        let sql = MySqlRenderer.render(&SchemaOperation::create(&plan));
        assert_eq!(
            sql.up,
            "CREATE TABLE `users` (\n    \
             `id` integer NOT NULL AUTO_INCREMENT PRIMARY KEY,\n    \
             `email` varchar(255) NOT NULL UNIQUE,\n    \
             `active` boolean DEFAULT 1\n\
             ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;\n"
        );
        assert_eq!(sql.down, "DROP TABLE IF EXISTS `users`;\n");
    }

    #[test]
    fn test_uuid_primary_key() {
        let plan = TablePlan::new("tokens").column(ColumnSpec::primary("id", PrimaryKeyStrategy::Uuid));
        let sql = MySqlRenderer.render(&SchemaOperation::create(&plan));
        assert!(sql.up.contains("`id` char(36) NOT NULL DEFAULT (UUID()) PRIMARY KEY"));
    }

    #[test]
    fn test_text_index_gets_prefix() {
        let plan = TablePlan::new("posts")
            .column(ColumnSpec::new("body", AttributeKind::Text))
            .column(ColumnSpec::new("slug", AttributeKind::default_string()))
            .index(IndexSpec::new("posts_body_slug_index", vec!["body".into(), "slug".into()]));
        let sql = MySqlRenderer.render(&SchemaOperation::create(&plan));
        assert!(sql
            .up
            .contains("CREATE INDEX `posts_body_slug_index` ON `posts` (`body`(191), `slug`);"));
    }

    #[test]
    fn test_unique_text_column_uses_prefixed_index() {
        let plan = TablePlan::new("profiles")
            .column(presets::id())
            .column(ColumnSpec::new("bio", AttributeKind::Text).unique());
        let sql = MySqlRenderer.render(&SchemaOperation::create(&plan));
        assert!(sql.up.contains("`bio` text\n)"));
        assert!(!sql.up.contains("text UNIQUE"));
        assert!(sql
            .up
            .contains("CREATE UNIQUE INDEX `profiles_bio_unique` ON `profiles` (`bio`(191));"));

        let add = SchemaOperation::AlterTable {
            table: "profiles".into(),
            add_columns: vec![ColumnSpec::new("headline", AttributeKind::Text).unique()],
            drop_columns: vec![],
            alter_columns: vec![],
            reordered: vec![],
        };
        let sql = MySqlRenderer.render(&[add]);
        assert_eq!(
            sql.up,
            "ALTER TABLE `profiles` ADD COLUMN `headline` text;\n\n\
             CREATE UNIQUE INDEX `profiles_headline_unique` ON `profiles` (`headline`(191));\n"
        );

        let from = ColumnSpec::new("bio", AttributeKind::Text);
        let modify = SchemaOperation::AlterTable {
            table: "profiles".into(),
            add_columns: vec![],
            drop_columns: vec![],
            alter_columns: vec![ColumnAlteration {
                to: from.clone().unique(),
                from,
                change: ColumnChange::Redefined,
            }],
            reordered: vec![],
        };
        let sql = MySqlRenderer.render(&[modify]);
        assert_eq!(
            sql.up,
            "CREATE UNIQUE INDEX `profiles_bio_unique` ON `profiles` (`bio`(191));\n"
        );
        assert_eq!(sql.down, "ALTER TABLE `profiles` DROP INDEX `profiles_bio_unique`;\n");
    }

    #[test]
    fn test_foreign_key_constraint() {
        let op = SchemaOperation::AddForeignKey {
            table: "posts".into(),
            column: "user_id".into(),
            references: ForeignKeyRef::cascade("users", "id"),
        };
        let sql = MySqlRenderer.render(&[op]);
        assert_eq!(
            sql.up,
            "ALTER TABLE `posts` ADD CONSTRAINT `posts_user_id_foreign` FOREIGN KEY (`user_id`) REFERENCES `users` (`id`) ON DELETE CASCADE;\n"
        );
        assert_eq!(sql.down, "ALTER TABLE `posts` DROP FOREIGN KEY `posts_user_id_foreign`;\n");
    }

    #[test]
    fn test_modify_column() {
        let from = ColumnSpec::new("code", AttributeKind::string(20));
        let to = from.with_kind(AttributeKind::Text);
        let op = SchemaOperation::AlterTable {
            table: "orders".into(),
            add_columns: vec![],
            drop_columns: vec![],
            alter_columns: vec![ColumnAlteration {
                from,
                to,
                change: ColumnChange::Widened,
            }],
            reordered: vec![],
        };
        let sql = MySqlRenderer.render(&[op]);
        assert_eq!(sql.up, "ALTER TABLE `orders` MODIFY COLUMN `code` text;\n");
        assert_eq!(sql.down, "ALTER TABLE `orders` MODIFY COLUMN `code` varchar(20);\n");
    }

    #[test]
    fn test_uniqueness_change_does_not_duplicate_index() {
        let from = ColumnSpec::new("email", AttributeKind::default_string()).unique();
        let to = from.with_kind(AttributeKind::Text);
        let op = SchemaOperation::AlterTable {
            table: "users".into(),
            add_columns: vec![],
            drop_columns: vec![],
            alter_columns: vec![ColumnAlteration {
                from,
                to,
                change: ColumnChange::Widened,
            }],
            reordered: vec![],
        };
        let sql = MySqlRenderer.render(&[op]);
        assert_eq!(
            sql.up,
            "ALTER TABLE `users` DROP INDEX `email`;\n\n\
             ALTER TABLE `users` MODIFY COLUMN `email` text;\n\n\
             CREATE UNIQUE INDEX `users_email_unique` ON `users` (`email`(191));\n"
        );
        assert_eq!(sql.up.matches("UNIQUE").count(), 1);
    }

    #[test]
    fn test_nullable_timestamp_is_explicitly_null() {
        let plan = TablePlan::new("posts")
            .column(ColumnSpec::new("published_at", AttributeKind::DateTime))
            .column(presets::created_at("created_at"));
        let sql = MySqlRenderer.render(&SchemaOperation::create(&plan));
        assert!(sql.up.contains("`published_at` timestamp NULL,"));
        assert!(sql.up.contains("`created_at` timestamp NOT NULL DEFAULT CURRENT_TIMESTAMP"));
    }

    #[test]
    fn test_rebuild_renders_in_place() {
        let title = ColumnSpec::new("title", AttributeKind::default_string());
        let op = SchemaOperation::RebuildTable {
            table: "posts".into(),
            from: vec![presets::id(), title.clone()],
            to: vec![presets::id(), title.not_null()],
            from_indexes: vec![],
            to_indexes: vec![],
        };
        let sql = MySqlRenderer.render(&[op]);
        assert_eq!(
            sql.up,
            "ALTER TABLE `posts` MODIFY COLUMN `title` varchar(255) NOT NULL;\n"
        );
    }

    #[test]
    fn test_drop_index_and_unique_constraint() {
        let ops = vec![
            SchemaOperation::DropUniqueConstraint {
                name: "orders_status_total_unique".into(),
                table: "orders".into(),
                columns: vec!["status".into(), "total".into()],
            },
            SchemaOperation::DropIndex {
                table: "orders".into(),
                index: IndexSpec::for_column("orders", "status"),
            },
        ];
        let sql = MySqlRenderer.render(&ops);
        assert_eq!(
            sql.up,
            "ALTER TABLE `orders` DROP INDEX `orders_status_total_unique`;\n\n\
             DROP INDEX `orders_status_index` ON `orders`;\n"
        );
        assert_eq!(
            sql.down,
            "CREATE INDEX `orders_status_index` ON `orders` (`status`);\n\n\
             ALTER TABLE `orders` ADD CONSTRAINT `orders_status_total_unique` UNIQUE (`status`, `total`);\n"
        );
    }
}
