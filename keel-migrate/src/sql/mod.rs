//! SQL rendering for schema operations.
//!
//! Each dialect implements [`SqlRenderer`]. Renderers never fail: an
//! operation a dialect cannot express safely is rendered as the closest safe
//! statement (or a comment) and reported in [`MigrationSql::warnings`].

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MySqlRenderer;
pub use postgres::PostgresRenderer;
pub use sqlite::SqliteRenderer;

use keel_schema::{AttributeKind, DefaultValue, Dialect};
use tracing::warn;

use crate::column::ColumnSpec;
use crate::error::MigrationError;
use crate::operation::{ColumnAlteration, SchemaOperation};

/// Rendered SQL for one migration artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSql {
    /// SQL applying the migration.
    pub up: String,
    /// SQL reverting the migration. Empty when nothing is reversible.
    pub down: String,
    /// Operations that were degraded while rendering.
    pub warnings: Vec<String>,
}

impl MigrationSql {
    /// Check if the migration is empty.
    pub fn is_empty(&self) -> bool {
        self.up.trim().is_empty()
    }

    /// Whether a down script was rendered.
    pub fn has_down(&self) -> bool {
        !self.down.trim().is_empty()
    }
}

/// Statements rendered for a single operation.
#[derive(Debug)]
pub struct Statements {
    dialect: Dialect,
    up: Vec<String>,
    down: Vec<String>,
    warnings: Vec<String>,
}

impl Statements {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            up: Vec::new(),
            down: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Add an apply statement.
    pub fn up(&mut self, statement: impl Into<String>) {
        self.up.push(statement.into());
    }

    /// Add a revert statement. Revert statements run in the order added.
    pub fn down(&mut self, statement: impl Into<String>) {
        self.down.push(statement.into());
    }

    /// Record a degraded operation.
    pub fn warn(&mut self, operation: impl Into<String>) {
        let message = MigrationError::unsupported(self.dialect, operation).to_string();
        warn!(dialect = %self.dialect, "{}", message);
        self.warnings.push(message);
    }
}

/// Renders schema operations for one dialect.
pub trait SqlRenderer: Send + Sync {
    /// Target dialect.
    fn dialect(&self) -> Dialect;

    /// Quote an identifier.
    fn quote(&self, ident: &str) -> String;

    /// The column type, including any inline type constraint.
    fn column_type(&self, table: &str, column: &ColumnSpec) -> String;

    /// Render one operation.
    fn render_operation(&self, operation: &SchemaOperation, out: &mut Statements);

    /// Render a sequence of operations.
    ///
    /// The down script reverts operations in reverse order.
    fn render(&self, operations: &[SchemaOperation]) -> MigrationSql {
        let mut up = Vec::new();
        let mut down_groups = Vec::new();
        let mut warnings = Vec::new();

        for operation in operations {
            let mut statements = Statements::new(self.dialect());
            self.render_operation(operation, &mut statements);
            up.extend(statements.up);
            down_groups.push(statements.down);
            warnings.extend(statements.warnings);
        }

        let down: Vec<String> = down_groups.into_iter().rev().flatten().collect();
        MigrationSql {
            up: join_statements(&up),
            down: join_statements(&down),
            warnings,
        }
    }
}

/// The renderer for a dialect.
pub fn renderer_for(dialect: Dialect) -> Box<dyn SqlRenderer> {
    match dialect {
        Dialect::Sqlite => Box::new(SqliteRenderer),
        Dialect::MySql => Box::new(MySqlRenderer),
        Dialect::Postgres => Box::new(PostgresRenderer),
    }
}

fn join_statements(statements: &[String]) -> String {
    if statements.is_empty() {
        return String::new();
    }
    let mut sql = statements.join("\n\n");
    sql.push('\n');
    sql
}

/// A single-quoted SQL string literal.
pub(crate) fn sql_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Comma-separated string literals.
pub(crate) fn sql_string_list(values: &[String]) -> String {
    values
        .iter()
        .map(|v| sql_string(v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The literal of a default value, if the dialect has one.
pub(crate) fn default_literal(dialect: Dialect, default: &DefaultValue) -> Option<String> {
    let literal = match default {
        DefaultValue::String(s) => sql_string(s),
        DefaultValue::Integer(i) => i.to_string(),
        DefaultValue::Float(f) => f.to_string(),
        DefaultValue::Boolean(b) => match (dialect, b) {
            (Dialect::Postgres, true) => "true".to_string(),
            (Dialect::Postgres, false) => "false".to_string(),
            (_, true) => "1".to_string(),
            (_, false) => "0".to_string(),
        },
        DefaultValue::Null => "NULL".to_string(),
        DefaultValue::CurrentTimestamp => match dialect {
            Dialect::Postgres => "now()".to_string(),
            _ => "CURRENT_TIMESTAMP".to_string(),
        },
        DefaultValue::GeneratedUuid => match dialect {
            Dialect::Sqlite => return None,
            Dialect::MySql => "(UUID())".to_string(),
            Dialect::Postgres => "gen_random_uuid()".to_string(),
        },
    };
    Some(literal)
}

/// Comment noting an order change that is not applied.
pub(crate) fn reorder_comment(columns: &[String]) -> String {
    format!(
        "-- column order changed ({}); reordering is not applied",
        columns.join(", ")
    )
}

/// Note a foreign key change, which is never applied in place.
pub(crate) fn note_reference_change(table: &str, alteration: &ColumnAlteration, out: &mut Statements) {
    if alteration.from.references == alteration.to.references {
        return;
    }
    out.up(format!(
        "-- foreign key of {}.{} changed; drop and re-add it to apply",
        table, alteration.to.name
    ));
    out.warn(format!("change the foreign key of {}.{} in place", table, alteration.to.name));
}

/// Semantic category of a column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCategory {
    /// Bounded character data.
    String,
    /// Unbounded character data.
    Text,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInteger,
    /// Floating point.
    Float,
    /// Fixed precision.
    Decimal,
    /// Boolean.
    Boolean,
    /// Date.
    Date,
    /// Date and time.
    DateTime,
    /// Fixed set of values.
    Enum,
    /// JSON document.
    Json,
    /// UUID.
    Uuid,
}

impl TypeCategory {
    /// Category of a semantic type.
    pub fn of(kind: &AttributeKind) -> Self {
        match kind {
            AttributeKind::String { .. } => Self::String,
            AttributeKind::Text => Self::Text,
            AttributeKind::Integer => Self::Integer,
            AttributeKind::BigInteger => Self::BigInteger,
            AttributeKind::Float => Self::Float,
            AttributeKind::Decimal { .. } => Self::Decimal,
            AttributeKind::Boolean => Self::Boolean,
            AttributeKind::Date => Self::Date,
            AttributeKind::DateTime => Self::DateTime,
            AttributeKind::Enum { .. } => Self::Enum,
            AttributeKind::Json => Self::Json,
            AttributeKind::Uuid => Self::Uuid,
        }
    }

    /// Category a dialect stores a semantic type as.
    ///
    /// SQLite has no JSON or UUID types: they are stored as text and as a
    /// bounded string.
    pub fn stored_as(kind: &AttributeKind, dialect: Dialect) -> Self {
        match (dialect, kind) {
            (Dialect::Sqlite, AttributeKind::Json) => Self::Text,
            (Dialect::Sqlite, AttributeKind::Uuid) => Self::String,
            _ => Self::of(kind),
        }
    }
}

/// Classify a rendered column type by the dialect's type-name grammar.
pub fn classify_sql_type(dialect: Dialect, sql: &str) -> Option<TypeCategory> {
    let sql = sql.trim().to_ascii_lowercase();

    match dialect {
        Dialect::Sqlite if sql.contains(" check (") && sql.contains(" in (") => {
            return Some(TypeCategory::Enum);
        }
        Dialect::MySql if sql.starts_with("enum(") => return Some(TypeCategory::Enum),
        Dialect::Postgres if sql.starts_with('"') && sql.ends_with("_enum\"") => {
            return Some(TypeCategory::Enum);
        }
        _ => {}
    }

    let (base, args) = match sql.split_once('(') {
        Some((base, rest)) => (base.trim(), rest.split(')').next().map(str::trim)),
        None => (sql.as_str(), None),
    };

    let category = match base {
        "varchar" | "character varying" => TypeCategory::String,
        "char" | "character" if args == Some("36") => TypeCategory::Uuid,
        "char" | "character" => TypeCategory::String,
        "text" | "mediumtext" | "longtext" => TypeCategory::Text,
        "integer" | "int" | "serial" => TypeCategory::Integer,
        "bigint" | "bigserial" => TypeCategory::BigInteger,
        "float" | "double" | "real" | "double precision" => TypeCategory::Float,
        "decimal" | "numeric" => TypeCategory::Decimal,
        "boolean" | "bool" => TypeCategory::Boolean,
        "tinyint" if args == Some("1") => TypeCategory::Boolean,
        "date" => TypeCategory::Date,
        "timestamp" | "datetime" | "timestamp with time zone" | "timestamptz" => {
            TypeCategory::DateTime
        }
        "json" | "jsonb" => TypeCategory::Json,
        "uuid" => TypeCategory::Uuid,
        _ => return None,
    };
    Some(category)
}
