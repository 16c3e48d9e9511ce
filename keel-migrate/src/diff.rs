//! Diffing planned tables against attribute snapshots.

use indexmap::IndexMap;
use keel_schema::{AttributeKind, Dialect};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::column::{ColumnSpec, IndexSpec, TablePlan, UniqueConstraint};
use crate::error::{MigrateResult, MigrationError};
use crate::ledger::Ledger;
use crate::operation::{ColumnAlteration, ColumnChange, SchemaOperation};
use crate::snapshot::{plan_layout_json, AttributeSnapshot};

/// What a model needs this run.
#[derive(Debug, Clone, PartialEq)]
pub enum DiffOutcome {
    /// The table does not exist yet.
    Create {
        /// Logical ledger name.
        logical_name: String,
        /// Table creation and its constraints.
        operations: Vec<SchemaOperation>,
    },
    /// The table exists and its columns or indexes changed.
    Alter {
        /// Logical ledger name.
        logical_name: String,
        /// Index drops, the ALTER (or rebuild), then index and foreign key
        /// additions.
        operations: Vec<SchemaOperation>,
        /// Degradations applied while diffing.
        warnings: Vec<String>,
    },
    /// Nothing changed.
    NoOp,
    /// Only the column order changed. Reordering is not applied.
    Reordered {
        /// Planned column order.
        columns: Vec<String>,
    },
    /// No snapshot, but the table was already generated: adopt the plan.
    Baseline,
}

impl DiffOutcome {
    /// Whether an artifact should be emitted.
    pub fn has_operations(&self) -> bool {
        matches!(self, Self::Create { .. } | Self::Alter { .. })
    }
}

/// Key-level differences between a snapshot and a plan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnDiff {
    /// Planned columns missing from the snapshot, in planned order.
    pub added: Vec<ColumnSpec>,
    /// Snapshot columns missing from the plan, in snapshot order.
    pub removed: Vec<ColumnSpec>,
    /// Common columns whose definition changed.
    pub changed: Vec<ColumnAlteration>,
    /// Whether the common columns appear in a different relative order.
    pub reordered: bool,
}

impl ColumnDiff {
    /// Compare two column maps.
    pub fn between(
        snapshot: &IndexMap<String, ColumnSpec>,
        planned: &IndexMap<String, ColumnSpec>,
    ) -> Self {
        let added = planned
            .values()
            .filter(|c| !snapshot.contains_key(&c.name))
            .cloned()
            .collect();
        let removed = snapshot
            .values()
            .filter(|c| !planned.contains_key(&c.name))
            .cloned()
            .collect();

        let mut changed = Vec::new();
        for (name, to) in planned {
            if let Some(from) = snapshot.get(name) {
                if let Some(change) = ColumnChange::classify(from, to) {
                    changed.push(ColumnAlteration {
                        from: from.clone(),
                        to: to.clone(),
                        change,
                    });
                }
            }
        }

        let common_planned: Vec<&String> =
            planned.keys().filter(|k| snapshot.contains_key(*k)).collect();
        let common_snapshot: Vec<&String> =
            snapshot.keys().filter(|k| planned.contains_key(*k)).collect();

        Self {
            added,
            removed,
            changed,
            reordered: common_planned != common_snapshot,
        }
    }

    /// Whether anything besides ordering changed.
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty() || !self.changed.is_empty()
    }
}

/// Index and unique constraint differences between a snapshot and a plan.
///
/// An index redefined under the same name is both dropped and created.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexDiff {
    /// Planned indexes missing from the snapshot.
    pub created: Vec<IndexSpec>,
    /// Snapshot indexes missing from the plan.
    pub dropped: Vec<IndexSpec>,
    /// Planned constraints missing from the snapshot.
    pub added_constraints: Vec<UniqueConstraint>,
    /// Snapshot constraints missing from the plan.
    pub dropped_constraints: Vec<UniqueConstraint>,
}

impl IndexDiff {
    /// Compare the indexes of a snapshot and a plan.
    pub fn between(snapshot: &AttributeSnapshot, plan: &TablePlan) -> Self {
        fn missing<T: PartialEq + Clone>(from: &[T], to: &[T]) -> Vec<T> {
            from.iter().filter(|item| !to.contains(item)).cloned().collect()
        }
        Self {
            created: missing(&plan.indexes, &snapshot.indexes),
            dropped: missing(&snapshot.indexes, &plan.indexes),
            added_constraints: missing(&plan.unique_constraints, &snapshot.unique_constraints),
            dropped_constraints: missing(&snapshot.unique_constraints, &plan.unique_constraints),
        }
    }

    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
            && self.dropped.is_empty()
            && self.added_constraints.is_empty()
            && self.dropped_constraints.is_empty()
    }
}

/// Classifies each model as create, alter or no-op.
#[derive(Debug, Clone, Copy)]
pub struct DiffEngine {
    dialect: Dialect,
    allow_narrowing: bool,
}

impl DiffEngine {
    /// Create a diff engine.
    ///
    /// Without `allow_narrowing`, lossy column changes are widened to text.
    pub fn new(dialect: Dialect, allow_narrowing: bool) -> Self {
        Self {
            dialect,
            allow_narrowing,
        }
    }

    /// Diff one model's planned table against its snapshot.
    pub fn diff(
        &self,
        model: &str,
        plan: &TablePlan,
        snapshot: Option<&AttributeSnapshot>,
        ledger: &Ledger,
    ) -> MigrateResult<DiffOutcome> {
        let Some(snapshot) = snapshot else {
            let logical_name = format!("create-{}-table", plan.table);
            if ledger.contains(&logical_name) {
                debug!(model, table = %plan.table, "table already generated, adopting plan");
                return Ok(DiffOutcome::Baseline);
            }
            return Ok(DiffOutcome::Create {
                logical_name,
                operations: SchemaOperation::create(plan),
            });
        };

        if snapshot.matches(plan)? {
            return Ok(DiffOutcome::NoOp);
        }

        let diff = ColumnDiff::between(&snapshot.columns, &plan.columns);
        let index_diff = IndexDiff::between(snapshot, plan);
        let columns_changed = diff.has_changes();
        if !columns_changed && index_diff.is_empty() {
            if diff.reordered {
                warn!(model, table = %plan.table, "column order changed; reordering is not applied");
                return Ok(DiffOutcome::Reordered {
                    columns: plan.columns.keys().cloned().collect(),
                });
            }
            return Ok(DiffOutcome::NoOp);
        }

        let mut warnings = Vec::new();
        let alter_columns: Vec<ColumnAlteration> = diff
            .changed
            .into_iter()
            .filter_map(|alteration| self.degrade(&plan.table, alteration, &mut warnings))
            .collect();

        let operations = if self.dialect == Dialect::Sqlite && !alter_columns.is_empty() {
            debug!(model, table = %plan.table, "columns cannot be altered in place, rebuilding");
            vec![rebuild(snapshot, plan, &diff.added, &alter_columns)]
        } else {
            let table = &plan.table;
            let mut operations: Vec<SchemaOperation> = index_diff
                .dropped_constraints
                .iter()
                .map(|c| SchemaOperation::DropUniqueConstraint {
                    name: c.name.clone(),
                    table: table.clone(),
                    columns: c.columns.clone(),
                })
                .chain(index_diff.dropped.iter().map(|index| SchemaOperation::DropIndex {
                    table: table.clone(),
                    index: index.clone(),
                }))
                .collect();

            if columns_changed {
                operations.push(SchemaOperation::AlterTable {
                    table: table.clone(),
                    add_columns: diff.added.clone(),
                    drop_columns: diff.removed,
                    alter_columns,
                    reordered: if diff.reordered {
                        plan.columns.keys().cloned().collect()
                    } else {
                        Vec::new()
                    },
                });
            }

            operations.extend(index_diff.created.iter().map(|index| SchemaOperation::CreateIndex {
                table: table.clone(),
                index: index.clone(),
            }));
            operations.extend(index_diff.added_constraints.iter().map(|c| {
                SchemaOperation::AddUniqueConstraint {
                    name: c.name.clone(),
                    table: table.clone(),
                    columns: c.columns.clone(),
                }
            }));
            if !self.dialect.inline_foreign_keys() {
                for column in &diff.added {
                    if let Some(target) = &column.references {
                        operations.push(SchemaOperation::AddForeignKey {
                            table: table.clone(),
                            column: column.name.clone(),
                            references: target.clone(),
                        });
                    }
                }
            }
            operations
        };

        let logical_name = format!("alter-{}-table-{}", plan.table, fingerprint(snapshot, plan)?);

        Ok(DiffOutcome::Alter {
            logical_name,
            operations,
            warnings,
        })
    }

    /// Apply the narrowing policy to one alteration.
    fn degrade(
        &self,
        table: &str,
        alteration: ColumnAlteration,
        warnings: &mut Vec<String>,
    ) -> Option<ColumnAlteration> {
        if !alteration.change.is_lossy() || self.allow_narrowing {
            return Some(alteration);
        }

        let column = &alteration.to.name;
        let warning = MigrationError::unsupported(
            self.dialect,
            format!(
                "safely change {}.{} from {} to {}; widened to text instead",
                table, column, alteration.from.kind, alteration.to.kind
            ),
        )
        .to_string();
        warn!(table, column = %column, "{}", warning);
        warnings.push(warning);

        let to = alteration.to.with_kind(AttributeKind::Text);
        let change = ColumnChange::classify(&alteration.from, &to)?;
        Some(ColumnAlteration {
            from: alteration.from,
            to,
            change,
        })
    }
}

/// A rebuild applying column changes in place of an ALTER.
///
/// Shared columns keep their snapshot order and added columns go last, as
/// `ADD COLUMN` would place them.
fn rebuild(
    snapshot: &AttributeSnapshot,
    plan: &TablePlan,
    added: &[ColumnSpec],
    alter_columns: &[ColumnAlteration],
) -> SchemaOperation {
    let to = snapshot
        .columns
        .values()
        .filter(|c| plan.columns.contains_key(&c.name))
        .map(|c| {
            alter_columns
                .iter()
                .find(|a| a.to.name == c.name)
                .map_or_else(|| c.clone(), |a| a.to.clone())
        })
        .chain(added.iter().cloned())
        .collect();

    let with_constraints = |indexes: &[IndexSpec], constraints: &[UniqueConstraint]| {
        indexes
            .iter()
            .cloned()
            .chain(constraints.iter().map(UniqueConstraint::as_index))
            .collect()
    };

    SchemaOperation::RebuildTable {
        table: plan.table.clone(),
        from: snapshot.columns.values().cloned().collect(),
        to,
        from_indexes: with_constraints(&snapshot.indexes, &snapshot.unique_constraints),
        to_indexes: with_constraints(&plan.indexes, &plan.unique_constraints),
    }
}

/// Short digest identifying a transition between two layouts.
fn fingerprint(snapshot: &AttributeSnapshot, plan: &TablePlan) -> MigrateResult<String> {
    let mut hasher = Sha256::new();
    hasher.update(snapshot.layout_json()?.as_bytes());
    hasher.update(b"\n");
    hasher.update(plan_layout_json(plan)?.as_bytes());
    let digest = hex::encode(hasher.finalize());
    Ok(digest[..8].to_string())
}
