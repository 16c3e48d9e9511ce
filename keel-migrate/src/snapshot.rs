//! Attribute snapshots.
//!
//! After every successful CREATE or ALTER the planned layout of a model
//! (columns, indexes and composite unique constraints) is written to
//! `{snapshots_dir}/{Model}.json`. The next run diffs against it. Snapshots
//! are superseded on each write, never versioned.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::column::{ColumnSpec, IndexSpec, TablePlan, UniqueConstraint};
use crate::error::{MigrateResult, MigrationError};

/// The planned layout of one model at its last synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSnapshot {
    /// Model name.
    pub model: String,
    /// Table name.
    pub table: String,
    /// Columns in planned order.
    pub columns: IndexMap<String, ColumnSpec>,
    /// Indexes in planned order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<IndexSpec>,
    /// Composite unique constraints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unique_constraints: Vec<UniqueConstraint>,
}

/// The part of a table compared between runs.
#[derive(Serialize)]
struct Layout<'a> {
    columns: &'a IndexMap<String, ColumnSpec>,
    indexes: &'a [IndexSpec],
    unique_constraints: &'a [UniqueConstraint],
}

impl AttributeSnapshot {
    /// Capture a table plan.
    pub fn capture(model: impl Into<String>, plan: &TablePlan) -> Self {
        Self {
            model: model.into(),
            table: plan.table.clone(),
            columns: plan.columns.clone(),
            indexes: plan.indexes.clone(),
            unique_constraints: plan.unique_constraints.clone(),
        }
    }

    /// Whether the snapshot matches a plan.
    ///
    /// A single comparison of the serialized layouts; this is the
    /// steady-state check run for every model on every run.
    pub fn matches(&self, plan: &TablePlan) -> MigrateResult<bool> {
        Ok(self.table == plan.table && self.layout_json()? == plan_layout_json(plan)?)
    }

    /// Serialized layout of the snapshot.
    pub(crate) fn layout_json(&self) -> MigrateResult<String> {
        Ok(serde_json::to_string(&Layout {
            columns: &self.columns,
            indexes: &self.indexes,
            unique_constraints: &self.unique_constraints,
        })?)
    }
}

/// Serialized layout of a plan, comparable with [`AttributeSnapshot::layout_json`].
pub(crate) fn plan_layout_json(plan: &TablePlan) -> MigrateResult<String> {
    Ok(serde_json::to_string(&Layout {
        columns: &plan.columns,
        indexes: &plan.indexes,
        unique_constraints: &plan.unique_constraints,
    })?)
}

/// Reads and writes snapshot files.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Create a store rooted at a directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The snapshot directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a model's snapshot.
    pub fn path_for(&self, model: &str) -> PathBuf {
        self.dir.join(format!("{}.json", model))
    }

    /// Load a model's snapshot, if one exists.
    pub async fn load(&self, model: &str) -> MigrateResult<Option<AttributeSnapshot>> {
        let path = self.path_for(model);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(MigrationError::Io(e)),
        };

        let snapshot: AttributeSnapshot = serde_json::from_str(&content).map_err(|e| {
            MigrationError::other(format!("corrupt snapshot {}: {}", path.display(), e))
        })?;
        Ok(Some(snapshot))
    }

    /// Write a model's snapshot, replacing the previous one.
    ///
    /// The file is written next to its destination and renamed into place.
    pub async fn save(&self, snapshot: &AttributeSnapshot) -> MigrateResult<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(&snapshot.model);
        let tmp = self.dir.join(format!(".{}.json.tmp", snapshot.model));
        let mut content = serde_json::to_string_pretty(snapshot)?;
        content.push('\n');

        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(model = %snapshot.model, path = %path.display(), "saved snapshot");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::presets;
    use keel_schema::AttributeKind;
    use pretty_assertions::assert_eq;

    fn orders() -> TablePlan {
        TablePlan::new("orders")
            .column(presets::id())
            .column(ColumnSpec::new("status", AttributeKind::default_string()))
    }

    #[test]
    fn test_matches_is_order_sensitive() {
        let snapshot = AttributeSnapshot::capture("Order", &orders());
        assert!(snapshot.matches(&orders()).unwrap());

        let reordered = TablePlan::new("orders")
            .column(ColumnSpec::new("status", AttributeKind::default_string()))
            .column(presets::id());
        assert!(!snapshot.matches(&reordered).unwrap());
    }

    #[test]
    fn test_matches_covers_indexes_and_constraints() {
        let snapshot = AttributeSnapshot::capture("Order", &orders());
        let indexed = orders().index(IndexSpec::for_column("orders", "status"));
        assert!(!snapshot.matches(&indexed).unwrap());

        let constrained = orders().unique_together(&["id", "status"]);
        assert!(!snapshot.matches(&constrained).unwrap());
        assert!(AttributeSnapshot::capture("Order", &constrained)
            .matches(&constrained)
            .unwrap());
    }

    #[test]
    fn test_snapshot_without_indexes_still_loads() {
        let json = r#"{"model":"Order","table":"orders","columns":{}}"#;
        let snapshot: AttributeSnapshot = serde_json::from_str(json).unwrap();
        assert!(snapshot.indexes.is_empty());
        assert!(snapshot.unique_constraints.is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("snapshots"));
        assert!(store.load("Order").await.unwrap().is_none());

        let snapshot = AttributeSnapshot::capture(
            "Order",
            &orders().index(IndexSpec::for_column("orders", "status")),
        );
        let path = store.save(&snapshot).await.unwrap();
        assert!(path.ends_with("Order.json"));

        let loaded = store.load("Order").await.unwrap().unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Order.json"), "{ nope").unwrap();
        let store = SnapshotStore::new(dir.path());
        assert!(store.load("Order").await.is_err());
    }
}
