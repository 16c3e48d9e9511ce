//! End-to-end synthesis tests.
//!
//! Each test lays out a models directory in a temporary project, runs the
//! engine against it and inspects the artifacts, ledger and snapshots it
//! leaves behind.

use std::fs;
use std::path::{Path, PathBuf};

use keel::migrate::{MemoryLedgerStore, SynthesisConfig, SynthesisEngine};
use keel::schema::Dialect;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

struct Project {
    dir: TempDir,
}

impl Project {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("models")).unwrap();
        Self { dir }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn model(&self, name: &str, json: &str) -> PathBuf {
        let path = self.root().join("models").join(format!("{}.json", name));
        fs::write(&path, json).unwrap();
        path
    }

    fn config(&self, dialect: Dialect) -> SynthesisConfig {
        SynthesisConfig::new()
            .models_dir(self.root().join("models"))
            .migrations_dir(self.root().join("migrations"))
            .snapshots_dir(self.root().join(".keel/snapshots"))
            .dialect(dialect)
    }

    fn engine(&self, dialect: Dialect) -> SynthesisEngine {
        SynthesisEngine::new(self.config(dialect))
    }

    fn artifacts(&self) -> Vec<String> {
        let dir = self.root().join("migrations");
        if !dir.exists() {
            return Vec::new();
        }
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn up_sql(&self, logical_name: &str) -> String {
        let suffix = format!("-{}", logical_name);
        let name = self
            .artifacts()
            .into_iter()
            .find(|n| n.ends_with(&suffix))
            .unwrap_or_else(|| panic!("no artifact for {}", logical_name));
        fs::read_to_string(self.root().join("migrations").join(name).join("up.sql")).unwrap()
    }
}

const ORDER: &str = r#"{
  "name": "Order",
  "attributes": {
    "status": { "type": "string" },
    "total": { "type": "number" }
  }
}"#;

#[tokio::test]
async fn test_new_model_creates_table() {
    let project = Project::new();
    project.model("Order", ORDER);

    let report = project.engine(Dialect::Sqlite).run().await.unwrap();
    assert_eq!(report.written.len(), 1);
    assert_eq!(report.written[0].logical_name, "create-orders-table");

    assert_eq!(
        project.up_sql("create-orders-table"),
        "CREATE TABLE \"orders\" (\n    \
         \"id\" integer PRIMARY KEY AUTOINCREMENT,\n    \
         \"status\" varchar(255),\n    \
         \"total\" integer,\n    \
         \"created_at\" timestamp NOT NULL DEFAULT CURRENT_TIMESTAMP,\n    \
         \"updated_at\" timestamp\n\
         );\n"
    );
    assert!(project.root().join(".keel/snapshots/Order.json").exists());
    assert!(project.root().join("migrations/ledger.json").exists());
}

#[tokio::test]
async fn test_added_attribute_alters_table() {
    let project = Project::new();
    project.model("Order", r#"{"name":"Order","attributes":{"status":"string"}}"#);
    project.engine(Dialect::Sqlite).run().await.unwrap();

    project.model("Order", ORDER);
    let report = project.engine(Dialect::Sqlite).run().await.unwrap();

    assert_eq!(report.written.len(), 1);
    let artifact = &report.written[0];
    assert!(artifact.logical_name.starts_with("alter-orders-table-"));
    assert_eq!(
        artifact.up_sql,
        "ALTER TABLE \"orders\" ADD COLUMN \"total\" integer;\n"
    );
    assert_eq!(artifact.down_sql, "ALTER TABLE \"orders\" DROP COLUMN \"total\";\n");
}

#[tokio::test]
async fn test_belongs_to_many_creates_one_pivot() {
    let project = Project::new();
    project.model("Post", r#"{"name":"Post","belongsToMany":["Tag"]}"#);
    project.model("Tag", r#"{"name":"Tag","belongsToMany":["Post"]}"#);

    let report = project.engine(Dialect::Sqlite).run().await.unwrap();
    let pivots: Vec<_> = report
        .written
        .iter()
        .filter(|a| a.logical_name == "create-post_tags-table")
        .collect();
    assert_eq!(pivots.len(), 1);

    let up = project.up_sql("create-post_tags-table");
    assert!(up.contains("\"post_id\" integer NOT NULL REFERENCES \"posts\"(\"id\") ON DELETE CASCADE"));
    assert!(up.contains("\"tag_id\" integer NOT NULL REFERENCES \"tags\"(\"id\") ON DELETE CASCADE"));
}

#[tokio::test]
async fn test_rerun_is_idempotent_on_every_dialect() {
    for dialect in Dialect::ALL {
        let project = Project::new();
        project.model("User", r#"{"name":"User","hasMany":["Post"],"traits":{"billable":true}}"#);
        project.model("Post", r#"{"name":"Post","belongsToMany":["Tag"]}"#);
        project.model("Tag", r#"{"name":"Tag"}"#);

        let first = project.engine(dialect).run().await.unwrap();
        assert!(first.has_changes(), "{} produced nothing", dialect);
        assert!(!first.has_failures());
        let written = project.artifacts();

        let second = project.engine(dialect).run().await.unwrap();
        assert!(second.written.is_empty(), "{} wrote again", dialect);
        assert_eq!(project.artifacts(), written);
    }
}

#[tokio::test]
async fn test_foreign_keys_follow_referenced_tables() {
    for dialect in [Dialect::MySql, Dialect::Postgres] {
        let project = Project::new();
        project.model("Comment", r#"{"name":"Comment","attributes":{"body":"text"}}"#);
        project.model("Post", r#"{"name":"Post","hasMany":["Comment"]}"#);

        let report = project.engine(dialect).run().await.unwrap();
        let position = |name: &str| {
            report
                .written
                .iter()
                .position(|a| a.logical_name == name)
                .unwrap_or_else(|| panic!("{} missing on {}", name, dialect))
        };

        let fk = position("alter-comments-table-foreign-keys");
        assert!(position("create-posts-table") < fk);
        assert!(position("create-comments-table") < fk);
        assert!(report.written[fk].up_sql.contains("FOREIGN KEY"));
        assert!(!report.written[position("create-comments-table")].up_sql.contains("REFERENCES"));
    }
}

#[tokio::test]
async fn test_sqlite_foreign_keys_are_inline() {
    let project = Project::new();
    project.model("Comment", r#"{"name":"Comment"}"#);
    project.model("Post", r#"{"name":"Post","hasMany":["Comment"]}"#);

    let report = project.engine(Dialect::Sqlite).run().await.unwrap();
    let names: Vec<&str> = report.written.iter().map(|a| a.logical_name.as_str()).collect();
    assert_eq!(names, vec!["create-posts-table", "create-comments-table"]);
    assert!(project
        .up_sql("create-comments-table")
        .contains("\"post_id\" integer REFERENCES \"posts\"(\"id\") ON DELETE CASCADE"));
}

#[tokio::test]
async fn test_subscriptions_precede_users() {
    let project = Project::new();
    project.model("User", r#"{"name":"User","traits":{"billable":true}}"#);

    let report = project.engine(Dialect::Postgres).run().await.unwrap();
    let names: Vec<&str> = report.written.iter().map(|a| a.logical_name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "create-subscriptions-table",
            "create-users-table",
            "alter-subscriptions-table-foreign-keys",
        ]
    );
}

#[tokio::test]
async fn test_missing_snapshot_with_ledger_entry_baselines() {
    let project = Project::new();
    project.model("Order", ORDER);
    project.engine(Dialect::Sqlite).run().await.unwrap();

    fs::remove_dir_all(project.root().join(".keel/snapshots")).unwrap();
    let report = project.engine(Dialect::Sqlite).run().await.unwrap();

    assert!(report.written.is_empty());
    assert_eq!(report.baselined, vec!["Order".to_string()]);
    assert!(project.root().join(".keel/snapshots/Order.json").exists());
}

#[tokio::test]
async fn test_single_model_run_leaves_others_alone() {
    let project = Project::new();
    let order = project.model("Order", ORDER);
    project.model("Invoice", r#"{"name":"Invoice"}"#);

    let report = project.engine(Dialect::Sqlite).run_model(&order).await.unwrap();
    assert_eq!(report.written.len(), 1);
    assert_eq!(report.written[0].logical_name, "create-orders-table");
    assert!(!project.root().join(".keel/snapshots/Invoice.json").exists());
}

#[tokio::test]
async fn test_invalid_model_does_not_block_others() {
    let project = Project::new();
    project.model("Order", ORDER);
    project.model("Broken", r#"{"name":"Broken","attributes":[1,2,3]}"#);

    let report = project.engine(Dialect::Sqlite).run().await.unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].model, "Broken");
    assert_eq!(report.written.len(), 1);
}

#[tokio::test]
async fn test_ledger_failure_leaves_no_artifact() {
    let project = Project::new();
    project.model("Order", ORDER);

    let engine = SynthesisEngine::with_store(project.config(Dialect::Sqlite), MemoryLedgerStore::failing());
    let report = engine.run().await.unwrap();

    assert!(report.written.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert!(project.artifacts().is_empty());
    assert!(!project.root().join(".keel/snapshots/Order.json").exists());
}

#[tokio::test]
async fn test_removed_artifact_is_not_regenerated() {
    let project = Project::new();
    project.model("Order", ORDER);
    project.engine(Dialect::Sqlite).run().await.unwrap();

    // The ledger, not the directory, decides what has been generated.
    let name = project.artifacts().remove(0);
    fs::remove_dir_all(project.root().join("migrations").join(&name)).unwrap();
    fs::remove_dir_all(project.root().join(".keel/snapshots")).unwrap();

    let report = project.engine(Dialect::Sqlite).run().await.unwrap();
    assert!(report.written.is_empty());

    let status = project.engine(Dialect::Sqlite).status().await.unwrap();
    assert_eq!(status.entries.len(), 1);
    assert_eq!(status.missing.len(), 1);
}
