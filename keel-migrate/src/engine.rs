//! The synthesis engine.
//!
//! One run introspects every model, resolves relations across the project,
//! plans and diffs each table, then emits artifacts in dependency order:
//! table creations (companions around their owner), pivot tables, foreign
//! key artifacts where the dialect adds them afterwards, and alterations.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use keel_schema::{Dialect, Introspector, KeelConfig, ModelSet};
use tracing::{debug, info, warn};

use crate::column::TablePlan;
use crate::diff::{DiffEngine, DiffOutcome};
use crate::error::{MigrateResult, MigrationError};
use crate::file::{list_artifacts, ArtifactEmitter, EmitOutcome, MigrationArtifact, StoredArtifact};
use crate::ledger::{FileLedgerStore, Ledger, LedgerEntry, LedgerStore};
use crate::operation::SchemaOperation;
use crate::planner::{ModelPlan, TablePlanner};
use crate::relation::RelationResolver;
use crate::snapshot::{AttributeSnapshot, SnapshotStore};
use crate::traits::{CompanionTable, Placement};

/// Configuration for the synthesis engine.
#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    /// Model description directory.
    pub models_dir: PathBuf,
    /// Migration artifact directory.
    pub migrations_dir: PathBuf,
    /// Attribute snapshot directory.
    pub snapshots_dir: PathBuf,
    /// Ledger file.
    pub ledger_file: PathBuf,
    /// Target dialect.
    pub dialect: Dialect,
    /// Render narrowing changes exactly instead of widening them to text.
    pub allow_narrowing: bool,
    /// Render artifacts without writing anything.
    pub dry_run: bool,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("./models"),
            migrations_dir: PathBuf::from("./migrations"),
            snapshots_dir: PathBuf::from("./.keel/snapshots"),
            ledger_file: PathBuf::from("./migrations/ledger.json"),
            dialect: Dialect::Sqlite,
            allow_narrowing: false,
            dry_run: false,
        }
    }
}

impl SynthesisConfig {
    /// Create a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from `keel.toml`, resolving paths against `root`.
    pub fn from_keel_config(config: &KeelConfig, root: impl AsRef<Path>) -> Self {
        let paths = config.resolve_paths(root);
        Self {
            ledger_file: paths.migrations.join(&config.migrations.ledger),
            models_dir: paths.models,
            migrations_dir: paths.migrations,
            snapshots_dir: paths.snapshots,
            dialect: config.dialect(),
            allow_narrowing: config.migrations.allow_narrowing,
            dry_run: config.migrations.dry_run,
        }
    }

    /// Set the models directory.
    pub fn models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.models_dir = dir.into();
        self
    }

    /// Set the migrations directory. The ledger file moves along with it.
    pub fn migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let ledger_name = self
            .ledger_file
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("ledger.json"));
        self.ledger_file = dir.join(ledger_name);
        self.migrations_dir = dir;
        self
    }

    /// Set the snapshots directory.
    pub fn snapshots_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshots_dir = dir.into();
        self
    }

    /// Set the ledger file.
    pub fn ledger_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ledger_file = path.into();
        self
    }

    /// Set the target dialect.
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Allow narrowing column changes.
    pub fn allow_narrowing(mut self, allow: bool) -> Self {
        self.allow_narrowing = allow;
        self
    }

    /// Enable dry-run mode.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// A model that could not be synthesized.
#[derive(Debug)]
pub struct RunFailure {
    /// Model name.
    pub model: String,
    /// What went wrong.
    pub error: MigrationError,
}

/// Result of a synthesis run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Artifacts written, or rendered in dry-run mode.
    pub written: Vec<MigrationArtifact>,
    /// Logical migrations already recorded in the ledger.
    pub skipped: Vec<String>,
    /// Models whose existing table was adopted without an artifact.
    pub baselined: Vec<String>,
    /// Models without changes.
    pub unchanged: Vec<String>,
    /// Models that failed.
    pub failures: Vec<RunFailure>,
    /// Degraded operations and other notices.
    pub warnings: Vec<String>,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// Total duration in milliseconds.
    pub duration_ms: i64,
}

impl RunReport {
    /// Check if any model failed.
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Check if any artifact was produced.
    pub fn has_changes(&self) -> bool {
        !self.written.is_empty()
    }

    /// Get a summary of the result.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if !self.written.is_empty() {
            let verb = if self.dry_run { "planned" } else { "written" };
            parts.push(format!("{} {}", self.written.len(), verb));
        }
        if !self.skipped.is_empty() {
            parts.push(format!("{} skipped", self.skipped.len()));
        }
        if !self.baselined.is_empty() {
            parts.push(format!("{} baselined", self.baselined.len()));
        }
        if !self.unchanged.is_empty() {
            parts.push(format!("{} unchanged", self.unchanged.len()));
        }
        if !self.failures.is_empty() {
            parts.push(format!("{} failed", self.failures.len()));
        }

        if parts.is_empty() {
            "No models to synthesize".to_string()
        } else {
            format!("{} in {}ms", parts.join(", "), self.duration_ms)
        }
    }

    fn fail(&mut self, model: &str, error: MigrationError) {
        warn!(model, error = %error, "model failed");
        self.failures.push(RunFailure {
            model: model.to_string(),
            error,
        });
    }
}

/// Ledger entries compared with the artifact directories on disk.
#[derive(Debug, Default)]
pub struct SynthesisStatus {
    /// Ledger entries, oldest first.
    pub entries: Vec<LedgerEntry>,
    /// Artifact directories with no ledger entry.
    pub untracked: Vec<StoredArtifact>,
    /// Ledger entries whose directory is gone.
    pub missing: Vec<LedgerEntry>,
}

struct PendingCreate<'p> {
    plan: &'p ModelPlan,
    logical_name: String,
    operations: Vec<SchemaOperation>,
}

struct PendingAlter<'p> {
    plan: &'p ModelPlan,
    logical_name: String,
    operations: Vec<SchemaOperation>,
    warnings: Vec<String>,
}

/// Mutable state of one run.
struct RunState {
    ledger: Ledger,
    emitter: ArtifactEmitter,
    report: RunReport,
    seen: HashSet<String>,
    created: Vec<TablePlan>,
}

impl RunState {
    /// Emit one artifact. Failures are recorded against `model`.
    async fn emit(
        &mut self,
        store: &dyn LedgerStore,
        model: &str,
        operations: &[SchemaOperation],
        logical_name: &str,
    ) -> Option<EmitOutcome> {
        match self
            .emitter
            .emit(operations, logical_name, &mut self.ledger, store)
            .await
        {
            Ok(outcome) => {
                match outcome.artifact() {
                    Some(artifact) => {
                        self.report.warnings.extend(artifact.warnings.iter().cloned());
                        self.report.written.push(artifact.clone());
                    }
                    None => self.report.skipped.push(logical_name.to_string()),
                }
                Some(outcome)
            }
            Err(err) => {
                self.report.fail(model, err);
                None
            }
        }
    }

    /// Emit a companion table once per run.
    async fn emit_companion(&mut self, store: &dyn LedgerStore, model: &str, companion: &CompanionTable) {
        if !self.seen.insert(companion.logical_name.clone()) {
            return;
        }
        let operations = SchemaOperation::create(&companion.table);
        if let Some(outcome) = self
            .emit(store, model, &operations, &companion.logical_name)
            .await
        {
            if outcome.artifact().is_some() {
                self.created.push(companion.table.clone());
            }
        }
    }
}

/// Synthesizes migration artifacts from model descriptions.
pub struct SynthesisEngine<S: LedgerStore = FileLedgerStore> {
    config: SynthesisConfig,
    introspector: Introspector,
    snapshots: SnapshotStore,
    store: S,
}

impl SynthesisEngine<FileLedgerStore> {
    /// Create an engine with a file-backed ledger.
    pub fn new(config: SynthesisConfig) -> Self {
        let store = FileLedgerStore::new(&config.ledger_file);
        Self::with_store(config, store)
    }
}

impl<S: LedgerStore> SynthesisEngine<S> {
    /// Create an engine with a custom ledger store.
    pub fn with_store(config: SynthesisConfig, store: S) -> Self {
        Self {
            snapshots: SnapshotStore::new(&config.snapshots_dir),
            introspector: Introspector::new(),
            config,
            store,
        }
    }

    /// The engine configuration.
    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// The ledger store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Synthesize migrations for every model.
    pub async fn run(&self) -> MigrateResult<RunReport> {
        let introspection = self.introspector.load_all(&self.config.models_dir)?;
        let mut report = RunReport::default();
        for failure in introspection.failures {
            report.fail(&failure.model, MigrationError::Schema(failure.error));
        }
        self.synthesize(&introspection.models, None, report).await
    }

    /// Synthesize migrations for one model file.
    ///
    /// The rest of the models directory is still loaded so relations
    /// resolve against the whole project.
    pub async fn run_model(&self, path: impl AsRef<Path>) -> MigrateResult<RunReport> {
        let model = self.introspector.load(path.as_ref())?;

        let mut models = match self.introspector.load_all(&self.config.models_dir) {
            Ok(result) => {
                for failure in &result.failures {
                    debug!(model = %failure.model, "ignoring unrelated model failure");
                }
                result.models
            }
            Err(err) => {
                debug!(error = %err, "models directory unavailable, using the single model");
                ModelSet::new()
            }
        };
        if !models.contains(&model.name) {
            models.insert(model.clone());
        }

        self.synthesize(&models, Some(model.name()), RunReport::default())
            .await
    }

    /// Compare the ledger with the artifact directories on disk.
    pub async fn status(&self) -> MigrateResult<SynthesisStatus> {
        let ledger = Ledger::load(&self.store).await?;
        let on_disk = list_artifacts(&self.config.migrations_dir).await?;

        let untracked = on_disk
            .iter()
            .filter(|a| !ledger.entries().iter().any(|e| e.name == a.name))
            .cloned()
            .collect();
        let missing = ledger
            .entries()
            .iter()
            .filter(|e| !on_disk.iter().any(|a| a.name == e.name))
            .cloned()
            .collect();

        Ok(SynthesisStatus {
            entries: ledger.entries().to_vec(),
            untracked,
            missing,
        })
    }

    async fn synthesize(
        &self,
        models: &ModelSet,
        only: Option<&str>,
        mut report: RunReport,
    ) -> MigrateResult<RunReport> {
        let start = Instant::now();
        let dialect = self.config.dialect;
        report.dry_run = self.config.dry_run;

        // Resolution failures abort before anything is written.
        let graph = RelationResolver::new(models).resolve()?;
        let planner = TablePlanner::new(&graph, dialect);

        let mut plans = Vec::new();
        let mut failed_tables: HashSet<String> = HashSet::new();
        for model in models.iter() {
            if only.is_some_and(|name| name != model.name()) {
                continue;
            }
            match planner.plan(model) {
                Ok(plan) => plans.push(plan),
                Err(err) => {
                    failed_tables.insert(model.table.to_string());
                    report.fail(model.name(), err);
                }
            }
        }

        let mut ledger = Ledger::load(&self.store).await?;
        let on_disk = list_artifacts(&self.config.migrations_dir).await?;
        let adopted = ledger.reconcile(on_disk.into_iter().map(|a| (a.name, a.logical_name)));
        if adopted > 0 {
            info!(adopted, "adopted artifacts missing from the ledger");
        }

        let differ = DiffEngine::new(dialect, self.config.allow_narrowing);
        let mut creates = Vec::new();
        let mut alters = Vec::new();

        for plan in &plans {
            let snapshot = match self.snapshots.load(&plan.model).await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    report.fail(&plan.model, err);
                    continue;
                }
            };

            let outcome = match differ.diff(&plan.model, &plan.table, snapshot.as_ref(), &ledger) {
                Ok(outcome) => outcome,
                Err(err) => {
                    report.fail(&plan.model, err);
                    continue;
                }
            };

            match outcome {
                DiffOutcome::Create {
                    logical_name,
                    operations,
                } => creates.push(PendingCreate {
                    plan,
                    logical_name,
                    operations,
                }),
                DiffOutcome::Alter {
                    logical_name,
                    operations,
                    warnings,
                } => alters.push(PendingAlter {
                    plan,
                    logical_name,
                    operations,
                    warnings,
                }),
                DiffOutcome::NoOp => report.unchanged.push(plan.model.clone()),
                DiffOutcome::Reordered { columns } => {
                    report.warnings.push(format!(
                        "column order of {} changed ({}); reordering is not applied",
                        plan.table.table,
                        columns.join(", ")
                    ));
                    self.save_snapshot(plan, &mut report).await;
                    report.unchanged.push(plan.model.clone());
                }
                DiffOutcome::Baseline => {
                    report.warnings.push(format!(
                        "{} has no snapshot but `create-{}-table` is recorded; adopting the current model",
                        plan.model, plan.table.table
                    ));
                    self.save_snapshot(plan, &mut report).await;
                    report.baselined.push(plan.model.clone());
                }
            }
        }

        let emitter = ArtifactEmitter::new(&self.config.migrations_dir, dialect, &ledger)
            .dry_run(self.config.dry_run);
        let mut state = RunState {
            ledger,
            emitter,
            report,
            seen: HashSet::new(),
            created: Vec::new(),
        };
        let store: &dyn LedgerStore = &self.store;

        // Table creations, referenced tables first.
        let mut owners: HashSet<&str> = HashSet::new();
        for index in creation_order(&creates) {
            let pending = &creates[index];
            let plan = pending.plan;
            owners.insert(plan.model.as_str());

            for companion in plan.companions.iter().filter(|c| c.placement == Placement::BeforeOwner) {
                state.emit_companion(store, &plan.model, companion).await;
            }

            match state
                .emit(store, &plan.model, &pending.operations, &pending.logical_name)
                .await
            {
                Some(outcome) => {
                    if outcome.artifact().is_some() {
                        state.created.push(plan.table.clone());
                        self.save_snapshot(plan, &mut state.report).await;
                    }
                }
                // Nothing may reference a table that was not written.
                None => {
                    failed_tables.insert(plan.table.table.clone());
                }
            }

            for companion in plan.companions.iter().filter(|c| c.placement == Placement::AfterOwner) {
                state.emit_companion(store, &plan.model, companion).await;
            }
        }

        // Companions of tables that already exist, e.g. a trait added later.
        for plan in plans.iter().filter(|p| !owners.contains(p.model.as_str())) {
            for companion in &plan.companions {
                state.emit_companion(store, &plan.model, companion).await;
            }
        }

        let owner_table = only.and_then(|name| models.get(name)).map(|m| m.table.to_string());
        for pivot in graph.pivots() {
            if failed_tables.contains(&pivot.first_table) || failed_tables.contains(&pivot.second_table) {
                warn!(pivot = %pivot.table, "skipping pivot of a failed model");
                continue;
            }
            if let Some(table) = &owner_table {
                if &pivot.first_table != table && &pivot.second_table != table {
                    continue;
                }
            }
            let table = pivot.table_plan();
            if let Some(outcome) = state
                .emit(
                    store,
                    &pivot.declared_by,
                    &SchemaOperation::create(&table),
                    &pivot.logical_name(),
                )
                .await
            {
                if outcome.artifact().is_some() {
                    state.created.push(table);
                }
            }
        }

        if !dialect.inline_foreign_keys() {
            let created = std::mem::take(&mut state.created);
            for table in &created {
                let operations: Vec<SchemaOperation> = table
                    .foreign_keys()
                    .filter_map(|column| {
                        let target = column.references.as_ref()?;
                        if failed_tables.contains(&target.table) {
                            warn!(table = %table.table, column = %column.name, "skipping foreign key to a failed table");
                            return None;
                        }
                        Some(SchemaOperation::AddForeignKey {
                            table: table.table.clone(),
                            column: column.name.clone(),
                            references: target.clone(),
                        })
                    })
                    .collect();
                if operations.is_empty() {
                    continue;
                }
                let model = table.model.clone().unwrap_or_else(|| table.table.clone());
                let logical_name = format!("alter-{}-table-foreign-keys", table.table);
                state.emit(store, &model, &operations, &logical_name).await;
            }
        }

        for pending in &alters {
            state.report.warnings.extend(pending.warnings.iter().cloned());
            if state
                .emit(store, &pending.plan.model, &pending.operations, &pending.logical_name)
                .await
                .is_some()
            {
                // Also refreshed when skipped: the ledger already has this transition.
                self.save_snapshot(pending.plan, &mut state.report).await;
            }
        }

        let mut report = state.report;
        report.duration_ms = start.elapsed().as_millis() as i64;
        info!(summary = %report.summary(), "synthesis finished");
        Ok(report)
    }

    async fn save_snapshot(&self, plan: &ModelPlan, report: &mut RunReport) {
        if self.config.dry_run {
            return;
        }
        let snapshot = AttributeSnapshot::capture(&plan.model, &plan.table);
        if let Err(err) = self.snapshots.save(&snapshot).await {
            report.fail(&plan.model, err);
        }
    }
}

/// Stable dependency order of pending creations.
///
/// A table comes after the tables it references when they are created in the
/// same run. Otherwise directory order is kept; cycles fall back to it.
fn creation_order(creates: &[PendingCreate<'_>]) -> Vec<usize> {
    let tables: Vec<&str> = creates.iter().map(|c| c.plan.table.table.as_str()).collect();
    let mut done = vec![false; creates.len()];
    let mut order = Vec::with_capacity(creates.len());

    while order.len() < creates.len() {
        let ready = (0..creates.len()).find(|&i| {
            !done[i]
                && creates[i]
                    .plan
                    .table
                    .referenced_tables()
                    .iter()
                    .all(|target| match tables.iter().position(|t| t == target) {
                        Some(j) => done[j],
                        None => true,
                    })
        });
        let Some(next) = ready.or_else(|| (0..creates.len()).find(|&i| !done[i])) else {
            break;
        };
        done[next] = true;
        order.push(next);
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedgerStore;
    use pretty_assertions::assert_eq;

    fn write_model(dir: &Path, name: &str, json: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(format!("{}.json", name)), json).unwrap();
    }

    fn engine(root: &Path, dialect: Dialect) -> SynthesisEngine<MemoryLedgerStore> {
        let config = SynthesisConfig::new()
            .models_dir(root.join("models"))
            .migrations_dir(root.join("migrations"))
            .snapshots_dir(root.join("snapshots"))
            .dialect(dialect);
        SynthesisEngine::with_store(config, MemoryLedgerStore::new())
    }

    fn names(report: &RunReport) -> Vec<String> {
        report.written.iter().map(|a| a.logical_name.clone()).collect()
    }

    #[test]
    fn test_config_from_keel_config() {
        let config = KeelConfig::from_str(
            r#"
            [database]
            dialect = "postgresql"

            [migrations]
            allow_narrowing = true
            "#,
        )
        .unwrap();
        let synthesis = SynthesisConfig::from_keel_config(&config, "/project");
        assert_eq!(synthesis.dialect, Dialect::Postgres);
        assert!(synthesis.allow_narrowing);
        assert_eq!(synthesis.ledger_file, PathBuf::from("/project/./migrations/ledger.json"));
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let models = dir.path().join("models");
        write_model(
            &models,
            "Order",
            r#"{"name":"Order","attributes":{"status":{"type":"string"},"total":{"type":"number"}}}"#,
        );

        let engine = engine(dir.path(), Dialect::Sqlite);
        let first = engine.run().await.unwrap();
        assert_eq!(names(&first), vec!["create-orders-table"]);

        let second = engine.run().await.unwrap();
        assert!(second.written.is_empty());
        assert_eq!(second.unchanged, vec!["Order".to_string()]);
        assert_eq!(engine.store().entries().len(), 1);
    }

    #[tokio::test]
    async fn test_attribute_added_emits_alter() {
        let dir = tempfile::tempdir().unwrap();
        let models = dir.path().join("models");
        write_model(&models, "Order", r#"{"name":"Order","attributes":{"status":{"type":"string"}}}"#);

        let engine = engine(dir.path(), Dialect::Sqlite);
        engine.run().await.unwrap();

        write_model(
            &models,
            "Order",
            r#"{"name":"Order","attributes":{"status":{"type":"string"},"total":{"type":"number"}}}"#,
        );
        let report = engine.run().await.unwrap();
        assert_eq!(report.written.len(), 1);
        let artifact = &report.written[0];
        assert!(artifact.logical_name.starts_with("alter-orders-table-"));
        assert!(artifact.up_sql.contains("ALTER TABLE \"orders\" ADD COLUMN \"total\" integer;"));
    }

    #[tokio::test]
    async fn test_referenced_tables_are_created_first() {
        let dir = tempfile::tempdir().unwrap();
        let models = dir.path().join("models");
        write_model(&models, "Comment", r#"{"name":"Comment","attributes":{"body":{"type":"text"}}}"#);
        write_model(
            &models,
            "Post",
            r#"{"name":"Post","hasMany":["Comment"],"belongsToMany":["Tag"]}"#,
        );
        write_model(&models, "Tag", r#"{"name":"Tag"}"#);

        let report = engine(dir.path(), Dialect::Postgres).run().await.unwrap();
        assert_eq!(
            names(&report),
            vec![
                "create-posts-table",
                "create-comments-table",
                "create-tags-table",
                "create-post_tags-table",
                "alter-comments-table-foreign-keys",
                "alter-post_tags-table-foreign-keys",
            ]
        );
        let ids: Vec<u64> = report.written.iter().map(|a| a.id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_unresolved_relation_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let models = dir.path().join("models");
        write_model(&models, "Post", r#"{"name":"Post","belongsToMany":["Tag"]}"#);

        let engine = engine(dir.path(), Dialect::Sqlite);
        let err = engine.run().await.unwrap_err();
        assert!(matches!(err, MigrationError::UnresolvedRelation { .. }));
        assert!(!dir.path().join("migrations").exists());
        assert!(engine.store().entries().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_leaves_no_trace() {
        let dir = tempfile::tempdir().unwrap();
        write_model(&dir.path().join("models"), "Order", r#"{"name":"Order"}"#);

        let config = SynthesisConfig::new()
            .models_dir(dir.path().join("models"))
            .migrations_dir(dir.path().join("migrations"))
            .snapshots_dir(dir.path().join("snapshots"))
            .dry_run(true);
        let engine = SynthesisEngine::with_store(config, MemoryLedgerStore::new());
        let report = engine.run().await.unwrap();

        assert_eq!(report.written.len(), 1);
        assert!(report.summary().starts_with("1 planned"));
        assert!(!dir.path().join("migrations").exists());
        assert!(!dir.path().join("snapshots").exists());
    }

    #[tokio::test]
    async fn test_status_reports_untracked_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let stray = dir.path().join("migrations/5-create-notes-table");
        std::fs::create_dir_all(&stray).unwrap();
        std::fs::write(stray.join("up.sql"), "CREATE TABLE notes();").unwrap();

        let status = engine(dir.path(), Dialect::Sqlite).status().await.unwrap();
        assert!(status.entries.is_empty());
        assert_eq!(status.untracked.len(), 1);
        assert_eq!(status.untracked[0].logical_name, "create-notes-table");
    }

    #[tokio::test]
    async fn test_pivot_skipped_when_owner_create_fails() {
        let dir = tempfile::tempdir().unwrap();
        let models = dir.path().join("models");
        write_model(&models, "Post", r#"{"name":"Post","belongsToMany":["Tag"]}"#);
        write_model(&models, "Tag", r#"{"name":"Tag"}"#);

        let config = SynthesisConfig::new()
            .models_dir(&models)
            .migrations_dir(dir.path().join("migrations"))
            .snapshots_dir(dir.path().join("snapshots"));
        let engine =
            SynthesisEngine::with_store(config, MemoryLedgerStore::failing_for("create-posts-table"));
        let report = engine.run().await.unwrap();

        assert_eq!(names(&report), vec!["create-tags-table"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].model, "Post");
        assert!(!report.skipped.contains(&"create-post_tags-table".to_string()));
        assert!(engine
            .store()
            .entries()
            .iter()
            .all(|e| e.logical_name != "create-post_tags-table"));
    }

    #[tokio::test]
    async fn test_added_index_emits_create_index() {
        let dir = tempfile::tempdir().unwrap();
        let models = dir.path().join("models");
        write_model(&models, "Order", r#"{"name":"Order","attributes":{"status":"string"}}"#);

        let engine = engine(dir.path(), Dialect::Postgres);
        engine.run().await.unwrap();

        write_model(
            &models,
            "Order",
            r#"{"name":"Order","attributes":{"status":"string"},
                "indexes":[{"name":"orders_status_index","columns":["status"]}]}"#,
        );
        let report = engine.run().await.unwrap();
        assert_eq!(report.written.len(), 1);
        assert!(report.written[0].logical_name.starts_with("alter-orders-table-"));
        assert_eq!(
            report.written[0].up_sql,
            "CREATE INDEX \"orders_status_index\" ON \"orders\" (\"status\");\n"
        );

        let third = engine.run().await.unwrap();
        assert!(third.written.is_empty());
        assert_eq!(third.unchanged, vec!["Order".to_string()]);
    }

    #[tokio::test]
    async fn test_sqlite_nullability_change_rebuilds_table() {
        let dir = tempfile::tempdir().unwrap();
        let models = dir.path().join("models");
        write_model(&models, "Order", r#"{"name":"Order","attributes":{"status":"string"}}"#);

        let engine = engine(dir.path(), Dialect::Sqlite);
        engine.run().await.unwrap();

        write_model(
            &models,
            "Order",
            r#"{"name":"Order","attributes":{"status":{"type":"string","required":true}}}"#,
        );
        let report = engine.run().await.unwrap();
        assert_eq!(report.written.len(), 1);
        let up = &report.written[0].up_sql;
        assert!(up.contains("\"status\" varchar(255) NOT NULL"));
        assert!(up.contains("INSERT INTO \"orders_rebuild\""));
        assert!(up.contains("ALTER TABLE \"orders_rebuild\" RENAME TO \"orders\";"));
        assert!(up
            .lines()
            .filter(|line| !line.trim().is_empty())
            .all(|line| !line.starts_with("--")));

        assert!(engine.run().await.unwrap().written.is_empty());
    }
}
