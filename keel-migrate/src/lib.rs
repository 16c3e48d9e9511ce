//! # keel-migrate
//!
//! Migration synthesis for Keel.
//!
//! This crate provides functionality for:
//! - Relation resolution across the whole models directory (foreign keys, pivot tables)
//! - Trait expansion (timestamps, soft deletes, companions such as `passkeys`)
//! - Diffing a planned table against its last attribute snapshot
//! - SQL rendering for SQLite, MySQL and PostgreSQL
//! - Migration artifact writing and the append-only migration ledger
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────┐
//! │ Model files  │────▶│ Relation graph │────▶│ Table planner│
//! └──────────────┘     └────────────────┘     └──────────────┘
//!                                                    │
//!                                                    ▼
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────┐
//! │ Ledger       │◀────│ Artifact writer│◀────│ Diff engine  │◀── snapshots
//! └──────────────┘     └────────────────┘     └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use keel_migrate::{SynthesisConfig, SynthesisEngine};
//! use keel_schema::Dialect;
//!
//! async fn synthesize() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SynthesisConfig::new()
//!         .models_dir("./models")
//!         .migrations_dir("./migrations")
//!         .dialect(Dialect::Postgres);
//!
//!     let report = SynthesisEngine::new(config).run().await?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Migration artifacts
//!
//! Each artifact is a directory named `{id}-{logical name}`:
//!
//! ```text
//! migrations/
//! ├── 1718000000000-create-users-table/
//! │   ├── up.sql
//! │   └── down.sql
//! ├── 1718000000001-create-post_tags-table/
//! │   ├── up.sql
//! │   └── down.sql
//! └── ledger.json
//! ```
//!
//! A logical name already present in the ledger is never generated again.

pub mod column;
pub mod diff;
pub mod engine;
pub mod error;
pub mod file;
pub mod ledger;
pub mod operation;
pub mod planner;
pub mod relation;
pub mod snapshot;
pub mod sql;
pub mod traits;

pub use column::{ColumnSpec, ForeignKeyRef, IndexSpec, ReferentialAction, TablePlan, UniqueConstraint};
pub use diff::{ColumnDiff, DiffEngine, DiffOutcome, IndexDiff};
pub use engine::{RunFailure, RunReport, SynthesisConfig, SynthesisEngine, SynthesisStatus};
pub use error::{MigrateResult, MigrationError};
pub use file::{
    compute_checksum, list_artifacts, parse_artifact_name, ArtifactEmitter, EmitOutcome,
    MigrationArtifact, MigrationClock, StoredArtifact,
};
pub use ledger::{FileLedgerStore, Ledger, LedgerEntry, LedgerStore, MemoryLedgerStore};
pub use operation::{ColumnAlteration, ColumnChange, SchemaOperation};
pub use planner::{ModelPlan, TablePlanner};
pub use relation::{PivotPlan, RelationGraph, RelationPlan, RelationResolver};
pub use snapshot::{AttributeSnapshot, SnapshotStore};
pub use sql::{renderer_for, MigrationSql, MySqlRenderer, PostgresRenderer, SqlRenderer, SqliteRenderer};
pub use traits::{CompanionTable, Placement, TraitPlan, TraitResolver};
