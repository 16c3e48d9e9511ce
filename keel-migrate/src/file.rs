//! Migration artifact emission.

use std::path::{Path, PathBuf};

use chrono::Utc;
use keel_schema::Dialect;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{MigrateResult, MigrationError};
use crate::ledger::{Ledger, LedgerEntry, LedgerStore};
use crate::operation::SchemaOperation;
use crate::sql::{renderer_for, SqlRenderer};

/// Strictly increasing millisecond identifiers.
///
/// Two artifacts emitted within the same millisecond still get distinct,
/// ordered identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationClock {
    last: u64,
}

impl MigrationClock {
    /// A clock that never issues an identifier at or below `last`.
    pub fn new(last: Option<u64>) -> Self {
        Self {
            last: last.unwrap_or(0),
        }
    }

    /// The next identifier.
    pub fn next(&mut self) -> u64 {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        self.next_at(now)
    }

    fn next_at(&mut self, now: u64) -> u64 {
        self.last = now.max(self.last + 1);
        self.last
    }
}

/// A rendered migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationArtifact {
    /// Ordering identifier.
    pub id: u64,
    /// Artifact name, `{id}-{logical_name}`.
    pub name: String,
    /// Logical name, e.g. `create-users-table`.
    pub logical_name: String,
    /// Artifact directory.
    pub path: PathBuf,
    /// Apply script.
    pub up_sql: String,
    /// Revert script, possibly empty.
    pub down_sql: String,
    /// SHA-256 of the apply script.
    pub checksum: String,
    /// Operations degraded while rendering.
    pub warnings: Vec<String>,
}

/// The result of an emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitOutcome {
    /// The artifact was written and recorded.
    Written(MigrationArtifact),
    /// The artifact was rendered but not written (dry run).
    Planned(MigrationArtifact),
    /// The logical migration is already recorded, or rendered to nothing.
    Skipped,
}

impl EmitOutcome {
    /// The artifact, if one was rendered.
    pub fn artifact(&self) -> Option<&MigrationArtifact> {
        match self {
            Self::Written(artifact) | Self::Planned(artifact) => Some(artifact),
            Self::Skipped => None,
        }
    }
}

/// Renders operations and writes them as migration artifacts.
pub struct ArtifactEmitter {
    migrations_dir: PathBuf,
    renderer: Box<dyn SqlRenderer>,
    clock: MigrationClock,
    dry_run: bool,
}

impl ArtifactEmitter {
    /// Create an emitter whose clock continues after the ledger's entries.
    pub fn new(migrations_dir: impl Into<PathBuf>, dialect: Dialect, ledger: &Ledger) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
            renderer: renderer_for(dialect),
            clock: MigrationClock::new(ledger.highest_id()),
            dry_run: false,
        }
    }

    /// Render without writing anything.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The migrations directory.
    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Emit one logical migration.
    ///
    /// Skips when the ledger already has it. Otherwise the artifact is
    /// written, then appended to the store, then recorded in `ledger`. If the
    /// store rejects the entry the artifact is removed again.
    pub async fn emit(
        &mut self,
        operations: &[SchemaOperation],
        logical_name: &str,
        ledger: &mut Ledger,
        store: &dyn LedgerStore,
    ) -> MigrateResult<EmitOutcome> {
        if ledger.contains(logical_name) {
            debug!(logical_name, "already recorded, skipping");
            return Ok(EmitOutcome::Skipped);
        }

        let sql = self.renderer.render(operations);
        if sql.is_empty() {
            debug!(logical_name, "rendered nothing, skipping");
            return Ok(EmitOutcome::Skipped);
        }

        let id = self.clock.next();
        let name = format!("{}-{}", id, logical_name);
        let artifact = MigrationArtifact {
            id,
            path: self.migrations_dir.join(&name),
            name,
            logical_name: logical_name.to_string(),
            checksum: compute_checksum(&sql.up),
            up_sql: sql.up,
            down_sql: sql.down,
            warnings: sql.warnings,
        };

        if self.dry_run {
            debug!(name = %artifact.name, "dry run, not writing");
            return Ok(EmitOutcome::Planned(artifact));
        }

        self.write(&artifact).await?;

        let entry = LedgerEntry {
            name: artifact.name.clone(),
            logical_name: artifact.logical_name.clone(),
            checksum: artifact.checksum.clone(),
            recorded_at: Utc::now(),
        };
        if let Err(err) = store.append(&entry).await {
            tokio::fs::remove_dir_all(&artifact.path).await.ok();
            return Err(match err {
                err @ MigrationError::LedgerWriteFailure { .. } => err,
                other => MigrationError::ledger_write(&artifact.name, other.to_string()),
            });
        }
        ledger.record(entry);

        info!(name = %artifact.name, path = %artifact.path.display(), "wrote migration");
        Ok(EmitOutcome::Written(artifact))
    }

    /// Write the artifact into a temporary directory and rename it into place.
    async fn write(&self, artifact: &MigrationArtifact) -> MigrateResult<()> {
        tokio::fs::create_dir_all(&self.migrations_dir).await?;

        let tmp = self.migrations_dir.join(format!(".{}.tmp", artifact.name));
        if tmp.exists() {
            tokio::fs::remove_dir_all(&tmp).await?;
        }
        tokio::fs::create_dir(&tmp).await?;

        let written = async {
            tokio::fs::write(tmp.join("up.sql"), &artifact.up_sql).await?;
            if !artifact.down_sql.trim().is_empty() {
                tokio::fs::write(tmp.join("down.sql"), &artifact.down_sql).await?;
            }
            tokio::fs::rename(&tmp, &artifact.path).await
        }
        .await;

        if let Err(err) = written {
            tokio::fs::remove_dir_all(&tmp).await.ok();
            return Err(MigrationError::Io(err));
        }
        Ok(())
    }
}

/// An artifact directory found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    /// Ordering identifier.
    pub id: u64,
    /// Directory name.
    pub name: String,
    /// Logical name.
    pub logical_name: String,
    /// Directory path.
    pub path: PathBuf,
}

/// List artifact directories, ordered by identifier.
///
/// Directories without an `up.sql` or with a name that is not
/// `{id}-{create|alter}-...` are ignored.
pub async fn list_artifacts(migrations_dir: &Path) -> MigrateResult<Vec<StoredArtifact>> {
    let mut artifacts = Vec::new();

    let mut entries = match tokio::fs::read_dir(migrations_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(artifacts),
        Err(e) => return Err(MigrationError::Io(e)),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.is_dir() || !path.join("up.sql").exists() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        match parse_artifact_name(name) {
            Ok((id, logical_name)) => artifacts.push(StoredArtifact {
                id,
                name: name.to_string(),
                logical_name,
                path: path.clone(),
            }),
            Err(err) => debug!(path = %path.display(), "ignoring directory: {}", err),
        }
    }

    artifacts.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.name.cmp(&b.name)));
    Ok(artifacts)
}

/// Parse an artifact name into its identifier and logical name.
pub fn parse_artifact_name(name: &str) -> MigrateResult<(u64, String)> {
    let (id, logical) = name.split_once('-').ok_or_else(|| {
        MigrationError::InvalidMigration(format!("Invalid migration name format: {}", name))
    })?;

    let id: u64 = id
        .parse()
        .map_err(|_| MigrationError::InvalidMigration(format!("Invalid migration ID: {}", id)))?;

    let known = (logical.starts_with("create-") || logical.starts_with("alter-"))
        && (logical.ends_with("-table") || logical.contains("-table-"));
    if !known {
        return Err(MigrationError::InvalidMigration(format!(
            "Invalid migration name format: {}",
            name
        )));
    }

    Ok((id, logical.to_string()))
}

/// Compute a checksum for migration content.
pub fn compute_checksum(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}
