//! The migration ledger.
//!
//! An append-only record of which logical migrations have been generated.
//! It prevents generating the same table twice; it says nothing about
//! whether an artifact was applied to a database.
//!
//! The ledger is loaded once at the start of a run into a [`Ledger`] value
//! and only changes through [`Ledger::record`], which the emitter calls after
//! the store accepted the entry.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{MigrateResult, MigrationError};

/// A recorded migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Artifact name (`1718000000000-create-users-table`).
    pub name: String,
    /// Logical name (`create-users-table`).
    pub logical_name: String,
    /// SHA-256 of the artifact's up script.
    pub checksum: String,
    /// When the entry was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Ordering identifier parsed from the artifact name.
    pub fn id(&self) -> Option<u64> {
        self.name.split('-').next().and_then(|id| id.parse().ok())
    }
}

/// Ledger storage.
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    /// Load every entry, oldest first.
    async fn load(&self) -> MigrateResult<Vec<LedgerEntry>>;

    /// Durably append an entry.
    async fn append(&self, entry: &LedgerEntry) -> MigrateResult<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    entries: Vec<LedgerEntry>,
}

/// A ledger stored as JSON in the migrations directory.
#[derive(Debug, Clone)]
pub struct FileLedgerStore {
    path: PathBuf,
}

impl FileLedgerStore {
    /// Create a store backed by a file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The ledger file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> MigrateResult<LedgerFile> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                MigrationError::other(format!("corrupt ledger {}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LedgerFile::default()),
            Err(e) => Err(MigrationError::Io(e)),
        }
    }
}

#[async_trait::async_trait]
impl LedgerStore for FileLedgerStore {
    async fn load(&self) -> MigrateResult<Vec<LedgerEntry>> {
        Ok(self.read().await?.entries)
    }

    async fn append(&self, entry: &LedgerEntry) -> MigrateResult<()> {
        let mut file = self.read().await?;
        file.entries.push(entry.clone());

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(&file)?;
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Appends a [`MemoryLedgerStore`] rejects.
#[derive(Debug, Default)]
enum Rejection {
    #[default]
    None,
    All,
    Logical(String),
}

/// An in-memory ledger.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    entries: Mutex<Vec<LedgerEntry>>,
    reject: Rejection,
}

impl MemoryLedgerStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose appends always fail.
    pub fn failing() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            reject: Rejection::All,
        }
    }

    /// A store rejecting the entry of one logical migration.
    pub fn failing_for(logical_name: impl Into<String>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            reject: Rejection::Logical(logical_name.into()),
        }
    }

    /// Snapshot of the stored entries.
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.entries.lock().clone()
    }
}

#[async_trait::async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn load(&self) -> MigrateResult<Vec<LedgerEntry>> {
        Ok(self.entries.lock().clone())
    }

    async fn append(&self, entry: &LedgerEntry) -> MigrateResult<()> {
        let rejected = match &self.reject {
            Rejection::None => false,
            Rejection::All => true,
            Rejection::Logical(name) => *name == entry.logical_name,
        };
        if rejected {
            return Err(MigrationError::ledger_write(&entry.name, "ledger store rejected the entry"));
        }
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

/// The ledger of one run.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    /// Build a ledger from stored entries.
    pub fn new(entries: Vec<LedgerEntry>) -> Self {
        Self { entries }
    }

    /// Load a ledger from a store.
    pub async fn load(store: &dyn LedgerStore) -> MigrateResult<Self> {
        Ok(Self::new(store.load().await?))
    }

    /// Whether a logical migration has been recorded.
    ///
    /// Matches an entry whose logical name is `logical`, or whose artifact
    /// name contains it as a whole `-`-separated segment run.
    pub fn contains(&self, logical: &str) -> bool {
        let suffix = format!("-{}", logical);
        let infix = format!("-{}-", logical);
        self.entries.iter().any(|entry| {
            entry.logical_name == logical
                || entry.name == logical
                || entry.name.ends_with(&suffix)
                || entry.name.contains(&infix)
        })
    }

    /// Highest ordering identifier recorded.
    pub fn highest_id(&self) -> Option<u64> {
        self.entries.iter().filter_map(LedgerEntry::id).max()
    }

    /// Record an entry the store has accepted.
    pub fn record(&mut self, entry: LedgerEntry) {
        self.entries.push(entry);
    }

    /// Add artifact names found on disk that the stored ledger lacks.
    ///
    /// Returns how many were adopted.
    pub fn reconcile<I>(&mut self, names: I) -> usize
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut adopted = 0;
        for (name, logical_name) in names {
            if self.entries.iter().any(|e| e.name == name) {
                continue;
            }
            self.entries.push(LedgerEntry {
                name,
                logical_name,
                checksum: String::new(),
                recorded_at: Utc::now(),
            });
            adopted += 1;
        }
        adopted
    }

    /// Every entry, oldest first.
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(name: &str, logical: &str) -> LedgerEntry {
        LedgerEntry {
            name: name.to_string(),
            logical_name: logical.to_string(),
            checksum: "abc".to_string(),
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_contains_matches_segments() {
        let ledger = Ledger::new(vec![
            entry("1700000000000-create-users-table", "create-users-table"),
            entry("1700000000001-create-post_tags-table", "create-post_tags-table"),
        ]);
        assert!(ledger.contains("create-users-table"));
        assert!(ledger.contains("create-post_tags-table"));
        assert!(!ledger.contains("create-tags-table"));
        assert!(!ledger.contains("create-posts-table"));
    }

    #[test]
    fn test_contains_legacy_names_without_logical_name() {
        let ledger = Ledger::new(vec![entry("1700000000000-create-passkeys-table", "")]);
        assert!(ledger.contains("create-passkeys-table"));
    }

    #[test]
    fn test_highest_id() {
        let ledger = Ledger::new(vec![
            entry("1700000000005-create-users-table", "create-users-table"),
            entry("1700000000002-create-posts-table", "create-posts-table"),
        ]);
        assert_eq!(ledger.highest_id(), Some(1_700_000_000_005));
        assert_eq!(Ledger::default().highest_id(), None);
    }

    #[test]
    fn test_reconcile_skips_known_names() {
        let mut ledger = Ledger::new(vec![entry("1-create-users-table", "create-users-table")]);
        let adopted = ledger.reconcile(vec![
            ("1-create-users-table".to_string(), "create-users-table".to_string()),
            ("2-create-posts-table".to_string(), "create-posts-table".to_string()),
        ]);
        assert_eq!(adopted, 1);
        assert!(ledger.contains("create-posts-table"));
    }

    #[tokio::test]
    async fn test_file_store_appends() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLedgerStore::new(dir.path().join("migrations/ledger.json"));
        assert!(store.load().await.unwrap().is_empty());

        store.append(&entry("1-create-users-table", "create-users-table")).await.unwrap();
        store.append(&entry("2-create-posts-table", "create-posts-table")).await.unwrap();

        let ledger = Ledger::load(&store).await.unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.entries()[1].name, "2-create-posts-table");
    }

    #[tokio::test]
    async fn test_failing_memory_store() {
        let store = MemoryLedgerStore::failing();
        let err = store.append(&entry("1-x", "x")).await.unwrap_err();
        assert!(matches!(err, MigrationError::LedgerWriteFailure { .. }));
        assert!(store.entries().is_empty());

        let store = MemoryLedgerStore::failing_for("create-posts-table");
        store.append(&entry("1-create-tags-table", "create-tags-table")).await.unwrap();
        assert!(store.append(&entry("2-create-posts-table", "create-posts-table")).await.is_err());
        assert_eq!(store.entries().len(), 1);
    }
}
