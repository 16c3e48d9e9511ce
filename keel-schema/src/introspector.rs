//! Model introspection.
//!
//! The [`Introspector`] loads every model file of a directory into a
//! [`ModelSet`]. A malformed model aborts only itself: the failure is
//! recorded and the remaining files are still loaded.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use smol_str::SmolStr;
use tracing::{debug, info, warn};

use crate::ast::ModelDescription;
use crate::cache::ModelCache;
use crate::error::{SchemaError, SchemaResult};
use crate::parser::ModelFormat;

/// An ordered, name-indexed set of model descriptions.
#[derive(Debug, Clone, Default)]
pub struct ModelSet {
    models: IndexMap<SmolStr, Arc<ModelDescription>>,
}

impl ModelSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a model. A model with the same name is replaced in place.
    pub fn insert(&mut self, model: Arc<ModelDescription>) {
        self.models.insert(model.name.clone(), model);
    }

    /// Get a model by name.
    pub fn get(&self, name: &str) -> Option<&Arc<ModelDescription>> {
        self.models.get(name)
    }

    /// Get a model by table name.
    pub fn by_table(&self, table: &str) -> Option<&Arc<ModelDescription>> {
        self.models.values().find(|m| m.table == table)
    }

    /// Check if a model is present.
    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Iterate in load order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ModelDescription>> {
        self.models.values()
    }

    /// Model names in load order.
    pub fn names(&self) -> Vec<&str> {
        self.models.keys().map(|k| k.as_str()).collect()
    }

    /// Number of models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl FromIterator<ModelDescription> for ModelSet {
    fn from_iter<I: IntoIterator<Item = ModelDescription>>(iter: I) -> Self {
        let mut set = Self::new();
        for model in iter {
            set.insert(Arc::new(model));
        }
        set
    }
}

/// A model file that could not be loaded.
#[derive(Debug)]
pub struct ModelFailure {
    /// Model name (from the file stem when the file could not be parsed).
    pub model: String,
    /// Path of the model file.
    pub path: PathBuf,
    /// Why loading failed.
    pub error: SchemaError,
}

/// Result of loading a models directory.
#[derive(Debug, Default)]
pub struct IntrospectionResult {
    /// Successfully loaded models, in directory order.
    pub models: ModelSet,
    /// Models that failed to load.
    pub failures: Vec<ModelFailure>,
}

impl IntrospectionResult {
    /// Check whether a model name failed to load.
    pub fn failed(&self, name: &str) -> Option<&ModelFailure> {
        self.failures.iter().find(|f| f.model == name)
    }
}

/// Loads model descriptions, caching them by resolved path.
#[derive(Debug, Default)]
pub struct Introspector {
    cache: ModelCache,
}

impl Introspector {
    /// Create an introspector with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load one model file.
    pub fn load(&self, path: impl AsRef<Path>) -> SchemaResult<Arc<ModelDescription>> {
        self.cache.get_or_load(path)
    }

    /// Load every model file of a directory, in file name order.
    ///
    /// Only a missing or unreadable directory is an error; individual model
    /// failures are collected in the result.
    pub fn load_all(&self, dir: impl AsRef<Path>) -> SchemaResult<IntrospectionResult> {
        let dir = dir.as_ref();
        let mut result = IntrospectionResult::default();

        for path in model_files(dir)? {
            match self.load(&path) {
                Ok(model) => {
                    if let Some(existing) = result.models.get(&model.name) {
                        let message = format!(
                            "model name `{}` is already declared by {}",
                            model.name,
                            existing
                                .source
                                .as_deref()
                                .map(|p| p.display().to_string())
                                .unwrap_or_default()
                        );
                        result.failures.push(ModelFailure {
                            model: model.name.to_string(),
                            path,
                            error: SchemaError::invalid_model(model.name.as_str(), message),
                        });
                        continue;
                    }
                    debug!(model = %model.name, path = %path.display(), "loaded model");
                    result.models.insert(model);
                }
                Err(error) => {
                    let model = error
                        .model()
                        .map(str::to_string)
                        .unwrap_or_else(|| file_stem(&path));
                    warn!(model = %model, error = %error, "failed to load model");
                    result.failures.push(ModelFailure { model, path, error });
                }
            }
        }

        info!(
            loaded = result.models.len(),
            failed = result.failures.len(),
            dir = %dir.display(),
            "introspected models"
        );
        Ok(result)
    }

    /// Locate the file of a model by name inside a directory.
    pub fn find_model_file(dir: impl AsRef<Path>, name: &str) -> Option<PathBuf> {
        ["json", "toml"]
            .iter()
            .map(|ext| dir.as_ref().join(format!("{}.{}", name, ext)))
            .find(|p| p.is_file())
    }

    /// The underlying cache.
    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }
}

/// Model files of a directory, sorted by file name.
pub fn model_files(dir: &Path) -> SchemaResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| SchemaError::IoError {
        path: dir.display().to_string(),
        source: e,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && ModelFormat::from_path(path).is_some())
        .collect();
    paths.sort();
    Ok(paths)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}
