//! Vector caches for the semantic tier.
//!
//! Target-field vectors are keyed by `(model_id, schema_version)`, so a
//! schema whose descriptions change gets fresh vectors without any explicit
//! invalidation. Source-column vectors are memoized per run unless a
//! long-lived memo is injected.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use fieldmap_model::EntitySchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Vectors for every field of one schema version, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetVectors {
    pub model_id: String,
    pub schema_id: String,
    pub schema_version: String,
    pub fields: Vec<String>,
    pub vectors: Vec<Vec<f32>>,
}

impl TargetVectors {
    pub fn vector(&self, field: &str) -> Option<&[f32]> {
        self.fields
            .iter()
            .position(|f| f == field)
            .and_then(|idx| self.vectors.get(idx))
            .map(Vec::as_slice)
    }

    /// Field names paired with their vectors.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.fields
            .iter()
            .map(String::as_str)
            .zip(self.vectors.iter().map(Vec::as_slice))
    }

    /// True when these vectors were computed for exactly this schema.
    pub fn covers(&self, schema: &EntitySchema) -> bool {
        self.schema_version == schema.version()
            && self.vectors.len() == self.fields.len()
            && self.fields.len() == schema.len()
            && self
                .fields
                .iter()
                .zip(schema.fields())
                .all(|(name, field)| *name == field.name)
    }
}

type TargetKey = (String, String);

/// Process-wide cache of target-field vectors with optional persistence.
#[derive(Debug, Default)]
pub struct TargetVectorCache {
    entries: RwLock<HashMap<TargetKey, Arc<TargetVectors>>>,
    persist_dir: Option<PathBuf>,
}

impl TargetVectorCache {
    /// In-memory cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache that also writes one JSON document per `(model, schema version)`
    /// to `dir` and reads it back on a memory miss.
    pub fn with_persist_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            entries: RwLock::default(),
            persist_dir: Some(dir.into()),
        }
    }

    pub fn persist_dir(&self) -> Option<&Path> {
        self.persist_dir.as_deref()
    }

    /// Cached vectors for `schema` under `model_id`, from memory or disk.
    pub fn get(&self, model_id: &str, schema: &EntitySchema) -> Option<Arc<TargetVectors>> {
        let key = (model_id.to_string(), schema.version().to_string());
        if let Some(found) = self.read().get(&key) {
            return Some(Arc::clone(found));
        }
        let loaded = self.load_persisted(model_id, schema)?;
        let loaded = Arc::new(loaded);
        self.write().insert(key, Arc::clone(&loaded));
        Some(loaded)
    }

    /// Store freshly computed vectors; persistence failures are logged only.
    pub fn insert(&self, vectors: TargetVectors) -> Arc<TargetVectors> {
        if let Some(dir) = &self.persist_dir {
            persist(dir, &vectors);
        }
        let key = (vectors.model_id.clone(), vectors.schema_version.clone());
        let vectors = Arc::new(vectors);
        self.write().insert(key, Arc::clone(&vectors));
        vectors
    }

    /// Single vector lookup, memory only.
    pub fn vector(&self, model_id: &str, schema_version: &str, field: &str) -> Option<Vec<f32>> {
        let key = (model_id.to_string(), schema_version.to_string());
        self.read()
            .get(&key)
            .and_then(|entry| entry.vector(field).map(<[f32]>::to_vec))
    }

    /// Drop every entry for `schema_version`, in memory and on disk.
    /// Returns the number of in-memory entries removed.
    pub fn invalidate(&self, schema_version: &str) -> usize {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|(_, version), _| version != schema_version);
        let removed = before - entries.len();
        drop(entries);

        if let Some(dir) = &self.persist_dir
            && let Ok(listing) = fs::read_dir(dir)
        {
            let suffix = format!("__{schema_version}.json");
            for entry in listing.flatten() {
                let path = entry.path();
                let matches = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.ends_with(&suffix));
                if matches && let Err(err) = fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %err, "failed to remove cached vectors");
                }
            }
        }
        debug!(schema_version, removed, "invalidated target vectors");
        removed
    }

    /// Drop every in-memory entry.
    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn load_persisted(&self, model_id: &str, schema: &EntitySchema) -> Option<TargetVectors> {
        let dir = self.persist_dir.as_ref()?;
        let path = persisted_path(dir, model_id, schema.version());
        let text = fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<TargetVectors>(&text) {
            Ok(vectors) if vectors.model_id == model_id && vectors.covers(schema) => {
                debug!(path = %path.display(), "loaded persisted target vectors");
                Some(vectors)
            }
            Ok(_) => {
                warn!(
                    path = %path.display(),
                    "persisted target vectors do not match schema, ignoring"
                );
                None
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "unreadable persisted target vectors, ignoring"
                );
                None
            }
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<TargetKey, Arc<TargetVectors>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<TargetKey, Arc<TargetVectors>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn persisted_path(dir: &Path, model_id: &str, schema_version: &str) -> PathBuf {
    let model: String = model_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    dir.join(format!("{model}__{schema_version}.json"))
}

fn persist(dir: &Path, vectors: &TargetVectors) {
    let path = persisted_path(dir, &vectors.model_id, &vectors.schema_version);
    let result = fs::create_dir_all(dir)
        .map_err(|e| e.to_string())
        .and_then(|()| serde_json::to_string(vectors).map_err(|e| e.to_string()))
        .and_then(|json| fs::write(&path, json).map_err(|e| e.to_string()));
    match result {
        Ok(()) => debug!(path = %path.display(), "persisted target vectors"),
        Err(err) => warn!(path = %path.display(), error = %err, "failed to persist target vectors"),
    }
}

/// Source-column vectors keyed by `(model_id, source text)`.
#[derive(Debug, Default)]
pub struct SourceVectorMemo {
    entries: Mutex<HashMap<(String, String), Arc<Vec<f32>>>>,
}

impl SourceVectorMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, model_id: &str, text: &str) -> Option<Arc<Vec<f32>>> {
        self.lock()
            .get(&(model_id.to_string(), text.to_string()))
            .cloned()
    }

    pub fn insert(&self, model_id: &str, text: &str, vector: Vec<f32>) -> Arc<Vec<f32>> {
        let vector = Arc::new(vector);
        self.lock()
            .insert((model_id.to_string(), text.to_string()), Arc::clone(&vector));
        vector
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), Arc<Vec<f32>>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
