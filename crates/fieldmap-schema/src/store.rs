//! Process-wide cache of loaded schemas and alias tables.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use fieldmap_model::{AliasTable, EntitySchema};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::document::{AliasDocument, DocumentFormat, SchemaDocument, build_aliases, build_schema};
use crate::error::{Result, SchemaError};
use crate::paths::schema_root;

const SCHEMA_MARKER: &str = ".schema.";
const ALIAS_MARKER: &str = ".aliases.";

#[derive(Debug)]
struct Entry {
    schema: Arc<EntitySchema>,
    aliases: Arc<AliasTable>,
}

#[derive(Debug, Default)]
struct Snapshot {
    entries: BTreeMap<String, Entry>,
    fingerprint: String,
}

/// Loaded target schemas and their alias tables.
///
/// Readers get `Arc` handles, so a reload never disturbs a mapping run that
/// already holds a schema. A failed reload leaves the previous snapshot in
/// place.
#[derive(Debug)]
pub struct SchemaStore {
    source_dir: Option<PathBuf>,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl SchemaStore {
    /// Load every `<id>.schema.{toml,json}` document in `dir`, with its
    /// optional `<id>.aliases.{toml,json}` sibling.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let snapshot = load_snapshot(&dir)?;
        Ok(Self {
            source_dir: Some(dir),
            snapshot: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// Load from [`schema_root`].
    pub fn load_default() -> Result<Self> {
        Self::load_dir(schema_root())
    }

    /// Build a store from in-memory documents. Such a store has nothing to
    /// reload from.
    pub fn from_documents<I>(documents: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, SchemaDocument, Option<AliasDocument>)>,
    {
        let mut entries = BTreeMap::new();
        for (id, schema_doc, alias_doc) in documents {
            if entries.contains_key(&id) {
                return Err(SchemaError::DuplicateSchema {
                    path: PathBuf::from(&id),
                    schema: id,
                });
            }
            let entry = build_entry(&id, schema_doc, alias_doc)?;
            entries.insert(id, entry);
        }
        Ok(Self {
            source_dir: None,
            snapshot: RwLock::new(Arc::new(Snapshot {
                entries,
                fingerprint: String::new(),
            })),
        })
    }

    /// Schema by id.
    pub fn get_schema(&self, id: &str) -> Result<Arc<EntitySchema>> {
        self.current()
            .entries
            .get(id)
            .map(|entry| Arc::clone(&entry.schema))
            .ok_or_else(|| SchemaError::SchemaNotFound { id: id.to_string() })
    }

    /// Alias table by schema id. Schemas without an alias document get an
    /// empty table.
    pub fn get_aliases(&self, id: &str) -> Result<Arc<AliasTable>> {
        self.current()
            .entries
            .get(id)
            .map(|entry| Arc::clone(&entry.aliases))
            .ok_or_else(|| SchemaError::SchemaNotFound { id: id.to_string() })
    }

    /// Loaded schema ids, sorted.
    pub fn schema_ids(&self) -> Vec<String> {
        self.current().entries.keys().cloned().collect()
    }

    pub fn source_dir(&self) -> Option<&Path> {
        self.source_dir.as_deref()
    }

    /// SHA-256 over the documents the current snapshot was loaded from.
    /// Empty for in-memory stores.
    pub fn fingerprint(&self) -> String {
        self.current().fingerprint.clone()
    }

    /// Re-read the source directory and swap in the new snapshot.
    pub fn reload(&self) -> Result<()> {
        let Some(dir) = &self.source_dir else {
            return Ok(());
        };
        match load_snapshot(dir) {
            Ok(snapshot) => {
                self.replace(snapshot);
                Ok(())
            }
            Err(err) => {
                warn!(
                    dir = %dir.display(),
                    error = %err,
                    "schema reload failed, keeping previous snapshot"
                );
                Err(err)
            }
        }
    }

    /// Reload only when the documents on disk changed since the last load.
    /// Returns whether a reload happened.
    pub fn refresh_if_stale(&self) -> Result<bool> {
        let Some(dir) = &self.source_dir else {
            return Ok(false);
        };
        let files = read_documents(dir)?;
        if fingerprint(&files) == self.current().fingerprint {
            debug!(dir = %dir.display(), "schema documents unchanged");
            return Ok(false);
        }
        self.reload()?;
        Ok(true)
    }

    fn current(&self) -> Arc<Snapshot> {
        let guard = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    fn replace(&self, snapshot: Snapshot) {
        let mut guard = self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(snapshot);
    }
}

/// A document file found in the schema directory.
struct DocumentFile {
    path: PathBuf,
    id: String,
    kind: DocumentKind,
    format: DocumentFormat,
    text: String,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DocumentKind {
    Schema,
    Aliases,
}

fn load_snapshot(dir: &Path) -> Result<Snapshot> {
    let files = read_documents(dir)?;
    let fingerprint = fingerprint(&files);

    let mut schemas: BTreeMap<String, (&DocumentFile, SchemaDocument)> = BTreeMap::new();
    let mut aliases: BTreeMap<String, (&DocumentFile, AliasDocument)> = BTreeMap::new();
    for file in &files {
        match file.kind {
            DocumentKind::Schema => {
                let doc: SchemaDocument = file.format.parse(&file.path, &file.text)?;
                if schemas.insert(file.id.clone(), (file, doc)).is_some() {
                    return Err(SchemaError::DuplicateSchema {
                        schema: file.id.clone(),
                        path: file.path.clone(),
                    });
                }
            }
            DocumentKind::Aliases => {
                let doc: AliasDocument = file.format.parse(&file.path, &file.text)?;
                if aliases.insert(file.id.clone(), (file, doc)).is_some() {
                    return Err(SchemaError::DuplicateSchema {
                        schema: file.id.clone(),
                        path: file.path.clone(),
                    });
                }
            }
        }
    }

    if let Some((id, (file, _))) = aliases.iter().find(|(id, _)| !schemas.contains_key(*id)) {
        return Err(SchemaError::OrphanAliases {
            schema: id.clone(),
            path: file.path.clone(),
        });
    }

    let mut entries = BTreeMap::new();
    for (id, (_, schema_doc)) in schemas {
        let alias_doc = aliases.remove(&id).map(|(_, doc)| doc);
        let entry = build_entry(&id, schema_doc, alias_doc)?;
        entries.insert(id, entry);
    }

    info!(
        dir = %dir.display(),
        schemas = entries.len(),
        fingerprint = &fingerprint[..12],
        "loaded schemas"
    );
    Ok(Snapshot {
        entries,
        fingerprint,
    })
}

fn build_entry(
    id: &str,
    schema_doc: SchemaDocument,
    alias_doc: Option<AliasDocument>,
) -> Result<Entry> {
    let schema = build_schema(id, schema_doc)?;
    let aliases = match alias_doc {
        Some(doc) => build_aliases(&schema, doc)?,
        None => AliasTable::new(),
    };
    debug!(
        schema = id,
        version = schema.version(),
        fields = schema.len(),
        aliases = aliases.len(),
        "built schema"
    );
    Ok(Entry {
        schema: Arc::new(schema),
        aliases: Arc::new(aliases),
    })
}

/// Read every schema/alias document in `dir`, sorted by file name.
fn read_documents(dir: &Path) -> Result<Vec<DocumentFile>> {
    if !dir.is_dir() {
        return Err(SchemaError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| SchemaError::Io { path, source }
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err(dir))? {
        let path = entry.map_err(io_err(dir))?.path();
        if !path.is_file() {
            continue;
        }
        let Some((id, kind, format)) = classify(&path) else {
            continue;
        };
        let text = fs::read_to_string(&path).map_err(io_err(&path))?;
        files.push(DocumentFile {
            path,
            id,
            kind,
            format,
            text,
        });
    }
    files.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    Ok(files)
}

/// Split `candidate.schema.toml` into `("candidate", Schema, Toml)`.
fn classify(path: &Path) -> Option<(String, DocumentKind, DocumentFormat)> {
    let name = path.file_name()?.to_str()?;
    let (stem, ext) = name.rsplit_once('.')?;
    let format = DocumentFormat::from_extension(ext)?;
    let with_dot = format!("{stem}.");
    let (id, kind) = if let Some(id) = with_dot.strip_suffix(SCHEMA_MARKER) {
        (id, DocumentKind::Schema)
    } else if let Some(id) = with_dot.strip_suffix(ALIAS_MARKER) {
        (id, DocumentKind::Aliases)
    } else {
        return None;
    };
    if id.is_empty() {
        return None;
    }
    Some((id.to_string(), kind, format))
}

fn fingerprint(files: &[DocumentFile]) -> String {
    let mut hasher = Sha256::new();
    for file in files {
        if let Some(name) = file.path.file_name() {
            hasher.update(name.to_string_lossy().as_bytes());
        }
        hasher.update([0u8]);
        hasher.update(file.text.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}
