//! Wiring configuration into a ready [`MappingEngine`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use fieldmap_match::{CredentialPool, MappingEngine};
use fieldmap_model::MappingRequest;
use fieldmap_schema::{SchemaStore, schema_root};
use tracing::info;

use crate::config::FieldmapConfig;

/// Schema directory: the explicit override, then the config file, then the
/// default location.
pub fn schema_dir(config: &FieldmapConfig, override_dir: Option<&Path>) -> PathBuf {
    override_dir
        .map(Path::to_path_buf)
        .or_else(|| config.schema_dir.clone())
        .unwrap_or_else(schema_root)
}

pub fn load_store(dir: &Path) -> Result<SchemaStore> {
    let store = SchemaStore::load_dir(dir)
        .with_context(|| format!("load schemas from {}", dir.display()))?;
    info!(dir = %dir.display(), schemas = store.schema_ids().len(), "schemas loaded");
    Ok(store)
}

/// Build the engine with the providers named in `config`, reading API keys
/// through `lookup`.
pub fn build_engine_with<F>(
    config: &FieldmapConfig,
    store: SchemaStore,
    lookup: F,
) -> Result<MappingEngine>
where
    F: Fn(&str) -> Option<String>,
{
    let mut builder = MappingEngine::builder(Arc::new(store)).config(config.engine.clone());
    if let Some(embedder) = config
        .providers
        .build_embedder_with(&lookup)
        .context("configure embedding provider")?
    {
        builder = builder.embedding_provider(embedder);
    }
    if let Some(setup) = config
        .providers
        .build_reasoner_with(&lookup)
        .context("configure reasoning provider")?
    {
        let pool = Arc::new(CredentialPool::new(setup.credentials));
        builder = builder.reasoning_provider(setup.provider, pool);
    }
    builder.build().context("build mapping engine")
}

/// Build the engine, reading API keys from the process environment.
pub fn build_engine(config: &FieldmapConfig, store: SchemaStore) -> Result<MappingEngine> {
    build_engine_with(config, store, |var| std::env::var(var).ok())
}

/// Read a JSON mapping request.
pub fn read_request(path: &Path) -> Result<MappingRequest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read request {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse request {}", path.display()))
}
