//! The `fieldmap.toml` configuration file.
//!
//! ```toml
//! schema_dir = "schemas"
//!
//! [engine]
//! auto_accept_threshold = 0.85
//!
//! [engine.reasoning]
//! batch_size = 10
//!
//! [providers.embedding]
//! kind = "hashed"
//! ```
//!
//! Every table is optional. Relative paths are resolved against the
//! directory holding the file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fieldmap_match::EngineConfig;
use fieldmap_providers::ProvidersConfig;
use serde::{Deserialize, Serialize};

/// Name looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "fieldmap.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldmapConfig {
    /// Directory of schema and alias documents.
    pub schema_dir: Option<PathBuf>,
    pub engine: EngineConfig,
    pub providers: ProvidersConfig,
}

impl FieldmapConfig {
    /// Parse a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let mut config: Self =
            toml::from_str(&text).with_context(|| format!("parse config {}", path.display()))?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Load `path` if given, else `fieldmap.toml` in the working directory
    /// if present, else defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        let fallback = Path::new(DEFAULT_CONFIG_FILE);
        if fallback.is_file() {
            return Self::load(fallback);
        }
        Ok(Self::default())
    }

    fn resolve_paths(&mut self, base: &Path) {
        if let Some(dir) = self.schema_dir.take() {
            self.schema_dir = Some(rebase(base, dir));
        }
        if let Some(dir) = self.engine.vector_cache_dir.take() {
            self.engine.vector_cache_dir = Some(rebase(base, dir));
        }
    }
}

fn rebase(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_relative() {
        base.join(path)
    } else {
        path
    }
}
