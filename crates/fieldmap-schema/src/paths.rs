//! Schema directory path resolution.

use std::path::PathBuf;

/// Environment variable for overriding the schema directory.
pub const SCHEMA_DIR_ENV_VAR: &str = "FIELDMAP_SCHEMA_DIR";

/// Get the schema root directory.
///
/// Resolution order:
/// 1. `FIELDMAP_SCHEMA_DIR` environment variable
/// 2. `schemas/` directory relative to workspace root
pub fn schema_root() -> PathBuf {
    if let Ok(root) = std::env::var(SCHEMA_DIR_ENV_VAR) {
        return PathBuf::from(root);
    }
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../schemas")
}
