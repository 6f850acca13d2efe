//! Error types for schema and alias loading.

use std::path::PathBuf;

use fieldmap_model::AliasConflict;
use thiserror::Error;

/// Errors raised while loading or looking up target schemas.
///
/// Everything except [`SchemaError::SchemaNotFound`] is a configuration
/// error: it is raised at load time and is not recoverable per request.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SchemaError {
    /// No schema is loaded under the requested id.
    #[error("schema not found: {id}")]
    SchemaNotFound { id: String },

    /// Schema directory does not exist.
    #[error("schema directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML document {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to parse JSON document {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Two documents define the same schema (e.g. both TOML and JSON).
    #[error("schema '{schema}' is defined more than once ({path})")]
    DuplicateSchema { schema: String, path: PathBuf },

    /// An alias document has no matching schema document.
    #[error("alias document {path} has no schema '{schema}'")]
    OrphanAliases { schema: String, path: PathBuf },

    #[error("schema '{schema}' declares no fields")]
    EmptySchema { schema: String },

    #[error("schema '{schema}' has an empty field name at position {index}")]
    EmptyFieldName { schema: String, index: usize },

    /// Field names are compared case-insensitively.
    #[error("schema '{schema}' declares field '{field}' more than once")]
    DuplicateField { schema: String, field: String },

    /// An alias table entry names a field the schema does not declare.
    #[error("alias table for '{schema}' targets unknown field '{target}'")]
    UnknownAliasTarget { schema: String, target: String },

    #[error("alias table for '{schema}' has an empty alias under '{target}'")]
    EmptyAlias { schema: String, target: String },

    #[error("alias table for '{schema}' is inconsistent: {source}")]
    AliasConflict {
        schema: String,
        #[source]
        source: AliasConflict,
    },
}

/// Result type for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
