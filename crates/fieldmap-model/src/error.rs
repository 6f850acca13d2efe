//! Error types for model construction and request validation.

use thiserror::Error;

/// An alias was registered under a second target field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("alias '{alias}' is registered for both '{existing_target}' and '{new_target}'")]
pub struct AliasConflict {
    /// The alias as written in the second registration.
    pub alias: String,
    /// Target field that already owns the alias.
    pub existing_target: String,
    /// Target field the alias was being added to.
    pub new_target: String,
}

/// A mapping request that cannot be processed as submitted.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum RequestError {
    /// The request lists no source columns.
    #[error("request has no source columns")]
    NoColumns,

    /// The request does not name a target schema.
    #[error("request has no target schema id")]
    MissingSchemaId,

    /// The auto-accept threshold is outside `[0, 1]` or not a number.
    #[error("auto-accept threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f32),
}
