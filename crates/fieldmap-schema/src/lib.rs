//! Target schema store for fieldmap.
//!
//! Loads one schema document and an optional alias document per entity from
//! a directory, validates them eagerly and serves read-only handles:
//!
//! ```text
//! schemas/
//! ├── candidate.schema.toml    # fields of the "candidate" entity
//! ├── candidate.aliases.toml   # TARGET_FIELD = ["alias", ...]
//! └── employee.schema.json
//! ```
//!
//! Any inconsistency (unknown alias target, an alias under two fields,
//! duplicate field names) fails the load instead of surfacing per request.

#![deny(unsafe_code)]

pub mod document;
pub mod error;
pub mod paths;
pub mod store;

pub use document::{AliasDocument, DocumentFormat, SchemaDocument};
pub use error::{Result, SchemaError};
pub use paths::{SCHEMA_DIR_ENV_VAR, schema_root};
pub use store::SchemaStore;
