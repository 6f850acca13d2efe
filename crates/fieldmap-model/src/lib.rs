//! Data model for mapping tabular source columns onto a target entity schema.
//!
//! This crate provides:
//!
//! - **Schema types**: [`FieldDefinition`], [`EntitySchema`] and [`AliasTable`]
//! - **Name normalization**: [`NormalizedName`], the canonical token form every
//!   matching tier compares against
//! - **Match output**: [`CandidateMatch`], [`MappingResult`], [`MappingRun`] and
//!   the run-level [`MappingStats`]
//! - **Requests**: [`MappingRequest`] as consumed from upload/validation callers
//!
//! Loading schemas from disk lives in `fieldmap-schema`; the matching tiers and
//! the orchestrator live in `fieldmap-match`.

#![deny(unsafe_code)]

pub mod candidate;
pub mod confidence;
pub mod error;
pub mod names;
pub mod request;
pub mod run;
pub mod schema;

pub use candidate::{CandidateMatch, MatchMethod};
pub use confidence::{ConfidenceLevel, ConfidenceThresholds};
pub use error::{AliasConflict, RequestError};
pub use names::{NormalizedName, compact_key};
pub use request::MappingRequest;
pub use run::{MappingResult, MappingRun, MappingStats, TierDegradation};
pub use schema::{AliasTable, EntitySchema, FieldDataType, FieldDefinition};
