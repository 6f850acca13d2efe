//! Tiered resolution of source column names onto target schema fields.
//!
//! Tiers run cheapest first and a column stops as soon as it has a candidate
//! at or above the auto-accept threshold:
//!
//! 1. **Exact / alias**: normalized-name and alias-table lookup
//! 2. **Fuzzy**: Jaro-Winkler over names and aliases
//! 3. **Semantic**: cosine similarity of embeddings from an
//!    [`EmbeddingProvider`]
//! 4. **Reasoning**: batched calls to a [`ReasoningProvider`] across a pool of
//!    quota-limited credentials
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use fieldmap_match::MappingEngine;
//! use fieldmap_model::MappingRequest;
//! use fieldmap_schema::SchemaStore;
//!
//! let store = Arc::new(SchemaStore::load_dir("schemas")?);
//! let engine = MappingEngine::builder(store).build()?;
//! let run = engine.map(&MappingRequest::new("candidate", ["PersonID", "WorkEmails"]))?;
//! for result in &run.results {
//!     println!("{} -> {:?}", result.source_name, result.accepted_field());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod deadline;
pub mod engine;
pub mod error;
pub mod exact;
pub mod fuzzy;
pub mod reasoning;
pub mod semantic;
pub mod text;
pub mod tier;

pub use config::{EngineConfig, ReasoningConfig};
pub use engine::{MappingEngine, MappingEngineBuilder};
pub use error::{EngineBuildError, MappingError, ProviderError};
pub use reasoning::{
    Clock, Credential, CredentialPool, CredentialState, CredentialStatus, ReasoningCache,
    ReasoningItem, ReasoningProvider, ReasoningSuggestion, SchemaSummary, SystemClock,
};
pub use semantic::{EmbeddingProvider, SourceVectorMemo, TargetVectorCache, TargetVectors};
