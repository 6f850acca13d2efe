use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use fieldmap_model::CandidateMatch;

/// Reasoning answers keyed by `(schema_id, compact source name)`.
///
/// Shared across runs; a hit skips the external call entirely.
#[derive(Debug, Default)]
pub struct ReasoningCache {
    entries: RwLock<HashMap<(String, String), Vec<CandidateMatch>>>,
}

impl ReasoningCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, schema_id: &str, source_key: &str) -> Option<Vec<CandidateMatch>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(schema_id.to_string(), source_key.to_string()))
            .cloned()
    }

    pub fn insert(&self, schema_id: &str, source_key: &str, candidates: Vec<CandidateMatch>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((schema_id.to_string(), source_key.to_string()), candidates);
    }

    /// Drop every answer for one schema, e.g. after its fields changed.
    pub fn invalidate_schema(&self, schema_id: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(id, _), _| id != schema_id);
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
