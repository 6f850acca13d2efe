//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use fieldmap_model::ConfidenceThresholds;
use serde::{Deserialize, Serialize};

use crate::error::EngineBuildError;

/// Tunables for [`MappingEngine`](crate::MappingEngine).
///
/// Every field has a default, so a partial `[engine]` table is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum confidence for a mapping to skip later tiers and be reported
    /// without `needs_review`. Requests may override it.
    pub auto_accept_threshold: f32,
    /// Confidence assigned to alias hits.
    pub alias_confidence: f32,
    /// Fuzzy scores below this are not emitted.
    pub fuzzy_floor: f32,
    /// Semantic similarities below this are not emitted.
    pub semantic_floor: f32,
    /// Runner-up candidates kept per column.
    pub max_alternatives: usize,
    /// Sample values per column used for embedding and reasoning.
    pub sample_limit: usize,
    /// Sample values are truncated to this many characters.
    pub sample_max_chars: usize,
    /// Size of the per-column worker pool.
    pub worker_threads: usize,
    pub embedding_timeout_ms: u64,
    /// Keep source-column vectors across runs instead of per run.
    pub cache_source_vectors: bool,
    /// Directory for persisted target-field vectors.
    pub vector_cache_dir: Option<PathBuf>,
    /// Boundaries for reported confidence levels.
    pub confidence: ConfidenceThresholds,
    pub reasoning: ReasoningConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_accept_threshold: 0.85,
            alias_confidence: 0.95,
            fuzzy_floor: 0.5,
            semantic_floor: 0.55,
            max_alternatives: 2,
            sample_limit: 5,
            sample_max_chars: 64,
            worker_threads: 4,
            embedding_timeout_ms: 10_000,
            cache_source_vectors: false,
            vector_cache_dir: None,
            confidence: ConfidenceThresholds::default(),
            reasoning: ReasoningConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_millis(self.embedding_timeout_ms)
    }

    /// Check ranges; called when the engine is built.
    pub fn validate(&self) -> Result<(), EngineBuildError> {
        for (name, value) in [
            ("auto_accept_threshold", self.auto_accept_threshold),
            ("alias_confidence", self.alias_confidence),
            ("fuzzy_floor", self.fuzzy_floor),
            ("semantic_floor", self.semantic_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineBuildError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.worker_threads == 0 {
            return Err(EngineBuildError::InvalidConfig(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        if self.reasoning.batch_size == 0 {
            return Err(EngineBuildError::InvalidConfig(
                "reasoning.batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for the external reasoning tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    pub enabled: bool,
    /// Columns per external call.
    pub batch_size: usize,
    /// Existing candidates sent along with each column.
    pub candidate_limit: usize,
    pub timeout_ms: u64,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: 10,
            candidate_limit: 3,
            timeout_ms: 30_000,
        }
    }
}

impl ReasoningConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
