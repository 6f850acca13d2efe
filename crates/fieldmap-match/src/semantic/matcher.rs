use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use fieldmap_model::{CandidateMatch, EntitySchema, MatchMethod};
use tracing::debug;

use super::cache::{SourceVectorMemo, TargetVectorCache, TargetVectors};
use super::provider::{EmbeddingProvider, cosine_similarity};
use crate::deadline::call_with_timeout;
use crate::error::ProviderError;
use crate::text::target_text;

/// Ranks target fields by cosine similarity to a source column's vector.
///
/// All provider calls go through one deadline each; a run makes at most one
/// call for target vectors (on a cache miss) and one for source vectors.
#[derive(Clone)]
pub struct SemanticMatcher {
    provider: Arc<dyn EmbeddingProvider>,
    targets: Arc<TargetVectorCache>,
    floor: f32,
    timeout: Duration,
}

impl SemanticMatcher {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        targets: Arc<TargetVectorCache>,
        floor: f32,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            targets,
            floor,
            timeout,
        }
    }

    pub fn model_id(&self) -> &str {
        self.provider.model_id()
    }

    /// Vectors for every field of `schema`, computed once per schema version.
    pub fn target_vectors(
        &self,
        schema: &EntitySchema,
    ) -> Result<Arc<TargetVectors>, ProviderError> {
        if let Some(cached) = self.targets.get(self.model_id(), schema) {
            return Ok(cached);
        }
        let texts: Vec<String> = schema.fields().iter().map(target_text).collect();
        let vectors = self.encode(texts)?;
        debug!(
            schema = schema.id(),
            version = schema.version(),
            fields = vectors.len(),
            "computed target vectors"
        );
        Ok(self.targets.insert(TargetVectors {
            model_id: self.model_id().to_string(),
            schema_id: schema.id().to_string(),
            schema_version: schema.version().to_string(),
            fields: schema.fields().iter().map(|f| f.name.clone()).collect(),
            vectors,
        }))
    }

    /// Vectors for `texts`, in order. Texts already in `memo` are not sent to
    /// the provider; identical texts are encoded once.
    pub fn source_vectors(
        &self,
        texts: &[String],
        memo: &SourceVectorMemo,
    ) -> Result<Vec<Arc<Vec<f32>>>, ProviderError> {
        let model_id = self.model_id().to_string();
        let mut missing: Vec<String> = Vec::new();
        for text in texts {
            if memo.get(&model_id, text).is_none() && !missing.contains(text) {
                missing.push(text.clone());
            }
        }

        let mut fresh: HashMap<String, Arc<Vec<f32>>> = HashMap::with_capacity(missing.len());
        if !missing.is_empty() {
            let vectors = self.encode(missing.clone())?;
            for (text, vector) in missing.into_iter().zip(vectors) {
                let stored = memo.insert(&model_id, &text, vector);
                fresh.insert(text, stored);
            }
        }

        texts
            .iter()
            .map(|text| {
                fresh
                    .get(text)
                    .cloned()
                    .or_else(|| memo.get(&model_id, text))
                    .ok_or_else(|| {
                        ProviderError::InvalidResponse(
                            "source vector missing after encoding".to_string(),
                        )
                    })
            })
            .collect()
    }

    /// Candidates at or above the floor, best first, ties in declaration order.
    pub fn score(&self, source: &[f32], targets: &TargetVectors) -> Vec<CandidateMatch> {
        let mut scored: Vec<(usize, &str, f32)> = targets
            .iter()
            .enumerate()
            .map(|(position, (field, vector))| (position, field, cosine_similarity(source, vector)))
            .filter(|(_, _, score)| *score >= self.floor)
            .collect();
        scored.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored
            .into_iter()
            .map(|(_, field, score)| CandidateMatch::new(field, score, MatchMethod::Semantic))
            .collect()
    }

    fn encode(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, ProviderError> {
        let expected = texts.len();
        let provider = Arc::clone(&self.provider);
        let vectors = call_with_timeout("embedding", self.timeout, move || {
            provider.encode_batch(&texts)
        })?;
        if vectors.len() != expected {
            return Err(ProviderError::InvalidResponse(format!(
                "expected {expected} vectors, got {}",
                vectors.len()
            )));
        }
        if let Some(first) = vectors.first() {
            let dims = first.len();
            if dims == 0 || vectors.iter().any(|v| v.len() != dims) {
                return Err(ProviderError::InvalidResponse(
                    "embedding vectors have inconsistent dimensions".to_string(),
                ));
            }
        }
        Ok(vectors)
    }
}

impl std::fmt::Debug for SemanticMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticMatcher")
            .field("model_id", &self.model_id())
            .field("floor", &self.floor)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
