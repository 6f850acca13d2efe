//! The mapping orchestrator.
//!
//! A run goes through the tiers in cost order and only sends a column to the
//! next tier while its best candidate is below the auto-accept threshold:
//!
//! ```text
//! exact/alias ──▶ fuzzy + semantic ──▶ reasoning ──▶ rank + accept
//!   (local)          (local, one          (batched,
//!                    embedding call)      per credential)
//! ```
//!
//! Per-column work in each stage runs on the engine's worker pool. External
//! calls are made from the orchestrating thread, each under a deadline.

use std::collections::HashMap;
use std::sync::Arc;

use fieldmap_model::{
    CandidateMatch, EntitySchema, MappingRequest, MappingResult, MappingRun, MappingStats,
    MatchMethod,
};
use fieldmap_schema::{SchemaError, SchemaStore};
use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::config::EngineConfig;
use crate::error::{EngineBuildError, MappingError};
use crate::exact::ExactMatcher;
use crate::fuzzy::FuzzyMatcher;
use crate::reasoning::{
    CredentialPool, PendingColumn, ReasoningCache, ReasoningClient, ReasoningProvider,
};
use crate::semantic::{
    EmbeddingProvider, SemanticMatcher, SourceVectorMemo, TargetVectorCache, TargetVectors,
};
use crate::text::select_samples;
use crate::tier::{ColumnContext, Tier, best_confidence, merge_candidates};

/// Builder for [`MappingEngine`].
pub struct MappingEngineBuilder {
    store: Arc<SchemaStore>,
    config: EngineConfig,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    target_cache: Option<Arc<TargetVectorCache>>,
    source_memo: Option<Arc<SourceVectorMemo>>,
    reasoner: Option<(Arc<dyn ReasoningProvider>, Arc<CredentialPool>)>,
    reasoning_cache: Option<Arc<ReasoningCache>>,
}

impl MappingEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Enables the semantic tier.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(provider);
        self
    }

    /// Share a target vector cache between engines.
    pub fn target_cache(mut self, cache: Arc<TargetVectorCache>) -> Self {
        self.target_cache = Some(cache);
        self
    }

    /// Keep source vectors across runs. Only used when
    /// `cache_source_vectors` is set.
    pub fn source_memo(mut self, memo: Arc<SourceVectorMemo>) -> Self {
        self.source_memo = Some(memo);
        self
    }

    /// Enables the reasoning tier, unless disabled in the config.
    pub fn reasoning_provider(
        mut self,
        provider: Arc<dyn ReasoningProvider>,
        pool: Arc<CredentialPool>,
    ) -> Self {
        self.reasoner = Some((provider, pool));
        self
    }

    pub fn reasoning_cache(mut self, cache: Arc<ReasoningCache>) -> Self {
        self.reasoning_cache = Some(cache);
        self
    }

    pub fn build(self) -> Result<MappingEngine, EngineBuildError> {
        self.config.validate()?;
        let config = self.config;

        let target_cache = self.target_cache.unwrap_or_else(|| {
            Arc::new(match &config.vector_cache_dir {
                Some(dir) => TargetVectorCache::with_persist_dir(dir),
                None => TargetVectorCache::new(),
            })
        });
        let semantic = self.embedder.map(|provider| {
            SemanticMatcher::new(
                provider,
                Arc::clone(&target_cache),
                config.semantic_floor,
                config.embedding_timeout(),
            )
        });
        let source_memo = config
            .cache_source_vectors
            .then(|| self.source_memo.unwrap_or_default());

        let reasoning = match self.reasoner {
            Some((provider, pool)) if config.reasoning.enabled => Some(ReasoningClient::new(
                provider,
                pool,
                self.reasoning_cache.unwrap_or_default(),
                &config.reasoning,
            )),
            Some(_) => {
                debug!("reasoning provider configured but disabled");
                None
            }
            None => None,
        };

        let workers = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|i| format!("fieldmap-worker-{i}"))
            .build()?;

        info!(
            semantic = semantic.is_some(),
            reasoning = reasoning.is_some(),
            workers = config.worker_threads,
            "mapping engine ready"
        );
        Ok(MappingEngine {
            store: self.store,
            config,
            target_cache,
            semantic,
            source_memo,
            reasoning,
            workers,
        })
    }
}

/// Resolves source columns against the schemas of one store.
///
/// Safe to share between threads; concurrent runs share the caches and the
/// credential pool.
pub struct MappingEngine {
    store: Arc<SchemaStore>,
    config: EngineConfig,
    target_cache: Arc<TargetVectorCache>,
    semantic: Option<SemanticMatcher>,
    source_memo: Option<Arc<SourceVectorMemo>>,
    reasoning: Option<ReasoningClient>,
    workers: rayon::ThreadPool,
}

impl MappingEngine {
    pub fn builder(store: Arc<SchemaStore>) -> MappingEngineBuilder {
        MappingEngineBuilder {
            store,
            config: EngineConfig::default(),
            embedder: None,
            target_cache: None,
            source_memo: None,
            reasoner: None,
            reasoning_cache: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<SchemaStore> {
        &self.store
    }

    pub fn target_cache(&self) -> &Arc<TargetVectorCache> {
        &self.target_cache
    }

    pub fn reasoning_cache(&self) -> Option<&Arc<ReasoningCache>> {
        self.reasoning.as_ref().map(ReasoningClient::cache)
    }

    pub fn credential_pool(&self) -> Option<&Arc<CredentialPool>> {
        self.reasoning.as_ref().map(ReasoningClient::pool)
    }

    /// Drop every cached vector and reasoning answer held in memory.
    pub fn clear_caches(&self) {
        self.target_cache.clear();
        if let Some(memo) = &self.source_memo {
            memo.clear();
        }
        if let Some(client) = &self.reasoning {
            client.cache().clear();
        }
    }

    /// Reload the schema store if its files changed, and drop cached work
    /// for schemas whose version moved.
    pub fn refresh_schemas(&self) -> Result<bool, SchemaError> {
        let before: HashMap<String, String> = self
            .store
            .schema_ids()
            .into_iter()
            .filter_map(|id| {
                let version = self.store.get_schema(&id).ok()?.version().to_string();
                Some((id, version))
            })
            .collect();
        if !self.store.refresh_if_stale()? {
            return Ok(false);
        }

        for (id, old_version) in before {
            let current = self
                .store
                .get_schema(&id)
                .ok()
                .map(|schema| schema.version().to_string());
            if current.as_deref() == Some(old_version.as_str()) {
                continue;
            }
            let dropped = self.target_cache.invalidate(&old_version);
            if let Some(client) = &self.reasoning {
                client.cache().invalidate_schema(&id);
            }
            info!(schema = %id, vectors = dropped, "schema changed, cached matches dropped");
        }
        Ok(true)
    }

    /// Resolve every source column of `request`.
    ///
    /// Fails only for invalid requests and unknown schemas. Provider outages
    /// degrade the affected tier and are reported in the run statistics.
    #[instrument(
        skip_all,
        fields(schema = %request.target_schema_id, columns = request.source_columns.len())
    )]
    pub fn map(&self, request: &MappingRequest) -> Result<MappingRun, MappingError> {
        request.validate()?;
        let not_found = |_| MappingError::SchemaNotFound {
            id: request.target_schema_id.clone(),
        };
        let schema = self
            .store
            .get_schema(&request.target_schema_id)
            .map_err(not_found)?;
        let aliases = self
            .store
            .get_aliases(&request.target_schema_id)
            .map_err(not_found)?;

        let threshold = request
            .auto_accept_threshold
            .unwrap_or(self.config.auto_accept_threshold);
        let mut stats = MappingStats::default();

        let mut columns: Vec<ColumnContext> = request
            .source_columns
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                let samples = select_samples(
                    request.samples_for(raw),
                    self.config.sample_limit,
                    self.config.sample_max_chars,
                );
                ColumnContext::new(index, raw, samples)
            })
            .collect();

        let exact = ExactMatcher::new(&schema, &aliases, self.config.alias_confidence);
        let mut candidates = self.run_tier(Tier::Exact(&exact), &columns, None);
        let unresolved = below(&candidates, threshold, 0..columns.len());
        debug!(
            resolved = columns.len() - unresolved.len(),
            "exact and alias stage done"
        );

        if !unresolved.is_empty() {
            let fuzzy = FuzzyMatcher::new(&schema, &aliases, self.config.fuzzy_floor);
            let targets = self.prepare_semantic(&schema, &mut columns, &unresolved, &mut stats);
            let mut tiers = vec![Tier::Fuzzy(&fuzzy)];
            if let (Some(matcher), Some(targets)) = (&self.semantic, targets.as_deref()) {
                tiers.push(Tier::Semantic { matcher, targets });
            }
            for tier in tiers {
                let found = self.run_tier(tier, &columns, Some(&unresolved));
                for (existing, found) in candidates.iter_mut().zip(found) {
                    merge_candidates(existing, found);
                }
            }
        }

        let pending = below(&candidates, threshold, unresolved);
        if !pending.is_empty() {
            match &self.reasoning {
                Some(client) => {
                    let answers =
                        self.reason(client, &schema, &columns, &candidates, &pending, &mut stats);
                    let tier = Tier::Reasoning(&answers);
                    for &index in &pending {
                        merge_candidates(&mut candidates[index], tier.propose(&columns[index]));
                    }
                }
                None => debug!(columns = pending.len(), "reasoning tier not configured"),
            }
        }

        let results: Vec<MappingResult> = columns
            .iter()
            .zip(candidates)
            .map(|(column, mut found)| {
                rank_candidates(&mut found, &schema);
                MappingResult::from_ranked(
                    column.raw.clone(),
                    found,
                    threshold,
                    self.config.max_alternatives,
                    &self.config.confidence,
                )
            })
            .collect();
        for result in &results {
            stats.record_result(result);
        }

        info!(
            accepted = stats.above_threshold,
            review = stats.needs_review,
            unmatched = stats.unmatched,
            external_calls = stats.external_call_count,
            degraded = stats.degraded.len(),
            "mapping run complete"
        );
        Ok(MappingRun {
            source_columns: request.source_columns.clone(),
            target_schema_id: schema.id().to_string(),
            schema_version: schema.version().to_string(),
            auto_accept_threshold: threshold,
            results,
            stats,
        })
    }

    /// Candidates from one tier for every column, or only for `subset`.
    fn run_tier(
        &self,
        tier: Tier<'_>,
        columns: &[ColumnContext],
        subset: Option<&[usize]>,
    ) -> Vec<Vec<CandidateMatch>> {
        self.workers.install(|| {
            columns
                .par_iter()
                .map(|column| match subset {
                    Some(indices) if !indices.contains(&column.index) => Vec::new(),
                    _ => tier.propose(column),
                })
                .collect()
        })
    }

    /// Fetch target vectors and source vectors for the columns the semantic
    /// tier will score. Returns `None` when the tier is off or degraded.
    fn prepare_semantic(
        &self,
        schema: &EntitySchema,
        columns: &mut [ColumnContext],
        unresolved: &[usize],
        stats: &mut MappingStats,
    ) -> Option<Arc<TargetVectors>> {
        let Some(matcher) = &self.semantic else {
            debug!("semantic tier not configured");
            return None;
        };
        let scored: Vec<usize> = unresolved
            .iter()
            .copied()
            .filter(|&index| !columns[index].name.is_empty())
            .collect();
        if scored.is_empty() {
            return None;
        }

        let targets = match matcher.target_vectors(schema) {
            Ok(targets) => targets,
            Err(err) => {
                warn!(error = %err, "target embedding failed, semantic tier skipped");
                stats.record_degradation(MatchMethod::Semantic, err.reason(), scored.len());
                return None;
            }
        };

        let texts: Vec<String> = scored.iter().map(|&i| columns[i].source_text()).collect();
        let run_memo;
        let memo = match &self.source_memo {
            Some(memo) => memo.as_ref(),
            None => {
                run_memo = SourceVectorMemo::new();
                &run_memo
            }
        };
        match matcher.source_vectors(&texts, memo) {
            Ok(vectors) => {
                for (&index, vector) in scored.iter().zip(vectors) {
                    columns[index].source_vector = Some(vector);
                }
                Some(targets)
            }
            Err(err) => {
                warn!(error = %err, "source embedding failed, semantic tier skipped");
                stats.record_degradation(MatchMethod::Semantic, err.reason(), scored.len());
                None
            }
        }
    }

    fn reason(
        &self,
        client: &ReasoningClient,
        schema: &EntitySchema,
        columns: &[ColumnContext],
        candidates: &[Vec<CandidateMatch>],
        pending: &[usize],
        stats: &mut MappingStats,
    ) -> HashMap<usize, Vec<CandidateMatch>> {
        let pending: Vec<PendingColumn> = pending
            .iter()
            .filter(|&&index| !columns[index].name.is_empty())
            .map(|&index| {
                let column = &columns[index];
                let mut existing = candidates[index].clone();
                existing.sort_by(CandidateMatch::rank_cmp);
                PendingColumn {
                    index,
                    name: column.raw.clone(),
                    key: column.name.compact().to_string(),
                    samples: column.samples.clone(),
                    candidates: existing,
                }
            })
            .collect();
        if pending.is_empty() {
            return HashMap::new();
        }
        client.resolve(schema, &pending, stats)
    }
}

impl std::fmt::Debug for MappingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingEngine")
            .field("config", &self.config)
            .field("semantic", &self.semantic)
            .field("reasoning", &self.reasoning)
            .finish_non_exhaustive()
    }
}

/// Order one column's candidates for acceptance.
///
/// Confidence, then method priority. Two fuzzy candidates that still tie go
/// to the shorter field name. Declaration order decides the rest.
fn rank_candidates(found: &mut [CandidateMatch], schema: &EntitySchema) {
    found.sort_by(|a, b| {
        a.rank_cmp(b)
            .then_with(|| {
                if a.method == MatchMethod::Fuzzy && b.method == MatchMethod::Fuzzy {
                    a.target_field.chars().count().cmp(&b.target_field.chars().count())
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .then_with(|| {
                schema
                    .position(&a.target_field)
                    .cmp(&schema.position(&b.target_field))
            })
    });
}

/// Indices from `within` whose best candidate is below `threshold`.
fn below(
    candidates: &[Vec<CandidateMatch>],
    threshold: f32,
    within: impl IntoIterator<Item = usize>,
) -> Vec<usize> {
    within
        .into_iter()
        .filter(|&index| best_confidence(&candidates[index]) < threshold)
        .collect()
}

#[cfg(test)]
mod tests {
    use fieldmap_model::{FieldDataType, FieldDefinition};

    use super::*;

    fn schema() -> EntitySchema {
        EntitySchema::new(
            "t",
            vec![
                FieldDefinition::new("WORK_CODE", FieldDataType::String),
                FieldDefinition::new("CODE", FieldDataType::String),
                FieldDefinition::new("REGION", FieldDataType::String),
            ],
        )
    }

    fn fields(found: &[CandidateMatch]) -> Vec<&str> {
        found.iter().map(|c| c.target_field.as_str()).collect()
    }

    #[test]
    fn fuzzy_ties_go_to_shorter_name() {
        let mut found = vec![
            CandidateMatch::new("WORK_CODE", 0.8, MatchMethod::Fuzzy),
            CandidateMatch::new("REGION", 0.8, MatchMethod::Fuzzy),
            CandidateMatch::new("CODE", 0.8, MatchMethod::Fuzzy),
        ];
        rank_candidates(&mut found, &schema());
        assert_eq!(fields(&found), ["CODE", "REGION", "WORK_CODE"]);
    }

    #[test]
    fn other_ties_keep_declaration_order() {
        let mut found = vec![
            CandidateMatch::new("CODE", 0.8, MatchMethod::Semantic),
            CandidateMatch::new("WORK_CODE", 0.8, MatchMethod::Semantic),
            CandidateMatch::new("REGION", 0.8, MatchMethod::Fuzzy),
        ];
        rank_candidates(&mut found, &schema());
        assert_eq!(fields(&found), ["WORK_CODE", "CODE", "REGION"]);
    }
}
