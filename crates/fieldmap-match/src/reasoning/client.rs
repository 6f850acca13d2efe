use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use fieldmap_model::{CandidateMatch, EntitySchema, MappingStats, MatchMethod, compact_key};
use tracing::{debug, warn};

use super::cache::ReasoningCache;
use super::credentials::{CredentialPool, Lease};
use super::provider::{ReasoningItem, ReasoningProvider, ReasoningSuggestion, SchemaSummary};
use crate::config::ReasoningConfig;
use crate::deadline::call_with_timeout;
use crate::error::ProviderError;

/// A column that is still below the auto-accept threshold after the local
/// tiers.
#[derive(Debug, Clone)]
pub struct PendingColumn {
    /// Position in the request.
    pub index: usize,
    pub name: String,
    /// Compact normalized name; the cache key and the batch identity.
    pub key: String,
    pub samples: Vec<String>,
    /// Existing candidates, best first.
    pub candidates: Vec<CandidateMatch>,
}

/// Sends unresolved columns to the reasoning provider in batches.
///
/// Batches of one run go out one after another. Each batch takes one
/// request slot from the credential pool; a quota or auth rejection retries
/// the batch once on the next eligible credential.
pub struct ReasoningClient {
    provider: Arc<dyn ReasoningProvider>,
    pool: Arc<CredentialPool>,
    cache: Arc<ReasoningCache>,
    batch_size: usize,
    candidate_limit: usize,
    timeout: Duration,
}

impl ReasoningClient {
    pub fn new(
        provider: Arc<dyn ReasoningProvider>,
        pool: Arc<CredentialPool>,
        cache: Arc<ReasoningCache>,
        config: &ReasoningConfig,
    ) -> Self {
        Self {
            provider,
            pool,
            cache,
            batch_size: config.batch_size.max(1),
            candidate_limit: config.candidate_limit,
            timeout: config.timeout(),
        }
    }

    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    pub fn cache(&self) -> &Arc<ReasoningCache> {
        &self.cache
    }

    /// Reasoning candidates per column index. Columns without an answer are
    /// absent from the map.
    pub fn resolve(
        &self,
        schema: &EntitySchema,
        pending: &[PendingColumn],
        stats: &mut MappingStats,
    ) -> HashMap<usize, Vec<CandidateMatch>> {
        stats.reasoning_columns += pending.len();
        let mut answers = HashMap::new();

        // Columns that normalize to the same key share one batch entry.
        let mut groups: Vec<(&str, Vec<&PendingColumn>)> = Vec::new();
        for column in pending {
            match groups.iter_mut().find(|(key, _)| *key == column.key) {
                Some((_, members)) => members.push(column),
                None => groups.push((&column.key, vec![column])),
            }
        }

        let mut to_send = Vec::with_capacity(groups.len());
        for (key, members) in groups {
            match self.cache.get(schema.id(), key) {
                Some(cached) => {
                    let cached: Vec<CandidateMatch> = cached
                        .into_iter()
                        .filter(|c| schema.field(&c.target_field).is_some())
                        .collect();
                    stats.reasoning_cache_hits += members.len();
                    for member in members {
                        answers.insert(member.index, cached.clone());
                    }
                }
                None => to_send.push((key, members)),
            }
        }
        if to_send.is_empty() {
            return answers;
        }

        let summary = SchemaSummary::from(schema);
        for chunk in to_send.chunks(self.batch_size) {
            let items: Vec<ReasoningItem> = chunk
                .iter()
                .map(|(_, members)| {
                    let first = members[0];
                    ReasoningItem {
                        column: first.name.clone(),
                        samples: first.samples.clone(),
                        candidates: first
                            .candidates
                            .iter()
                            .take(self.candidate_limit)
                            .cloned()
                            .collect(),
                    }
                })
                .collect();
            let affected: usize = chunk.iter().map(|(_, members)| members.len()).sum();

            let Some(suggestions) = self.dispatch(items, &summary, affected, stats) else {
                continue;
            };
            let keys: HashSet<&str> = chunk.iter().map(|(key, _)| *key).collect();
            let mut accepted = accept_suggestions(schema, &keys, suggestions);
            debug!(
                batch = chunk.len(),
                answered = accepted.len(),
                "reasoning batch completed"
            );

            for (key, members) in chunk {
                let Some(found) = accepted.remove(*key) else {
                    continue;
                };
                self.cache.insert(schema.id(), key, found.clone());
                for member in members {
                    answers.insert(member.index, found.clone());
                }
            }
        }
        answers
    }

    fn dispatch(
        &self,
        items: Vec<ReasoningItem>,
        summary: &SchemaSummary,
        affected: usize,
        stats: &mut MappingStats,
    ) -> Option<Vec<ReasoningSuggestion>> {
        let items = Arc::new(items);
        let summary = Arc::new(summary.clone());
        let mut retried = false;
        loop {
            let Some(lease) = self.pool.acquire() else {
                warn!(columns = affected, "no eligible reasoning credential");
                stats.quota_exhausted = true;
                stats.record_degradation(
                    MatchMethod::Reasoning,
                    "no eligible credential",
                    affected,
                );
                return None;
            };
            stats.record_external_call(lease.id());

            match self.call(&lease, Arc::clone(&items), Arc::clone(&summary)) {
                Ok(suggestions) => {
                    self.pool.record_success(&lease);
                    return Some(suggestions);
                }
                Err(err) if err.is_credential_error() => {
                    if matches!(err, ProviderError::QuotaExceeded(_)) {
                        self.pool.mark_exhausted(&lease);
                    } else {
                        self.pool.mark_unauthorized(&lease);
                    }
                    if !retried {
                        retried = true;
                        debug!(
                            credential = lease.id(),
                            error = %err,
                            "retrying batch on next credential"
                        );
                        continue;
                    }
                    warn!(
                        credential = lease.id(),
                        error = %err,
                        "reasoning batch failed after failover"
                    );
                    stats.record_degradation(MatchMethod::Reasoning, err.reason(), affected);
                    return None;
                }
                Err(err) => {
                    self.pool.record_failure(&lease);
                    warn!(credential = lease.id(), error = %err, "reasoning batch failed");
                    stats.record_degradation(MatchMethod::Reasoning, err.reason(), affected);
                    return None;
                }
            }
        }
    }

    fn call(
        &self,
        lease: &Lease,
        items: Arc<Vec<ReasoningItem>>,
        summary: Arc<SchemaSummary>,
    ) -> Result<Vec<ReasoningSuggestion>, ProviderError> {
        let provider = Arc::clone(&self.provider);
        let credential = lease.credential().clone();
        call_with_timeout("reasoning", self.timeout, move || {
            provider.reason(&credential, &items, &summary)
        })
    }
}

impl std::fmt::Debug for ReasoningClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReasoningClient")
            .field("pool", &self.pool)
            .field("batch_size", &self.batch_size)
            .field("candidate_limit", &self.candidate_limit)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Turn provider answers into candidates, dropping answers for columns that
/// were not in the batch and for fields the schema does not declare.
fn accept_suggestions(
    schema: &EntitySchema,
    keys: &HashSet<&str>,
    suggestions: Vec<ReasoningSuggestion>,
) -> HashMap<String, Vec<CandidateMatch>> {
    let mut accepted: HashMap<String, Vec<CandidateMatch>> = HashMap::new();
    for suggestion in suggestions {
        let key = compact_key(&suggestion.column);
        if !keys.contains(key.as_str()) {
            warn!(
                column = %suggestion.column,
                "reasoning answer for a column not in the batch, dropped"
            );
            continue;
        }
        let Some(field) = schema.field(suggestion.target_field.trim()) else {
            warn!(
                column = %suggestion.column,
                target = %suggestion.target_field,
                "reasoning answer names an unknown field, dropped"
            );
            continue;
        };
        let candidate =
            CandidateMatch::new(&field.name, suggestion.confidence, MatchMethod::Reasoning)
                .with_rationale(suggestion.rationale);
        let found = accepted.entry(key).or_default();
        match found.iter_mut().find(|c| c.target_field == candidate.target_field) {
            Some(existing) if candidate.outranks(existing) => *existing = candidate,
            Some(_) => {}
            None => found.push(candidate),
        }
    }
    for found in accepted.values_mut() {
        found.sort_by(CandidateMatch::rank_cmp);
    }
    accepted
}
