//! Per-column decisions and the run-level response.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::candidate::{CandidateMatch, MatchMethod};
use crate::confidence::{ConfidenceLevel, ConfidenceThresholds};

/// Final decision for one source column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingResult {
    /// Source column name exactly as submitted.
    pub source_name: String,
    /// Highest-ranked candidate, if any tier proposed one.
    pub accepted: Option<CandidateMatch>,
    /// Runner-up candidates in rank order.
    pub alternatives: Vec<CandidateMatch>,
    /// True when nothing was accepted or the accepted confidence is below
    /// the auto-accept threshold.
    pub needs_review: bool,
    /// Level of the accepted candidate, if it reaches the low threshold.
    pub confidence_level: Option<ConfidenceLevel>,
}

impl MappingResult {
    /// Build a result from candidates already sorted best-first.
    pub fn from_ranked(
        source_name: impl Into<String>,
        ranked: Vec<CandidateMatch>,
        auto_accept_threshold: f32,
        max_alternatives: usize,
        levels: &ConfidenceThresholds,
    ) -> Self {
        let mut ranked = ranked.into_iter();
        let accepted = ranked.next();
        let alternatives: Vec<CandidateMatch> = ranked.take(max_alternatives).collect();
        let needs_review = accepted
            .as_ref()
            .is_none_or(|c| c.confidence < auto_accept_threshold);
        let confidence_level = accepted
            .as_ref()
            .and_then(|c| levels.categorize(c.confidence));
        Self {
            source_name: source_name.into(),
            accepted,
            alternatives,
            needs_review,
            confidence_level,
        }
    }

    /// Target field of the accepted candidate.
    pub fn accepted_field(&self) -> Option<&str> {
        self.accepted.as_ref().map(|c| c.target_field.as_str())
    }

    pub fn accepted_method(&self) -> Option<MatchMethod> {
        self.accepted.as_ref().map(|c| c.method)
    }

    pub fn is_unmatched(&self) -> bool {
        self.accepted.is_none()
    }
}

/// A tier that could not do its work during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierDegradation {
    pub tier: MatchMethod,
    pub reason: String,
    /// Columns that reached the tier but got no answer from it.
    pub affected_columns: usize,
}

/// Aggregate counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingStats {
    /// Accepted candidates per producing method.
    pub accepted_by_method: BTreeMap<MatchMethod, usize>,
    /// Accepted candidates per confidence level.
    pub by_level: BTreeMap<ConfidenceLevel, usize>,
    /// Columns whose accepted confidence reaches the auto-accept threshold.
    pub above_threshold: usize,
    /// Columns with an accepted candidate below the threshold.
    pub below_threshold: usize,
    /// Columns with no candidate at all.
    pub unmatched: usize,
    pub needs_review: usize,
    /// Calls made to the external reasoning service.
    pub external_call_count: usize,
    pub reasoning_cache_hits: usize,
    /// Columns that reached the reasoning tier.
    pub reasoning_columns: usize,
    /// External calls per credential id.
    pub credential_usage: BTreeMap<String, usize>,
    /// True when at least one reasoning batch found no eligible credential.
    pub quota_exhausted: bool,
    pub degraded: Vec<TierDegradation>,
}

impl MappingStats {
    /// Count one final column decision.
    pub fn record_result(&mut self, result: &MappingResult) {
        match &result.accepted {
            Some(accepted) => {
                *self.accepted_by_method.entry(accepted.method).or_insert(0) += 1;
                if result.needs_review {
                    self.below_threshold += 1;
                } else {
                    self.above_threshold += 1;
                }
            }
            None => self.unmatched += 1,
        }
        if let Some(level) = result.confidence_level {
            *self.by_level.entry(level).or_insert(0) += 1;
        }
        if result.needs_review {
            self.needs_review += 1;
        }
    }

    /// Record a degraded tier; repeated reasons for the same tier accumulate.
    pub fn record_degradation(
        &mut self,
        tier: MatchMethod,
        reason: impl Into<String>,
        columns: usize,
    ) {
        let reason = reason.into();
        if let Some(existing) = self
            .degraded
            .iter_mut()
            .find(|d| d.tier == tier && d.reason == reason)
        {
            existing.affected_columns += columns;
            return;
        }
        self.degraded.push(TierDegradation {
            tier,
            reason,
            affected_columns: columns,
        });
    }

    /// Count one external reasoning call made with `credential_id`.
    pub fn record_external_call(&mut self, credential_id: &str) {
        self.external_call_count += 1;
        *self
            .credential_usage
            .entry(credential_id.to_string())
            .or_insert(0) += 1;
    }

    pub fn is_degraded(&self, tier: MatchMethod) -> bool {
        self.degraded.iter().any(|d| d.tier == tier)
    }
}

/// The full response for one mapping request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingRun {
    pub source_columns: Vec<String>,
    pub target_schema_id: String,
    pub schema_version: String,
    pub auto_accept_threshold: f32,
    /// One result per source column, in request order.
    pub results: Vec<MappingResult>,
    pub stats: MappingStats,
}

impl MappingRun {
    /// First result for a source column name.
    pub fn result_for(&self, source_name: &str) -> Option<&MappingResult> {
        self.results.iter().find(|r| r.source_name == source_name)
    }

    pub fn accepted_count(&self) -> usize {
        self.results.iter().filter(|r| r.accepted.is_some()).count()
    }
}
