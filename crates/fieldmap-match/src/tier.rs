//! Matching tiers behind one dispatch point.

use std::collections::HashMap;
use std::sync::Arc;

use fieldmap_model::{CandidateMatch, MatchMethod, NormalizedName};

use crate::exact::ExactMatcher;
use crate::fuzzy::FuzzyMatcher;
use crate::semantic::{SemanticMatcher, TargetVectors};
use crate::text::source_text;

/// Per-column state carried through a run.
#[derive(Debug, Clone)]
pub struct ColumnContext {
    pub index: usize,
    pub raw: String,
    pub name: NormalizedName,
    /// Selected, truncated sample values.
    pub samples: Vec<String>,
    /// Filled in before the semantic tier runs.
    pub source_vector: Option<Arc<Vec<f32>>>,
}

impl ColumnContext {
    pub fn new(index: usize, raw: &str, samples: Vec<String>) -> Self {
        Self {
            index,
            raw: raw.to_string(),
            name: NormalizedName::new(raw),
            samples,
            source_vector: None,
        }
    }

    pub fn source_text(&self) -> String {
        source_text(&self.name, &self.samples)
    }
}

/// One matching strategy, ready to propose candidates for a column.
#[derive(Debug, Clone, Copy)]
pub enum Tier<'a> {
    Exact(&'a ExactMatcher),
    Fuzzy(&'a FuzzyMatcher),
    Semantic {
        matcher: &'a SemanticMatcher,
        targets: &'a TargetVectors,
    },
    /// Answers already fetched for this run, keyed by column index.
    Reasoning(&'a HashMap<usize, Vec<CandidateMatch>>),
}

impl Tier<'_> {
    /// The method of the candidates this tier produces. The exact tier also
    /// produces alias candidates.
    pub fn method(&self) -> MatchMethod {
        match self {
            Tier::Exact(_) => MatchMethod::Exact,
            Tier::Fuzzy(_) => MatchMethod::Fuzzy,
            Tier::Semantic { .. } => MatchMethod::Semantic,
            Tier::Reasoning(_) => MatchMethod::Reasoning,
        }
    }

    pub fn propose(&self, column: &ColumnContext) -> Vec<CandidateMatch> {
        match self {
            Tier::Exact(matcher) => matcher.propose(&column.name),
            Tier::Fuzzy(matcher) => matcher.propose(&column.name),
            Tier::Semantic { matcher, targets } => column
                .source_vector
                .as_deref()
                .map(|vector| matcher.score(vector, targets))
                .unwrap_or_default(),
            Tier::Reasoning(answers) => answers.get(&column.index).cloned().unwrap_or_default(),
        }
    }
}

/// Fold `found` into `existing`, keeping the stronger candidate per target.
pub fn merge_candidates(existing: &mut Vec<CandidateMatch>, found: Vec<CandidateMatch>) {
    for candidate in found {
        match existing
            .iter_mut()
            .find(|c| c.target_field == candidate.target_field)
        {
            Some(current) if candidate.outranks(current) => *current = candidate,
            Some(_) => {}
            None => existing.push(candidate),
        }
    }
}

/// Highest confidence among `candidates`, 0 when empty.
pub fn best_confidence(candidates: &[CandidateMatch]) -> f32 {
    candidates
        .iter()
        .map(|c| c.confidence)
        .fold(0.0_f32, f32::max)
}
