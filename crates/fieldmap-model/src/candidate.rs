//! Candidate matches proposed by the resolution tiers.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The tier that produced a candidate.
///
/// Variant order is the tie-break priority when two candidates carry the
/// same confidence: exact > alias > reasoning > semantic > fuzzy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMethod {
    Exact,
    Alias,
    Reasoning,
    Semantic,
    Fuzzy,
}

impl MatchMethod {
    pub const ALL: [MatchMethod; 5] = [
        Self::Exact,
        Self::Alias,
        Self::Reasoning,
        Self::Semantic,
        Self::Fuzzy,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Alias => "alias",
            Self::Reasoning => "reasoning",
            Self::Semantic => "semantic",
            Self::Fuzzy => "fuzzy",
        }
    }

    /// Rank used for tie-breaks; lower wins.
    pub const fn priority(&self) -> u8 {
        match self {
            Self::Exact => 0,
            Self::Alias => 1,
            Self::Reasoning => 2,
            Self::Semantic => 3,
            Self::Fuzzy => 4,
        }
    }
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One proposed target field for a source column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMatch {
    /// Target field name as declared in the schema.
    pub target_field: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    pub method: MatchMethod,
    /// Explanation retained for audit, currently only set by the reasoning tier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl CandidateMatch {
    /// Create a candidate; confidence is clamped into `[0, 1]` and NaN becomes 0.
    pub fn new(target_field: impl Into<String>, confidence: f32, method: MatchMethod) -> Self {
        Self {
            target_field: target_field.into(),
            confidence: clamp_confidence(confidence),
            method,
            rationale: None,
        }
    }

    #[must_use]
    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        let rationale = rationale.into();
        if !rationale.trim().is_empty() {
            self.rationale = Some(rationale);
        }
        self
    }

    /// Compare by confidence (higher first), then method priority.
    ///
    /// Callers add declaration order as the final key.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .confidence
            .partial_cmp(&self.confidence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.method.priority().cmp(&other.method.priority()))
    }

    /// True when `self` should replace `other` for the same target field.
    pub fn outranks(&self, other: &Self) -> bool {
        self.rank_cmp(other) == Ordering::Less
    }
}

fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
