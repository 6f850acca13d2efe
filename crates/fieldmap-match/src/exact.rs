//! Exact and alias lookup on normalized names.

use std::collections::HashMap;

use fieldmap_model::{AliasTable, CandidateMatch, EntitySchema, MatchMethod, NormalizedName};

/// Compact-key lookup tables for one schema.
#[derive(Debug, Clone)]
pub struct ExactMatcher {
    by_name: HashMap<String, String>,
    by_alias: HashMap<String, String>,
    alias_confidence: f32,
}

impl ExactMatcher {
    pub fn new(schema: &EntitySchema, aliases: &AliasTable, alias_confidence: f32) -> Self {
        let mut by_name = HashMap::with_capacity(schema.len());
        for field in schema.fields() {
            by_name
                .entry(NormalizedName::new(&field.name).compact().to_string())
                .or_insert_with(|| field.name.clone());
        }
        let mut by_alias = HashMap::with_capacity(aliases.len());
        for (target, names) in aliases.iter() {
            for alias in names {
                let key = NormalizedName::new(alias).compact().to_string();
                by_alias.insert(key, target.to_string());
            }
        }
        Self {
            by_name,
            by_alias,
            alias_confidence,
        }
    }

    /// Candidates for a source name: at most one exact hit (1.0) and one
    /// alias hit, deduplicated by target.
    pub fn propose(&self, name: &NormalizedName) -> Vec<CandidateMatch> {
        let key = name.compact();
        if key.is_empty() {
            return Vec::new();
        }
        let mut candidates = Vec::with_capacity(2);
        if let Some(target) = self.by_name.get(key) {
            candidates.push(CandidateMatch::new(target, 1.0, MatchMethod::Exact));
        }
        if let Some(target) = self.by_alias.get(key)
            && !candidates.iter().any(|c| &c.target_field == target)
        {
            candidates.push(CandidateMatch::new(
                target,
                self.alias_confidence,
                MatchMethod::Alias,
            ));
        }
        candidates
    }
}
