//! Fuzzy string scoring between a source name and target names/aliases.
//!
//! Uses Jaro-Winkler similarity on the compact form of both names, and on the
//! sorted-token form when both names have more than one token so that
//! `email_work` and `WorkEmail` compare as equal.

use std::cmp::Ordering;

use fieldmap_model::{AliasTable, CandidateMatch, EntitySchema, MatchMethod, NormalizedName};
use rapidfuzz::distance::jaro_winkler;

#[derive(Debug, Clone)]
struct FuzzyTarget {
    field: String,
    position: usize,
    /// The field name followed by its aliases.
    forms: Vec<NormalizedName>,
}

/// Fuzzy scorer for one schema.
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    targets: Vec<FuzzyTarget>,
    floor: f32,
}

impl FuzzyMatcher {
    pub fn new(schema: &EntitySchema, aliases: &AliasTable, floor: f32) -> Self {
        let targets = schema
            .fields()
            .iter()
            .enumerate()
            .map(|(position, field)| {
                let mut forms = vec![NormalizedName::new(&field.name)];
                forms.extend(aliases.aliases_for(&field.name).map(NormalizedName::new));
                FuzzyTarget {
                    field: field.name.clone(),
                    position,
                    forms,
                }
            })
            .collect();
        Self { targets, floor }
    }

    /// Score every target field and keep those at or above the floor.
    ///
    /// Ordered by score, then shorter field name, then declaration order.
    pub fn propose(&self, name: &NormalizedName) -> Vec<CandidateMatch> {
        if name.is_empty() {
            return Vec::new();
        }
        let mut scored: Vec<(&FuzzyTarget, f32)> = self
            .targets
            .iter()
            .map(|target| {
                let best = target
                    .forms
                    .iter()
                    .map(|form| similarity(name, form))
                    .fold(0.0_f32, f32::max);
                (target, best)
            })
            .filter(|(_, score)| *score >= self.floor)
            .collect();

        scored.sort_by(|(a, a_score), (b, b_score)| {
            b_score
                .partial_cmp(a_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.field.chars().count().cmp(&b.field.chars().count()))
                .then_with(|| a.position.cmp(&b.position))
        });

        scored
            .into_iter()
            .map(|(target, score)| CandidateMatch::new(&target.field, score, MatchMethod::Fuzzy))
            .collect()
    }
}

/// Similarity in `[0, 1]` between two normalized names.
pub fn similarity(source: &NormalizedName, target: &NormalizedName) -> f32 {
    if source.is_empty() || target.is_empty() {
        return 0.0;
    }
    let mut score = jaro_winkler::similarity(source.compact().chars(), target.compact().chars());
    if source.tokens().len() > 1 && target.tokens().len() > 1 {
        let sorted = jaro_winkler::similarity(source.sorted().chars(), target.sorted().chars());
        score = score.max(sorted);
    }
    (score as f32).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use fieldmap_model::{FieldDataType, FieldDefinition};

    use super::*;

    fn schema() -> EntitySchema {
        EntitySchema::new(
            "candidate",
            vec![
                FieldDefinition::new("FIRST_NAME", FieldDataType::String),
                FieldDefinition::new("LAST_NAME", FieldDataType::String),
                FieldDefinition::new("EMAIL", FieldDataType::Email),
                FieldDefinition::new("WORK_EMAIL", FieldDataType::Email),
            ],
        )
    }

    #[test]
    fn token_order_does_not_matter() {
        let score = similarity(
            &NormalizedName::new("email_work"),
            &NormalizedName::new("WorkEmail"),
        );
        assert_eq!(score, 1.0);
    }

    #[test]
    fn nothing_below_floor() {
        let matcher = FuzzyMatcher::new(&schema(), &AliasTable::new(), 0.5);
        for candidate in matcher.propose(&NormalizedName::new("firstname")) {
            assert!(candidate.confidence >= 0.5);
            assert_eq!(candidate.method, MatchMethod::Fuzzy);
        }
        assert!(matcher.propose(&NormalizedName::new("XYZ_123")).is_empty());
    }

    #[test]
    fn best_match_first() {
        let matcher = FuzzyMatcher::new(&schema(), &AliasTable::new(), 0.5);
        let found = matcher.propose(&NormalizedName::new("Frist Name"));
        assert_eq!(found[0].target_field, "FIRST_NAME");
    }

    #[test]
    fn equal_scores_prefer_shorter_name() {
        let schema = EntitySchema::new(
            "t",
            vec![
                FieldDefinition::new("CODE_LONG", FieldDataType::String),
                FieldDefinition::new("CODE", FieldDataType::String),
            ],
        );
        let mut aliases = AliasTable::new();
        aliases.insert("CODE_LONG", "kode").unwrap();
        let matcher = FuzzyMatcher::new(&schema, &aliases, 0.5);
        let found = matcher.propose(&NormalizedName::new("kode"));
        // The alias scores 1.0 for CODE_LONG; CODE is lower, so order is by score.
        assert_eq!(found[0].target_field, "CODE_LONG");

        let matcher = FuzzyMatcher::new(&schema, &AliasTable::new(), 0.0);
        let tied = matcher.propose(&NormalizedName::new("zzzz"));
        assert_eq!(tied[0].target_field, "CODE");
        assert_eq!(tied[1].target_field, "CODE_LONG");
    }

    #[test]
    fn aliases_are_scored() {
        let mut aliases = AliasTable::new();
        aliases.insert("EMAIL", "E-Mail Address").unwrap();
        let matcher = FuzzyMatcher::new(&schema(), &aliases, 0.5);
        let found = matcher.propose(&NormalizedName::new("EMail Adress"));
        assert_eq!(found[0].target_field, "EMAIL");
        assert!(found[0].confidence > 0.9);
    }
}
