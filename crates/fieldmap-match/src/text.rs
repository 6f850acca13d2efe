//! Descriptive texts fed to the embedding and reasoning providers.

use std::collections::HashSet;

use fieldmap_model::{FieldDefinition, NormalizedName};

/// Text describing a target field: normalized name, label, description and
/// a data type hint.
pub fn target_text(field: &FieldDefinition) -> String {
    let mut parts = vec![NormalizedName::new(&field.name).text()];
    let label = field.display_label.trim();
    if !label.is_empty() {
        parts.push(label.to_string());
    }
    let description = field.description.trim();
    if !description.is_empty() {
        parts.push(description.to_string());
    }
    parts.push(format!("type: {}", field.data_type));
    parts.join(" | ")
}

/// Text describing a source column: normalized name followed by a few of its
/// sample values.
pub fn source_text(name: &NormalizedName, samples: &[String]) -> String {
    if samples.is_empty() {
        return name.text();
    }
    format!("{} | {}", name.text(), samples.join(", "))
}

/// Up to `limit` distinct, non-blank sample values in input order, each
/// truncated to `max_chars` characters.
pub fn select_samples(samples: &[String], limit: usize, max_chars: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    samples
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(|value| value.chars().take(max_chars).collect::<String>())
        .filter(|value| seen.insert(value.clone()))
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use fieldmap_model::FieldDataType;

    use super::*;

    #[test]
    fn target_text_includes_description_and_type() {
        let field = FieldDefinition::new("WORK_EMAIL", FieldDataType::Email)
            .with_label("Work email")
            .with_description("Business address");
        assert_eq!(
            target_text(&field),
            "work email | Work email | Business address | type: email"
        );
    }

    #[test]
    fn samples_are_distinct_and_truncated() {
        let samples: Vec<String> = ["a", " a ", "", "bbbbbb", "c", "d"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(select_samples(&samples, 3, 4), vec!["a", "bbbb", "c"]);
    }

    #[test]
    fn source_text_without_samples_is_the_name() {
        let name = NormalizedName::new("WorkEmails");
        assert_eq!(source_text(&name, &[]), "work emails");
        assert_eq!(
            source_text(&name, &["x@example.com".to_string()]),
            "work emails | x@example.com"
        );
    }
}
