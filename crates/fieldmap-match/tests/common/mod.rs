//! Fakes shared by the engine integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use fieldmap_match::{
    Clock, Credential, EmbeddingProvider, ProviderError, ReasoningItem, ReasoningProvider,
    ReasoningSuggestion, SchemaSummary,
};
use fieldmap_model::{FieldDataType, FieldDefinition};
use fieldmap_schema::{AliasDocument, SchemaDocument, SchemaStore};

pub fn candidate_fields() -> Vec<FieldDefinition> {
    vec![
        FieldDefinition::new("CANDIDATE_ID", FieldDataType::String).required(),
        FieldDefinition::new("FIRST_NAME", FieldDataType::String),
        FieldDefinition::new("LAST_NAME", FieldDataType::String),
        FieldDefinition::new("EMAIL", FieldDataType::Email),
        FieldDefinition::new("PHONE", FieldDataType::Phone),
    ]
}

pub fn candidate_store() -> Arc<SchemaStore> {
    let aliases = AliasDocument::new().with("CANDIDATE_ID", ["PersonID", "Applicant Number"]);
    let store = SchemaStore::from_documents([(
        "candidate".to_string(),
        SchemaDocument {
            fields: candidate_fields(),
        },
        Some(aliases),
    )])
    .expect("build candidate store");
    Arc::new(store)
}

/// Maps a handful of words onto fixed dimensions; every other word is
/// ignored, so unrelated texts encode to the zero vector.
#[derive(Default)]
pub struct ConceptEmbedder {
    batches: Mutex<Vec<Vec<String>>>,
}

const CONCEPTS: &[(&str, usize, f32)] = &[
    ("email", 0, 1.0),
    ("emails", 0, 1.0),
    ("mail", 0, 1.0),
    ("id", 1, 1.0),
    ("identifier", 1, 1.0),
    ("candidate", 1, 1.0),
    ("person", 1, 1.0),
    ("applicant", 1, 1.0),
    ("work", 2, 0.5),
];

impl ConceptEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Texts of every batch call, in call order.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }
}

impl EmbeddingProvider for ConceptEmbedder {
    fn model_id(&self) -> &str {
        "concept-v1"
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut vector = vec![0.0; 3];
        for word in text.split(|ch: char| !ch.is_alphanumeric()) {
            let word = word.to_lowercase();
            if let Some((_, dim, weight)) = CONCEPTS.iter().find(|(w, _, _)| *w == word) {
                vector[*dim] += weight;
            }
        }
        Ok(vector)
    }

    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.batches.lock().unwrap().push(texts.to_vec());
        texts.iter().map(|text| self.encode(text)).collect()
    }
}

/// Always fails with the given error, optionally after a delay.
pub struct BrokenEmbedder {
    pub error: ProviderError,
    pub delay: Duration,
}

impl EmbeddingProvider for BrokenEmbedder {
    fn model_id(&self) -> &str {
        "broken"
    }

    fn encode(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        std::thread::sleep(self.delay);
        Err(self.error.clone())
    }
}

type Answered = Result<Vec<ReasoningSuggestion>, ProviderError>;
type Answer = dyn Fn(&Credential, &[ReasoningItem]) -> Answered + Send + Sync;

/// Reasoning provider driven by a closure; records every call.
pub struct ScriptedReasoner {
    answer: Box<Answer>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
    count: AtomicUsize,
}

impl ScriptedReasoner {
    pub fn new<F>(answer: F) -> Arc<Self>
    where
        F: Fn(&Credential, &[ReasoningItem]) -> Result<Vec<ReasoningSuggestion>, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        Arc::new(Self {
            answer: Box::new(answer),
            calls: Mutex::new(Vec::new()),
            count: AtomicUsize::new(0),
        })
    }

    /// Answers from a fixed `(column, field, confidence)` table, ignoring
    /// columns not in the table.
    pub fn table(entries: &[(&str, &str, f32)]) -> Arc<Self> {
        let entries: Vec<(String, String, f32)> = entries
            .iter()
            .map(|(c, f, s)| (c.to_string(), f.to_string(), *s))
            .collect();
        Self::new(move |_, batch| {
            Ok(batch
                .iter()
                .filter_map(|item| {
                    entries
                        .iter()
                        .find(|(column, _, _)| *column == item.column)
                        .map(|(column, field, confidence)| ReasoningSuggestion {
                            column: column.clone(),
                            target_field: field.clone(),
                            confidence: *confidence,
                            rationale: format!("{column} looks like {field}"),
                        })
                })
                .collect())
        })
    }

    pub fn call_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// `(credential id, batch columns)` per call.
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ReasoningProvider for ScriptedReasoner {
    fn reason(
        &self,
        credential: &Credential,
        batch: &[ReasoningItem],
        _schema: &SchemaSummary,
    ) -> Result<Vec<ReasoningSuggestion>, ProviderError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push((
            credential.id.clone(),
            batch.iter().map(|item| item.column.clone()).collect(),
        ));
        (self.answer)(credential, batch)
    }
}

pub struct FixedClock(Mutex<NaiveDate>);

impl FixedClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(
            NaiveDate::from_ymd_opt(2026, 5, 4).unwrap(),
        )))
    }

    pub fn advance(&self) {
        let mut day = self.0.lock().unwrap();
        *day = day.succ_opt().unwrap();
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.0.lock().unwrap()
    }
}
