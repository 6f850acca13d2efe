//! The reasoning provider capability and its request/response shapes.

use std::fmt;

use fieldmap_model::{CandidateMatch, EntitySchema, FieldDataType};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// One access key for the reasoning service.
///
/// The secret never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub id: String,
    pub secret: String,
    /// External calls allowed per day.
    pub daily_quota: u32,
    /// Consecutive failures before the credential goes on standby.
    pub failure_limit: u32,
}

impl Credential {
    pub fn new(
        id: impl Into<String>,
        secret: impl Into<String>,
        daily_quota: u32,
        failure_limit: u32,
    ) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
            daily_quota,
            failure_limit,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .field("daily_quota", &self.daily_quota)
            .field("failure_limit", &self.failure_limit)
            .finish()
    }
}

/// One unresolved column sent for reasoning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningItem {
    pub column: String,
    #[serde(default)]
    pub samples: Vec<String>,
    /// Best existing candidates from earlier tiers.
    #[serde(default)]
    pub candidates: Vec<CandidateMatch>,
}

/// Compact description of the target schema sent with every batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSummary {
    pub schema_id: String,
    pub fields: Vec<FieldSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSummary {
    pub name: String,
    pub label: String,
    pub data_type: FieldDataType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl From<&EntitySchema> for SchemaSummary {
    fn from(schema: &EntitySchema) -> Self {
        Self {
            schema_id: schema.id().to_string(),
            fields: schema
                .fields()
                .iter()
                .map(|field| FieldSummary {
                    name: field.name.clone(),
                    label: field.label().to_string(),
                    data_type: field.data_type,
                    description: field.description.clone(),
                })
                .collect(),
        }
    }
}

/// A provider's answer for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningSuggestion {
    pub column: String,
    pub target_field: String,
    /// Self-reported score; clamped into `[0, 1]` when turned into a candidate.
    pub confidence: f32,
    #[serde(default)]
    pub rationale: String,
}

/// An external text-reasoning service.
///
/// Called with one batch of columns at a time. Answers may cover only some
/// of the columns; columns and fields the batch does not contain are ignored
/// by the caller.
pub trait ReasoningProvider: Send + Sync {
    fn reason(
        &self,
        credential: &Credential,
        batch: &[ReasoningItem],
        schema: &SchemaSummary,
    ) -> Result<Vec<ReasoningSuggestion>, ProviderError>;
}
