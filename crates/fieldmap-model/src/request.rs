//! Mapping requests as submitted by upload and validation collaborators.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::RequestError;

/// A request to map source columns onto a target schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingRequest {
    /// Source column names in file order. Duplicates are allowed and each
    /// gets its own result.
    pub source_columns: Vec<String>,
    /// Sample values per source column.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sample_values: BTreeMap<String, Vec<String>>,
    pub target_schema_id: String,
    /// Overrides the engine's configured auto-accept threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_accept_threshold: Option<f32>,
}

impl MappingRequest {
    pub fn new<I, S>(target_schema_id: impl Into<String>, source_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            source_columns: source_columns.into_iter().map(Into::into).collect(),
            sample_values: BTreeMap::new(),
            target_schema_id: target_schema_id.into(),
            auto_accept_threshold: None,
        }
    }

    #[must_use]
    pub fn with_samples<I, S>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sample_values
            .insert(column.into(), values.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.auto_accept_threshold = Some(threshold);
        self
    }

    /// Sample values for a column; empty when none were supplied.
    pub fn samples_for(&self, column: &str) -> &[String] {
        self.sample_values
            .get(column)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Reject requests the engine cannot process.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.source_columns.is_empty() {
            return Err(RequestError::NoColumns);
        }
        if self.target_schema_id.trim().is_empty() {
            return Err(RequestError::MissingSchemaId);
        }
        if let Some(threshold) = self.auto_accept_threshold
            && !(0.0..=1.0).contains(&threshold)
        {
            return Err(RequestError::InvalidThreshold(threshold));
        }
        Ok(())
    }
}
