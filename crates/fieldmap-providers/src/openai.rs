//! Embeddings from an OpenAI-compatible `/embeddings` endpoint.

use std::time::Duration;

use fieldmap_match::ProviderError;
use fieldmap_match::semantic::EmbeddingProvider;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http::{build_client, endpoint, read_json, send_error};

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Embedding provider for any service speaking the OpenAI embeddings API.
pub struct OpenAiEmbedder {
    client: Client,
    url: String,
    model: String,
    api_key: String,
    dimensions: Option<usize>,
    model_id: String,
}

impl OpenAiEmbedder {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: impl Into<String>,
        dimensions: Option<usize>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let model = model.into();
        let model_id = match dimensions {
            Some(dims) => format!("openai:{model}:{dims}"),
            None => format!("openai:{model}"),
        };
        Ok(Self {
            client: build_client(timeout)?,
            url: endpoint(base_url, "embeddings"),
            model,
            api_key: api_key.into(),
            dimensions,
            model_id,
        })
    }
}

impl EmbeddingProvider for OpenAiEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.encode_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| ProviderError::InvalidResponse("empty embedding response".to_string()))
    }

    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.model, texts = texts.len(), "requesting embeddings");
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
                dimensions: self.dimensions,
            })
            .send()
            .map_err(|err| send_error(&err))?;
        let body: EmbeddingResponse = read_json(response)?;
        order_embeddings(body.data, texts.len())
    }
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

/// Put the returned vectors back in request order.
fn order_embeddings(
    mut data: Vec<EmbeddingData>,
    expected: usize,
) -> Result<Vec<Vec<f32>>, ProviderError> {
    if data.len() != expected {
        return Err(ProviderError::InvalidResponse(format!(
            "expected {expected} embeddings, got {}",
            data.len()
        )));
    }
    data.sort_by_key(|item| item.index);
    if data.iter().enumerate().any(|(i, item)| item.index != i) {
        return Err(ProviderError::InvalidResponse(
            "embedding indices do not cover the request".to_string(),
        ));
    }
    Ok(data.into_iter().map(|item| item.embedding).collect())
}
