//! Column reasoning through an OpenAI-compatible `/chat/completions`
//! endpoint.
//!
//! The model gets the target schema and one batch of columns as JSON and is
//! asked for a JSON object `{"suggestions": [...]}`. Replies wrapped in a
//! Markdown code fence, or a bare array, are accepted too.

use std::time::Duration;

use fieldmap_match::reasoning::{
    Credential, ReasoningItem, ReasoningProvider, ReasoningSuggestion, SchemaSummary,
};
use fieldmap_match::ProviderError;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::http::{build_client, endpoint, read_json, send_error};

const SYSTEM_PROMPT: &str = "You map columns of uploaded spreadsheets onto the fields of a target \
schema. For each column decide which schema field it holds, using its name, its sample values and \
the candidates found by string and embedding similarity. Only use field names from the schema. \
Leave out columns that match no field. Answer with a JSON object of the form \
{\"suggestions\": [{\"column\": \"...\", \"target_field\": \"...\", \"confidence\": 0.0, \
\"rationale\": \"...\"}]} where confidence is between 0 and 1.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    response_format: serde_json::Value,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SuggestionReply {
    Wrapped { suggestions: Vec<ReasoningSuggestion> },
    Bare(Vec<ReasoningSuggestion>),
}

/// Reasoning provider backed by a chat completion model.
pub struct ChatReasoner {
    client: Client,
    url: String,
    model: String,
}

impl ChatReasoner {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(timeout)?,
            url: endpoint(base_url, "chat/completions"),
            model: model.into(),
        })
    }

    fn request<'a>(&'a self, batch: &[ReasoningItem], schema: &SchemaSummary) -> ChatRequest<'a> {
        let payload = json!({
            "schema": schema,
            "columns": batch,
        });
        ChatRequest {
            model: &self.model,
            temperature: 0.0,
            response_format: json!({"type": "json_object"}),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: payload.to_string(),
                },
            ],
        }
    }
}

impl ReasoningProvider for ChatReasoner {
    fn reason(
        &self,
        credential: &Credential,
        batch: &[ReasoningItem],
        schema: &SchemaSummary,
    ) -> Result<Vec<ReasoningSuggestion>, ProviderError> {
        debug!(
            model = %self.model,
            credential = %credential.id,
            columns = batch.len(),
            "requesting column reasoning"
        );
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&credential.secret)
            .json(&self.request(batch, schema))
            .send()
            .map_err(|err| send_error(&err))?;
        let body: ChatResponse = read_json(response)?;
        let content = body
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::InvalidResponse("no choices in reply".to_string()))?;
        parse_suggestions(&content)
    }
}

impl std::fmt::Debug for ChatReasoner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatReasoner")
            .field("url", &self.url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// Decode the model's reply.
pub fn parse_suggestions(content: &str) -> Result<Vec<ReasoningSuggestion>, ProviderError> {
    let text = strip_code_fence(content.trim());
    match serde_json::from_str::<SuggestionReply>(text) {
        Ok(SuggestionReply::Wrapped { suggestions } | SuggestionReply::Bare(suggestions)) => {
            Ok(suggestions)
        }
        Err(err) => Err(ProviderError::InvalidResponse(format!(
            "reply is not a suggestion list: {err}"
        ))),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Skip the info string ("json") on the opening line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
