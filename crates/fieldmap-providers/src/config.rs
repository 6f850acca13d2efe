//! Which providers to build, as read from the `[providers]` table of
//! `fieldmap.toml`.
//!
//! ```toml
//! [providers.embedding]
//! kind = "openai"
//! base_url = "https://api.openai.com/v1"
//! model = "text-embedding-3-small"
//! api_key_env = "OPENAI_API_KEY"
//!
//! [providers.reasoning]
//! kind = "chat"
//! base_url = "https://api.openai.com/v1"
//! model = "gpt-4o-mini"
//!
//! [[providers.reasoning.credentials]]
//! id = "primary"
//! api_key_env = "FIELDMAP_KEY_PRIMARY"
//! daily_quota = 500
//! ```
//!
//! Secrets never live in the file; each credential names the environment
//! variable holding its key.

use std::sync::Arc;
use std::time::Duration;

use fieldmap_match::reasoning::{Credential, ReasoningProvider};
use fieldmap_match::semantic::EmbeddingProvider;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::chat::ChatReasoner;
use crate::error::ProviderConfigError;
use crate::hashed::{DEFAULT_DIMENSIONS, HashedNgramEncoder};
use crate::openai::OpenAiEmbedder;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub embedding: EmbeddingConfig,
    pub reasoning: ReasoningProviderConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EmbeddingConfig {
    /// No semantic tier.
    None,
    /// Offline hashed n-gram vectors.
    Hashed {
        #[serde(default = "default_dimensions")]
        dimensions: usize,
    },
    OpenAi {
        base_url: String,
        model: String,
        api_key_env: String,
        #[serde(default)]
        dimensions: Option<usize>,
        #[serde(default = "default_http_timeout_ms")]
        timeout_ms: u64,
    },
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self::Hashed {
            dimensions: DEFAULT_DIMENSIONS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ReasoningProviderConfig {
    /// No reasoning tier.
    #[default]
    None,
    Chat {
        base_url: String,
        model: String,
        #[serde(default = "default_http_timeout_ms")]
        timeout_ms: u64,
        #[serde(default)]
        credentials: Vec<CredentialConfig>,
    },
}

/// One credential entry; the key itself comes from `api_key_env`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialConfig {
    pub id: String,
    pub api_key_env: String,
    #[serde(default = "default_daily_quota")]
    pub daily_quota: u32,
    #[serde(default = "default_failure_limit")]
    pub failure_limit: u32,
}

fn default_dimensions() -> usize {
    DEFAULT_DIMENSIONS
}

fn default_http_timeout_ms() -> u64 {
    60_000
}

fn default_daily_quota() -> u32 {
    1_000
}

fn default_failure_limit() -> u32 {
    3
}

/// A configured reasoning provider and the credentials to call it with.
pub struct ReasoningSetup {
    pub provider: Arc<dyn ReasoningProvider>,
    pub credentials: Vec<Credential>,
}

impl ProvidersConfig {
    /// Build the embedding provider, reading API keys from the process
    /// environment.
    pub fn build_embedder(
        &self,
    ) -> Result<Option<Arc<dyn EmbeddingProvider>>, ProviderConfigError> {
        self.build_embedder_with(|var| std::env::var(var).ok())
    }

    /// Build the embedding provider, looking API keys up with `lookup`.
    pub fn build_embedder_with<F>(
        &self,
        lookup: F,
    ) -> Result<Option<Arc<dyn EmbeddingProvider>>, ProviderConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider: Arc<dyn EmbeddingProvider> = match &self.embedding {
            EmbeddingConfig::None => return Ok(None),
            EmbeddingConfig::Hashed { dimensions } => {
                if *dimensions == 0 {
                    return Err(ProviderConfigError::Invalid(
                        "hashed embedding dimensions must be at least 1".to_string(),
                    ));
                }
                Arc::new(HashedNgramEncoder::new(*dimensions))
            }
            EmbeddingConfig::OpenAi {
                base_url,
                model,
                api_key_env,
                dimensions,
                timeout_ms,
            } => {
                let api_key = require_key(&lookup, api_key_env, "embedding provider")?;
                Arc::new(OpenAiEmbedder::new(
                    base_url,
                    model.clone(),
                    api_key,
                    *dimensions,
                    Duration::from_millis(*timeout_ms),
                )?)
            }
        };
        info!(model = provider.model_id(), "embedding provider configured");
        Ok(Some(provider))
    }

    /// Build the reasoning provider and its credentials, reading API keys
    /// from the process environment.
    pub fn build_reasoner(&self) -> Result<Option<ReasoningSetup>, ProviderConfigError> {
        self.build_reasoner_with(|var| std::env::var(var).ok())
    }

    /// Build the reasoning provider, looking API keys up with `lookup`.
    pub fn build_reasoner_with<F>(
        &self,
        lookup: F,
    ) -> Result<Option<ReasoningSetup>, ProviderConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let ReasoningProviderConfig::Chat {
            base_url,
            model,
            timeout_ms,
            credentials,
        } = &self.reasoning
        else {
            return Ok(None);
        };
        if credentials.is_empty() {
            return Err(ProviderConfigError::Invalid(
                "reasoning provider needs at least one credential".to_string(),
            ));
        }

        let mut resolved = Vec::with_capacity(credentials.len());
        for entry in credentials {
            if resolved.iter().any(|c: &Credential| c.id == entry.id) {
                return Err(ProviderConfigError::Invalid(format!(
                    "duplicate credential id `{}`",
                    entry.id
                )));
            }
            let what = format!("credential `{}`", entry.id);
            let secret = require_key(&lookup, &entry.api_key_env, &what)?;
            resolved.push(Credential::new(
                entry.id.clone(),
                secret,
                entry.daily_quota,
                entry.failure_limit.max(1),
            ));
        }

        let timeout = Duration::from_millis(*timeout_ms);
        let provider = ChatReasoner::new(base_url, model.clone(), timeout)?;
        info!(model = %model, credentials = resolved.len(), "reasoning provider configured");
        Ok(Some(ReasoningSetup {
            provider: Arc::new(provider),
            credentials: resolved,
        }))
    }
}

fn require_key<F>(lookup: &F, var: &str, owner: &str) -> Result<String, ProviderConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ProviderConfigError::MissingApiKey {
            var: var.to_string(),
            owner: owner.to_string(),
        })
}
