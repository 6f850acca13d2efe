//! Errors raised while turning provider configuration into providers.

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProviderConfigError {
    /// An API key variable named in the configuration is not set.
    #[error("environment variable {var} is not set (needed by {owner})")]
    MissingApiKey { var: String, owner: String },

    #[error("invalid provider configuration: {0}")]
    Invalid(String),

    #[error("failed to create HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
