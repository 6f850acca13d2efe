//! Concrete embedding and reasoning providers for `fieldmap-match`.
//!
//! - [`HashedNgramEncoder`]: offline embeddings from hashed character n-grams
//! - [`OpenAiEmbedder`]: any OpenAI-compatible `/embeddings` endpoint
//! - [`ChatReasoner`]: column reasoning through `/chat/completions`
//!
//! [`ProvidersConfig`] picks one of each from configuration and resolves API
//! keys from the environment.

#![deny(unsafe_code)]

pub mod chat;
pub mod config;
pub mod error;
pub mod hashed;
pub mod http;
pub mod openai;

pub use chat::ChatReasoner;
pub use config::{
    CredentialConfig, EmbeddingConfig, ProvidersConfig, ReasoningProviderConfig, ReasoningSetup,
};
pub use error::ProviderConfigError;
pub use hashed::HashedNgramEncoder;
pub use openai::OpenAiEmbedder;
