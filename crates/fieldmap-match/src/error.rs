//! Error types for the resolution engine and its external providers.

use std::time::Duration;

use fieldmap_model::RequestError;
use thiserror::Error;

/// Errors returned by [`MappingEngine::map`](crate::MappingEngine::map).
///
/// Both are caller errors. Tier failures never surface here; they are
/// reported as degradations in the run's statistics.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum MappingError {
    #[error("schema not found: {id}")]
    SchemaNotFound { id: String },

    #[error("invalid request: {0}")]
    InvalidRequest(#[from] RequestError),
}

/// Errors building a [`MappingEngine`](crate::MappingEngine).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineBuildError {
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Failure of an embedding or reasoning provider call.
///
/// Contained at the tier boundary: the tier emits no candidates and the run
/// records a degradation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ProviderError {
    /// The service could not be reached or answered with a server error.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The call did not complete within its deadline.
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    /// The credential used for the call is over its quota.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The credential used for the call was rejected.
    #[error("credential rejected: {0}")]
    Unauthorized(String),

    /// The service answered, but not with something usable.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Quota and auth failures are tied to one credential, so the same
    /// request may succeed with another.
    pub fn is_credential_error(&self) -> bool {
        matches!(self, Self::QuotaExceeded(_) | Self::Unauthorized(_))
    }

    /// Short label used when recording a degraded tier.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::Timeout(_) => "timeout",
            Self::QuotaExceeded(_) => "quota exceeded",
            Self::Unauthorized(_) => "unauthorized",
            Self::InvalidResponse(_) => "invalid response",
        }
    }
}
