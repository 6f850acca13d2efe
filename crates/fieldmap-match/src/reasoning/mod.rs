//! The external reasoning tier: batching, credential failover and the answer
//! cache.

mod cache;
mod client;
mod credentials;
mod provider;

pub use cache::ReasoningCache;
pub use client::{PendingColumn, ReasoningClient};
pub use credentials::{Clock, CredentialPool, CredentialState, CredentialStatus, Lease, SystemClock};
pub use provider::{
    Credential, FieldSummary, ReasoningItem, ReasoningProvider, ReasoningSuggestion, SchemaSummary,
};
