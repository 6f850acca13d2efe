//! Embedding-based similarity between source columns and target fields.

mod cache;
mod matcher;
mod provider;

pub use cache::{SourceVectorMemo, TargetVectorCache, TargetVectors};
pub use matcher::SemanticMatcher;
pub use provider::{EmbeddingProvider, cosine_similarity, l2_normalize};
