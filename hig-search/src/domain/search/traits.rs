//! Trait definitions for search domain abstractions.
//!
//! These traits enable dependency injection and easy testing through mocking.

use super::types::{QueryPlan, Section};
use crate::domain::cache::CacheError;

/// Error type for search and indexing operations.
///
/// Searching itself never fails; these errors come from loading data into the
/// index (snapshots, lexicons, section sources).
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported snapshot version {found} (expected {expected})")]
    SnapshotVersion { found: u32, expected: u32 },

    #[error("Invalid section: {0}")]
    InvalidSection(String),

    #[error("Invalid lexicon: {0}")]
    Lexicon(String),

    #[error("Source fetch error: {0}")]
    Source(#[from] CacheError),
}

pub type Result<T> = std::result::Result<T, SearchError>;

/// Optional semantic similarity capability.
///
/// When a scorer is installed and returns a similarity, the relevance scorer
/// blends it into the base score using the semantic weighting scheme. When it
/// is absent, or declines a pair by returning `None`, keyword-only weights
/// apply unchanged.
pub trait SemanticScorer: Send + Sync {
    /// Similarity between the query and the section, in [0, 1].
    fn similarity(&self, plan: &QueryPlan, section: &Section) -> Option<f64>;
}
