//! Section search - relevance ranking over Human Interface Guidelines content.
//!
//! This module provides a search system that combines:
//! - **Query analysis** into tokens, synonym concepts, intent and filters
//! - **Multi-factor scoring** of keyword, structure and context agreement
//! - **Optional semantic similarity** blended in when a scorer is installed
//!
//! # Architecture
//!
//! - [`QueryAnalyzer`] - Free text to [`QueryPlan`], driven by a [`Lexicon`]
//! - [`RelevanceScorer`] - Pure scoring of one section against one plan
//! - [`SectionStore`] - Copy-on-write section index shared by readers
//! - [`SearchService`] - Orchestrates the above into the public API
//!
//! # Example
//!
//! ```ignore
//! use hig_search::domain::search::{SearchRequest, SearchService, SectionStore};
//! use hig_search::domain::search::types::Platform;
//!
//! let store = SectionStore::new();
//! let service = SearchService::with_defaults(store.clone());
//!
//! let response = service.search(&SearchRequest::new("button design").platform(Platform::Ios));
//! ```
//!
//! # Query Syntax
//!
//! - `"button design"` → intent: find_component, concepts: button, design
//! - `"ios button dimensions"` → intent: find_specification, platform: iOS
//! - `"compare buttons ios vs macos"` → intent: compare_platforms, no platform filter
//! - `"navigation patterns"` → category: patterns, concepts: navigation

mod analyzer;
mod lexicon;
mod scorer;
mod service;
mod snapshot;
mod store;
mod traits;

pub mod types;

pub use analyzer::{contains_phrase, normalize_text, QueryAnalyzer};
pub use lexicon::Lexicon;
pub use scorer::{BlendWeights, BoostFactors, FieldWeights, RelevanceScorer, ScoringWeights};
pub use service::{SearchConfig, SearchService};
pub use snapshot::{IndexSnapshot, SectionRecord, SnapshotMetadata, SNAPSHOT_VERSION};
pub use store::{SectionStore, StoreStats};
pub use traits::{Result, SearchError, SemanticScorer};
pub use types::{
    ComponentSpec, QueryPlan, RankedSection, SearchMethod, SearchRequest, SearchResponse, Section,
};
