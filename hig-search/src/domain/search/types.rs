//! Core types for the search domain.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use time::OffsetDateTime;

/// Platform a documentation section applies to.
///
/// `Universal` sections apply to every platform and are always considered
/// alongside a platform-filtered candidate set.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum Platform {
    #[serde(rename = "iOS")]
    #[strum(serialize = "iOS")]
    Ios,
    #[serde(rename = "macOS")]
    #[strum(serialize = "macOS")]
    MacOs,
    #[serde(rename = "watchOS")]
    #[strum(serialize = "watchOS")]
    WatchOs,
    #[serde(rename = "tvOS")]
    #[strum(serialize = "tvOS")]
    TvOs,
    #[serde(rename = "visionOS")]
    #[strum(serialize = "visionOS")]
    VisionOs,
    #[serde(rename = "universal")]
    #[strum(serialize = "universal")]
    Universal,
}

impl Platform {
    /// Lowercase form used when building section ids, e.g. `buttons-ios`.
    pub fn slug(&self) -> String {
        self.to_string().to_lowercase()
    }
}

/// Top-level documentation category.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum Category {
    GettingStarted,
    Foundations,
    Patterns,
    Components,
    Inputs,
    Technologies,
}

/// How the content of a section was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExtractionMethod {
    Structured,
    Heuristic,
    Static,
    Fallback,
}

/// Confidence metadata attached to ingested content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentQuality {
    /// Overall quality in [0, 1]; multiplies the final relevance score
    pub score: f64,
    /// Extraction confidence in [0, 1]
    pub confidence: f64,
    /// Whether the content is synthetic fallback data
    pub is_fallback: bool,
    pub extraction_method: ExtractionMethod,
}

impl Default for ContentQuality {
    fn default() -> Self {
        Self {
            score: 0.5,
            confidence: 0.5,
            is_fallback: false,
            extraction_method: ExtractionMethod::Heuristic,
        }
    }
}

/// Structured parts extracted from a section, when available.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StructuredContent {
    pub overview: String,
    pub guidelines: Vec<String>,
    pub examples: Vec<String>,
    pub specifications: BTreeMap<String, String>,
    pub related_concepts: BTreeSet<String>,
}

/// One indexed documentation unit.
///
/// Sections are immutable once indexed; re-ingestion replaces the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    /// Unique key, e.g. "buttons-ios"
    pub id: String,
    pub title: String,
    pub url: String,
    pub platform: Platform,
    pub category: Category,
    /// Plain text body
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<StructuredContent>,
    /// Normalized keywords; never empty once indexed
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    #[serde(default)]
    pub quality: ContentQuality,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

/// Caller-supplied or auto-detected result filters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    pub platform: Option<Platform>,
    pub category: Option<Category>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.platform.is_none() && self.category.is_none()
    }
}

/// The inferred purpose of a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QueryIntent {
    FindComponent,
    FindGuideline,
    FindSpecification,
    ComparePlatforms,
    #[default]
    Generic,
}

/// A query token together with every term it expands to.
///
/// Relevance ratios count concepts, not raw terms: a concept is matched when
/// any of its terms matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConcept {
    /// Canonical (stemmed) form of the token the concept came from
    pub token: String,
    /// The token, its stem and all synonyms
    pub terms: BTreeSet<String>,
}

/// Entities recognized in the query text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryEntities {
    pub platforms: Vec<Platform>,
    pub categories: Vec<Category>,
    pub components: Vec<String>,
}

/// Structured interpretation of a raw query. One per search.
#[derive(Debug, Clone, Default)]
pub struct QueryPlan {
    /// The query text as received
    pub raw: String,
    /// Normalized tokens after stop-word removal, deduplicated by canonical form
    pub tokens: Vec<String>,
    pub concepts: Vec<QueryConcept>,
    /// Union of all concept terms
    pub expanded_terms: BTreeSet<String>,
    pub intent: QueryIntent,
    pub entities: QueryEntities,
    /// Filters as supplied by the caller
    pub requested: SearchFilters,
    /// Effective filters: caller-supplied merged with detected entities
    pub filters: SearchFilters,
}

impl QueryPlan {
    /// A plan with nothing to match yields no results.
    pub fn is_empty(&self) -> bool {
        self.expanded_terms.is_empty()
    }
}

/// How a result set was produced; lets callers surface confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SearchMethod {
    Matched,
    NoMatch,
    /// At least one result is backed by fallback content
    Degraded,
}

/// Per-factor contribution to a section's relevance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub keyword: f64,
    pub structure: f64,
    pub context: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic: Option<f64>,
    pub base: f64,
    /// Product of all applied boost factors
    pub boost: f64,
    /// Final score: base * boost * quality
    pub score: f64,
}

/// A section that survived scoring, with its score.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedSection {
    pub section: Arc<Section>,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    /// Raw query text is contained in the title; ranked above everything else
    pub title_override: bool,
}

/// Request for the public search operation.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: String,
    pub platform: Option<Platform>,
    pub category: Option<Category>,
    /// Falls back to the configured default and is clamped to the maximum
    pub limit: Option<usize>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn filters(&self) -> SearchFilters {
        SearchFilters {
            platform: self.platform,
            category: self.category,
        }
    }
}

/// Information about how a search was executed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub intent: QueryIntent,
    pub expanded_terms: Vec<String>,
    pub platform_filter: Option<Platform>,
    pub category_filter: Option<Category>,
    /// Sections considered after filtering
    pub candidates: usize,
    /// Sections scoring at or above the relevance threshold
    pub above_threshold: usize,
    pub semantic_enabled: bool,
    pub elapsed_ms: f64,
}

/// Response of the public search operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<RankedSection>,
    pub method: SearchMethod,
    pub diagnostics: Diagnostics,
}

/// Best match for a component lookup plus near-tie alternatives.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    pub best_match: Option<RankedSection>,
    pub alternatives: Vec<RankedSection>,
    pub method: SearchMethod,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn platform_display_and_parse() {
        assert_eq!(Platform::Ios.to_string(), "iOS");
        assert_eq!(Platform::from_str("ios").unwrap(), Platform::Ios);
        assert_eq!(Platform::from_str("MACOS").unwrap(), Platform::MacOs);
        assert_eq!(Platform::Universal.slug(), "universal");
        assert!(Platform::from_str("android").is_err());
    }

    #[test]
    fn category_uses_kebab_case() {
        assert_eq!(Category::GettingStarted.to_string(), "getting-started");
        assert_eq!(
            Category::from_str("Getting-Started").unwrap(),
            Category::GettingStarted
        );
    }

    #[test]
    fn section_deserializes_with_defaults() {
        let json = r#"{
            "id": "buttons-ios",
            "title": "Buttons",
            "url": "https://example.com/buttons",
            "platform": "iOS",
            "category": "components",
            "lastUpdated": "2024-05-01T00:00:00Z"
        }"#;
        let section: Section = serde_json::from_str(json).unwrap();
        assert_eq!(section.platform, Platform::Ios);
        assert!(section.keywords.is_empty());
        assert!(section.structured_content.is_none());
        assert_eq!(section.quality, ContentQuality::default());
    }

    #[test]
    fn search_request_builder_sets_filters() {
        let request = SearchRequest::new("buttons")
            .platform(Platform::MacOs)
            .category(Category::Components)
            .limit(3);
        assert_eq!(
            request.filters(),
            SearchFilters {
                platform: Some(Platform::MacOs),
                category: Some(Category::Components),
            }
        );
        assert_eq!(request.limit, Some(3));
    }
}
