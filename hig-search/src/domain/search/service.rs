//! Search service composing the analyzer, the section store and the scorer.

use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use itertools::Itertools;
use serde::Deserialize;

use super::analyzer::{contains_phrase, normalize_text, QueryAnalyzer};
use super::lexicon::Lexicon;
use super::scorer::{RelevanceScorer, ScoringWeights};
use super::store::{SectionStore, StoreStats};
use super::traits::SemanticScorer;
use super::types::{
    ComponentSpec, Diagnostics, Platform, QueryIntent, QueryPlan, RankedSection, SearchFilters,
    SearchMethod, SearchRequest, SearchResponse, Section,
};

/// Configuration for the search service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Default number of results to return
    pub default_limit: usize,
    /// Maximum number of results allowed
    pub max_limit: usize,
    /// Alternatives scoring at least this fraction of the best match are near-ties
    pub near_tie_ratio: f64,
    /// Maximum alternatives returned by a component lookup
    pub max_alternatives: usize,
    pub weights: ScoringWeights,
    /// Lexicon document replacing the embedded default
    pub lexicon_path: Option<PathBuf>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 50,
            near_tie_ratio: 0.8,
            max_alternatives: 5,
            weights: ScoringWeights::default(),
            lexicon_path: None,
        }
    }
}

/// Search service over an explicitly owned section store.
///
/// Searching is read-only: every query runs against an immutable snapshot of
/// the store, so any number of searches may run concurrently with ingestion.
///
/// # Examples
///
/// ```
/// use hig_search::domain::search::{SearchRequest, SearchService, SectionStore};
///
/// let service = SearchService::with_defaults(SectionStore::new());
/// let response = service.search(&SearchRequest::new("buttons"));
/// assert!(response.results.is_empty());
/// ```
#[derive(Clone)]
pub struct SearchService {
    store: SectionStore,
    analyzer: QueryAnalyzer,
    scorer: RelevanceScorer,
    config: SearchConfig,
}

impl SearchService {
    /// Create a new search service.
    pub fn new(store: SectionStore, lexicon: Arc<Lexicon>, config: SearchConfig) -> Self {
        Self {
            store,
            analyzer: QueryAnalyzer::new(Arc::clone(&lexicon)),
            scorer: RelevanceScorer::new(lexicon, config.weights),
            config,
        }
    }

    /// Create a search service with the default lexicon and configuration.
    pub fn with_defaults(store: SectionStore) -> Self {
        Self::new(store, Arc::new(Lexicon::default()), SearchConfig::default())
    }

    /// Blend an optional semantic similarity into scoring.
    pub fn with_semantic_scorer(mut self, semantic: Arc<dyn SemanticScorer>) -> Self {
        self.scorer = self.scorer.with_semantic_scorer(semantic);
        self
    }

    pub fn store(&self) -> &SectionStore {
        &self.store
    }

    pub fn analyzer(&self) -> &QueryAnalyzer {
        &self.analyzer
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Execute a search query.
    ///
    /// Never fails: an empty store or a query with nothing to match produces
    /// an empty result list with [`SearchMethod::NoMatch`].
    pub fn search(&self, request: &SearchRequest) -> SearchResponse {
        let started = Instant::now();
        let plan = self.analyzer.analyze(&request.query, request.filters());
        let limit = self.effective_limit(request.limit);
        self.execute(&plan, limit, started)
    }

    /// Look up a component by name.
    ///
    /// The best match is the section whose id is `{name}-{platform}` (or
    /// `{name}-universal`), otherwise the top hit if its title names the
    /// component. Near-ties of the best match are returned as alternatives;
    /// without a best match every ranked hit is an alternative.
    pub fn get_component_spec(&self, component: &str, platform: Option<Platform>) -> ComponentSpec {
        let started = Instant::now();
        let mut plan = self.analyzer.analyze(
            component,
            SearchFilters {
                platform,
                category: None,
            },
        );
        plan.intent = QueryIntent::FindComponent;

        let limit = self.config.max_alternatives + 1;
        let response = self.execute(&plan, limit, started);
        let mut results = response.results;

        let best_index = self
            .direct_match(component, platform)
            .and_then(|id| results.iter().position(|r| r.section.id == id))
            .or_else(|| {
                results
                    .first()
                    .filter(|top| self.names_component(&top.section.title, component))
                    .map(|_| 0)
            });

        let Some(index) = best_index else {
            return ComponentSpec {
                best_match: None,
                alternatives: results,
                method: response.method,
            };
        };

        let best = results.remove(index);
        let cutoff = best.score * self.config.near_tie_ratio;
        let alternatives = results
            .into_iter()
            .filter(|r| r.score >= cutoff)
            .take(self.config.max_alternatives)
            .collect();

        ComponentSpec {
            best_match: Some(best),
            alternatives,
            method: response.method,
        }
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    fn effective_limit(&self, limit: Option<usize>) -> usize {
        limit
            .unwrap_or(self.config.default_limit)
            .min(self.config.max_limit)
            .max(1)
    }

    fn execute(&self, plan: &QueryPlan, limit: usize, started: Instant) -> SearchResponse {
        let snapshot = self.store.snapshot();
        let threshold = self.scorer.weights().min_relevance_threshold;

        let candidates: Vec<&Arc<Section>> = if plan.is_empty() {
            Vec::new()
        } else {
            snapshot
                .values()
                .filter(|section| matches_filters(section, &plan.filters))
                .collect()
        };

        let mut ranked: Vec<RankedSection> = candidates
            .iter()
            .filter_map(|section| {
                let breakdown = self.scorer.score(section, plan);
                (breakdown.score >= threshold).then(|| RankedSection {
                    section: Arc::clone(section),
                    score: breakdown.score,
                    breakdown,
                    title_override: contains_phrase(&section.title, &plan.raw),
                })
            })
            .collect();
        let above_threshold = ranked.len();

        ranked.sort_by(compare_ranked);
        if plan.intent == QueryIntent::ComparePlatforms {
            ranked = interleave_by_platform(ranked, &plan.entities.platforms);
        }
        ranked.truncate(limit);

        let method = if ranked.is_empty() {
            SearchMethod::NoMatch
        } else if ranked.iter().any(|r| r.section.quality.is_fallback) {
            SearchMethod::Degraded
        } else {
            SearchMethod::Matched
        };

        let diagnostics = Diagnostics {
            intent: plan.intent,
            expanded_terms: plan.expanded_terms.iter().cloned().collect(),
            platform_filter: plan.filters.platform,
            category_filter: plan.filters.category,
            candidates: candidates.len(),
            above_threshold,
            semantic_enabled: self.scorer.has_semantic_scorer(),
            elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
        };

        tracing::debug!(
            query = %plan.raw,
            intent = %plan.intent,
            candidates = diagnostics.candidates,
            results = ranked.len(),
            method = %method,
            "Search executed"
        );

        SearchResponse {
            results: ranked,
            method,
            diagnostics,
        }
    }

    /// Id of the section the component lookup addresses directly, if stored.
    fn direct_match(&self, component: &str, platform: Option<Platform>) -> Option<String> {
        let slug = normalize_text(component).join("-");
        if slug.is_empty() {
            return None;
        }
        platform
            .into_iter()
            .chain(std::iter::once(Platform::Universal))
            .map(|p| format!("{}-{}", slug, p.slug()))
            .find(|id| self.store.get(id).is_some())
    }

    /// Title and component name agree word for word, modulo stemming.
    fn names_component(&self, title: &str, component: &str) -> bool {
        let lexicon = self.analyzer.lexicon();
        let canonical = |text: &str| -> Vec<String> {
            normalize_text(text)
                .iter()
                .map(|word| lexicon.canonical(word))
                .collect()
        };
        let name = canonical(component);
        !name.is_empty() && canonical(title) == name
    }
}

/// Platform filters keep universal sections; category filters are exact.
fn matches_filters(section: &Section, filters: &SearchFilters) -> bool {
    let platform_ok = filters
        .platform
        .map_or(true, |p| section.platform == p || section.platform == Platform::Universal);
    let category_ok = filters.category.map_or(true, |c| section.category == c);
    platform_ok && category_ok
}

/// Result order: title overrides first, then score, quality, recency and title.
fn compare_ranked(a: &RankedSection, b: &RankedSection) -> Ordering {
    b.title_override
        .cmp(&a.title_override)
        .then_with(|| b.score.total_cmp(&a.score))
        .then_with(|| b.section.quality.score.total_cmp(&a.section.quality.score))
        .then_with(|| b.section.last_updated.cmp(&a.section.last_updated))
        .then_with(|| a.section.title.cmp(&b.section.title))
        .then_with(|| a.section.id.cmp(&b.section.id))
}

/// Round-robin sorted results across platforms so no single platform
/// dominates a comparison. Requested platforms lead, in the order mentioned;
/// title overrides stay on top.
fn interleave_by_platform(
    ranked: Vec<RankedSection>,
    requested: &[Platform],
) -> Vec<RankedSection> {
    let (overrides, rest): (Vec<_>, Vec<_>) =
        ranked.into_iter().partition(|r| r.title_override);

    let mut groups = rest.into_iter().into_group_map_by(|r| r.section.platform);
    let mut order: Vec<Platform> = requested
        .iter()
        .copied()
        .filter(|p| groups.contains_key(p))
        .collect();
    let others = groups
        .iter()
        .filter(|(platform, _)| !order.contains(platform))
        .sorted_by(|(_, a), (_, b)| compare_ranked(&a[0], &b[0]))
        .map(|(platform, _)| *platform)
        .collect::<Vec<_>>();
    order.extend(others);

    let mut queues: Vec<std::vec::IntoIter<RankedSection>> = order
        .iter()
        .filter_map(|platform| groups.remove(platform))
        .map(Vec::into_iter)
        .collect();

    let mut interleaved = overrides;
    loop {
        let before = interleaved.len();
        for queue in queues.iter_mut() {
            if let Some(next) = queue.next() {
                interleaved.push(next);
            }
        }
        if interleaved.len() == before {
            break;
        }
    }
    interleaved
}
