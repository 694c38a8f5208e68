//! Query analyzer turning free text into a structured [`QueryPlan`].
//!
//! Transforms queries like "compare buttons ios vs macos" into tokens,
//! synonym-expanded concepts, an intent and platform/category filters.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, LazyLock};

use regex::Regex;

use super::lexicon::Lexicon;
use super::types::{QueryConcept, QueryEntities, QueryIntent, QueryPlan, SearchFilters};

static NON_WORD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}]+").unwrap());

/// Lowercase, strip punctuation and split into words.
pub fn normalize_text(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    NON_WORD_PATTERN
        .split(&lower)
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether `haystack` contains `needle` as a whole-word phrase.
///
/// Both sides are normalized first, so punctuation and case are ignored.
/// An empty needle never matches.
pub fn contains_phrase(haystack: &str, needle: &str) -> bool {
    let needle = normalize_text(needle);
    if needle.is_empty() {
        return false;
    }
    let haystack = format!(" {} ", normalize_text(haystack).join(" "));
    haystack.contains(&format!(" {} ", needle.join(" ")))
}

/// Builds query plans from raw query text.
///
/// Never fails: empty or unusable input produces a plan with no expanded
/// terms and [`QueryIntent::Generic`].
#[derive(Debug, Clone)]
pub struct QueryAnalyzer {
    lexicon: Arc<Lexicon>,
}

impl QueryAnalyzer {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        Self { lexicon }
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    /// Analyze a query, merging caller-supplied filters with detected entities.
    ///
    /// Caller-supplied filters always win. A detected platform only becomes a
    /// filter when exactly one is mentioned and the query is not a comparison.
    pub fn analyze(&self, raw_query: &str, requested: SearchFilters) -> QueryPlan {
        let mut plan = QueryPlan {
            raw: raw_query.to_string(),
            requested,
            filters: requested,
            ..Default::default()
        };

        let words = normalize_text(raw_query);
        if words.is_empty() {
            return plan;
        }

        // Phrases are detected before stop words are removed ("sign in")
        let phrases: Vec<String> = words
            .windows(2)
            .map(|pair| format!("{} {}", pair[0], pair[1]))
            .filter(|phrase| self.lexicon.is_known_phrase(phrase))
            .collect();

        plan.tokens = self.tokenize(words);
        plan.entities = self.extract_entities(&plan.tokens);
        plan.intent = self.detect_intent(&plan.tokens, &plan.entities, &requested);

        let detected_platform = match plan.entities.platforms.as_slice() {
            [platform] if plan.intent != QueryIntent::ComparePlatforms => Some(*platform),
            _ => None,
        };
        let detected_category = match plan.entities.categories.as_slice() {
            [category] => Some(*category),
            _ => None,
        };
        plan.filters = SearchFilters {
            platform: requested.platform.or(detected_platform),
            category: requested.category.or(detected_category),
        };

        let mut concepts: Vec<QueryConcept> = self
            .concept_tokens(&plan.tokens, phrases.is_empty())
            .into_iter()
            .map(|token| self.expand(token))
            .collect();
        concepts.extend(phrases.iter().map(|phrase| self.expand(phrase)));

        plan.expanded_terms = concepts
            .iter()
            .flat_map(|concept| concept.terms.iter().cloned())
            .collect();
        plan.concepts = concepts;

        tracing::debug!(
            query = raw_query,
            intent = %plan.intent,
            terms = plan.expanded_terms.len(),
            "Analyzed query"
        );

        plan
    }

    /// Drop short tokens and stop words, deduplicating by canonical form.
    fn tokenize(&self, words: Vec<String>) -> Vec<String> {
        let mut seen = HashSet::new();
        words
            .into_iter()
            .filter(|word| word.chars().count() >= 2 && !self.lexicon.is_stop_word(word))
            .filter(|word| seen.insert(self.lexicon.canonical(word)))
            .collect()
    }

    fn extract_entities(&self, tokens: &[String]) -> QueryEntities {
        let mut entities = QueryEntities::default();

        for token in tokens {
            if let Some(platform) = self.lexicon.platform(token) {
                if !entities.platforms.contains(&platform) {
                    entities.platforms.push(platform);
                }
            } else if let Some(category) = self.lexicon.category(token) {
                if !entities.categories.contains(&category) {
                    entities.categories.push(category);
                }
            } else if self.lexicon.is_component_noun(token) {
                entities.components.push(self.lexicon.canonical(token));
            }
        }

        entities
    }

    /// Ordered intent rules; the first match wins.
    fn detect_intent(
        &self,
        tokens: &[String],
        entities: &QueryEntities,
        requested: &SearchFilters,
    ) -> QueryIntent {
        let has = |predicate: fn(&Lexicon, &str) -> bool| {
            tokens.iter().any(|token| predicate(&self.lexicon, token))
        };

        let mentions_platform = !entities.platforms.is_empty() || requested.platform.is_some();

        if has(Lexicon::is_compare_cue) {
            QueryIntent::ComparePlatforms
        } else if mentions_platform && has(Lexicon::is_specification_cue) {
            QueryIntent::FindSpecification
        } else if has(Lexicon::is_guideline_cue) {
            QueryIntent::FindGuideline
        } else if !entities.components.is_empty() {
            QueryIntent::FindComponent
        } else {
            QueryIntent::Generic
        }
    }

    /// Tokens that carry searchable content.
    ///
    /// Platform and category names become filters and comparison words are
    /// operators, so neither is matched against text, unless nothing else
    /// would be left to search for.
    fn concept_tokens<'a>(&self, tokens: &'a [String], no_phrases: bool) -> Vec<&'a String> {
        let not_operator = |token: &&String| !self.lexicon.is_compare_cue(token);
        let content: Vec<&String> = tokens
            .iter()
            .filter(not_operator)
            .filter(|token| {
                self.lexicon.platform(token).is_none() && self.lexicon.category(token).is_none()
            })
            .collect();

        if !content.is_empty() || !no_phrases {
            return content;
        }

        let without_operators: Vec<&String> = tokens.iter().filter(not_operator).collect();
        if without_operators.is_empty() {
            tokens.iter().collect()
        } else {
            without_operators
        }
    }

    fn expand(&self, token: &str) -> QueryConcept {
        let canonical = self.lexicon.canonical(token);
        let mut terms = BTreeSet::from([token.to_string(), canonical.clone()]);
        if let Some(synonyms) = self.lexicon.synonyms(token) {
            terms.extend(synonyms.iter().cloned());
        }
        QueryConcept {
            token: canonical,
            terms,
        }
    }
}

impl Default for QueryAnalyzer {
    fn default() -> Self {
        Self::new(Arc::new(Lexicon::default()))
    }
}
