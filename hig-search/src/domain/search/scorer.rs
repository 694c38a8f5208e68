//! Multi-factor relevance scoring of a section against a query plan.
//!
//! ```text
//! keyword   = title_ratio * 1.0 + keyword_set_ratio * 0.6 + body_ratio * 0.3
//! structure = 1.0 when the section has structured content matching the intent
//! context   = platform/category agreement with the active filters
//! base      = keyword * 0.6 + structure * 0.25 + context * 0.15
//! final     = base * boosts * quality.score
//! ```
//!
//! Ratios count matched query concepts, a concept being a query token
//! together with its stems and synonyms. Counting concepts rather than raw
//! expanded terms keeps a token with many synonyms from diluting the others.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;

use super::analyzer::normalize_text;
use super::lexicon::Lexicon;
use super::traits::SemanticScorer;
use super::types::{
    Platform, QueryConcept, QueryIntent, QueryPlan, ScoreBreakdown, Section, StructuredContent,
};

/// Weights of the three text fields inside the keyword score.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct FieldWeights {
    pub title: f64,
    pub keywords: f64,
    pub body: f64,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            title: 1.0,
            keywords: 0.6,
            body: 0.3,
        }
    }
}

/// How the factor scores combine into the base score.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct BlendWeights {
    pub semantic: f64,
    pub keyword: f64,
    pub structure: f64,
    pub context: f64,
}

impl BlendWeights {
    /// Baseline scheme used when no semantic similarity is available.
    pub const KEYWORD_ONLY: Self = Self {
        semantic: 0.0,
        keyword: 0.6,
        structure: 0.25,
        context: 0.15,
    };

    /// Scheme used once a semantic scorer provides a similarity.
    pub const SEMANTIC: Self = Self {
        semantic: 0.4,
        keyword: 0.3,
        structure: 0.2,
        context: 0.1,
    };
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self::KEYWORD_ONLY
    }
}

/// Multiplicative boosts applied to the base score.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct BoostFactors {
    /// Every title word appears in the query
    pub exact_title: f64,
    pub platform_match: f64,
    pub category_match: f64,
}

impl Default for BoostFactors {
    fn default() -> Self {
        Self {
            exact_title: 2.0,
            platform_match: 1.5,
            category_match: 1.3,
        }
    }
}

/// All tunable scoring parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub fields: FieldWeights,
    pub keyword_scheme: BlendWeights,
    pub semantic_scheme: BlendWeights,
    pub boosts: BoostFactors,
    /// Results scoring below this are dropped
    pub min_relevance_threshold: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            fields: FieldWeights::default(),
            keyword_scheme: BlendWeights::KEYWORD_ONLY,
            semantic_scheme: BlendWeights::SEMANTIC,
            boosts: BoostFactors::default(),
            min_relevance_threshold: 0.1,
        }
    }
}

/// Normalized words of one text field, with their stems, for term lookup.
struct FieldText {
    forms: HashSet<String>,
    /// Space-padded joined words for phrase lookup
    joined: String,
}

impl FieldText {
    fn new(text: &str, lexicon: &Lexicon) -> Self {
        let words = normalize_text(text);
        let mut forms = HashSet::with_capacity(words.len() * 2);
        for word in &words {
            if let Some(stem) = lexicon.stem(word) {
                forms.insert(stem);
            }
            forms.insert(word.clone());
        }
        Self {
            forms,
            joined: format!(" {} ", words.join(" ")),
        }
    }

    fn matches(&self, term: &str) -> bool {
        if term.contains(' ') {
            self.joined.contains(&format!(" {} ", term))
        } else {
            self.forms.contains(term)
        }
    }
}

/// Scores sections against query plans. Pure and deterministic.
#[derive(Clone)]
pub struct RelevanceScorer {
    lexicon: Arc<Lexicon>,
    weights: ScoringWeights,
    semantic: Option<Arc<dyn SemanticScorer>>,
}

impl RelevanceScorer {
    pub fn new(lexicon: Arc<Lexicon>, weights: ScoringWeights) -> Self {
        Self {
            lexicon,
            weights,
            semantic: None,
        }
    }

    /// Install an optional semantic similarity capability.
    pub fn with_semantic_scorer(mut self, semantic: Arc<dyn SemanticScorer>) -> Self {
        self.semantic = Some(semantic);
        self
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn has_semantic_scorer(&self) -> bool {
        self.semantic.is_some()
    }

    /// Score a section. The final score is always `>= 0`.
    pub fn score(&self, section: &Section, plan: &QueryPlan) -> ScoreBreakdown {
        if plan.concepts.is_empty() {
            return ScoreBreakdown::default();
        }

        let keyword = self.keyword_score(section, &plan.concepts);
        let structure = structure_score(section.structured_content.as_ref(), plan.intent);
        let context = context_score(section, plan);
        let semantic = self
            .semantic
            .as_ref()
            .and_then(|scorer| scorer.similarity(plan, section))
            .map(|similarity| sanitize(similarity).min(1.0));

        let scheme = if semantic.is_some() {
            self.weights.semantic_scheme
        } else {
            self.weights.keyword_scheme
        };
        let base = semantic.unwrap_or(0.0) * scheme.semantic
            + keyword * scheme.keyword
            + structure * scheme.structure
            + context * scheme.context;

        let boost = self.boost(section, plan);
        let quality = sanitize(section.quality.score).min(1.0);

        ScoreBreakdown {
            keyword,
            structure,
            context,
            semantic,
            base,
            boost,
            score: sanitize(base * boost * quality),
        }
    }

    fn keyword_score(&self, section: &Section, concepts: &[QueryConcept]) -> f64 {
        let title = FieldText::new(&section.title, &self.lexicon);
        let body = FieldText::new(&body_text(section), &self.lexicon);
        let keywords: HashSet<String> = section
            .keywords
            .iter()
            .flat_map(|keyword| {
                let stem = self.lexicon.stem(keyword);
                std::iter::once(keyword.clone()).chain(stem)
            })
            .collect();

        let in_title: Vec<bool> = concepts
            .iter()
            .map(|concept| concept.terms.iter().any(|term| title.matches(term)))
            .collect();

        // A title match also counts for the keyword and body fields, so a
        // query term naming the title never dilutes those ratios.
        let ratio = |matches: &dyn Fn(&str) -> bool| {
            let matched = concepts
                .iter()
                .zip(&in_title)
                .filter(|(concept, &titled)| {
                    titled || concept.terms.iter().any(|term| matches(term.as_str()))
                })
                .count();
            (matched as f64 / concepts.len() as f64).min(1.0)
        };

        let title_matched = in_title.iter().filter(|&&titled| titled).count();
        let fields = &self.weights.fields;
        (title_matched as f64 / concepts.len() as f64).min(1.0) * fields.title
            + ratio(&|term| keywords.contains(term)) * fields.keywords
            + ratio(&|term| body.matches(term)) * fields.body
    }

    fn boost(&self, section: &Section, plan: &QueryPlan) -> f64 {
        let boosts = &self.weights.boosts;
        let mut boost = 1.0;
        if self.title_covered_by_query(&section.title, plan) {
            boost *= boosts.exact_title;
        }
        if plan.filters.platform == Some(section.platform) {
            boost *= boosts.platform_match;
        }
        if plan.filters.category == Some(section.category) {
            boost *= boosts.category_match;
        }
        boost
    }

    /// Every significant title word (by stem) appears among the query tokens.
    fn title_covered_by_query(&self, title: &str, plan: &QueryPlan) -> bool {
        let title_words: HashSet<String> = normalize_text(title)
            .into_iter()
            .filter(|word| !self.lexicon.is_stop_word(word))
            .map(|word| self.lexicon.canonical(&word))
            .collect();
        if title_words.is_empty() {
            return false;
        }
        let query_words: HashSet<String> = plan
            .tokens
            .iter()
            .map(|token| self.lexicon.canonical(token))
            .collect();
        title_words.is_subset(&query_words)
    }
}

/// Content, overview, guidelines and examples form the searchable body.
fn body_text(section: &Section) -> String {
    let mut body = section.content.clone();
    if let Some(structured) = &section.structured_content {
        for part in std::iter::once(&structured.overview)
            .chain(&structured.guidelines)
            .chain(&structured.examples)
        {
            body.push(' ');
            body.push_str(part);
        }
    }
    body
}

fn structure_score(structured: Option<&StructuredContent>, intent: QueryIntent) -> f64 {
    let Some(structured) = structured else {
        return 0.0;
    };
    let present = match intent {
        QueryIntent::FindSpecification => !structured.specifications.is_empty(),
        QueryIntent::FindGuideline => !structured.guidelines.is_empty(),
        QueryIntent::FindComponent => {
            !structured.overview.is_empty() || !structured.guidelines.is_empty()
        }
        QueryIntent::ComparePlatforms => {
            !structured.specifications.is_empty() || !structured.guidelines.is_empty()
        }
        QueryIntent::Generic => false,
    };
    if present {
        1.0
    } else {
        0.0
    }
}

/// Mean agreement over the constrained dimensions; 0 when nothing is filtered.
fn context_score(section: &Section, plan: &QueryPlan) -> f64 {
    let mut parts = Vec::with_capacity(2);

    if let Some(platform) = plan.filters.platform {
        parts.push(if section.platform == platform {
            1.0
        } else if section.platform == Platform::Universal {
            0.5
        } else {
            0.0
        });
    }
    if let Some(category) = plan.filters.category {
        parts.push(if section.category == category { 1.0 } else { 0.0 });
    }

    if parts.is_empty() {
        0.0
    } else {
        parts.iter().sum::<f64>() / parts.len() as f64
    }
}

/// Clamp NaN and negatives to zero.
fn sanitize(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.max(0.0)
    }
}
