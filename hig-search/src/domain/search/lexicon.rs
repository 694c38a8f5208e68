//! Query vocabulary: stop words, synonyms, stemming rules and gazetteers.
//!
//! The vocabulary is data, not code. A default lexicon is embedded from
//! `data/lexicon.json`; deployments can point `search.lexicon_path` at their
//! own document with the same shape.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

use serde::Deserialize;

use super::traits::{Result, SearchError};
use super::types::{Category, Platform};

static DEFAULT_LEXICON: LazyLock<Lexicon> = LazyLock::new(|| {
    Lexicon::from_json(include_str!("../../../data/lexicon.json"))
        .expect("embedded lexicon is valid")
});

/// Suffix rewrite used by the stemmer, e.g. "ies" -> "y".
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StemRule {
    pub suffix: String,
    #[serde(default)]
    pub replacement: String,
    /// Minimum length of the token once the suffix is removed
    pub min_stem: usize,
    /// Rule does not apply to tokens ending with this suffix
    #[serde(default)]
    pub unless_suffix: Option<String>,
}

impl StemRule {
    fn apply(&self, token: &str) -> Option<String> {
        let stem = token.strip_suffix(self.suffix.as_str())?;
        if stem.chars().count() < self.min_stem {
            return None;
        }
        if let Some(unless) = &self.unless_suffix {
            if token.ends_with(unless.as_str()) {
                return None;
            }
        }
        Some(format!("{}{}", stem, self.replacement))
    }
}

/// Word lists that steer intent detection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IntentCues {
    pub compare: HashSet<String>,
    pub specification: HashSet<String>,
    pub guideline: HashSet<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LexiconDocument {
    #[serde(default)]
    stop_words: Vec<String>,
    #[serde(default)]
    synonym_groups: Vec<Vec<String>>,
    #[serde(default)]
    stem_rules: Vec<StemRule>,
    #[serde(default)]
    platforms: HashMap<String, Platform>,
    #[serde(default)]
    categories: HashMap<String, Category>,
    #[serde(default)]
    component_nouns: Vec<String>,
    #[serde(default)]
    intent_cues: IntentCues,
}

/// Lookup tables used by the query analyzer and indexer.
#[derive(Debug, Clone)]
pub struct Lexicon {
    stop_words: HashSet<String>,
    synonyms: HashMap<String, BTreeSet<String>>,
    stem_rules: Vec<StemRule>,
    platforms: HashMap<String, Platform>,
    categories: HashMap<String, Category>,
    component_nouns: HashSet<String>,
    intent_cues: IntentCues,
}

impl Lexicon {
    /// Parse a lexicon document.
    ///
    /// Synonym groups are symmetric: every member maps to every other member
    /// of its group. Single-word members are also reachable through their stem.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: LexiconDocument = serde_json::from_str(json)?;

        let mut lexicon = Self {
            stop_words: lowercase_all(document.stop_words),
            synonyms: HashMap::new(),
            stem_rules: document.stem_rules,
            platforms: lowercase_keys(document.platforms),
            categories: lowercase_keys(document.categories),
            component_nouns: HashSet::new(),
            intent_cues: IntentCues {
                compare: lowercase_all(document.intent_cues.compare),
                specification: lowercase_all(document.intent_cues.specification),
                guideline: lowercase_all(document.intent_cues.guideline),
            },
        };

        lexicon.component_nouns = document
            .component_nouns
            .iter()
            .map(|noun| lexicon.canonical(&noun.to_lowercase()))
            .collect();

        for group in document.synonym_groups {
            let members: BTreeSet<String> = group
                .iter()
                .map(|term| term.trim().to_lowercase())
                .collect();
            if members.iter().any(String::is_empty) {
                return Err(SearchError::Lexicon(format!(
                    "empty term in synonym group {:?}",
                    group
                )));
            }

            for member in &members {
                let others: BTreeSet<String> =
                    members.iter().filter(|m| *m != member).cloned().collect();
                let mut keys = vec![member.clone()];
                if !member.contains(' ') {
                    let canonical = lexicon.canonical(member);
                    if canonical != *member {
                        keys.push(canonical);
                    }
                }
                for key in keys {
                    lexicon
                        .synonyms
                        .entry(key)
                        .or_default()
                        .extend(others.iter().cloned());
                }
            }
        }

        Ok(lexicon)
    }

    /// Read a lexicon document from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn is_stop_word(&self, token: &str) -> bool {
        self.stop_words.contains(token)
    }

    /// Apply the first matching stem rule, if any.
    pub fn stem(&self, token: &str) -> Option<String> {
        self.stem_rules.iter().find_map(|rule| rule.apply(token))
    }

    /// The stem of a token, or the token itself.
    pub fn canonical(&self, token: &str) -> String {
        self.stem(token).unwrap_or_else(|| token.to_string())
    }

    /// Synonyms of a term, looked up by the term and then by its stem.
    pub fn synonyms(&self, term: &str) -> Option<&BTreeSet<String>> {
        self.synonyms
            .get(term)
            .or_else(|| self.synonyms.get(&self.canonical(term)))
    }

    /// Whether a multi-word phrase has its own synonym entry.
    pub fn is_known_phrase(&self, phrase: &str) -> bool {
        phrase.contains(' ') && self.synonyms.contains_key(phrase)
    }

    pub fn platform(&self, token: &str) -> Option<Platform> {
        self.platforms.get(token).copied()
    }

    pub fn category(&self, token: &str) -> Option<Category> {
        self.categories.get(token).copied()
    }

    pub fn is_component_noun(&self, token: &str) -> bool {
        self.component_nouns.contains(token)
            || self.component_nouns.contains(&self.canonical(token))
    }

    pub fn is_compare_cue(&self, token: &str) -> bool {
        self.cue_matches(&self.intent_cues.compare, token)
    }

    pub fn is_specification_cue(&self, token: &str) -> bool {
        self.cue_matches(&self.intent_cues.specification, token)
    }

    pub fn is_guideline_cue(&self, token: &str) -> bool {
        self.cue_matches(&self.intent_cues.guideline, token)
    }

    fn cue_matches(&self, cues: &HashSet<String>, token: &str) -> bool {
        cues.contains(token) || cues.contains(&self.canonical(token))
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        DEFAULT_LEXICON.clone()
    }
}

fn lowercase_all(words: impl IntoIterator<Item = String>) -> HashSet<String> {
    words.into_iter().map(|w| w.trim().to_lowercase()).collect()
}

fn lowercase_keys<V>(map: HashMap<String, V>) -> HashMap<String, V> {
    map.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect()
}
