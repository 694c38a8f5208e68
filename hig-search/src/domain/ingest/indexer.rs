//! Section indexer syncing sources into the section store.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::source::SectionSource;
use crate::domain::search::{normalize_text, Lexicon, SearchError, Section, SectionStore};

/// Statistics from a sync cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub indexed: usize,
    pub rejected: usize,
    /// Sources that failed to produce sections
    pub errors: usize,
    /// Sections dropped because no source lists them anymore
    pub removed: usize,
    /// Sections in the store after the sync
    pub total: usize,
}

/// Indexer normalizing sections from one or more sources into a store.
///
/// # Example
///
/// ```ignore
/// let indexer = SectionIndexer::new(store.clone(), lexicon)
///     .with_source(Arc::new(FileSectionSource::new("data/sections.json")));
/// let stats = indexer.sync().await;
/// println!("Indexed {} sections", stats.indexed);
/// ```
#[derive(Clone)]
pub struct SectionIndexer {
    store: SectionStore,
    lexicon: Arc<Lexicon>,
    sources: Vec<Arc<dyn SectionSource>>,
}

impl SectionIndexer {
    pub fn new(store: SectionStore, lexicon: Arc<Lexicon>) -> Self {
        Self {
            store,
            lexicon,
            sources: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: Arc<dyn SectionSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn store(&self) -> &SectionStore {
        &self.store
    }

    /// Fetch every source and upsert its normalized sections.
    ///
    /// A failing source is logged and counted, never fatal; sections already
    /// indexed from it stay in place. When every source succeeds, sections
    /// none of them returned (including ones restored from a snapshot) are
    /// removed.
    pub async fn sync(&self) -> IndexStats {
        let mut stats = IndexStats::default();
        let mut seen = HashSet::new();

        for source in &self.sources {
            let sections = match source.fetch_sections().await {
                Ok(sections) => sections,
                Err(e) => {
                    warn!(source = source.name(), error = %e, "Failed to fetch sections");
                    stats.errors += 1;
                    continue;
                }
            };

            let mut accepted = Vec::with_capacity(sections.len());
            for section in sections {
                match normalize_section(section, &self.lexicon) {
                    Ok(section) => accepted.push(section),
                    Err(e) => {
                        warn!(source = source.name(), error = %e, "Rejected section");
                        stats.rejected += 1;
                    }
                }
            }

            seen.extend(accepted.iter().map(|section| section.id.clone()));
            let count = self.store.add_sections(accepted);
            info!(source = source.name(), count, "Synced sections");
            stats.indexed += count;
        }

        if stats.errors == 0 && !self.sources.is_empty() {
            stats.removed = self.store.retain_ids(&seen);
        }

        stats.total = self.store.len();
        info!(
            indexed = stats.indexed,
            rejected = stats.rejected,
            errors = stats.errors,
            removed = stats.removed,
            total = stats.total,
            "Sync completed"
        );
        stats
    }
}

/// Clean up a section for indexing.
///
/// Ids and titles are trimmed and must be non-empty. Keywords are lowercased
/// and deduplicated, and derived from the title (or the id) when none are
/// given; a section left without keywords is rejected.
/// Quality values are clamped to [0, 1].
pub fn normalize_section(mut section: Section, lexicon: &Lexicon) -> Result<Section, SearchError> {
    section.id = section.id.trim().to_string();
    section.title = section.title.trim().to_string();
    if section.id.is_empty() {
        return Err(SearchError::InvalidSection(format!(
            "section titled {:?} has no id",
            section.title
        )));
    }
    if section.title.is_empty() {
        return Err(SearchError::InvalidSection(format!(
            "section {} has no title",
            section.id
        )));
    }

    let mut keywords: BTreeSet<String> = section
        .keywords
        .iter()
        .map(|keyword| keyword.trim().to_lowercase())
        .filter(|keyword| !keyword.is_empty())
        .collect();
    if keywords.is_empty() {
        let title_words = normalize_text(&section.title);
        keywords = title_words
            .iter()
            .filter(|word| !lexicon.is_stop_word(word))
            .cloned()
            .collect();
        if keywords.is_empty() {
            keywords = title_words.into_iter().collect();
        }
        if keywords.is_empty() {
            keywords = normalize_text(&section.id).into_iter().collect();
        }
    }
    if keywords.is_empty() {
        return Err(SearchError::InvalidSection(format!(
            "section {} has no usable keywords",
            section.id
        )));
    }
    section.keywords = keywords;

    section.quality.score = clamp_unit(section.quality.score);
    section.quality.confidence = clamp_unit(section.quality.confidence);

    Ok(section)
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::domain::ingest::source::mock::MockSectionSource;
    use crate::domain::search::types::{Category, ContentQuality, Platform};

    fn make_section(id: &str, title: &str, keywords: &[&str]) -> Section {
        Section {
            id: id.to_string(),
            title: title.to_string(),
            url: format!("https://example.com/{}", id),
            platform: Platform::Ios,
            category: Category::Components,
            content: String::new(),
            structured_content: None,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            quality: ContentQuality::default(),
            last_updated: datetime!(2024-05-01 0:00 UTC),
        }
    }

    fn indexer() -> SectionIndexer {
        SectionIndexer::new(SectionStore::new(), Arc::new(Lexicon::default()))
    }

    #[test]
    fn keywords_are_lowercased_and_deduplicated() {
        let section = make_section("buttons-ios", "Buttons", &["Button", " button ", "TAP", ""]);
        let normalized = normalize_section(section, &Lexicon::default()).unwrap();
        assert_eq!(
            normalized.keywords.into_iter().collect::<Vec<_>>(),
            vec!["button", "tap"]
        );
    }

    #[test]
    fn missing_keywords_are_derived_from_title() {
        let section = make_section("sign-in", "Sign in with Apple", &[]);
        let normalized = normalize_section(section, &Lexicon::default()).unwrap();
        assert!(normalized.keywords.contains("sign"));
        assert!(normalized.keywords.contains("apple"));
        assert!(!normalized.keywords.contains("with"));
    }

    #[test]
    fn stop_word_titles_keep_their_words_as_keywords() {
        let lexicon = Lexicon::default();
        let about = normalize_section(make_section("about", "About", &[]), &lexicon).unwrap();
        assert!(!about.keywords.is_empty());

        let symbols = normalize_section(make_section("app-icons", "--", &[]), &lexicon).unwrap();
        assert!(symbols.keywords.contains("icons"));

        assert!(matches!(
            normalize_section(make_section("--", "?!", &[]), &lexicon),
            Err(SearchError::InvalidSection(_))
        ));
    }

    #[test]
    fn quality_is_clamped() {
        let mut section = make_section("buttons-ios", "Buttons", &["button"]);
        section.quality.score = 1.7;
        section.quality.confidence = f64::NAN;
        let normalized = normalize_section(section, &Lexicon::default()).unwrap();
        assert_eq!(normalized.quality.score, 1.0);
        assert_eq!(normalized.quality.confidence, 0.0);
    }

    #[test]
    fn blank_ids_and_titles_are_rejected() {
        let lexicon = Lexicon::default();
        assert!(matches!(
            normalize_section(make_section("  ", "Buttons", &[]), &lexicon),
            Err(SearchError::InvalidSection(_))
        ));
        assert!(matches!(
            normalize_section(make_section("buttons-ios", " ", &[]), &lexicon),
            Err(SearchError::InvalidSection(_))
        ));
    }

    #[tokio::test]
    async fn sync_indexes_valid_sections_and_counts_rejects() {
        let source = MockSectionSource::with_sections(vec![
            make_section("buttons-ios", "Buttons", &["button"]),
            make_section("", "Orphan", &[]),
            make_section("toggles-ios", "Toggles", &[]),
        ]);
        let indexer = indexer().with_source(Arc::new(source.clone()));

        let stats = indexer.sync().await;
        assert_eq!(
            stats,
            IndexStats {
                indexed: 2,
                rejected: 1,
                errors: 0,
                removed: 0,
                total: 2,
            }
        );
        assert!(indexer.store().get("toggles-ios").is_some());
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn failing_source_keeps_existing_sections() {
        let flaky = MockSectionSource::with_sections(vec![make_section(
            "buttons-ios",
            "Buttons",
            &["button"],
        )]);
        let healthy = MockSectionSource::with_sections(vec![make_section(
            "color-universal",
            "Color",
            &["color"],
        )]);
        let indexer = indexer()
            .with_source(Arc::new(flaky.clone()))
            .with_source(Arc::new(healthy));
        indexer.sync().await;

        flaky.set_sections(None);
        let stats = indexer.sync().await;

        assert_eq!(stats.errors, 1);
        assert_eq!(stats.indexed, 1);
        assert_eq!(stats.total, 2);
        assert!(indexer.store().get("buttons-ios").is_some());
    }

    #[tokio::test]
    async fn sections_dropped_by_every_source_are_removed() {
        let source = MockSectionSource::with_sections(vec![
            make_section("buttons-ios", "Buttons", &["button"]),
            make_section("toggles-ios", "Toggles", &["toggle"]),
        ]);
        let indexer = indexer().with_source(Arc::new(source.clone()));
        // Left over from an earlier snapshot
        indexer
            .store()
            .add_section(make_section("retired-ios", "Retired", &["retired"]));

        let stats = indexer.sync().await;
        assert_eq!(stats.removed, 1);
        assert!(indexer.store().get("retired-ios").is_none());

        source.set_sections(Some(vec![make_section("buttons-ios", "Buttons", &["button"])]));
        let stats = indexer.sync().await;
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.total, 1);
        assert!(indexer.store().get("toggles-ios").is_none());
    }

    #[tokio::test]
    async fn failed_sync_prunes_nothing() {
        let flaky = MockSectionSource::with_sections(vec![make_section(
            "buttons-ios",
            "Buttons",
            &["button"],
        )]);
        let indexer = indexer().with_source(Arc::new(flaky.clone()));
        indexer
            .store()
            .add_section(make_section("restored-ios", "Restored", &["restored"]));

        flaky.set_sections(None);
        let stats = indexer.sync().await;
        assert_eq!(stats.removed, 0);
        assert!(indexer.store().get("restored-ios").is_some());
    }

    #[tokio::test]
    async fn resync_replaces_sections_by_id() {
        let source = MockSectionSource::with_sections(vec![make_section(
            "buttons-ios",
            "Buttons",
            &["button"],
        )]);
        let indexer = indexer().with_source(Arc::new(source.clone()));
        indexer.sync().await;

        let mut updated = make_section("buttons-ios", "Buttons", &["button"]);
        updated.content = "Revised guidance".to_string();
        source.set_sections(Some(vec![updated]));
        indexer.sync().await;

        assert_eq!(indexer.store().len(), 1);
        assert_eq!(
            indexer.store().get("buttons-ios").unwrap().content,
            "Revised guidance"
        );
    }
}
