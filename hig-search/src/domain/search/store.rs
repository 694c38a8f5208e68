//! In-memory section store with copy-on-write snapshots.
//!
//! Readers take an `Arc` of the current immutable map and search it without
//! holding any lock. Writers swap in a new map, so a reader never observes a
//! half-written section.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{info, warn};

use super::snapshot::IndexSnapshot;
use super::traits::Result;
use super::types::{Category, Platform, Section};

pub type SectionMap = HashMap<String, Arc<Section>>;

/// Counts describing the indexed corpus.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total: usize,
    pub by_platform: BTreeMap<Platform, usize>,
    pub by_category: BTreeMap<Category, usize>,
    /// Sections backed by synthetic fallback content
    pub fallback_sections: usize,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_updated: Option<OffsetDateTime>,
}

/// Shared, cheaply cloneable section store.
#[derive(Clone, Default)]
pub struct SectionStore {
    sections: Arc<RwLock<Arc<SectionMap>>>,
}

impl SectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a section by id.
    pub fn add_section(&self, section: Section) {
        self.add_sections(std::iter::once(section));
    }

    /// Insert or replace many sections in a single swap.
    ///
    /// Returns the number of sections written.
    pub fn add_sections(&self, sections: impl IntoIterator<Item = Section>) -> usize {
        let mut guard = self.sections.write().unwrap_or_else(PoisonError::into_inner);
        let map = Arc::make_mut(&mut guard);
        let mut written = 0;
        for section in sections {
            map.insert(section.id.clone(), Arc::new(section));
            written += 1;
        }
        written
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Section>> {
        let mut guard = self.sections.write().unwrap_or_else(PoisonError::into_inner);
        Arc::make_mut(&mut guard).remove(id)
    }

    /// Drop every section whose id is not in `keep`, in a single swap.
    ///
    /// Returns the number of sections removed.
    pub fn retain_ids(&self, keep: &HashSet<String>) -> usize {
        let mut guard = self.sections.write().unwrap_or_else(PoisonError::into_inner);
        if guard.keys().all(|id| keep.contains(id)) {
            return 0;
        }
        let map = Arc::make_mut(&mut guard);
        let before = map.len();
        map.retain(|id, _| keep.contains(id));
        before - map.len()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Section>> {
        self.snapshot().get(id).cloned()
    }

    /// The current immutable view of all sections.
    pub fn snapshot(&self) -> Arc<SectionMap> {
        Arc::clone(&self.sections.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        let snapshot = self.snapshot();
        let mut stats = StoreStats {
            total: snapshot.len(),
            ..Default::default()
        };
        for section in snapshot.values() {
            *stats.by_platform.entry(section.platform).or_default() += 1;
            *stats.by_category.entry(section.category).or_default() += 1;
            if section.quality.is_fallback {
                stats.fallback_sections += 1;
            }
            stats.last_updated = stats.last_updated.max(Some(section.last_updated));
        }
        stats
    }

    /// Build the persisted snapshot document for the current contents.
    pub fn snapshot_document(&self) -> IndexSnapshot {
        IndexSnapshot::from_sections(self.snapshot().values().map(Arc::as_ref))
    }

    /// Restore sections from a snapshot without touching ids already present.
    ///
    /// Returns the number of sections restored.
    pub fn restore(&self, snapshot: IndexSnapshot) -> usize {
        let mut guard = self.sections.write().unwrap_or_else(PoisonError::into_inner);
        let map = Arc::make_mut(&mut guard);
        let mut restored = 0;
        for section in snapshot.into_sections() {
            if !map.contains_key(&section.id) {
                map.insert(section.id.clone(), Arc::new(section));
                restored += 1;
            }
        }
        restored
    }

    /// Persist the current contents to `path`.
    pub async fn save_snapshot(&self, path: &Path) -> Result<()> {
        let document = self.snapshot_document();
        document.save(path).await?;
        info!(
            path = %path.display(),
            sections = document.metadata.total_sections,
            "Saved index snapshot"
        );
        Ok(())
    }

    /// Warm the store from a snapshot file.
    ///
    /// The snapshot is advisory: a missing, unreadable or incompatible file is
    /// logged and ignored. Returns the number of sections restored.
    pub async fn load_snapshot(&self, path: &Path) -> usize {
        if !path.exists() {
            info!(path = %path.display(), "No index snapshot found, starting cold");
            return 0;
        }
        match IndexSnapshot::load(path).await {
            Ok(snapshot) => {
                let restored = self.restore(snapshot);
                info!(path = %path.display(), restored, "Restored index snapshot");
                restored
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unusable index snapshot");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::domain::search::types::ContentQuality;

    fn make_section(id: &str, content: &str) -> Section {
        Section {
            id: id.to_string(),
            title: "Buttons".to_string(),
            url: format!("https://example.com/{}", id),
            platform: Platform::Ios,
            category: Category::Components,
            content: content.to_string(),
            structured_content: None,
            keywords: ["button".to_string()].into(),
            quality: ContentQuality::default(),
            last_updated: datetime!(2024-05-01 0:00 UTC),
        }
    }

    #[test]
    fn upsert_is_idempotent_by_id() {
        let store = SectionStore::new();
        store.add_section(make_section("buttons-ios", "first"));
        store.add_section(make_section("buttons-ios", "second"));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("buttons-ios").unwrap().content, "second");
    }

    #[test]
    fn snapshots_are_isolated_from_later_writes() {
        let store = SectionStore::new();
        store.add_section(make_section("buttons-ios", "first"));

        let before = store.snapshot();
        store.add_section(make_section("buttons-ios", "second"));
        store.add_section(make_section("buttons-macos", "other"));

        assert_eq!(before.len(), 1);
        assert_eq!(before["buttons-ios"].content, "first");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn clones_share_contents() {
        let store = SectionStore::new();
        let handle = store.clone();
        handle.add_section(make_section("buttons-ios", "first"));
        assert!(!store.is_empty());
        assert!(store.remove("buttons-ios").is_some());
        assert!(handle.is_empty());
    }

    #[test]
    fn retain_ids_prunes_unlisted_sections() {
        let store = SectionStore::new();
        store.add_sections(vec![
            make_section("buttons-ios", "x"),
            make_section("buttons-macos", "y"),
        ]);
        let before = store.snapshot();

        let keep = HashSet::from(["buttons-ios".to_string()]);
        assert_eq!(store.retain_ids(&keep), 1);
        assert_eq!(store.retain_ids(&keep), 0);
        assert!(store.get("buttons-macos").is_none());
        assert_eq!(before.len(), 2);
    }

    #[test]
    fn stats_count_platforms_and_fallbacks() {
        let store = SectionStore::new();
        let mut fallback = make_section("fallback", "");
        fallback.platform = Platform::Universal;
        fallback.quality.is_fallback = true;
        fallback.last_updated = datetime!(2024-06-01 0:00 UTC);
        store.add_sections(vec![make_section("buttons-ios", "x"), fallback]);

        let stats = store.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_platform[&Platform::Ios], 1);
        assert_eq!(stats.by_platform[&Platform::Universal], 1);
        assert_eq!(stats.by_category[&Category::Components], 2);
        assert_eq!(stats.fallback_sections, 1);
        assert_eq!(stats.last_updated, Some(datetime!(2024-06-01 0:00 UTC)));
    }

    #[test]
    fn restore_keeps_existing_sections() {
        let source = SectionStore::new();
        source.add_sections(vec![
            make_section("buttons-ios", "old body"),
            make_section("buttons-macos", "old body"),
        ]);
        let snapshot = source.snapshot_document();

        let store = SectionStore::new();
        store.add_section(make_section("buttons-ios", "fresh body"));
        let restored = store.restore(snapshot);

        assert_eq!(restored, 1);
        assert_eq!(store.get("buttons-ios").unwrap().content, "fresh body");
        // Snapshots carry no body text
        assert_eq!(store.get("buttons-macos").unwrap().content, "");
    }

    #[tokio::test]
    async fn snapshot_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("index.json");

        let source = SectionStore::new();
        source.add_section(make_section("buttons-ios", "body"));
        source.save_snapshot(&path).await.unwrap();

        let store = SectionStore::new();
        assert_eq!(store.load_snapshot(&path).await, 1);
        assert_eq!(store.get("buttons-ios").unwrap().title, "Buttons");
    }

    #[tokio::test]
    async fn missing_or_corrupt_snapshot_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = SectionStore::new();

        assert_eq!(store.load_snapshot(&dir.path().join("absent.json")).await, 0);

        let corrupt = dir.path().join("corrupt.json");
        tokio::fs::write(&corrupt, "{not json").await.unwrap();
        assert_eq!(store.load_snapshot(&corrupt).await, 0);
        assert!(store.is_empty());
    }
}
