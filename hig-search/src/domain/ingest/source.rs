//! Where sections come from before they are normalized and indexed.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::cache::ContentFetcher;
use crate::domain::search::{Result, Section};

/// Trait for fetching raw sections from an upstream source.
#[async_trait]
pub trait SectionSource: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    async fn fetch_sections(&self) -> Result<Vec<Section>>;
}

/// Sections stored as a JSON array on disk, e.g. the bundled seed corpus.
#[derive(Debug, Clone)]
pub struct FileSectionSource {
    path: PathBuf,
    name: String,
}

impl FileSectionSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            name: format!("file:{}", path.display()),
            path,
        }
    }
}

#[async_trait]
impl SectionSource for FileSectionSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_sections(&self) -> Result<Vec<Section>> {
        let json = tokio::fs::read_to_string(&self.path).await?;
        let sections: Vec<Section> = serde_json::from_str(&json)?;
        debug!(path = %self.path.display(), count = sections.len(), "Read section file");
        Ok(sections)
    }
}

/// Sections published as a JSON feed, fetched through the resilient cache so
/// a dead upstream keeps serving the last good feed.
#[derive(Clone)]
pub struct FeedSectionSource {
    fetcher: ContentFetcher,
    url: String,
}

impl FeedSectionSource {
    pub fn new(fetcher: ContentFetcher, url: impl Into<String>) -> Self {
        Self {
            fetcher,
            url: url.into(),
        }
    }
}

#[async_trait]
impl SectionSource for FeedSectionSource {
    fn name(&self) -> &str {
        &self.url
    }

    async fn fetch_sections(&self) -> Result<Vec<Section>> {
        let hit = self.fetcher.fetch(&self.url).await?;
        if !hit.is_fresh() {
            debug!(url = %self.url, tier = %hit.tier, "Indexing cached feed");
        }
        Ok(serde_json::from_str(&hit.value)?)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::domain::search::SearchError;

    /// Source returning a fixed batch of sections, or failing when `None`.
    #[derive(Clone, Default)]
    pub struct MockSectionSource {
        sections: Arc<Mutex<Option<Vec<Section>>>>,
        call_count: Arc<AtomicUsize>,
    }

    impl MockSectionSource {
        pub fn with_sections(sections: Vec<Section>) -> Self {
            let source = Self::default();
            source.set_sections(Some(sections));
            source
        }

        pub fn failing() -> Self {
            Self::default()
        }

        pub fn set_sections(&self, sections: Option<Vec<Section>>) {
            *self.sections.lock().unwrap() = sections;
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SectionSource for MockSectionSource {
        fn name(&self) -> &str {
            "mock"
        }

        async fn fetch_sections(&self) -> Result<Vec<Section>> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            self.sections
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| SearchError::Io(std::io::Error::other("source unavailable")))
        }
    }
}
