//! Composition root: builds the services from settings.
//!
//! This is the only place that picks concrete sources and origins.

use std::sync::Arc;

use tracing::info;

use crate::{
    app_state::AppState,
    config::Settings,
    domain::{
        cache::{ContentFetcher, HttpOrigin, ResilientCache},
        ingest::{FeedSectionSource, FileSectionSource, SectionIndexer},
        search::{Lexicon, SearchService, SectionStore},
    },
};

/// Everything the server needs, wired but not yet started.
pub struct Services {
    pub app_state: AppState,
    pub indexer: SectionIndexer,
}

pub fn build_services(settings: &Settings) -> anyhow::Result<Services> {
    let lexicon = match &settings.search.lexicon_path {
        Some(path) => {
            info!(path = %path.display(), "Loading lexicon");
            Arc::new(Lexicon::load(path)?)
        }
        None => Arc::new(Lexicon::default()),
    };

    let store = SectionStore::new();
    let search_service =
        SearchService::new(store.clone(), Arc::clone(&lexicon), settings.search.clone());

    let mut indexer = SectionIndexer::new(store, lexicon)
        .with_source(Arc::new(FileSectionSource::new(&settings.ingest.seed_path)));

    let content_fetcher = match &settings.ingest.feed_url {
        Some(url) => {
            let policy = settings.ingest.retry_policy();
            let origin = HttpOrigin::with_timeout(policy.timeout)?;
            let fetcher = ContentFetcher::new(
                ResilientCache::new(&settings.cache),
                Arc::new(origin),
                policy,
            );
            indexer = indexer.with_source(Arc::new(FeedSectionSource::new(fetcher.clone(), url)));
            info!(url, "Remote section feed enabled");
            Some(fetcher)
        }
        None => None,
    };

    Ok(Services {
        app_state: AppState::new(search_service, content_fetcher),
        indexer,
    })
}
