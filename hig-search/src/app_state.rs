use std::sync::Arc;

use crate::domain::{
    cache::{CacheStats, ContentFetcher},
    search::SearchService,
};

#[derive(Clone)]
pub struct AppState {
    search_service: Arc<SearchService>,
    content_fetcher: Option<ContentFetcher>,
}

impl AppState {
    pub fn new(search_service: SearchService, content_fetcher: Option<ContentFetcher>) -> Self {
        Self {
            search_service: Arc::new(search_service),
            content_fetcher,
        }
    }

    pub fn search_service(&self) -> &SearchService {
        &self.search_service
    }

    /// Statistics of the feed cache, when a remote feed is configured.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.content_fetcher.as_ref().map(ContentFetcher::stats)
    }
}
