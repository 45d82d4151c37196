use std::sync::Arc;

use crate::db::{Cache, CatalogReader, LibraryStore};
use crate::services::sources::SourceManager;
use crate::services::RecommendationEngine;

/// Shared application state
///
/// Built once at startup; the recommendation engine receives its own handle
/// to the store's read side so request handlers and the engine share one
/// snapshot source.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LibraryStore>,
    pub engine: Arc<RecommendationEngine>,
    pub sources: Arc<SourceManager>,
    pub cache: Option<Cache>,
}

impl AppState {
    pub fn new<S>(store: Arc<S>, sources: SourceManager, cache: Option<Cache>) -> Self
    where
        S: LibraryStore + CatalogReader + 'static,
    {
        let reader: Arc<dyn CatalogReader> = store.clone();
        Self {
            store,
            engine: Arc::new(RecommendationEngine::new(reader)),
            sources: Arc::new(sources),
            cache,
        }
    }
}
