//! External book-source abstraction.
//!
//! A pluggable architecture for the catalogs the tracker can search
//! (Open Library, Google Books, etc.). Source hits only ever populate the
//! local catalog store; the recommendation engine never reads a source
//! directly.

use serde::Serialize;

use crate::error::AppResult;
use crate::models::SourceBook;

pub mod google_books;
pub mod openlibrary;

pub use google_books::GoogleBooksSource;
pub use openlibrary::OpenLibrarySource;

/// Trait for external book catalogs
#[async_trait::async_trait]
pub trait BookSource: Send + Sync {
    /// Stable identifier used in URLs and cache keys
    fn id(&self) -> &'static str;

    /// Human-readable name for clients
    fn display_name(&self) -> &'static str;

    /// Search the source for books matching a free-text query
    async fn search(&self, query: &str, limit: usize) -> AppResult<Vec<SourceBook>>;
}

/// Descriptor of a registered source
#[derive(Debug, Clone, Serialize)]
pub struct SourceDescriptor {
    pub id: &'static str,
    pub name: &'static str,
}

/// Hits from one source for a fan-out search
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct SourceResults {
    pub source: String,
    pub books: Vec<SourceBook>,
}

/// Fans a search query out over the registered sources
///
/// A failing source is logged and skipped so one flaky upstream cannot
/// empty the whole result.
#[derive(Default)]
pub struct SourceManager {
    sources: Vec<Box<dyn BookSource>>,
}

impl SourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: Box<dyn BookSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn descriptors(&self) -> Vec<SourceDescriptor> {
        self.sources
            .iter()
            .map(|s| SourceDescriptor {
                id: s.id(),
                name: s.display_name(),
            })
            .collect()
    }

    /// Search one source by id; unknown ids yield no results
    pub async fn search_source(
        &self,
        source_id: &str,
        query: &str,
        limit: usize,
    ) -> Vec<SourceResults> {
        match self.sources.iter().find(|s| s.id() == source_id) {
            Some(source) => match source.search(query, limit).await {
                Ok(books) => vec![SourceResults {
                    source: source.id().to_string(),
                    books,
                }],
                Err(e) => {
                    tracing::warn!(source = source.id(), error = %e, "Source search failed");
                    Vec::new()
                }
            },
            None => {
                tracing::debug!(source = source_id, "Unknown source requested");
                Vec::new()
            }
        }
    }

    /// Search every registered source
    pub async fn search_all(&self, query: &str, limit_per_source: usize) -> Vec<SourceResults> {
        let mut results = Vec::new();
        for source in &self.sources {
            match source.search(query, limit_per_source).await {
                Ok(books) if !books.is_empty() => {
                    tracing::info!(source = source.id(), hits = books.len(), "Source search");
                    results.push(SourceResults {
                        source: source.id().to_string(),
                        books,
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(source = source.id(), error = %e, "Source search failed");
                }
            }
        }
        results
    }
}
