use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{BookId, CatalogBook, GenreAggregate, LibraryEntry, NewBook};

pub mod cache;
pub mod memory;
pub mod postgres;

pub use cache::{create_redis_client, Cache, CacheKey};
pub use memory::MemoryStore;
pub use postgres::{create_pool, PgStore};

/// Read side of the catalog/library store consumed by the recommendation
/// engine.
///
/// The engine only ever sees this trait, so it can be exercised against a
/// mock store in tests and against either backing implementation in
/// production.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// All of one user's library entries, most recently added first
    async fn get_user_library(&self, user_id: i64) -> AppResult<Vec<LibraryEntry>>;

    /// Per-genre rating aggregates for one user's rated entries, sorted by
    /// average rating descending then count descending. Entries with no
    /// rating or no genre are excluded.
    async fn get_user_genre_aggregates(&self, user_id: i64) -> AppResult<Vec<GenreAggregate>>;

    /// Catalog books whose genre contains the given substring, random order
    async fn find_catalog_books_by_genre(
        &self,
        genre: &str,
        limit: i64,
    ) -> AppResult<Vec<CatalogBook>>;

    /// A random sample of catalog books with a non-empty description
    async fn sample_catalog_books_with_description(
        &self,
        limit: i64,
    ) -> AppResult<Vec<CatalogBook>>;

    /// Catalog books ranked by how many distinct users hold them, ties broken
    /// by most-recently-added identity first
    async fn get_popular_catalog_books(&self, limit: i64) -> AppResult<Vec<CatalogBook>>;
}

/// Full store interface used by the HTTP layer (reads plus library CRUD)
#[async_trait]
pub trait LibraryStore: CatalogReader {
    /// Inserts a catalog book, or returns the existing identity when a book
    /// with the same external source id is already present
    async fn upsert_catalog_book(&self, book: &NewBook) -> AppResult<BookId>;

    /// Adds a book to a user's library, replacing any existing entry for the
    /// same (user, book) pair
    async fn add_to_library(
        &self,
        user_id: i64,
        book_id: BookId,
        rating: Option<i32>,
        notes: Option<String>,
    ) -> AppResult<()>;

    async fn set_rating(&self, user_id: i64, book_id: BookId, rating: i32) -> AppResult<()>;

    async fn remove_from_library(&self, user_id: i64, book_id: BookId) -> AppResult<()>;

    async fn get_book(&self, book_id: BookId) -> AppResult<Option<CatalogBook>>;

    /// Title/author/genre substring search over the local catalog
    async fn search_catalog(&self, query: &str, limit: i64) -> AppResult<Vec<CatalogBook>>;
}
