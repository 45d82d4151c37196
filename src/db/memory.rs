use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use tokio::sync::RwLock;

use crate::db::{CatalogReader, LibraryStore};
use crate::error::AppResult;
use crate::models::{BookId, CatalogBook, GenreAggregate, LibraryEntry, NewBook};

/// In-process catalog/library store
///
/// Keeps the catalog and per-user shelves in maps behind an async lock.
/// Used by integration tests and handy for local development without
/// Postgres; semantics match `PgStore`.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    books: HashMap<BookId, CatalogBook>,
    source_ids: HashMap<String, BookId>,
    /// user_id -> book_id -> shelf entry
    shelves: HashMap<i64, HashMap<BookId, ShelfEntry>>,
}

#[derive(Clone)]
struct ShelfEntry {
    rating: Option<i32>,
    notes: Option<String>,
    added_at: DateTime<Utc>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogReader for MemoryStore {
    async fn get_user_library(&self, user_id: i64) -> AppResult<Vec<LibraryEntry>> {
        let inner = self.inner.read().await;

        let mut entries: Vec<LibraryEntry> = inner
            .shelves
            .get(&user_id)
            .map(|shelf| {
                shelf
                    .iter()
                    .filter_map(|(book_id, entry)| {
                        inner.books.get(book_id).map(|book| LibraryEntry {
                            book: book.clone(),
                            rating: entry.rating,
                            notes: entry.notes.clone(),
                            added_at: entry.added_at,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        entries.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        Ok(entries)
    }

    async fn get_user_genre_aggregates(&self, user_id: i64) -> AppResult<Vec<GenreAggregate>> {
        let library = self.get_user_library(user_id).await?;

        let mut by_genre: HashMap<String, (i64, i64)> = HashMap::new();
        for entry in &library {
            if let (Some(genre), Some(rating)) = (&entry.book.genre, entry.rating) {
                let slot = by_genre.entry(genre.clone()).or_insert((0, 0));
                slot.0 += i64::from(rating);
                slot.1 += 1;
            }
        }

        let mut aggregates: Vec<GenreAggregate> = by_genre
            .into_iter()
            .map(|(genre, (total, count))| GenreAggregate {
                genre,
                avg_rating: total as f64 / count as f64,
                rated_count: count,
            })
            .collect();

        aggregates.sort_by(|a, b| {
            b.avg_rating
                .partial_cmp(&a.avg_rating)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.rated_count.cmp(&a.rated_count))
        });

        Ok(aggregates)
    }

    async fn find_catalog_books_by_genre(
        &self,
        genre: &str,
        limit: i64,
    ) -> AppResult<Vec<CatalogBook>> {
        let inner = self.inner.read().await;
        let needle = genre.to_lowercase();

        let mut matches: Vec<CatalogBook> = inner
            .books
            .values()
            .filter(|b| {
                b.genre
                    .as_ref()
                    .is_some_and(|g| g.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();

        matches.shuffle(&mut rand::thread_rng());
        matches.truncate(limit as usize);
        Ok(matches)
    }

    async fn sample_catalog_books_with_description(
        &self,
        limit: i64,
    ) -> AppResult<Vec<CatalogBook>> {
        let inner = self.inner.read().await;

        let mut sample: Vec<CatalogBook> = inner
            .books
            .values()
            .filter(|b| b.description.as_ref().is_some_and(|d| !d.is_empty()))
            .cloned()
            .collect();

        sample.shuffle(&mut rand::thread_rng());
        sample.truncate(limit as usize);
        Ok(sample)
    }

    async fn get_popular_catalog_books(&self, limit: i64) -> AppResult<Vec<CatalogBook>> {
        let inner = self.inner.read().await;

        let mut holder_counts: HashMap<BookId, usize> = HashMap::new();
        for shelf in inner.shelves.values() {
            for book_id in shelf.keys() {
                *holder_counts.entry(*book_id).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<&CatalogBook> = inner.books.values().collect();
        ranked.sort_by(|a, b| {
            let holders_a = holder_counts.get(&a.id).copied().unwrap_or(0);
            let holders_b = holder_counts.get(&b.id).copied().unwrap_or(0);
            // Most-recently-added identity wins ties
            holders_b.cmp(&holders_a).then(b.id.cmp(&a.id))
        });

        Ok(ranked
            .into_iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LibraryStore for MemoryStore {
    async fn upsert_catalog_book(&self, book: &NewBook) -> AppResult<BookId> {
        let mut inner = self.inner.write().await;

        if let Some(source_id) = &book.source_id {
            if let Some(existing) = inner.source_ids.get(source_id).copied() {
                if let Some(stored) = inner.books.get_mut(&existing) {
                    if stored.description.is_none() {
                        stored.description = book.description.clone();
                    }
                    if stored.cover_url.is_none() {
                        stored.cover_url = book.cover_url.clone();
                    }
                }
                return Ok(existing);
            }
        }

        inner.next_id += 1;
        let id = BookId(inner.next_id);
        inner.books.insert(
            id,
            CatalogBook {
                id,
                title: book.title.clone(),
                author: book.author.clone(),
                genre: book.genre.clone(),
                description: book.description.clone(),
                cover_url: book.cover_url.clone(),
                publication_year: book.publication_year,
            },
        );
        if let Some(source_id) = &book.source_id {
            inner.source_ids.insert(source_id.clone(), id);
        }

        Ok(id)
    }

    async fn add_to_library(
        &self,
        user_id: i64,
        book_id: BookId,
        rating: Option<i32>,
        notes: Option<String>,
    ) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.shelves.entry(user_id).or_default().insert(
            book_id,
            ShelfEntry {
                rating,
                notes,
                added_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn set_rating(&self, user_id: i64, book_id: BookId, rating: i32) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner
            .shelves
            .get_mut(&user_id)
            .and_then(|shelf| shelf.get_mut(&book_id))
        {
            entry.rating = Some(rating);
        }
        Ok(())
    }

    async fn remove_from_library(&self, user_id: i64, book_id: BookId) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(shelf) = inner.shelves.get_mut(&user_id) {
            shelf.remove(&book_id);
        }
        Ok(())
    }

    async fn get_book(&self, book_id: BookId) -> AppResult<Option<CatalogBook>> {
        let inner = self.inner.read().await;
        Ok(inner.books.get(&book_id).cloned())
    }

    async fn search_catalog(&self, query: &str, limit: i64) -> AppResult<Vec<CatalogBook>> {
        let inner = self.inner.read().await;
        let needle = query.to_lowercase();

        Ok(inner
            .books
            .values()
            .filter(|b| {
                b.title.to_lowercase().contains(&needle)
                    || b.author.to_lowercase().contains(&needle)
                    || b.genre
                        .as_ref()
                        .is_some_and(|g| g.to_lowercase().contains(&needle))
            })
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_book(title: &str, genre: Option<&str>, source_id: Option<&str>) -> NewBook {
        NewBook {
            title: title.to_string(),
            author: "Author".to_string(),
            genre: genre.map(str::to_string),
            description: None,
            source_id: source_id.map(str::to_string),
            cover_url: None,
            publication_year: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_dedups_by_source_id() {
        let store = MemoryStore::new();

        let first = store
            .upsert_catalog_book(&new_book("Dune", None, Some("ol:1")))
            .await
            .unwrap();
        let second = store
            .upsert_catalog_book(&new_book("Dune", None, Some("ol:1")))
            .await
            .unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_genre_aggregates_sorted_and_filtered() {
        let store = MemoryStore::new();

        let fantasy = store
            .upsert_catalog_book(&new_book("A", Some("Fantasy"), None))
            .await
            .unwrap();
        let drama = store
            .upsert_catalog_book(&new_book("B", Some("Drama"), None))
            .await
            .unwrap();
        let unrated = store
            .upsert_catalog_book(&new_book("C", Some("History"), None))
            .await
            .unwrap();

        store.add_to_library(1, fantasy, Some(9), None).await.unwrap();
        store.add_to_library(1, drama, Some(4), None).await.unwrap();
        store.add_to_library(1, unrated, None, None).await.unwrap();

        let aggregates = store.get_user_genre_aggregates(1).await.unwrap();
        assert_eq!(aggregates.len(), 2);
        assert_eq!(aggregates[0].genre, "Fantasy");
        assert_eq!(aggregates[0].avg_rating, 9.0);
        assert_eq!(aggregates[1].genre, "Drama");
    }

    #[tokio::test]
    async fn test_popular_ranked_by_distinct_holders_then_id() {
        let store = MemoryStore::new();

        let a = store.upsert_catalog_book(&new_book("A", None, None)).await.unwrap();
        let b = store.upsert_catalog_book(&new_book("B", None, None)).await.unwrap();
        let c = store.upsert_catalog_book(&new_book("C", None, None)).await.unwrap();

        // b held by two users, a and c by none
        store.add_to_library(1, b, None, None).await.unwrap();
        store.add_to_library(2, b, None, None).await.unwrap();

        let popular = store.get_popular_catalog_books(10).await.unwrap();
        assert_eq!(popular[0].id, b);
        // tie between a and c broken by newer identity first
        assert_eq!(popular[1].id, c);
        assert_eq!(popular[2].id, a);
    }

    #[tokio::test]
    async fn test_find_by_genre_substring_is_case_insensitive() {
        let store = MemoryStore::new();

        store
            .upsert_catalog_book(&new_book("A", Some("Science Fiction"), None))
            .await
            .unwrap();
        store
            .upsert_catalog_book(&new_book("B", Some("Drama"), None))
            .await
            .unwrap();

        let hits = store.find_catalog_books_by_genre("fiction", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "A");
    }
}
