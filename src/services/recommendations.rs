//! Personal book recommendations.
//!
//! Blends two personalized strategies (genre preferences and TF-IDF content
//! similarity) over the shared catalog, with a popularity fallback for cold
//! starts and empty results. Everything is recomputed from scratch on every
//! request; a refresh is the identical call and the shuffle step varies the
//! selection between calls.

use std::collections::HashSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::db::CatalogReader;
use crate::models::{CatalogBook, LibraryEntry, Recommendation, RecommendationType};
use crate::services::similarity::{cosine_similarity, TfidfVectorizer};

/// Maximum number of recommendations returned per request
pub const MAX_RECOMMENDATIONS: usize = 5;

/// Personalization needs at least this many library entries
const MIN_LIBRARY_FOR_PERSONALIZATION: usize = 3;

/// A genre counts as preferred when its average rating reaches the midpoint
/// of the 1-10 scale
const PREFERRED_GENRE_MIN_AVG: f64 = 5.0;

/// Number of top aggregates used when no genre clears the threshold
const GENRE_FALLBACK_COUNT: usize = 3;

const MAX_GENRES: usize = 3;
const BOOKS_PER_GENRE: i64 = 5;

/// Ratings at or above this mark a library entry as liked
const LIKED_RATING_MIN: i32 = 5;

const CANDIDATE_POOL_SIZE: i64 = 100;
const MAX_CONTENT_MATCHES: usize = 10;

/// Similarity scores at or below this are treated as noise
const MIN_SIMILARITY_SCORE: f64 = 0.05;

const MAX_TFIDF_FEATURES: usize = 5000;
const DESCRIPTION_SNIPPET_LEN: usize = 500;
const POPULAR_POOL_SIZE: i64 = 10;

/// Recommendation engine over a read-only catalog snapshot
///
/// Constructed once at startup and shared by handle; holds no mutable state
/// between requests. An explicit seed pins the shuffle order for tests.
pub struct RecommendationEngine {
    store: Arc<dyn CatalogReader>,
    seed: Option<u64>,
}

impl RecommendationEngine {
    pub fn new(store: Arc<dyn CatalogReader>) -> Self {
        Self { store, seed: None }
    }

    pub fn with_seed(store: Arc<dyn CatalogReader>, seed: u64) -> Self {
        Self {
            store,
            seed: Some(seed),
        }
    }

    /// Returns at most [`MAX_RECOMMENDATIONS`] suggestions for a user.
    ///
    /// Never fails: store errors and degenerate inputs degrade to the
    /// popularity fallback, and the result is empty only when the catalog
    /// itself is empty.
    pub async fn get_recommendations(&self, user_id: i64) -> Vec<Recommendation> {
        let library = match self.store.get_user_library(user_id).await {
            Ok(library) => library,
            Err(e) => {
                tracing::error!(user_id, error = %e, "Failed to load library, serving popular books");
                Vec::new()
            }
        };
        let owned: HashSet<_> = library.iter().map(|e| e.book.id).collect();

        if library.len() < MIN_LIBRARY_FOR_PERSONALIZATION {
            tracing::debug!(
                user_id,
                entries = library.len(),
                "Cold start, serving popular books"
            );
            return self.popular_fallback(&owned).await;
        }

        // The strategies have no data dependency on each other; genre
        // candidates keep merge priority regardless of which finishes first.
        let (genre_recs, content_recs) =
            tokio::join!(self.genre_based(user_id), self.content_based(&library));

        let mut merged = genre_recs;
        merged.extend(content_recs);

        let mut personal: Vec<Recommendation> = dedup_by_identity(merged)
            .into_iter()
            .filter(|rec| !owned.contains(&rec.book.id))
            .collect();

        let mut rng = self.rng();
        personal.shuffle(&mut rng);
        personal.truncate(MAX_RECOMMENDATIONS);

        if !personal.is_empty() {
            tracing::info!(
                user_id,
                count = personal.len(),
                "Serving personalized recommendations"
            );
            return personal;
        }

        self.popular_fallback(&owned).await
    }

    /// Candidates from genres the user rates highly
    async fn genre_based(&self, user_id: i64) -> Vec<Recommendation> {
        let aggregates = match self.store.get_user_genre_aggregates(user_id).await {
            Ok(aggregates) => aggregates,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Genre aggregate lookup failed");
                return Vec::new();
            }
        };
        if aggregates.is_empty() {
            return Vec::new();
        }

        let mut preferred: Vec<&str> = aggregates
            .iter()
            .filter(|a| a.avg_rating >= PREFERRED_GENRE_MIN_AVG)
            .map(|a| a.genre.as_str())
            .collect();

        if preferred.is_empty() {
            // Nothing rated highly yet; aggregates are pre-sorted so the
            // head is still the best signal available
            preferred = aggregates
                .iter()
                .take(GENRE_FALLBACK_COUNT)
                .map(|a| a.genre.as_str())
                .collect();
        }

        let mut recommendations = Vec::new();
        for genre in preferred.iter().take(MAX_GENRES) {
            match self
                .store
                .find_catalog_books_by_genre(genre, BOOKS_PER_GENRE)
                .await
            {
                Ok(books) => {
                    recommendations.extend(books.into_iter().map(|book| Recommendation {
                        book,
                        recommendation_type: RecommendationType::GenreBased,
                        similarity_score: None,
                    }));
                }
                Err(e) => {
                    tracing::warn!(genre, error = %e, "Genre candidate lookup failed");
                }
            }
        }

        recommendations
    }

    /// Candidates ranked by mean TF-IDF cosine similarity against the user's
    /// liked books
    async fn content_based(&self, library: &[LibraryEntry]) -> Vec<Recommendation> {
        let liked: Vec<&LibraryEntry> = library
            .iter()
            .filter(|e| e.rating.is_some_and(|r| r >= LIKED_RATING_MIN))
            .collect();
        if liked.is_empty() {
            return Vec::new();
        }

        let candidates = match self
            .store
            .sample_catalog_books_with_description(CANDIDATE_POOL_SIZE)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(error = %e, "Candidate sampling failed");
                return Vec::new();
            }
        };
        if candidates.is_empty() {
            return Vec::new();
        }

        let liked_texts: Vec<String> = liked.iter().map(|e| book_text(&e.book)).collect();
        let candidate_texts: Vec<String> = candidates.iter().map(book_text).collect();

        let corpus: Vec<String> = liked_texts
            .iter()
            .chain(candidate_texts.iter())
            .cloned()
            .collect();
        if corpus.iter().filter(|t| !t.trim().is_empty()).count() < 2 {
            return Vec::new();
        }

        let vectorizer = TfidfVectorizer::new(MAX_TFIDF_FEATURES);
        let Some(vectors) = vectorizer.fit_transform(&corpus) else {
            // Degenerate corpus (e.g. all stop words), not an error
            return Vec::new();
        };
        let (liked_vectors, candidate_vectors) = vectors.split_at(liked_texts.len());

        let mut scored: Vec<(usize, f64)> = candidate_vectors
            .iter()
            .enumerate()
            .map(|(i, vector)| {
                let total: f64 = liked_vectors
                    .iter()
                    .map(|liked| cosine_similarity(vector, liked))
                    .sum();
                (i, total / liked_vectors.len() as f64)
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(MAX_CONTENT_MATCHES)
            .filter(|(_, score)| *score > MIN_SIMILARITY_SCORE)
            .map(|(i, score)| Recommendation {
                book: candidates[i].clone(),
                recommendation_type: RecommendationType::ContentBased,
                similarity_score: Some(score),
            })
            .collect()
    }

    /// Popularity fallback for cold starts and empty personalized results
    async fn popular_fallback(
        &self,
        owned: &HashSet<crate::models::BookId>,
    ) -> Vec<Recommendation> {
        let books = match self.store.get_popular_catalog_books(POPULAR_POOL_SIZE).await {
            Ok(books) => books,
            Err(e) => {
                tracing::error!(error = %e, "Popular book lookup failed");
                return Vec::new();
            }
        };

        let mut recommendations: Vec<Recommendation> = books
            .into_iter()
            .filter(|book| !owned.contains(&book.id))
            .map(|book| Recommendation {
                book,
                recommendation_type: RecommendationType::Popular,
                similarity_score: None,
            })
            .collect();

        let mut rng = self.rng();
        recommendations.shuffle(&mut rng);
        recommendations.truncate(MAX_RECOMMENDATIONS);
        recommendations
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// Text representation for TF-IDF: title, author, genre and the first part
/// of the description, whitespace-joined
fn book_text(book: &CatalogBook) -> String {
    let mut parts = vec![book.title.clone(), book.author.clone()];
    if let Some(genre) = &book.genre {
        parts.push(genre.clone());
    }
    if let Some(description) = &book.description {
        parts.push(description.chars().take(DESCRIPTION_SNIPPET_LEN).collect());
    }
    parts.join(" ")
}

/// Keeps the first occurrence of each book identity, preserving order
fn dedup_by_identity(recommendations: Vec<Recommendation>) -> Vec<Recommendation> {
    let mut seen = HashSet::new();
    recommendations
        .into_iter()
        .filter(|rec| seen.insert(rec.book.id))
        .collect()
}
