use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Identifier for a book in the shared catalog
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct BookId(pub i64);

impl Display for BookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A book in the shared catalog
///
/// The catalog is the universe of recommendation candidates. Genre and
/// description are optional because external sources don't always supply them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogBook {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub genre: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub publication_year: Option<i32>,
}

/// One entry in a user's personal library (one per user/book pair)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub book: CatalogBook,
    /// User rating on a 1-10 scale, absent until the user rates the book
    pub rating: Option<i32>,
    pub notes: Option<String>,
    pub added_at: DateTime<Utc>,
}

/// Per-genre rating aggregate for one user, derived fresh per request
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GenreAggregate {
    pub genre: String,
    pub avg_rating: f64,
    pub rated_count: i64,
}

/// Which strategy produced a recommendation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationType {
    GenreBased,
    ContentBased,
    Popular,
}

/// A catalog book suggested to a user, transient per request
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    #[serde(flatten)]
    pub book: CatalogBook,
    pub recommendation_type: RecommendationType,
    /// Mean cosine similarity against the user's liked books, in [0, 1].
    /// Only present for content-based recommendations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,
}

/// A new catalog book to insert or update, typically built from a source hit
#[derive(Debug, Clone, Deserialize)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// External identifier (e.g. Open Library key) used for catalog dedup
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub publication_year: Option<i32>,
}

/// A raw search hit from an external book source
///
/// Source hits only populate the catalog store; the recommender never
/// consumes them directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceBook {
    pub source: String,
    pub external_id: String,
    pub title: String,
    pub author: String,
    pub genre: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub publication_year: Option<i32>,
}

impl From<SourceBook> for NewBook {
    fn from(hit: SourceBook) -> Self {
        NewBook {
            title: hit.title,
            author: hit.author,
            genre: hit.genre,
            description: hit.description.filter(|d| !d.is_empty()),
            source_id: Some(format!("{}:{}", hit.source, hit.external_id)),
            cover_url: hit.cover_url,
            publication_year: hit.publication_year,
        }
    }
}
