use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};

use crate::db::{CatalogReader, LibraryStore};
use crate::error::AppResult;
use crate::models::{BookId, CatalogBook, GenreAggregate, LibraryEntry, NewBook};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// PostgreSQL-backed catalog/library store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct BookRow {
    id: i64,
    title: String,
    author: String,
    genre: Option<String>,
    description: Option<String>,
    cover_url: Option<String>,
    publication_year: Option<i32>,
}

impl From<BookRow> for CatalogBook {
    fn from(row: BookRow) -> Self {
        CatalogBook {
            id: BookId(row.id),
            title: row.title,
            author: row.author,
            genre: row.genre,
            description: row.description,
            cover_url: row.cover_url,
            publication_year: row.publication_year,
        }
    }
}

#[derive(FromRow)]
struct LibraryRow {
    id: i64,
    title: String,
    author: String,
    genre: Option<String>,
    description: Option<String>,
    cover_url: Option<String>,
    publication_year: Option<i32>,
    user_rating: Option<i32>,
    user_notes: Option<String>,
    date_added: DateTime<Utc>,
}

impl From<LibraryRow> for LibraryEntry {
    fn from(row: LibraryRow) -> Self {
        LibraryEntry {
            book: CatalogBook {
                id: BookId(row.id),
                title: row.title,
                author: row.author,
                genre: row.genre,
                description: row.description,
                cover_url: row.cover_url,
                publication_year: row.publication_year,
            },
            rating: row.user_rating,
            notes: row.user_notes,
            added_at: row.date_added,
        }
    }
}

#[derive(FromRow)]
struct GenreRow {
    genre: String,
    avg_rating: f64,
    rated_count: i64,
}

const BOOK_COLUMNS: &str = "id, title, author, genre, description, cover_url, publication_year";

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogReader for PgStore {
    async fn get_user_library(&self, user_id: i64) -> AppResult<Vec<LibraryEntry>> {
        let rows = sqlx::query_as::<_, LibraryRow>(
            r#"
            SELECT b.id, b.title, b.author, b.genre, b.description, b.cover_url,
                   b.publication_year, ub.user_rating, ub.user_notes, ub.date_added
            FROM user_books ub
            JOIN books b ON b.id = ub.book_id
            WHERE ub.user_id = $1
            ORDER BY ub.date_added DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(LibraryEntry::from).collect())
    }

    async fn get_user_genre_aggregates(&self, user_id: i64) -> AppResult<Vec<GenreAggregate>> {
        let rows = sqlx::query_as::<_, GenreRow>(
            r#"
            SELECT b.genre, AVG(ub.user_rating)::float8 AS avg_rating,
                   COUNT(*) AS rated_count
            FROM user_books ub
            JOIN books b ON b.id = ub.book_id
            WHERE ub.user_id = $1
              AND b.genre IS NOT NULL
              AND ub.user_rating IS NOT NULL
            GROUP BY b.genre
            ORDER BY avg_rating DESC, rated_count DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| GenreAggregate {
                genre: r.genre,
                avg_rating: r.avg_rating,
                rated_count: r.rated_count,
            })
            .collect())
    }

    async fn find_catalog_books_by_genre(
        &self,
        genre: &str,
        limit: i64,
    ) -> AppResult<Vec<CatalogBook>> {
        let rows = sqlx::query_as::<_, BookRow>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books \
             WHERE genre ILIKE '%' || $1 || '%' \
             ORDER BY random() LIMIT $2"
        ))
        .bind(genre)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CatalogBook::from).collect())
    }

    async fn sample_catalog_books_with_description(
        &self,
        limit: i64,
    ) -> AppResult<Vec<CatalogBook>> {
        let rows = sqlx::query_as::<_, BookRow>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books \
             WHERE description IS NOT NULL AND description <> '' \
             ORDER BY random() LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CatalogBook::from).collect())
    }

    async fn get_popular_catalog_books(&self, limit: i64) -> AppResult<Vec<CatalogBook>> {
        let rows = sqlx::query_as::<_, BookRow>(
            r#"
            SELECT b.id, b.title, b.author, b.genre, b.description, b.cover_url,
                   b.publication_year
            FROM books b
            LEFT JOIN user_books ub ON ub.book_id = b.id
            GROUP BY b.id
            ORDER BY COUNT(DISTINCT ub.user_id) DESC, b.id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CatalogBook::from).collect())
    }
}

#[async_trait]
impl LibraryStore for PgStore {
    async fn upsert_catalog_book(&self, book: &NewBook) -> AppResult<BookId> {
        // source_id carries the unique index; books without one are always
        // inserted fresh
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO books (title, author, genre, description, source_id,
                               cover_url, publication_year)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (source_id) DO UPDATE SET
                description = COALESCE(EXCLUDED.description, books.description),
                cover_url = COALESCE(EXCLUDED.cover_url, books.cover_url)
            RETURNING id
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.genre)
        .bind(&book.description)
        .bind(&book.source_id)
        .bind(&book.cover_url)
        .bind(book.publication_year)
        .fetch_one(&self.pool)
        .await?;

        Ok(BookId(id))
    }

    async fn add_to_library(
        &self,
        user_id: i64,
        book_id: BookId,
        rating: Option<i32>,
        notes: Option<String>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_books (user_id, book_id, user_rating, user_notes)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, book_id) DO UPDATE SET
                user_rating = EXCLUDED.user_rating,
                user_notes = EXCLUDED.user_notes
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(rating)
        .bind(notes)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_rating(&self, user_id: i64, book_id: BookId, rating: i32) -> AppResult<()> {
        sqlx::query("UPDATE user_books SET user_rating = $1 WHERE user_id = $2 AND book_id = $3")
            .bind(rating)
            .bind(user_id)
            .bind(book_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn remove_from_library(&self, user_id: i64, book_id: BookId) -> AppResult<()> {
        sqlx::query("DELETE FROM user_books WHERE user_id = $1 AND book_id = $2")
            .bind(user_id)
            .bind(book_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_book(&self, book_id: BookId) -> AppResult<Option<CatalogBook>> {
        let row = sqlx::query_as::<_, BookRow>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE id = $1"
        ))
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CatalogBook::from))
    }

    async fn search_catalog(&self, query: &str, limit: i64) -> AppResult<Vec<CatalogBook>> {
        let rows = sqlx::query_as::<_, BookRow>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books \
             WHERE title ILIKE '%' || $1 || '%' \
                OR author ILIKE '%' || $1 || '%' \
                OR genre ILIKE '%' || $1 || '%' \
             LIMIT $2"
        ))
        .bind(query)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CatalogBook::from).collect())
    }
}
