use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db::CacheKey;
use crate::error::{AppError, AppResult};
use crate::models::{BookId, CatalogBook, LibraryEntry, NewBook, Recommendation};
use crate::services::sources::{SourceDescriptor, SourceResults};
use crate::validate::{validate_rating, validate_search_query};

use super::AppState;

/// TTL for cached external search results (1 hour)
const SEARCH_CACHE_TTL: u64 = 3600;

const SOURCE_SEARCH_LIMIT: usize = 5;
const CATALOG_SEARCH_LIMIT: i64 = 20;

// Request types

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub source: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddToLibraryRequest {
    pub book_id: BookId,
    pub rating: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    pub rating: i32,
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// List the registered external book sources
pub async fn list_sources(State(state): State<AppState>) -> Json<Vec<SourceDescriptor>> {
    Json(state.sources.descriptors())
}

/// Search external book sources, optionally restricted to one source
pub async fn search_sources(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Vec<SourceResults>>> {
    let query = validate_search_query(&params.q)?.to_string();
    let source = params.source.unwrap_or_else(|| "all".to_string());
    let key = CacheKey::SourceSearch(source.clone(), query.clone());

    if let Some(cache) = &state.cache {
        match cache.get::<Vec<SourceResults>>(&key).await {
            Ok(Some(cached)) => {
                tracing::debug!(key = %key, "Search cache hit");
                return Ok(Json(cached));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Cache read failed, querying sources"),
        }
    }

    let results = if source == "all" {
        state.sources.search_all(&query, SOURCE_SEARCH_LIMIT).await
    } else {
        state
            .sources
            .search_source(&source, &query, SOURCE_SEARCH_LIMIT)
            .await
    };

    if let Some(cache) = &state.cache {
        if let Err(e) = cache.put(&key, &results, SEARCH_CACHE_TTL).await {
            tracing::warn!(error = %e, "Cache write failed");
        }
    }

    Ok(Json(results))
}

/// Insert a book into the shared catalog (idempotent per external source id)
pub async fn create_book(
    State(state): State<AppState>,
    Json(request): Json<NewBook>,
) -> AppResult<(StatusCode, Json<CatalogBook>)> {
    if request.title.trim().is_empty() {
        return Err(AppError::InvalidInput("Title must not be empty".to_string()));
    }

    let id = state.store.upsert_catalog_book(&request).await?;
    let book = state
        .store
        .get_book(id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("Book {} vanished after upsert", id)))?;

    Ok((StatusCode::CREATED, Json(book)))
}

/// Fetch one catalog book
pub async fn get_book(
    State(state): State<AppState>,
    Path(book_id): Path<i64>,
) -> AppResult<Json<CatalogBook>> {
    state
        .store
        .get_book(BookId(book_id))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Book {} not found", book_id)))
}

/// Substring search over the local catalog
pub async fn search_catalog(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Vec<CatalogBook>>> {
    let query = validate_search_query(&params.q)?;
    let books = state
        .store
        .search_catalog(query, CATALOG_SEARCH_LIMIT)
        .await?;
    Ok(Json(books))
}

/// A user's library, most recently added first
pub async fn get_library(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<Vec<LibraryEntry>>> {
    let entries = state.store.get_user_library(user_id).await?;
    Ok(Json(entries))
}

/// Add a catalog book to a user's library
pub async fn add_to_library(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(request): Json<AddToLibraryRequest>,
) -> AppResult<StatusCode> {
    let rating = request.rating.map(validate_rating).transpose()?;

    if state.store.get_book(request.book_id).await?.is_none() {
        return Err(AppError::NotFound(format!(
            "Book {} not found",
            request.book_id
        )));
    }

    state
        .store
        .add_to_library(user_id, request.book_id, rating, request.notes)
        .await?;

    tracing::info!(user_id, book_id = %request.book_id, "Book added to library");
    Ok(StatusCode::CREATED)
}

/// Set or change a rating on a library entry
pub async fn set_rating(
    State(state): State<AppState>,
    Path((user_id, book_id)): Path<(i64, i64)>,
    Json(request): Json<RatingRequest>,
) -> AppResult<StatusCode> {
    let rating = validate_rating(request.rating)?;
    state
        .store
        .set_rating(user_id, BookId(book_id), rating)
        .await?;
    Ok(StatusCode::OK)
}

/// Remove a book from a user's library
pub async fn remove_from_library(
    State(state): State<AppState>,
    Path((user_id, book_id)): Path<(i64, i64)>,
) -> AppResult<StatusCode> {
    state
        .store
        .remove_from_library(user_id, BookId(book_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Personal recommendations; refresh is the same call re-executed
pub async fn get_recommendations(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Json<Vec<Recommendation>> {
    Json(state.engine.get_recommendations(user_id).await)
}
