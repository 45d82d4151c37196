use std::collections::HashSet;
use std::sync::Arc;

use axum_test::TestServer;
use serde_json::{json, Value};

use booktrack_api::api::{create_router, AppState};
use booktrack_api::db::MemoryStore;
use booktrack_api::services::sources::SourceManager;

fn create_test_server() -> TestServer {
    let state = AppState::new(Arc::new(MemoryStore::new()), SourceManager::new(), None);
    let app = create_router(state);
    TestServer::new(app).unwrap()
}

async fn create_book(server: &TestServer, body: Value) -> i64 {
    let response = server.post("/api/v1/books").json(&body).await;
    response.assert_status(axum::http::StatusCode::CREATED);
    let book: Value = response.json();
    book["id"].as_i64().unwrap()
}

async fn add_to_library(server: &TestServer, user_id: i64, book_id: i64, rating: Option<i64>) {
    let response = server
        .post(&format!("/api/v1/users/{user_id}/library"))
        .json(&json!({ "book_id": book_id, "rating": rating }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_create_and_fetch_book() {
    let server = create_test_server();

    let id = create_book(
        &server,
        json!({
            "title": "Dune",
            "author": "Frank Herbert",
            "genre": "Science Fiction",
            "publication_year": 1965
        }),
    )
    .await;

    let response = server.get(&format!("/api/v1/books/{id}")).await;
    response.assert_status_ok();
    let book: Value = response.json();
    assert_eq!(book["title"], "Dune");
    assert_eq!(book["genre"], "Science Fiction");
}

#[tokio::test]
async fn test_get_missing_book_is_not_found() {
    let server = create_test_server();
    let response = server.get("/api/v1/books/999").await;
    response.assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_library_add_rate_and_remove() {
    let server = create_test_server();

    let id = create_book(
        &server,
        json!({ "title": "The Hobbit", "author": "J.R.R. Tolkien", "genre": "Fantasy" }),
    )
    .await;
    add_to_library(&server, 1, id, Some(7)).await;

    let response = server.get("/api/v1/users/1/library").await;
    response.assert_status_ok();
    let entries: Vec<Value> = response.json();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["rating"], 7);

    // Change the rating
    let response = server
        .put(&format!("/api/v1/users/1/library/{id}/rating"))
        .json(&json!({ "rating": 9 }))
        .await;
    response.assert_status_ok();

    let entries: Vec<Value> = server.get("/api/v1/users/1/library").await.json();
    assert_eq!(entries[0]["rating"], 9);

    // Remove the book
    let response = server.delete(&format!("/api/v1/users/1/library/{id}")).await;
    response.assert_status(axum::http::StatusCode::NO_CONTENT);

    let entries: Vec<Value> = server.get("/api/v1/users/1/library").await.json();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_out_of_range_rating_is_rejected() {
    let server = create_test_server();

    let id = create_book(&server, json!({ "title": "Emma", "author": "Jane Austen" })).await;
    let response = server
        .post("/api/v1/users/1/library")
        .json(&json!({ "book_id": id, "rating": 11 }))
        .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_adding_unknown_book_is_not_found() {
    let server = create_test_server();
    let response = server
        .post("/api/v1/users/1/library")
        .json(&json!({ "book_id": 12345 }))
        .await;
    response.assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_catalog_search_matches_author() {
    let server = create_test_server();

    create_book(&server, json!({ "title": "Emma", "author": "Jane Austen" })).await;
    create_book(&server, json!({ "title": "Dune", "author": "Frank Herbert" })).await;

    let response = server
        .get("/api/v1/catalog/search")
        .add_query_param("q", "austen")
        .await;
    response.assert_status_ok();
    let books: Vec<Value> = response.json();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0]["title"], "Emma");
}

#[tokio::test]
async fn test_source_search_rejects_short_query() {
    let server = create_test_server();
    let response = server
        .get("/api/v1/search")
        .add_query_param("q", "a")
        .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_sources_listing_is_empty_without_registrations() {
    let server = create_test_server();
    let response = server.get("/api/v1/sources").await;
    response.assert_status_ok();
    let sources: Vec<Value> = response.json();
    assert!(sources.is_empty());
}

#[tokio::test]
async fn test_cold_start_recommendations_are_popular() {
    let server = create_test_server();

    // Catalog with some holders to rank by popularity
    let mut catalog = Vec::new();
    for i in 0..6 {
        let id = create_book(
            &server,
            json!({ "title": format!("Book {i}"), "author": "Author" }),
        )
        .await;
        catalog.push(id);
    }
    for holder in 2..5 {
        add_to_library(&server, holder, catalog[0], None).await;
        add_to_library(&server, holder, catalog[1], None).await;
    }

    // User 1 owns only two books: below the personalization cutoff
    add_to_library(&server, 1, catalog[2], Some(8)).await;
    add_to_library(&server, 1, catalog[3], Some(9)).await;

    let response = server.get("/api/v1/users/1/recommendations").await;
    response.assert_status_ok();
    let recommendations: Vec<Value> = response.json();

    assert!(!recommendations.is_empty());
    assert!(recommendations.len() <= 5);
    for rec in &recommendations {
        assert_eq!(rec["recommendation_type"], "popular");
        let id = rec["id"].as_i64().unwrap();
        assert!(id != catalog[2] && id != catalog[3], "owned books excluded");
    }
}

#[tokio::test]
async fn test_personalized_recommendations_avoid_popular_tag() {
    let server = create_test_server();

    let mut fantasy = Vec::new();
    for i in 0..12 {
        let id = create_book(
            &server,
            json!({
                "title": format!("Fantasy Tome {i}"),
                "author": "Various",
                "genre": "Fantasy",
                "description": "Dragons, wizards and ancient magic shape a war of kingdoms"
            }),
        )
        .await;
        fantasy.push(id);
    }

    // Three highly rated fantasy books clear the cold-start cutoff
    for (i, book_id) in fantasy.iter().take(3).enumerate() {
        add_to_library(&server, 1, *book_id, Some(8 + (i as i64 % 2))).await;
    }

    let response = server.get("/api/v1/users/1/recommendations").await;
    response.assert_status_ok();
    let recommendations: Vec<Value> = response.json();

    assert!(!recommendations.is_empty());
    assert!(recommendations.len() <= 5);

    let mut seen = HashSet::new();
    for rec in &recommendations {
        let id = rec["id"].as_i64().unwrap();
        assert!(seen.insert(id), "no identity may repeat");
        assert!(
            !fantasy[..3].contains(&id),
            "owned books must not be re-recommended"
        );
        let kind = rec["recommendation_type"].as_str().unwrap();
        assert!(
            kind == "genre_based" || kind == "content_based",
            "personalized path never serves popular entries, got {kind}"
        );
        if let Some(score) = rec.get("similarity_score").and_then(Value::as_f64) {
            assert!((0.0..=1.0).contains(&score));
        }
    }
}

#[tokio::test]
async fn test_recommendations_refresh_draws_from_same_catalog() {
    let server = create_test_server();

    let mut fantasy = Vec::new();
    for i in 0..8 {
        let id = create_book(
            &server,
            json!({
                "title": format!("Saga {i}"),
                "author": "Author",
                "genre": "Fantasy",
                "description": "Dragons and magic"
            }),
        )
        .await;
        fantasy.push(id);
    }
    for book_id in fantasy.iter().take(3) {
        add_to_library(&server, 1, *book_id, Some(9)).await;
    }

    // Refresh is the identical call; every draw stays within the un-owned
    // catalog even though the selection may differ between calls
    for _ in 0..3 {
        let recommendations: Vec<Value> =
            server.get("/api/v1/users/1/recommendations").await.json();
        for rec in &recommendations {
            let id = rec["id"].as_i64().unwrap();
            assert!(fantasy[3..].contains(&id));
        }
    }
}
