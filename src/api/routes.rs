use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{handlers, AppState};

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/sources", get(handlers::list_sources))
        .route("/search", get(handlers::search_sources))
        .route("/books", post(handlers::create_book))
        .route("/books/:id", get(handlers::get_book))
        .route("/catalog/search", get(handlers::search_catalog))
        .route(
            "/users/:user_id/library",
            get(handlers::get_library).post(handlers::add_to_library),
        )
        .route(
            "/users/:user_id/library/:book_id/rating",
            put(handlers::set_rating),
        )
        .route(
            "/users/:user_id/library/:book_id",
            delete(handlers::remove_from_library),
        )
        .route(
            "/users/:user_id/recommendations",
            get(handlers::get_recommendations),
        )
}
