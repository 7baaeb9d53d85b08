use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers;
use super::AppState;

/// Creates the main API router with all routes
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
        // Catalogue
        .route("/movies", post(handlers::create_movie))
        .route("/movies/:id", get(handlers::get_movie))
        .route("/movies/:id/reviews", get(handlers::movie_reviews))
        // Reviews
        .route("/reviews", post(handlers::create_review))
        .route(
            "/reviews/:id",
            put(handlers::update_review).delete(handlers::delete_review),
        )
        .route("/users/:id/reviews", get(handlers::user_reviews))
        // Recommendations
        .route("/recommendations/for-you", get(handlers::for_you))
        .route("/recommendations/similar/:movie_id", get(handlers::similar))
        .route("/recommendations/trending", get(handlers::trending))
}
