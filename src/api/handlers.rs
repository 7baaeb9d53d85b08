use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    cache::{CacheKey, SIMILAR_TTL, TRENDING_TTL},
    error::{AppError, AppResult},
    models::{Movie, NewReview, Review, ReviewPatch},
    services::recommendations::ForYou,
};

use super::AppState;

/// Header carrying the caller's user id, supplied by the upstream
/// authentication layer and trusted as given
pub const USER_ID_HEADER: &str = "x-user-id";

/// Caller identity extracted from the [`USER_ID_HEADER`] header
pub struct CallerId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(CallerId)
            .ok_or_else(|| {
                AppError::Validation(format!("missing or invalid {} header", USER_ID_HEADER))
            })
    }
}

// Request types

#[derive(Debug, Deserialize)]
pub struct CreateMovieRequest {
    pub title: String,
    pub description: String,
    pub genres: Vec<String>,
    pub release_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub movie_id: Uuid,
    pub score: i16,
    pub title: String,
    pub content: String,
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Add a movie to the catalogue
pub async fn create_movie(
    State(state): State<AppState>,
    Json(request): Json<CreateMovieRequest>,
) -> AppResult<(StatusCode, Json<Movie>)> {
    if request.title.trim().is_empty() {
        return Err(AppError::Validation("movie title is required".to_string()));
    }
    if request.genres.is_empty() {
        return Err(AppError::Validation(
            "a movie needs at least one genre".to_string(),
        ));
    }

    let movie = Movie::new(
        request.title,
        request.description,
        request.genres,
        request.release_date,
    );
    state.catalog.insert_movie(&movie).await?;

    tracing::info!(movie_id = %movie.id, title = %movie.title, "Movie added to catalogue");

    Ok((StatusCode::CREATED, Json(movie)))
}

/// Fetch one movie
pub async fn get_movie(
    State(state): State<AppState>,
    Path(movie_id): Path<Uuid>,
) -> AppResult<Json<Movie>> {
    let movie = state
        .catalog
        .movie_by_id(movie_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("movie {} not found", movie_id)))?;
    Ok(Json(movie))
}

/// Create a review for the calling user
pub async fn create_review(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(request): Json<CreateReviewRequest>,
) -> AppResult<(StatusCode, Json<Review>)> {
    let review = state
        .reviews
        .create(NewReview {
            user_id,
            movie_id: request.movie_id,
            score: request.score,
            title: request.title,
            content: request.content,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(review)))
}

/// Edit the calling user's review
pub async fn update_review(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(review_id): Path<Uuid>,
    Json(patch): Json<ReviewPatch>,
) -> AppResult<Json<Review>> {
    let review = state.reviews.update(review_id, user_id, patch).await?;
    Ok(Json(review))
}

/// Soft-delete the calling user's review
pub async fn delete_review(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(review_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    state.reviews.delete(review_id, user_id).await?;
    Ok(Json(json!({ "message": "review deleted" })))
}

/// Active reviews for a movie
pub async fn movie_reviews(
    State(state): State<AppState>,
    Path(movie_id): Path<Uuid>,
) -> AppResult<Json<Vec<Review>>> {
    let reviews = state.reviews.for_movie(movie_id).await?;
    Ok(Json(reviews))
}

/// A user's active reviews
pub async fn user_reviews(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<Review>>> {
    let reviews = state.reviews.by_user(user_id).await?;
    Ok(Json(reviews))
}

/// Personalized recommendations for the calling user
pub async fn for_you(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> AppResult<Json<ForYou>> {
    let result = state.recommendations.for_you(user_id).await?;
    Ok(Json(result))
}

/// Movies similar to the given one
pub async fn similar(
    State(state): State<AppState>,
    Path(movie_id): Path<Uuid>,
) -> AppResult<Json<Vec<Movie>>> {
    let key = CacheKey::Similar(movie_id);
    if let Some(hit) = cache_read::<Vec<Movie>>(&state, &key).await {
        return Ok(Json(hit));
    }

    let movies = state.recommendations.similar_to(movie_id).await?;

    if let Some(cache) = &state.cache {
        cache.set_in_background(&key, &movies, SIMILAR_TTL);
    }
    Ok(Json(movies))
}

/// Movies with the most recent review activity
pub async fn trending(State(state): State<AppState>) -> AppResult<Json<Vec<Movie>>> {
    if let Some(hit) = cache_read::<Vec<Movie>>(&state, &CacheKey::Trending).await {
        return Ok(Json(hit));
    }

    let movies = state.recommendations.trending().await?;

    if let Some(cache) = &state.cache {
        cache.set_in_background(&CacheKey::Trending, &movies, TRENDING_TTL);
    }
    Ok(Json(movies))
}

/// Cache lookup that degrades to a miss on any failure
async fn cache_read<T: serde::de::DeserializeOwned>(
    state: &AppState,
    key: &CacheKey,
) -> Option<T> {
    let cache = state.cache.as_ref()?;
    match cache.get::<T>(key).await {
        Ok(hit) => hit,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Cache read failed, recomputing");
            None
        }
    }
}
