//! Data-store collaborators consumed by the core services.
//!
//! The services never talk to a database directly; they go through these
//! traits so that ranking and aggregation logic can be exercised against
//! mocks and the in-memory store.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{AggregateRating, Movie, Review},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::{create_pool, PostgresStore};

/// Catalogue collaborator: movie lookups plus the one write the rating
/// aggregator owns.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Fetch a movie by id, active or not
    async fn movie_by_id(&self, id: Uuid) -> AppResult<Option<Movie>>;

    /// Fetch all active movies
    async fn active_movies(&self) -> AppResult<Vec<Movie>>;

    /// Fetch active movies whose id is in `ids`
    async fn active_movies_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Movie>>;

    /// Fetch active movies tagged with at least one of `genres`
    async fn active_movies_by_genres(&self, genres: &[String]) -> AppResult<Vec<Movie>>;

    /// Insert a new movie
    async fn insert_movie(&self, movie: &Movie) -> AppResult<()>;

    /// Persist a movie's aggregate-rating fields
    async fn update_aggregate(&self, id: Uuid, rating: AggregateRating) -> AppResult<()>;
}

/// Rating-record collaborator.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ReviewStore: Send + Sync {
    /// Fetch a review by id, active or not
    async fn review_by_id(&self, id: Uuid) -> AppResult<Option<Review>>;

    /// Fetch the active reviews for a movie
    async fn active_reviews_for_movie(&self, movie_id: Uuid) -> AppResult<Vec<Review>>;

    /// Fetch a user's active reviews
    async fn active_reviews_by_user(&self, user_id: Uuid) -> AppResult<Vec<Review>>;

    /// Fetch active reviews created at or after `cutoff`, ordered by
    /// creation time ascending. The ordering is part of the contract:
    /// trending tie-breaks depend on the scan order.
    async fn active_reviews_since(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Review>>;

    /// Fetch the single active review a user holds for a movie, if any
    async fn active_review_for(
        &self,
        user_id: Uuid,
        movie_id: Uuid,
    ) -> AppResult<Option<Review>>;

    /// Insert a new review
    async fn insert_review(&self, review: &Review) -> AppResult<()>;

    /// Persist an edited review
    async fn update_review(&self, review: &Review) -> AppResult<()>;

    /// Soft-deactivate a review; the record stays in the store
    async fn deactivate_review(&self, id: Uuid) -> AppResult<()>;
}
