use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{review, NewReview, Review, ReviewPatch},
    store::{CatalogStore, ReviewStore},
};

use super::aggregator::RatingAggregator;

/// Review lifecycle: create, edit, soft-delete.
///
/// These three operations are the exhaustive trigger points for aggregate
/// recomputation. Each one recomputes synchronously before returning so a
/// following read of the movie sees a consistent aggregate.
pub struct ReviewService {
    catalog: Arc<dyn CatalogStore>,
    reviews: Arc<dyn ReviewStore>,
    aggregator: Arc<RatingAggregator>,
}

impl ReviewService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        reviews: Arc<dyn ReviewStore>,
        aggregator: Arc<RatingAggregator>,
    ) -> Self {
        Self {
            catalog,
            reviews,
            aggregator,
        }
    }

    /// Creates a review. A user rates a movie at most once; a second
    /// attempt yields Conflict.
    pub async fn create(&self, input: NewReview) -> AppResult<Review> {
        review::validate(input.score, &input.title, &input.content)
            .map_err(AppError::Validation)?;

        let movie = self
            .catalog
            .movie_by_id(input.movie_id)
            .await?
            .filter(|m| m.is_active)
            .ok_or_else(|| AppError::NotFound(format!("movie {} not found", input.movie_id)))?;

        if self
            .reviews
            .active_review_for(input.user_id, input.movie_id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "you have already reviewed this movie".to_string(),
            ));
        }

        let created = Review::new(input);
        self.reviews.insert_review(&created).await?;

        tracing::info!(
            review_id = %created.id,
            movie_id = %movie.id,
            score = created.score,
            "Review created"
        );

        self.refresh_aggregate(movie.id).await;
        Ok(created)
    }

    /// Edits a review's score, title and content. The rater and movie are
    /// immutable; only the owner may edit.
    pub async fn update(&self, id: Uuid, user_id: Uuid, patch: ReviewPatch) -> AppResult<Review> {
        review::validate(patch.score, &patch.title, &patch.content)
            .map_err(AppError::Validation)?;

        let mut existing = self
            .reviews
            .review_by_id(id)
            .await?
            .filter(|r| r.is_active)
            .ok_or_else(|| AppError::NotFound(format!("review {} not found", id)))?;

        if existing.user_id != user_id {
            return Err(AppError::Forbidden(
                "only the author may edit a review".to_string(),
            ));
        }

        existing.score = patch.score;
        existing.title = patch.title;
        existing.content = patch.content;
        existing.updated_at = Utc::now();

        self.reviews.update_review(&existing).await?;

        self.refresh_aggregate(existing.movie_id).await;
        Ok(existing)
    }

    /// Soft-deactivates a review; only the owner may delete.
    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> AppResult<()> {
        let existing = self
            .reviews
            .review_by_id(id)
            .await?
            .filter(|r| r.is_active)
            .ok_or_else(|| AppError::NotFound(format!("review {} not found", id)))?;

        if existing.user_id != user_id {
            return Err(AppError::Forbidden(
                "only the author may delete a review".to_string(),
            ));
        }

        self.reviews.deactivate_review(id).await?;

        tracing::info!(review_id = %id, movie_id = %existing.movie_id, "Review deactivated");

        self.refresh_aggregate(existing.movie_id).await;
        Ok(())
    }

    /// Active reviews for a movie
    pub async fn for_movie(&self, movie_id: Uuid) -> AppResult<Vec<Review>> {
        self.reviews.active_reviews_for_movie(movie_id).await
    }

    /// A user's active reviews
    pub async fn by_user(&self, user_id: Uuid) -> AppResult<Vec<Review>> {
        self.reviews.active_reviews_by_user(user_id).await
    }

    /// Recomputes after a successful mutation.
    ///
    /// A failed recompute does not fail the mutation: the movie is marked
    /// stale, the inconsistency goes to the operator log, and the next
    /// successful write sweeps it up.
    async fn refresh_aggregate(&self, movie_id: Uuid) {
        match self.aggregator.recompute(movie_id).await {
            Ok(_) => self.aggregator.sweep_stale().await,
            Err(e) => {
                tracing::error!(
                    movie_id = %movie_id,
                    error = %e,
                    "Aggregate recompute failed after review mutation, movie left stale"
                );
                self.aggregator.mark_stale(movie_id);
            }
        }
    }
}
