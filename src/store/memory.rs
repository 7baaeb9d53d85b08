use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{AggregateRating, Movie, Review},
};

use super::{CatalogStore, ReviewStore};

/// In-memory store backing integration tests and database-free local runs.
///
/// Both collaborator traits are implemented over plain maps behind async
/// read/write locks.
#[derive(Default)]
pub struct MemoryStore {
    movies: RwLock<HashMap<Uuid, Movie>>,
    reviews: RwLock<HashMap<Uuid, Review>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CatalogStore for MemoryStore {
    async fn movie_by_id(&self, id: Uuid) -> AppResult<Option<Movie>> {
        Ok(self.movies.read().await.get(&id).cloned())
    }

    async fn active_movies(&self) -> AppResult<Vec<Movie>> {
        Ok(self
            .movies
            .read()
            .await
            .values()
            .filter(|m| m.is_active)
            .cloned()
            .collect())
    }

    async fn active_movies_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Movie>> {
        Ok(self
            .movies
            .read()
            .await
            .values()
            .filter(|m| m.is_active && ids.contains(&m.id))
            .cloned()
            .collect())
    }

    async fn active_movies_by_genres(&self, genres: &[String]) -> AppResult<Vec<Movie>> {
        Ok(self
            .movies
            .read()
            .await
            .values()
            .filter(|m| m.is_active && m.shares_genre(genres))
            .cloned()
            .collect())
    }

    async fn insert_movie(&self, movie: &Movie) -> AppResult<()> {
        self.movies.write().await.insert(movie.id, movie.clone());
        Ok(())
    }

    async fn update_aggregate(&self, id: Uuid, rating: AggregateRating) -> AppResult<()> {
        let mut movies = self.movies.write().await;
        let movie = movies
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("movie {} not found", id)))?;
        movie.rating = rating;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ReviewStore for MemoryStore {
    async fn review_by_id(&self, id: Uuid) -> AppResult<Option<Review>> {
        Ok(self.reviews.read().await.get(&id).cloned())
    }

    async fn active_reviews_for_movie(&self, movie_id: Uuid) -> AppResult<Vec<Review>> {
        Ok(self
            .reviews
            .read()
            .await
            .values()
            .filter(|r| r.is_active && r.movie_id == movie_id)
            .cloned()
            .collect())
    }

    async fn active_reviews_by_user(&self, user_id: Uuid) -> AppResult<Vec<Review>> {
        Ok(self
            .reviews
            .read()
            .await
            .values()
            .filter(|r| r.is_active && r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn active_reviews_since(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Review>> {
        let mut recent: Vec<Review> = self
            .reviews
            .read()
            .await
            .values()
            .filter(|r| r.is_active && r.created_at >= cutoff)
            .cloned()
            .collect();
        recent.sort_by_key(|r| r.created_at);
        Ok(recent)
    }

    async fn active_review_for(
        &self,
        user_id: Uuid,
        movie_id: Uuid,
    ) -> AppResult<Option<Review>> {
        Ok(self
            .reviews
            .read()
            .await
            .values()
            .find(|r| r.is_active && r.user_id == user_id && r.movie_id == movie_id)
            .cloned())
    }

    async fn insert_review(&self, review: &Review) -> AppResult<()> {
        self.reviews.write().await.insert(review.id, review.clone());
        Ok(())
    }

    async fn update_review(&self, review: &Review) -> AppResult<()> {
        let mut reviews = self.reviews.write().await;
        let existing = reviews
            .get_mut(&review.id)
            .ok_or_else(|| AppError::NotFound(format!("review {} not found", review.id)))?;
        *existing = review.clone();
        Ok(())
    }

    async fn deactivate_review(&self, id: Uuid) -> AppResult<()> {
        let mut reviews = self.reviews.write().await;
        let review = reviews
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("review {} not found", id)))?;
        review.is_active = false;
        review.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewReview;
    use chrono::Duration;

    fn movie(genres: &[&str]) -> Movie {
        Movie::new(
            "Test".to_string(),
            "A test movie".to_string(),
            genres.iter().map(|g| g.to_string()).collect(),
            Utc::now(),
        )
    }

    fn review(movie_id: Uuid, score: i16) -> Review {
        Review::new(NewReview {
            user_id: Uuid::new_v4(),
            movie_id,
            score,
            title: "t".to_string(),
            content: "c".to_string(),
        })
    }

    #[tokio::test]
    async fn test_genre_lookup_skips_inactive() {
        let store = MemoryStore::new();
        let mut inactive = movie(&["Drama"]);
        inactive.is_active = false;
        store.insert_movie(&inactive).await.unwrap();
        store.insert_movie(&movie(&["Drama"])).await.unwrap();

        let found = store
            .active_movies_by_genres(&["Drama".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_reviews_since_ordered_and_windowed() {
        let store = MemoryStore::new();
        let movie_id = Uuid::new_v4();
        let mut old = review(movie_id, 4);
        old.created_at = Utc::now() - Duration::days(45);
        let recent = review(movie_id, 5);
        store.insert_review(&recent).await.unwrap();
        store.insert_review(&old).await.unwrap();

        let cutoff = Utc::now() - Duration::days(30);
        let found = store.active_reviews_since(cutoff).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, recent.id);
    }

    #[tokio::test]
    async fn test_deactivate_keeps_record() {
        let store = MemoryStore::new();
        let r = review(Uuid::new_v4(), 3);
        store.insert_review(&r).await.unwrap();
        store.deactivate_review(r.id).await.unwrap();

        let fetched = store.review_by_id(r.id).await.unwrap().unwrap();
        assert!(!fetched.is_active);
        assert!(store
            .active_reviews_for_movie(r.movie_id)
            .await
            .unwrap()
            .is_empty());
    }
}
