use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::Movie,
    store::{CatalogStore, ReviewStore},
};

use super::{
    profiler::{GenrePreference, PreferenceProfiler},
    ranker,
};

pub const FOR_YOU_LIMIT: usize = 10;
pub const SIMILAR_LIMIT: usize = 8;
pub const TRENDING_LIMIT: usize = 10;

/// Personalized recommendations plus the genre profile that produced them
#[derive(Debug, Serialize)]
pub struct ForYou {
    pub recommendations: Vec<Movie>,
    /// Top genres the selection was based on; empty for users with no
    /// rating history, whose result is pure popularity backfill
    pub based_on: Vec<GenrePreference>,
}

/// Read-only queries composing the profiler and the ranker.
///
/// All three are pure reads over the stores: no mutation, safe to call
/// concurrently and repeatedly.
pub struct RecommendationService {
    catalog: Arc<dyn CatalogStore>,
    reviews: Arc<dyn ReviewStore>,
    profiler: PreferenceProfiler,
}

impl RecommendationService {
    pub fn new(catalog: Arc<dyn CatalogStore>, reviews: Arc<dyn ReviewStore>) -> Self {
        let profiler = PreferenceProfiler::new(catalog.clone(), reviews.clone());
        Self {
            catalog,
            reviews,
            profiler,
        }
    }

    /// Personalized picks: preference-matched candidates first, popularity
    /// backfill up to the limit. Movies the user has already reviewed are
    /// never included.
    pub async fn for_you(&self, user_id: Uuid) -> AppResult<ForYou> {
        let rated = self.reviews.active_reviews_by_user(user_id).await?;
        let exclude: HashSet<Uuid> = rated.iter().map(|r| r.movie_id).collect();

        let based_on = self.profiler.profile(user_id).await?;

        let mut selected = Vec::new();
        if !based_on.is_empty() {
            let preferred: Vec<String> =
                based_on.iter().map(|p| p.genre.clone()).collect();
            let candidates = self.catalog.active_movies_by_genres(&preferred).await?;
            selected = ranker::preference_match(candidates, &preferred, &exclude, FOR_YOU_LIMIT);
        }

        if selected.len() < FOR_YOU_LIMIT {
            let pool = self.catalog.active_movies().await?;
            selected = ranker::backfill_popular(selected, pool, &exclude, FOR_YOU_LIMIT);
        }

        tracing::debug!(
            user_id = %user_id,
            picked = selected.len(),
            profiled_genres = based_on.len(),
            "For-you recommendations assembled"
        );

        Ok(ForYou {
            recommendations: selected,
            based_on,
        })
    }

    /// Active movies sharing at least one genre with the reference movie,
    /// best-rated first. Fails with NotFound when the reference is missing
    /// or inactive.
    pub async fn similar_to(&self, movie_id: Uuid) -> AppResult<Vec<Movie>> {
        let reference = self
            .catalog
            .movie_by_id(movie_id)
            .await?
            .filter(|m| m.is_active)
            .ok_or_else(|| AppError::NotFound(format!("movie {} not found", movie_id)))?;

        let candidates = self
            .catalog
            .active_movies_by_genres(&reference.genres)
            .await?;

        Ok(ranker::genre_overlap(candidates, &reference, SIMILAR_LIMIT))
    }

    /// Movies with the most review activity in the trailing window,
    /// anchored at the moment of the query.
    pub async fn trending(&self) -> AppResult<Vec<Movie>> {
        let cutoff = Utc::now() - Duration::days(ranker::TRENDING_WINDOW_DAYS);
        let recent = self.reviews.active_reviews_since(cutoff).await?;

        let ids = ranker::trending_ids(&recent, TRENDING_LIMIT);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let movies = self.catalog.active_movies_by_ids(&ids).await?;
        let mut by_id: HashMap<Uuid, Movie> =
            movies.into_iter().map(|m| (m.id, m)).collect();

        // Keep activity order; movies deactivated since the scan drop out
        Ok(ids.into_iter().filter_map(|id| by_id.remove(&id)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewReview, Review};
    use crate::store::{MockCatalogStore, MockReviewStore};
    use chrono::Utc;

    fn movie(genres: &[&str], average: f64) -> Movie {
        let mut m = Movie::new(
            "M".to_string(),
            "d".to_string(),
            genres.iter().map(|g| g.to_string()).collect(),
            Utc::now(),
        );
        m.rating.average = average;
        m.rating.count = 1;
        m
    }

    fn review(user_id: Uuid, movie_id: Uuid, score: i16) -> Review {
        Review::new(NewReview {
            user_id,
            movie_id,
            score,
            title: "t".to_string(),
            content: "c".to_string(),
        })
    }

    #[tokio::test]
    async fn test_similar_to_missing_movie_is_not_found() {
        let mut catalog = MockCatalogStore::new();
        catalog.expect_movie_by_id().returning(|_| Ok(None));

        let service =
            RecommendationService::new(Arc::new(catalog), Arc::new(MockReviewStore::new()));
        let err = service.similar_to(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_similar_to_inactive_movie_is_not_found() {
        let mut catalog = MockCatalogStore::new();
        catalog.expect_movie_by_id().returning(|id| {
            let mut m = movie(&["Drama"], 4.0);
            m.id = id;
            m.is_active = false;
            Ok(Some(m))
        });

        let service =
            RecommendationService::new(Arc::new(catalog), Arc::new(MockReviewStore::new()));
        let err = service.similar_to(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_for_you_excludes_rated_movies_even_in_backfill() {
        let user_id = Uuid::new_v4();
        let rated = movie(&["Drama"], 4.8);
        let fresh = movie(&["Drama"], 4.2);
        let rated_id = rated.id;

        let mut reviews = MockReviewStore::new();
        reviews
            .expect_active_reviews_by_user()
            .returning(move |uid| Ok(vec![review(uid, rated_id, 5)]));

        let mut catalog = MockCatalogStore::new();
        let rated_for_lookup = rated.clone();
        catalog
            .expect_movie_by_id()
            .returning(move |_| Ok(Some(rated_for_lookup.clone())));
        let candidates = vec![rated.clone(), fresh.clone()];
        catalog
            .expect_active_movies_by_genres()
            .returning(move |_| Ok(candidates.clone()));
        let pool = vec![rated, fresh.clone()];
        catalog
            .expect_active_movies()
            .returning(move || Ok(pool.clone()));

        let service = RecommendationService::new(Arc::new(catalog), Arc::new(reviews));
        let result = service.for_you(user_id).await.unwrap();

        assert_eq!(result.recommendations.len(), 1);
        assert_eq!(result.recommendations[0].id, fresh.id);
        assert_eq!(result.based_on.len(), 1);
        assert_eq!(result.based_on[0].genre, "Drama");
    }

    #[tokio::test]
    async fn test_for_you_with_no_history_is_popularity_backfill() {
        let a = movie(&["Drama"], 3.0);
        let b = movie(&["Comedy"], 4.5);
        let b_id = b.id;

        let mut reviews = MockReviewStore::new();
        reviews
            .expect_active_reviews_by_user()
            .returning(|_| Ok(vec![]));

        let mut catalog = MockCatalogStore::new();
        let pool = vec![a, b];
        catalog
            .expect_active_movies()
            .returning(move || Ok(pool.clone()));

        let service = RecommendationService::new(Arc::new(catalog), Arc::new(reviews));
        let result = service.for_you(Uuid::new_v4()).await.unwrap();

        assert!(result.based_on.is_empty());
        assert_eq!(result.recommendations.len(), 2);
        assert_eq!(result.recommendations[0].id, b_id);
    }

    #[tokio::test]
    async fn test_trending_preserves_activity_order() {
        let hot = movie(&["Action"], 2.0);
        let warm = movie(&["Action"], 5.0);
        let hot_id = hot.id;
        let warm_id = warm.id;

        let mut reviews = MockReviewStore::new();
        reviews.expect_active_reviews_since().returning(move |_| {
            Ok(vec![
                review(Uuid::new_v4(), warm_id, 4),
                review(Uuid::new_v4(), hot_id, 4),
                review(Uuid::new_v4(), hot_id, 3),
            ])
        });

        let mut catalog = MockCatalogStore::new();
        let movies = vec![hot, warm];
        catalog
            .expect_active_movies_by_ids()
            .returning(move |_| Ok(movies.clone()));

        let service = RecommendationService::new(Arc::new(catalog), Arc::new(reviews));
        let trending = service.trending().await.unwrap();

        // Two reviews beat one regardless of aggregate rating
        assert_eq!(trending[0].id, hot_id);
        assert_eq!(trending[1].id, warm_id);
    }

    #[tokio::test]
    async fn test_trending_empty_window_is_empty() {
        let mut reviews = MockReviewStore::new();
        reviews
            .expect_active_reviews_since()
            .returning(|_| Ok(vec![]));

        let service =
            RecommendationService::new(Arc::new(MockCatalogStore::new()), Arc::new(reviews));
        assert!(service.trending().await.unwrap().is_empty());
    }
}
