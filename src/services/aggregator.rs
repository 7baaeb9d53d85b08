use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::AggregateRating,
    store::{CatalogStore, ReviewStore},
};

/// Computes the aggregate for a set of active review scores.
///
/// The mean is rounded half-up on the tenths digit; the empty set yields
/// the 0/0 aggregate.
pub fn aggregate(scores: &[i16]) -> AggregateRating {
    if scores.is_empty() {
        return AggregateRating::zero();
    }

    let total: i64 = scores.iter().map(|s| *s as i64).sum();
    let mean = total as f64 / scores.len() as f64;

    AggregateRating {
        average: (mean * 10.0).round() / 10.0,
        count: scores.len() as i64,
    }
}

/// Runs a store operation, retrying once on a transient failure.
async fn with_retry<T, F, Fut>(mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    match op().await {
        Err(e) if e.is_transient() => {
            tracing::warn!(error = %e, "Transient store failure, retrying once");
            op().await
        }
        other => other,
    }
}

/// Recomputes a movie's aggregate rating from its active reviews.
///
/// The aggregate fields on the movie are owned by this component; callers
/// mutate review records and then invoke `recompute` synchronously so any
/// immediately-following read sees a consistent aggregate. Concurrent
/// recomputes for the same movie serialize on a per-movie lock.
pub struct RatingAggregator {
    catalog: Arc<dyn CatalogStore>,
    reviews: Arc<dyn ReviewStore>,
    /// Per-movie critical sections guarding read-then-write of the aggregate
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
    /// Movies whose last recompute failed after a successful review
    /// mutation; swept lazily on the next successful recompute
    stale: std::sync::Mutex<HashSet<Uuid>>,
}

impl RatingAggregator {
    pub fn new(catalog: Arc<dyn CatalogStore>, reviews: Arc<dyn ReviewStore>) -> Self {
        Self {
            catalog,
            reviews,
            locks: Mutex::new(HashMap::new()),
            stale: std::sync::Mutex::new(HashSet::new()),
        }
    }

    /// Recomputes and persists the aggregate for one movie.
    ///
    /// Returns the freshly computed aggregate. A success also clears the
    /// movie from the stale set.
    pub async fn recompute(&self, movie_id: Uuid) -> AppResult<AggregateRating> {
        let lock = self.lock_for(movie_id).await;
        let _guard = lock.lock().await;

        let reviews =
            with_retry(|| self.reviews.active_reviews_for_movie(movie_id)).await?;
        let scores: Vec<i16> = reviews.iter().map(|r| r.score).collect();
        let rating = aggregate(&scores);

        with_retry(|| self.catalog.update_aggregate(movie_id, rating)).await?;

        self.stale.lock().unwrap().remove(&movie_id);

        tracing::debug!(
            movie_id = %movie_id,
            average = rating.average,
            count = rating.count,
            "Aggregate recomputed"
        );

        Ok(rating)
    }

    /// Marks a movie's aggregate as stale after a failed recompute.
    ///
    /// The triggering review mutation is not rolled back; the movie is
    /// retried on the next `sweep_stale` call.
    pub fn mark_stale(&self, movie_id: Uuid) {
        self.stale.lock().unwrap().insert(movie_id);
    }

    /// Ids currently awaiting re-aggregation
    pub fn stale_movies(&self) -> Vec<Uuid> {
        self.stale.lock().unwrap().iter().copied().collect()
    }

    /// Retries every stale movie once. Failures stay in the stale set.
    pub async fn sweep_stale(&self) {
        for movie_id in self.stale_movies() {
            if let Err(e) = self.recompute(movie_id).await {
                tracing::warn!(movie_id = %movie_id, error = %e, "Stale re-aggregation failed");
            } else {
                tracing::info!(movie_id = %movie_id, "Stale aggregate repaired");
            }
        }
    }

    async fn lock_for(&self, movie_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        // An entry with no outstanding guard has a strong count of 1 and
        // can be dropped; the map stays proportional to in-flight recomputes
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(movie_id).or_default().clone()
    }

    #[cfg(test)]
    async fn lock_count(&self) -> usize {
        self.locks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{NewReview, Review};
    use crate::store::{MockCatalogStore, MockReviewStore};

    fn review(movie_id: Uuid, score: i16) -> Review {
        Review::new(NewReview {
            user_id: Uuid::new_v4(),
            movie_id,
            score,
            title: "t".to_string(),
            content: "c".to_string(),
        })
    }

    #[test]
    fn test_aggregate_empty_is_zero() {
        assert_eq!(aggregate(&[]), AggregateRating::zero());
    }

    #[test]
    fn test_aggregate_rounds_to_one_decimal() {
        // (4+4+5)/3 = 4.333... -> 4.3
        let rating = aggregate(&[4, 4, 5]);
        assert_eq!(rating.average, 4.3);
        assert_eq!(rating.count, 3);
    }

    #[test]
    fn test_aggregate_rounds_half_up() {
        // (4+4+5+2)/4 = 3.75 -> 3.8
        let rating = aggregate(&[4, 4, 5, 2]);
        assert_eq!(rating.average, 3.8);
        assert_eq!(rating.count, 4);

        // (1+2)/2 = 1.5 stays on the tenths digit
        assert_eq!(aggregate(&[1, 2]).average, 1.5);
    }

    #[test]
    fn test_aggregate_single_score() {
        let rating = aggregate(&[5]);
        assert_eq!(rating.average, 5.0);
        assert_eq!(rating.count, 1);
    }

    #[tokio::test]
    async fn test_recompute_persists_mean() {
        let movie_id = Uuid::new_v4();

        let mut reviews = MockReviewStore::new();
        reviews
            .expect_active_reviews_for_movie()
            .returning(move |id| Ok(vec![review(id, 4), review(id, 5)]));

        let mut catalog = MockCatalogStore::new();
        catalog
            .expect_update_aggregate()
            .withf(|_, rating| rating.average == 4.5 && rating.count == 2)
            .times(1)
            .returning(|_, _| Ok(()));

        let aggregator = RatingAggregator::new(Arc::new(catalog), Arc::new(reviews));
        let rating = aggregator.recompute(movie_id).await.unwrap();
        assert_eq!(rating.average, 4.5);
    }

    #[tokio::test]
    async fn test_recompute_zeroes_when_no_reviews() {
        let mut reviews = MockReviewStore::new();
        reviews
            .expect_active_reviews_for_movie()
            .returning(|_| Ok(vec![]));

        let mut catalog = MockCatalogStore::new();
        catalog
            .expect_update_aggregate()
            .withf(|_, rating| *rating == AggregateRating::zero())
            .times(1)
            .returning(|_, _| Ok(()));

        let aggregator = RatingAggregator::new(Arc::new(catalog), Arc::new(reviews));
        let rating = aggregator.recompute(Uuid::new_v4()).await.unwrap();
        assert_eq!(rating, AggregateRating::zero());
    }

    #[tokio::test]
    async fn test_recompute_retries_transient_persist_once() {
        let mut reviews = MockReviewStore::new();
        reviews
            .expect_active_reviews_for_movie()
            .returning(|id| Ok(vec![review(id, 3)]));

        let mut catalog = MockCatalogStore::new();
        let mut attempts = 0;
        catalog
            .expect_update_aggregate()
            .times(2)
            .returning(move |_, _| {
                attempts += 1;
                if attempts == 1 {
                    Err(AppError::Unavailable("connection reset".to_string()))
                } else {
                    Ok(())
                }
            });

        let aggregator = RatingAggregator::new(Arc::new(catalog), Arc::new(reviews));
        assert!(aggregator.recompute(Uuid::new_v4()).await.is_ok());
    }

    #[tokio::test]
    async fn test_idle_lock_entries_are_evicted() {
        let mut reviews = MockReviewStore::new();
        reviews
            .expect_active_reviews_for_movie()
            .returning(|_| Ok(vec![]));

        let mut catalog = MockCatalogStore::new();
        catalog.expect_update_aggregate().returning(|_, _| Ok(()));

        let aggregator = RatingAggregator::new(Arc::new(catalog), Arc::new(reviews));
        for _ in 0..3 {
            aggregator.recompute(Uuid::new_v4()).await.unwrap();
        }

        // Each acquisition drops the idle entries of earlier recomputes
        assert_eq!(aggregator.lock_count().await, 1);
    }

    #[tokio::test]
    async fn test_stale_set_swept_on_success() {
        let movie_id = Uuid::new_v4();

        let mut reviews = MockReviewStore::new();
        reviews
            .expect_active_reviews_for_movie()
            .returning(|id| Ok(vec![review(id, 2)]));

        let mut catalog = MockCatalogStore::new();
        catalog.expect_update_aggregate().returning(|_, _| Ok(()));

        let aggregator = RatingAggregator::new(Arc::new(catalog), Arc::new(reviews));
        aggregator.mark_stale(movie_id);
        assert_eq!(aggregator.stale_movies(), vec![movie_id]);

        aggregator.sweep_stale().await;
        assert!(aggregator.stale_movies().is_empty());
    }
}
