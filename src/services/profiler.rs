use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::Review,
    store::{CatalogStore, ReviewStore},
};

/// A profile never carries more than this many genres
pub const TOP_GENRES: usize = 3;

/// One entry of a user's preference profile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenrePreference {
    pub genre: String,
    /// Mean score the user gave movies carrying this genre
    pub mean_score: f64,
}

/// Computes per-genre mean scores from a review snapshot.
///
/// Every review contributes its full score to each genre on the rated
/// movie; a movie with N genres feeds all N accumulators. The result is
/// sorted by mean descending, ties broken by genre label ascending.
pub fn genre_means(
    reviews: &[Review],
    genres_by_movie: &HashMap<Uuid, Vec<String>>,
) -> Vec<GenrePreference> {
    let mut sums: BTreeMap<&str, (i64, i64)> = BTreeMap::new();

    for review in reviews {
        let Some(genres) = genres_by_movie.get(&review.movie_id) else {
            continue;
        };
        for genre in genres {
            let entry = sums.entry(genre).or_insert((0, 0));
            entry.0 += review.score as i64;
            entry.1 += 1;
        }
    }

    let mut prefs: Vec<GenrePreference> = sums
        .into_iter()
        .map(|(genre, (sum, count))| GenrePreference {
            genre: genre.to_string(),
            mean_score: sum as f64 / count as f64,
        })
        .collect();

    // Stable sort over the label-ordered entries keeps ties lexical
    prefs.sort_by(|a, b| b.mean_score.total_cmp(&a.mean_score));
    prefs
}

/// Derives a user's top genres from their active review history.
///
/// Genres are read live through the current movie records, so a category
/// correction on a movie retroactively shifts past preference computation.
pub struct PreferenceProfiler {
    catalog: Arc<dyn CatalogStore>,
    reviews: Arc<dyn ReviewStore>,
}

impl PreferenceProfiler {
    pub fn new(catalog: Arc<dyn CatalogStore>, reviews: Arc<dyn ReviewStore>) -> Self {
        Self { catalog, reviews }
    }

    /// Returns at most the top 3 (genre, mean score) entries.
    ///
    /// A user with no active reviews gets an empty profile; that is a
    /// valid state, not a failure.
    pub async fn profile(&self, user_id: Uuid) -> AppResult<Vec<GenrePreference>> {
        let reviews = self.reviews.active_reviews_by_user(user_id).await?;
        if reviews.is_empty() {
            return Ok(Vec::new());
        }

        let movie_ids: HashSet<Uuid> = reviews.iter().map(|r| r.movie_id).collect();

        let mut genres_by_movie = HashMap::with_capacity(movie_ids.len());
        for movie_id in movie_ids {
            if let Some(movie) = self.catalog.movie_by_id(movie_id).await? {
                genres_by_movie.insert(movie_id, movie.genres);
            }
        }

        let mut prefs = genre_means(&reviews, &genres_by_movie);
        prefs.truncate(TOP_GENRES);

        tracing::debug!(
            user_id = %user_id,
            top_genres = ?prefs.iter().map(|p| p.genre.as_str()).collect::<Vec<_>>(),
            "Preference profile computed"
        );

        Ok(prefs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewReview;

    fn review(movie_id: Uuid, score: i16) -> Review {
        Review::new(NewReview {
            user_id: Uuid::new_v4(),
            movie_id,
            score,
            title: "t".to_string(),
            content: "c".to_string(),
        })
    }

    fn genre_map(entries: &[(Uuid, &[&str])]) -> HashMap<Uuid, Vec<String>> {
        entries
            .iter()
            .map(|(id, genres)| (*id, genres.iter().map(|g| g.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_empty_history_yields_empty_profile() {
        assert!(genre_means(&[], &HashMap::new()).is_empty());
    }

    #[test]
    fn test_mean_per_genre() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let genres = genre_map(&[(a, &["Drama"]), (b, &["Drama"])]);

        let prefs = genre_means(&[review(a, 5), review(b, 3)], &genres);
        assert_eq!(prefs.len(), 1);
        assert_eq!(prefs[0].genre, "Drama");
        assert_eq!(prefs[0].mean_score, 4.0);
    }

    #[test]
    fn test_multi_genre_movie_feeds_every_accumulator() {
        let a = Uuid::new_v4();
        let genres = genre_map(&[(a, &["Drama", "Thriller", "Crime"])]);

        let prefs = genre_means(&[review(a, 4)], &genres);
        assert_eq!(prefs.len(), 3);
        for pref in &prefs {
            assert_eq!(pref.mean_score, 4.0);
        }
    }

    #[test]
    fn test_sorted_by_mean_then_label() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let genres = genre_map(&[(a, &["Horror"]), (b, &["Comedy"]), (c, &["Action"])]);

        let prefs = genre_means(
            &[review(a, 5), review(b, 3), review(c, 3)],
            &genres,
        );
        assert_eq!(prefs[0].genre, "Horror");
        // Equal means fall back to lexical label order
        assert_eq!(prefs[1].genre, "Action");
        assert_eq!(prefs[2].genre, "Comedy");
    }

    #[test]
    fn test_review_without_known_movie_is_skipped() {
        let prefs = genre_means(&[review(Uuid::new_v4(), 5)], &HashMap::new());
        assert!(prefs.is_empty());
    }

    mod service {
        use super::*;
        use crate::models::Movie;
        use crate::store::{MockCatalogStore, MockReviewStore};
        use chrono::Utc;

        fn movie(id: Uuid, genres: &[&str]) -> Movie {
            let mut m = Movie::new(
                "M".to_string(),
                "d".to_string(),
                genres.iter().map(|g| g.to_string()).collect(),
                Utc::now(),
            );
            m.id = id;
            m
        }

        #[tokio::test]
        async fn test_profile_caps_at_top_three() {
            let user_id = Uuid::new_v4();
            let movie_id = Uuid::new_v4();

            let mut reviews = MockReviewStore::new();
            reviews.expect_active_reviews_by_user().returning(move |_| {
                let mut r = review(movie_id, 4);
                r.user_id = user_id;
                Ok(vec![r])
            });

            let mut catalog = MockCatalogStore::new();
            catalog.expect_movie_by_id().returning(move |id| {
                Ok(Some(movie(id, &["Drama", "Thriller", "Crime", "Noir"])))
            });

            let profiler = PreferenceProfiler::new(Arc::new(catalog), Arc::new(reviews));
            let prefs = profiler.profile(user_id).await.unwrap();
            assert_eq!(prefs.len(), TOP_GENRES);
        }

        #[tokio::test]
        async fn test_profile_empty_for_unrated_user() {
            let mut reviews = MockReviewStore::new();
            reviews
                .expect_active_reviews_by_user()
                .returning(|_| Ok(vec![]));

            let catalog = MockCatalogStore::new();
            let profiler = PreferenceProfiler::new(Arc::new(catalog), Arc::new(reviews));
            let prefs = profiler.profile(Uuid::new_v4()).await.unwrap();
            assert!(prefs.is_empty());
        }
    }
}
