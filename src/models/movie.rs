use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Derived mean score and supporting count for a movie.
///
/// Owned exclusively by the rating aggregator; nothing else writes these
/// fields back to the catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateRating {
    /// Mean of active review scores, rounded to one decimal place
    pub average: f64,
    /// Number of active reviews contributing to the mean
    pub count: i64,
}

impl AggregateRating {
    /// The aggregate for a movie with no active reviews
    pub fn zero() -> Self {
        Self {
            average: 0.0,
            count: 0,
        }
    }
}

impl Default for AggregateRating {
    fn default() -> Self {
        Self::zero()
    }
}

/// A catalogued movie
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movie {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// Genre labels; always non-empty for a valid catalogue entry
    pub genres: Vec<String>,
    pub release_date: DateTime<Utc>,
    pub rating: AggregateRating,
    pub is_active: bool,
}

impl Movie {
    /// Creates a new active movie with an empty aggregate
    pub fn new(
        title: String,
        description: String,
        genres: Vec<String>,
        release_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            description,
            genres,
            release_date,
            rating: AggregateRating::zero(),
            is_active: true,
        }
    }

    /// Whether this movie shares at least one genre with `genres`
    pub fn shares_genre(&self, genres: &[String]) -> bool {
        self.genres.iter().any(|g| genres.contains(g))
    }
}
