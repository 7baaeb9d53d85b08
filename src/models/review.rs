use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inclusive bounds of the discrete review score range
pub const MIN_SCORE: i16 = 1;
pub const MAX_SCORE: i16 = 5;

/// One user's review of one movie.
///
/// Soft-deletable: deactivated reviews stay in the store but no longer
/// contribute to aggregates, profiles or trending counts. At most one
/// active review exists per (user, movie) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub movie_id: Uuid,
    /// Score in [1,5]
    pub score: i16,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
}

/// Input for creating a review
#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
    pub user_id: Uuid,
    pub movie_id: Uuid,
    pub score: i16,
    pub title: String,
    pub content: String,
}

/// Input for editing a review; user and movie are immutable
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewPatch {
    pub score: i16,
    pub title: String,
    pub content: String,
}

impl Review {
    /// Creates a new active review from validated input
    pub fn new(input: NewReview) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            movie_id: input.movie_id,
            score: input.score,
            title: input.title,
            content: input.content,
            created_at: now,
            updated_at: now,
            is_active: true,
        }
    }
}

/// Validates score and required text fields for a review mutation
pub fn validate(score: i16, title: &str, content: &str) -> Result<(), String> {
    if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(format!(
            "score must be between {} and {}",
            MIN_SCORE, MAX_SCORE
        ));
    }
    if title.trim().is_empty() {
        return Err("review title is required".to_string());
    }
    if content.trim().is_empty() {
        return Err("review content is required".to_string());
    }
    Ok(())
}
