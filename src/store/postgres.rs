use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{AggregateRating, Movie, Review},
};

use super::{CatalogStore, ReviewStore};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Maps sqlx failures onto the app taxonomy.
///
/// Pool exhaustion and IO failures are transient and eligible for the one
/// bounded retry; everything else is a plain database error.
fn store_err(e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => AppError::Unavailable(e.to_string()),
        other => AppError::Database(other),
    }
}

/// sqlx-backed implementation of both store collaborators
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Flat row shape for the `movies` table
#[derive(FromRow)]
struct MovieRow {
    id: Uuid,
    title: String,
    description: String,
    genres: Vec<String>,
    release_date: DateTime<Utc>,
    rating_average: f64,
    rating_count: i64,
    is_active: bool,
}

impl From<MovieRow> for Movie {
    fn from(row: MovieRow) -> Self {
        Movie {
            id: row.id,
            title: row.title,
            description: row.description,
            genres: row.genres,
            release_date: row.release_date,
            rating: AggregateRating {
                average: row.rating_average,
                count: row.rating_count,
            },
            is_active: row.is_active,
        }
    }
}

/// Flat row shape for the `reviews` table
#[derive(FromRow)]
struct ReviewRow {
    id: Uuid,
    user_id: Uuid,
    movie_id: Uuid,
    score: i16,
    title: String,
    content: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    is_active: bool,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Review {
            id: row.id,
            user_id: row.user_id,
            movie_id: row.movie_id,
            score: row.score,
            title: row.title,
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
            is_active: row.is_active,
        }
    }
}

const MOVIE_COLUMNS: &str =
    "id, title, description, genres, release_date, rating_average, rating_count, is_active";

const REVIEW_COLUMNS: &str =
    "id, user_id, movie_id, score, title, content, created_at, updated_at, is_active";

#[async_trait::async_trait]
impl CatalogStore for PostgresStore {
    async fn movie_by_id(&self, id: Uuid) -> AppResult<Option<Movie>> {
        let row: Option<MovieRow> = sqlx::query_as(&format!(
            "SELECT {} FROM movies WHERE id = $1",
            MOVIE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.map(Movie::from))
    }

    async fn active_movies(&self) -> AppResult<Vec<Movie>> {
        let rows: Vec<MovieRow> = sqlx::query_as(&format!(
            "SELECT {} FROM movies WHERE is_active",
            MOVIE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows.into_iter().map(Movie::from).collect())
    }

    async fn active_movies_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Movie>> {
        let rows: Vec<MovieRow> = sqlx::query_as(&format!(
            "SELECT {} FROM movies WHERE is_active AND id = ANY($1)",
            MOVIE_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows.into_iter().map(Movie::from).collect())
    }

    async fn active_movies_by_genres(&self, genres: &[String]) -> AppResult<Vec<Movie>> {
        let rows: Vec<MovieRow> = sqlx::query_as(&format!(
            "SELECT {} FROM movies WHERE is_active AND genres && $1",
            MOVIE_COLUMNS
        ))
        .bind(genres)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows.into_iter().map(Movie::from).collect())
    }

    async fn insert_movie(&self, movie: &Movie) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO movies \
             (id, title, description, genres, release_date, rating_average, rating_count, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(movie.id)
        .bind(&movie.title)
        .bind(&movie.description)
        .bind(&movie.genres)
        .bind(movie.release_date)
        .bind(movie.rating.average)
        .bind(movie.rating.count)
        .bind(movie.is_active)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(())
    }

    async fn update_aggregate(&self, id: Uuid, rating: AggregateRating) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE movies SET rating_average = $1, rating_count = $2 WHERE id = $3",
        )
        .bind(rating.average)
        .bind(rating.count)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("movie {} not found", id)));
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl ReviewStore for PostgresStore {
    async fn review_by_id(&self, id: Uuid) -> AppResult<Option<Review>> {
        let row: Option<ReviewRow> = sqlx::query_as(&format!(
            "SELECT {} FROM reviews WHERE id = $1",
            REVIEW_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.map(Review::from))
    }

    async fn active_reviews_for_movie(&self, movie_id: Uuid) -> AppResult<Vec<Review>> {
        let rows: Vec<ReviewRow> = sqlx::query_as(&format!(
            "SELECT {} FROM reviews WHERE is_active AND movie_id = $1",
            REVIEW_COLUMNS
        ))
        .bind(movie_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows.into_iter().map(Review::from).collect())
    }

    async fn active_reviews_by_user(&self, user_id: Uuid) -> AppResult<Vec<Review>> {
        let rows: Vec<ReviewRow> = sqlx::query_as(&format!(
            "SELECT {} FROM reviews WHERE is_active AND user_id = $1",
            REVIEW_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows.into_iter().map(Review::from).collect())
    }

    async fn active_reviews_since(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Review>> {
        let rows: Vec<ReviewRow> = sqlx::query_as(&format!(
            "SELECT {} FROM reviews WHERE is_active AND created_at >= $1 \
             ORDER BY created_at ASC",
            REVIEW_COLUMNS
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows.into_iter().map(Review::from).collect())
    }

    async fn active_review_for(
        &self,
        user_id: Uuid,
        movie_id: Uuid,
    ) -> AppResult<Option<Review>> {
        let row: Option<ReviewRow> = sqlx::query_as(&format!(
            "SELECT {} FROM reviews WHERE is_active AND user_id = $1 AND movie_id = $2",
            REVIEW_COLUMNS
        ))
        .bind(user_id)
        .bind(movie_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.map(Review::from))
    }

    async fn insert_review(&self, review: &Review) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO reviews \
             (id, user_id, movie_id, score, title, content, created_at, updated_at, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(review.id)
        .bind(review.user_id)
        .bind(review.movie_id)
        .bind(review.score)
        .bind(&review.title)
        .bind(&review.content)
        .bind(review.created_at)
        .bind(review.updated_at)
        .bind(review.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            // The partial unique index on active (user_id, movie_id) backs
            // the one-active-review invariant at the storage layer too
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict("user has already reviewed this movie".to_string())
            }
            other => store_err(other),
        })?;

        Ok(())
    }

    async fn update_review(&self, review: &Review) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE reviews SET score = $1, title = $2, content = $3, updated_at = $4 \
             WHERE id = $5",
        )
        .bind(review.score)
        .bind(&review.title)
        .bind(&review.content)
        .bind(review.updated_at)
        .bind(review.id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("review {} not found", review.id)));
        }

        Ok(())
    }

    async fn deactivate_review(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE reviews SET is_active = false, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("review {} not found", id)));
        }

        Ok(())
    }
}
