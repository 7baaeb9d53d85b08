//! Pure ranking functions over explicit candidate snapshots.
//!
//! Everything here is free of store access so ordering, deduplication and
//! capping can be tested in isolation. Callers fetch the snapshots.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::models::{Movie, Review};

/// Minimum aggregate rating for a preference-match candidate
pub const MIN_PREFERENCE_RATING: f64 = 3.5;

/// Trailing window for trending activity, anchored at query time
pub const TRENDING_WINDOW_DAYS: i64 = 30;

/// Popularity order: aggregate rating desc, rating count desc, then movie
/// id asc so identical catalogue state always ranks identically.
fn by_popularity(a: &Movie, b: &Movie) -> Ordering {
    b.rating
        .average
        .total_cmp(&a.rating.average)
        .then(b.rating.count.cmp(&a.rating.count))
        .then(a.id.cmp(&b.id))
}

/// Drops duplicates, excluded ids and inactive movies, keeping order.
fn dedupe_eligible(movies: Vec<Movie>, exclude: &HashSet<Uuid>) -> Vec<Movie> {
    let mut seen = HashSet::new();
    movies
        .into_iter()
        .filter(|m| m.is_active && !exclude.contains(&m.id) && seen.insert(m.id))
        .collect()
}

/// Ranks candidates against a user's preferred genres.
///
/// Keeps active movies sharing at least one preferred genre with an
/// aggregate of at least [`MIN_PREFERENCE_RATING`], ordered by popularity.
pub fn preference_match(
    candidates: Vec<Movie>,
    preferred: &[String],
    exclude: &HashSet<Uuid>,
    limit: usize,
) -> Vec<Movie> {
    let mut matched: Vec<Movie> = dedupe_eligible(candidates, exclude)
        .into_iter()
        .filter(|m| m.shares_genre(preferred) && m.rating.average >= MIN_PREFERENCE_RATING)
        .collect();

    matched.sort_by(by_popularity);
    matched.truncate(limit);
    matched
}

/// Tops up an under-filled selection with the most popular movies from
/// `pool` that are not excluded and not already selected.
///
/// Backfill is unconditional: a selection that starts empty comes back as
/// pure popularity ranking.
pub fn backfill_popular(
    mut selected: Vec<Movie>,
    pool: Vec<Movie>,
    exclude: &HashSet<Uuid>,
    limit: usize,
) -> Vec<Movie> {
    selected.truncate(limit);
    if selected.len() == limit {
        return selected;
    }

    let mut taken: HashSet<Uuid> = exclude.clone();
    taken.extend(selected.iter().map(|m| m.id));

    let mut fill = dedupe_eligible(pool, &taken);
    fill.sort_by(by_popularity);
    fill.truncate(limit - selected.len());

    selected.extend(fill);
    selected
}

/// Ranks candidates sharing at least one genre with the reference movie,
/// excluding the reference itself.
pub fn genre_overlap(candidates: Vec<Movie>, reference: &Movie, limit: usize) -> Vec<Movie> {
    let exclude = HashSet::from([reference.id]);
    let mut similar: Vec<Movie> = dedupe_eligible(candidates, &exclude)
        .into_iter()
        .filter(|m| m.shares_genre(&reference.genres))
        .collect();

    similar.sort_by(by_popularity);
    similar.truncate(limit);
    similar
}

/// Counts reviews per movie in first-encounter order.
///
/// The input must already be restricted to the trending window and ordered
/// by creation time ascending; the position a movie id first appears at is
/// its tie-break rank.
pub fn recent_activity_counts(reviews: &[Review]) -> Vec<(Uuid, usize)> {
    let mut positions: HashMap<Uuid, usize> = HashMap::new();
    let mut counts: Vec<(Uuid, usize)> = Vec::new();

    for review in reviews {
        match positions.get(&review.movie_id) {
            Some(&idx) => counts[idx].1 += 1,
            None => {
                positions.insert(review.movie_id, counts.len());
                counts.push((review.movie_id, 1));
            }
        }
    }

    counts
}

/// Movie ids with the most recent activity, highest count first.
///
/// The stable sort keeps tied counts in first-encounter order. Movies with
/// zero recent reviews never appear.
pub fn trending_ids(reviews: &[Review], limit: usize) -> Vec<Uuid> {
    let mut counts = recent_activity_counts(reviews);
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(limit).map(|(id, _)| id).collect()
}
