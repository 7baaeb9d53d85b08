pub mod movie;
pub mod review;

pub use movie::{AggregateRating, Movie};
pub use review::{NewReview, Review, ReviewPatch};
