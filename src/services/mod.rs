pub mod aggregator;
pub mod profiler;
pub mod ranker;
pub mod recommendations;
pub mod reviews;

pub use aggregator::RatingAggregator;
pub use profiler::PreferenceProfiler;
pub use recommendations::RecommendationService;
pub use reviews::ReviewService;
