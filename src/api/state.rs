use std::sync::Arc;

use crate::{
    cache::Cache,
    services::{RatingAggregator, RecommendationService, ReviewService},
    store::{CatalogStore, MemoryStore, ReviewStore},
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogStore>,
    pub reviews: Arc<ReviewService>,
    pub recommendations: Arc<RecommendationService>,
    /// Redis-backed read cache; `None` degrades every lookup to a recompute
    pub cache: Option<Cache>,
}

impl AppState {
    /// Wires the services over the given store collaborators
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        reviews: Arc<dyn ReviewStore>,
        cache: Option<Cache>,
    ) -> Self {
        let aggregator = Arc::new(RatingAggregator::new(catalog.clone(), reviews.clone()));
        let review_service = Arc::new(ReviewService::new(
            catalog.clone(),
            reviews.clone(),
            aggregator,
        ));
        let recommendation_service =
            Arc::new(RecommendationService::new(catalog.clone(), reviews));

        Self {
            catalog,
            reviews: review_service,
            recommendations: recommendation_service,
            cache,
        }
    }

    /// State over the in-memory store, no cache. Used by tests and
    /// database-free local runs.
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(store.clone(), store, None)
    }
}
