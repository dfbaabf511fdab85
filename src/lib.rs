//! Pricing engine for the tour operations dashboard.
//!
//! Calculates multi-channel, multi-variant, multi-choice tour prices and
//! persists the pricing rules behind the dashboard's calendar screens.

pub mod cache;
pub mod db;
pub mod error;
pub mod models;
pub mod pricing;
pub mod routes;

use sqlx::PgPool;

use cache::AppCache;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub cache: AppCache,
}
