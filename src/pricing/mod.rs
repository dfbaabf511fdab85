//! Pricing engine module for the tour operations dashboard.
//!
//! Turns base product prices, per-channel markup/commission/coupon
//! parameters, and per-choice overrides into maximum/net/OTA sale prices,
//! and persists the resulting rules with merge-on-save semantics.

pub mod calculators;
pub mod merge;
pub mod models;
pub mod queries;
pub mod requests;
pub mod responses;
pub mod routes;
pub mod services;
pub mod stats;
pub mod status;

// Re-export commonly used items
pub use calculators::{round_money, PricingStrategy};
pub use models::{ChoiceOverride, ChoicesPricing, PricingRule, NO_CHOICE_KEY};
pub use routes::router;
pub use services::{BatchOutcome, BatchReport, ChannelSelector};
