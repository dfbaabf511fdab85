//! Response DTOs for pricing API endpoints.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use super::calculators::{PriceBreakdown, TierBreakdowns};
use super::models::{ChoicesPricing, PricingRule};
use super::services::{BatchOutcome, BatchReport};
use super::stats::PricingStatistics;
use super::status::{SaleStatus, StatusLogEntry};

/// One tier's calculated quantities, rounded for display.
#[derive(Debug, Clone, Serialize)]
pub struct BreakdownResponse {
    #[serde(with = "rust_decimal::serde::str")]
    pub base_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub markup_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub max_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub discount_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub net_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub ota_sale_price: Decimal,
}

impl From<PriceBreakdown> for BreakdownResponse {
    fn from(b: PriceBreakdown) -> Self {
        use super::calculators::round_money;
        BreakdownResponse {
            base_price: round_money(b.base, 2),
            markup_price: round_money(b.markup, 2),
            max_price: round_money(b.max, 2),
            discount_price: round_money(b.discount, 2),
            net_price: round_money(b.net, 2),
            ota_sale_price: round_money(b.ota_sale, 2),
        }
    }
}

/// Response for a price preview.
#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub adult: BreakdownResponse,
    pub child: BreakdownResponse,
    pub infant: BreakdownResponse,
    /// True when the channel broadcasts one price to every tier.
    pub single_price: bool,
}

impl PreviewResponse {
    pub fn new(breakdowns: TierBreakdowns, single_price: bool) -> Self {
        PreviewResponse {
            adult: breakdowns.adult.into(),
            child: breakdowns.child.into(),
            infant: breakdowns.infant.into(),
            single_price,
        }
    }
}

/// Response for a batch save: always one of the three terminal outcomes.
#[derive(Debug, Serialize)]
pub struct BatchSaveResponse {
    pub status: &'static str,
    pub message: String,
    pub saved: usize,
    pub failed: usize,
    pub total: usize,
}

impl From<BatchReport> for BatchSaveResponse {
    fn from(report: BatchReport) -> Self {
        let status = match report.outcome {
            BatchOutcome::AllSaved { .. } => "all_saved",
            BatchOutcome::PartiallySaved { .. } => "partially_saved",
            BatchOutcome::NoneSaved { .. } => "none_saved",
        };
        BatchSaveResponse {
            status,
            message: report.outcome.message(),
            saved: report.saved,
            failed: report.failed,
            total: report.total,
        }
    }
}

/// A rule loaded for editing, choices already reconciled and decoded.
#[derive(Debug, Serialize)]
pub struct RuleResponse {
    #[serde(flatten)]
    pub rule: PricingRule,
    pub choices: ChoicesPricing,
}

/// Response for a delete.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: u64,
}

/// Statistics for one product: distinct priced dates per channel and year.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub by_channel_id: HashMap<Uuid, BTreeMap<i32, usize>>,
    pub by_channel_name: HashMap<String, BTreeMap<i32, usize>>,
}

impl From<PricingStatistics> for StatsResponse {
    fn from(stats: PricingStatistics) -> Self {
        StatsResponse {
            by_channel_id: stats.by_channel_id,
            by_channel_name: stats.by_channel_name,
        }
    }
}

/// Response for a status toggle: the appended audit entry.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub entry: StatusLogEntry,
}

/// Current state of a subject: what the calendar shows, whether the day can
/// actually be bought, and the entry that decided it.
#[derive(Debug, Serialize)]
pub struct CurrentStatusResponse {
    pub status: SaleStatus,
    pub purchasable: bool,
    pub last_entry: Option<StatusLogEntry>,
}

/// Response for a checklist category reset.
#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub reset: usize,
}
