//! Pricing route handlers.
//!
//! The dashboard screens are rendered elsewhere; these endpoints carry the
//! engine's operations as JSON.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::AppState;

use super::calculators::{self, DayParameters, PriceBasis, PricingStrategy, TierMode};
use super::models::Inheritable;
use super::requests::*;
use super::responses::*;
use super::services::{self, ChannelSelector};
use super::stats;
use super::status::{self, SaleStatus};

/// Build the pricing router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pricing/preview", post(preview))
        .route("/pricing/rules", get(rule_for_edit).delete(delete_rules))
        .route("/pricing/rules/batch", post(save_batch))
        .route("/pricing/rules/field", post(update_rule_field))
        .route("/pricing/stats/:product_id", get(statistics))
        .route("/status/toggle", post(toggle_status))
        .route("/status/current", get(current_status))
        .route("/status/history", get(status_history))
        .route("/checklist/:category/reset", post(reset_checklist))
}

/// Calculate the preview quadruples for one day's configuration.
async fn preview(
    State(state): State<AppState>,
    Json(req): Json<PreviewRequest>,
) -> Result<Json<PreviewResponse>> {
    let channel = state.cache.channel(&state.db, req.channel_id).await?;
    let strategy = PricingStrategy::for_channel(&channel);

    let prices = match strategy.tier_mode {
        TierMode::Single => PriceBasis::single(req.adult_price),
        TierMode::Separate => PriceBasis {
            adult: req.adult_price,
            child: req.child_price.unwrap_or(req.adult_price),
            infant: req.infant_price.unwrap_or_default(),
        },
    };

    let addons = match req.choice_id {
        Some(choice_id) => {
            let combos = state.cache.combinations_for(&state.db, req.product_id).await?;
            let combo = combos
                .iter()
                .find(|c| c.id == choice_id)
                .ok_or(AppError::NotFound)?;
            PriceBasis {
                adult: combo.adult_price,
                child: combo.child_price,
                infant: combo.infant_price,
            }
        }
        None => PriceBasis::single(Decimal::ZERO),
    };

    let commission = Inheritable::resolve(req.commission_percent, channel.commission_percent);
    let params = DayParameters {
        markup_amount: req.markup_amount.unwrap_or_default(),
        markup_percent: req.markup_percent.unwrap_or_default(),
        commission_percent: commission.value(),
        coupon_percent: req.coupon_percent.unwrap_or_default(),
        not_included_amount: req.not_included_amount.unwrap_or_default(),
    };

    let breakdowns = calculators::compute_for_tiers(&strategy, &prices, &addons, &params);
    Ok(Json(PreviewResponse::new(
        breakdowns,
        strategy.tier_mode == TierMode::Single,
    )))
}

/// Save a batch of rules and answer with a terminal outcome.
async fn save_batch(
    State(state): State<AppState>,
    Json(req): Json<BatchSaveRequest>,
) -> Result<Json<BatchSaveResponse>> {
    req.ensure_channels_selected()?;
    state.cache.product(&state.db, req.product_id).await?;

    let mut payloads = Vec::with_capacity(req.rules.len());
    for entry in req.rules {
        let channel = state.cache.channel(&state.db, entry.channel_id).await?;
        payloads.push(entry.into_payload(req.product_id, channel.commission_percent));
    }

    let total = payloads.len();
    let report = services::save_rules_batch(&state.db, &payloads, |completed, total| {
        tracing::debug!(completed, total, "batch save progress");
    })
    .await?;

    tracing::info!(
        product_id = %req.product_id,
        total,
        saved = report.saved,
        failed = report.failed,
        "batch save finished"
    );
    Ok(Json(report.into()))
}

/// Load one rule for editing, collisions reconciled.
async fn rule_for_edit(
    State(state): State<AppState>,
    Query(query): Query<RuleQuery>,
) -> Result<Json<RuleResponse>> {
    let loaded = services::load_rule_for_edit(
        &state.db,
        query.product_id,
        query.channel_id,
        query.date,
        &query.variant_key,
    )
    .await?
    .ok_or(AppError::NotFound)?;

    Ok(Json(RuleResponse {
        rule: loaded.rule,
        choices: loaded.choices,
    }))
}

/// Delete rules for the selected dates and channel(s).
async fn delete_rules(
    State(state): State<AppState>,
    Json(req): Json<DeleteRulesRequest>,
) -> Result<Json<DeleteResponse>> {
    let selector = match (req.channel_id, req.channel_category) {
        (Some(id), _) => ChannelSelector::Channel(id),
        (None, Some(category)) => ChannelSelector::Category(category),
        (None, None) => {
            return Err(AppError::Validation(
                "No channel or channel category selected".to_string(),
            ))
        }
    };

    let deleted = services::delete_rules_by_dates(
        &state.db,
        &state.cache,
        req.product_id,
        &selector,
        &req.dates,
    )
    .await?;
    Ok(Json(DeleteResponse { deleted }))
}

/// Inline edit of one numeric field of one choice override.
async fn update_rule_field(
    State(state): State<AppState>,
    Json(req): Json<ChoiceFieldUpdateRequest>,
) -> Result<Json<RuleResponse>> {
    let rule = services::save_choice_field(
        &state.db,
        req.product_id,
        req.channel_id,
        req.date,
        &req.variant_key,
        &req.choice_key,
        req.field,
        req.value,
    )
    .await?;

    let choices = rule.parse_choices();
    Ok(Json(RuleResponse { rule, choices }))
}

/// Aggregate distinct-date statistics for a product.
async fn statistics(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<StatsResponse>> {
    let token = state.cache.begin_selection(product_id);
    let stats = stats::aggregate_product_stats(&state.db, product_id, Some(&token))
        .await?
        // A newer selection superseded this load; nothing to show.
        .ok_or(AppError::NotFound)?;

    Ok(Json(stats.into()))
}

/// Record a sale/closed transition.
async fn toggle_status(
    State(state): State<AppState>,
    Json(req): Json<StatusToggleRequest>,
) -> Result<Json<StatusResponse>> {
    let new_state = match req.state.as_str() {
        "sale" => SaleStatus::Sale,
        "closed" => SaleStatus::Closed,
        other => {
            return Err(AppError::Validation(format!(
                "Unknown sale state '{other}', expected 'sale' or 'closed'"
            )))
        }
    };

    let subject = status::subject_id(
        req.product_id,
        req.channel_id,
        req.date,
        req.choice_id.as_deref(),
    );
    let entry = status::record_transition(&state.db, &subject, &req.actor, new_state).await?;
    Ok(Json(StatusResponse { entry }))
}

/// Current state of one subject: latest log entry, calendar state, and
/// purchasability from the rule row.
async fn current_status(
    State(state): State<AppState>,
    Query(query): Query<CurrentStatusQuery>,
) -> Result<Json<CurrentStatusResponse>> {
    let subject = status::subject_id(
        query.product_id,
        query.channel_id,
        query.date,
        query.choice_id.as_deref(),
    );
    let latest = status::latest_entry(&state.db, &subject).await?;
    let rule = services::load_rule_for_edit(
        &state.db,
        query.product_id,
        query.channel_id,
        query.date,
        &query.variant_key,
    )
    .await?
    .map(|r| r.rule);

    let (sale_status, purchasable) = status::current_state(rule.as_ref(), latest.as_ref());
    Ok(Json(CurrentStatusResponse {
        status: sale_status,
        purchasable,
        last_entry: latest,
    }))
}

/// Audit history for one subject, newest first.
async fn status_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<status::StatusLogEntry>>> {
    let subject = status::subject_id(
        query.product_id,
        query.channel_id,
        query.date,
        query.choice_id.as_deref(),
    );
    let entries = status::history(&state.db, &subject).await?;
    Ok(Json(entries))
}

/// Reset every completed item of a checklist category.
async fn reset_checklist(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Json(req): Json<ResetCategoryRequest>,
) -> Result<Json<ResetResponse>> {
    let reset = status::reset_category(&state.db, &category, &req.actor).await?;
    Ok(Json(ResetResponse { reset }))
}
