//! Pricing rule persistence services.
//!
//! Saves go through read-merge-write: the stored row for the same identity
//! (if any) is loaded first, its `choices_pricing` reconciled and merged with
//! the operator's entries, and only then written back. Batch saves report
//! progress per row and fall back to sequential single saves when the batch
//! path fails, so the caller always learns exactly how much was persisted.

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::cache::AppCache;
use crate::error::{AppError, Result};

use super::merge::{self, OverrideField};
use super::models::{ChoicesPricing, PricingRule};
use super::queries::{self, RulePayload};

/// Rows per transactional chunk in the batch path.
const BATCH_CHUNK_SIZE: usize = 50;

/// How the operator scoped a delete: one channel, or every channel of a
/// category.
#[derive(Debug, Clone)]
pub enum ChannelSelector {
    Channel(Uuid),
    Category(String),
}

/// Terminal result of a batch save. Never silently partial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    AllSaved { total: usize },
    PartiallySaved { saved: usize, failed: usize },
    NoneSaved { total: usize },
}

impl BatchOutcome {
    pub fn from_counts(saved: usize, failed: usize) -> Self {
        if failed == 0 {
            BatchOutcome::AllSaved { total: saved }
        } else if saved == 0 {
            BatchOutcome::NoneSaved { total: failed }
        } else {
            BatchOutcome::PartiallySaved { saved, failed }
        }
    }

    pub fn message(&self) -> String {
        match self {
            BatchOutcome::AllSaved { total } => {
                format!("Saved all {total} pricing rules")
            }
            BatchOutcome::PartiallySaved { saved, failed } => {
                format!("Saved {saved} pricing rules, {failed} failed")
            }
            BatchOutcome::NoneSaved { total } => {
                format!("Failed to save all {total} pricing rules")
            }
        }
    }
}

/// Report returned by [`save_rules_batch`].
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub outcome: BatchOutcome,
    pub saved: usize,
    pub failed: usize,
    pub total: usize,
}

fn positive(value: Decimal) -> bool {
    value > Decimal::ZERO
}

fn payload_has_positive_price(payload: &RulePayload) -> bool {
    if positive(payload.adult_price)
        || positive(payload.child_price)
        || positive(payload.infant_price)
    {
        return true;
    }
    // An entered per-choice OTA price also counts as a price.
    if let Ok(choices) = serde_json::from_value::<ChoicesPricing>(payload.choices_pricing.clone()) {
        return choices.values().any(|entry| {
            entry.ota_sale_price.is_some_and(positive)
                || entry.not_included_price.is_some_and(positive)
        });
    }
    false
}

/// Guard a save request before touching the store. A failed check is a
/// refused no-op with a user-facing message, not a store error.
pub fn validate_payloads(payloads: &[RulePayload]) -> Result<()> {
    if payloads.is_empty() {
        return Err(AppError::Validation(
            "No dates selected: nothing to save".to_string(),
        ));
    }
    if !payloads.iter().any(payload_has_positive_price) {
        return Err(AppError::Validation(
            "No positive price entered for any date".to_string(),
        ));
    }
    Ok(())
}

/// Merge a payload's entered choice overrides over what the store already
/// holds for its identity, returning the payload to write plus any duplicate
/// row ids to collapse.
async fn merge_with_stored(
    pool: &PgPool,
    payload: &RulePayload,
) -> Result<(RulePayload, Option<Uuid>, Vec<Uuid>)> {
    let existing = queries::fetch_rules_for_identity(
        pool,
        payload.product_id,
        payload.channel_id,
        payload.date,
        &payload.variant_key,
    )
    .await?;

    let entered: ChoicesPricing = serde_json::from_value(payload.choices_pricing.clone())
        .unwrap_or_else(|e| {
            tracing::warn!("unparseable entered choices_pricing, ignoring: {e}");
            ChoicesPricing::new()
        });

    // Rows come back newest first; reconcile oldest first so newer fields win.
    let maps_oldest_first: Vec<ChoicesPricing> =
        existing.iter().rev().map(|r| r.parse_choices()).collect();
    let stored = merge::reconcile(&maps_oldest_first);
    let merged = merge::prepare_for_save(&stored, &entered);

    let mut to_write = payload.clone();
    to_write.choices_pricing =
        serde_json::to_value(&merged).map_err(|e| AppError::Internal(e.to_string()))?;

    let head_id = existing.first().map(|r| r.id);
    let duplicate_ids: Vec<Uuid> = existing.iter().skip(1).map(|r| r.id).collect();
    Ok((to_write, head_id, duplicate_ids))
}

/// Save one rule with the read-merge-write discipline. Store errors
/// propagate to the caller; there is no local retry.
pub async fn save_rule(pool: &PgPool, payload: &RulePayload) -> Result<PricingRule> {
    let (to_write, head_id, duplicate_ids) = merge_with_stored(pool, payload).await?;

    let rule = match head_id {
        Some(id) => queries::update_rule(pool, id, &to_write).await?,
        None => queries::insert_rule(pool, &to_write).await?,
    };

    if !duplicate_ids.is_empty() {
        tracing::warn!(
            product_id = %payload.product_id,
            channel_id = %payload.channel_id,
            date = %payload.date,
            count = duplicate_ids.len(),
            "collapsed colliding rule rows after merge"
        );
        queries::delete_rule_ids(pool, &duplicate_ids).await?;
    }

    Ok(rule)
}

/// Save a list of rules, reporting `(completed, total)` after each row.
///
/// The chunked batch path keeps progress monotonic and reaches `total` on
/// success. If the batch path errors anywhere, every payload is retried as a
/// sequential single save and the report carries the partial counts.
pub async fn save_rules_batch(
    pool: &PgPool,
    payloads: &[RulePayload],
    mut progress: impl FnMut(usize, usize),
) -> Result<BatchReport> {
    validate_payloads(payloads)?;
    let total = payloads.len();

    match save_batch_path(pool, payloads, total, &mut progress).await {
        Ok(()) => Ok(BatchReport {
            outcome: BatchOutcome::AllSaved { total },
            saved: total,
            failed: 0,
            total,
        }),
        Err(batch_err) => {
            tracing::warn!("batch save failed, falling back to sequential saves: {batch_err}");
            let report = save_sequential(pool, payloads, &mut progress).await;
            Ok(report)
        }
    }
}

async fn save_batch_path(
    pool: &PgPool,
    payloads: &[RulePayload],
    total: usize,
    progress: &mut impl FnMut(usize, usize),
) -> Result<()> {
    let mut completed = 0usize;
    for chunk in payloads.chunks(BATCH_CHUNK_SIZE) {
        // Merges are read against the pool, writes are grouped per chunk so
        // a failed chunk never leaves half its rows behind.
        let mut writes = Vec::with_capacity(chunk.len());
        for payload in chunk {
            writes.push(merge_with_stored(pool, payload).await?);
        }

        let mut tx = pool.begin().await?;
        for (to_write, head_id, duplicate_ids) in &writes {
            match head_id {
                Some(id) => {
                    queries::update_rule(&mut *tx, *id, to_write).await?;
                }
                None => {
                    queries::insert_rule(&mut *tx, to_write).await?;
                }
            }
            if !duplicate_ids.is_empty() {
                queries::delete_rule_ids(&mut *tx, duplicate_ids).await?;
            }
        }
        tx.commit().await?;

        for _ in 0..chunk.len() {
            completed += 1;
            progress(completed, total);
        }
    }
    Ok(())
}

async fn save_sequential(
    pool: &PgPool,
    payloads: &[RulePayload],
    progress: &mut impl FnMut(usize, usize),
) -> BatchReport {
    let total = payloads.len();
    let mut saved = 0usize;
    let mut failed = 0usize;

    for (index, payload) in payloads.iter().enumerate() {
        match save_rule(pool, payload).await {
            Ok(_) => saved += 1,
            Err(e) => {
                failed += 1;
                tracing::error!(
                    date = %payload.date,
                    channel_id = %payload.channel_id,
                    "sequential save failed: {e}"
                );
            }
        }
        progress(index + 1, total);
    }

    BatchReport {
        outcome: BatchOutcome::from_counts(saved, failed),
        saved,
        failed,
        total,
    }
}

/// A rule loaded for an edit session: the reconciled row plus its decoded
/// choice overrides.
#[derive(Debug, Clone)]
pub struct RuleForEdit {
    pub rule: PricingRule,
    pub choices: ChoicesPricing,
}

/// Point lookup for editing. Colliding rows are reconciled by merging their
/// choice maps, newest fields winning, before the result is returned.
pub async fn load_rule_for_edit(
    pool: &PgPool,
    product_id: Uuid,
    channel_id: Uuid,
    date: chrono::NaiveDate,
    variant_key: &str,
) -> Result<Option<RuleForEdit>> {
    let rows =
        queries::fetch_rules_for_identity(pool, product_id, channel_id, date, variant_key).await?;
    let Some(head) = rows.first().cloned() else {
        return Ok(None);
    };

    let maps_oldest_first: Vec<ChoicesPricing> =
        rows.iter().rev().map(|r| r.parse_choices()).collect();
    let choices = merge::reconcile(&maps_oldest_first);

    Ok(Some(RuleForEdit { rule: head, choices }))
}

/// Rebuild a write payload from a stored row, with a replacement choice map.
fn payload_from_rule(rule: &PricingRule, choices: &ChoicesPricing) -> Result<RulePayload> {
    Ok(RulePayload {
        product_id: rule.product_id,
        channel_id: rule.channel_id,
        date: rule.date,
        variant_key: rule.variant_key.clone(),
        adult_price: rule.adult_price,
        child_price: rule.child_price,
        infant_price: rule.infant_price,
        price_adjustment_adult: rule.price_adjustment_adult,
        price_adjustment_child: rule.price_adjustment_child,
        price_adjustment_infant: rule.price_adjustment_infant,
        commission_percent: rule.commission_percent,
        coupon_percent: rule.coupon_percent,
        markup_amount: rule.markup_amount,
        markup_percent: rule.markup_percent,
        not_included_price: rule.not_included_price,
        is_sale_available: rule.is_sale_available,
        choices_pricing: serde_json::to_value(choices)
            .map_err(|e| AppError::Internal(e.to_string()))?,
        inclusions_ko: rule.inclusions_ko.clone(),
        inclusions_en: rule.inclusions_en.clone(),
        exclusions_ko: rule.exclusions_ko.clone(),
        exclusions_en: rule.exclusions_en.clone(),
        price_type: rule.price_type.clone(),
    })
}

/// Inline edit of one numeric field of one choice override. The rest of the
/// row is carried over unchanged; colliding rows are reconciled and collapsed
/// the same way a full save would.
pub async fn save_choice_field(
    pool: &PgPool,
    product_id: Uuid,
    channel_id: Uuid,
    date: chrono::NaiveDate,
    variant_key: &str,
    choice_key: &str,
    field: OverrideField,
    value: Decimal,
) -> Result<PricingRule> {
    let rows =
        queries::fetch_rules_for_identity(pool, product_id, channel_id, date, variant_key).await?;
    let Some(head) = rows.first() else {
        return Err(AppError::NotFound);
    };

    let maps_oldest_first: Vec<ChoicesPricing> =
        rows.iter().rev().map(|r| r.parse_choices()).collect();
    let mut choices = merge::reconcile(&maps_oldest_first);
    let base = choices.get(choice_key).cloned().unwrap_or_default();
    choices.insert(
        choice_key.to_string(),
        merge::merge_override(&base, &merge::single_field_update(field, value)),
    );

    let payload = payload_from_rule(head, &choices)?;
    let rule = queries::update_rule(pool, head.id, &payload).await?;

    let duplicate_ids: Vec<Uuid> = rows.iter().skip(1).map(|r| r.id).collect();
    if !duplicate_ids.is_empty() {
        queries::delete_rule_ids(pool, &duplicate_ids).await?;
    }

    Ok(rule)
}

/// Delete every rule for the selected dates and channels. Hard delete; an
/// empty date set is a no-op.
pub async fn delete_rules_by_dates(
    pool: &PgPool,
    cache: &AppCache,
    product_id: Uuid,
    selector: &ChannelSelector,
    dates: &[chrono::NaiveDate],
) -> Result<u64> {
    if dates.is_empty() {
        return Ok(0);
    }

    let channel_ids: Vec<Uuid> = match selector {
        ChannelSelector::Channel(id) => vec![*id],
        ChannelSelector::Category(category) => cache
            .channels_in_category(pool, category)
            .await?
            .iter()
            .map(|c| c.id)
            .collect(),
    };
    if channel_ids.is_empty() {
        return Ok(0);
    }

    let deleted = queries::delete_rules(pool, product_id, &channel_ids, dates).await?;
    tracing::info!(
        %product_id,
        channels = channel_ids.len(),
        dates = dates.len(),
        deleted,
        "deleted pricing rules"
    );
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn payload(adult: Decimal) -> RulePayload {
        RulePayload {
            product_id: Uuid::new_v4(),
            channel_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            variant_key: "default".to_string(),
            adult_price: adult,
            child_price: dec!(0),
            infant_price: dec!(0),
            price_adjustment_adult: dec!(0),
            price_adjustment_child: dec!(0),
            price_adjustment_infant: dec!(0),
            commission_percent: dec!(0),
            coupon_percent: dec!(0),
            markup_amount: dec!(0),
            markup_percent: dec!(0),
            not_included_price: dec!(0),
            is_sale_available: true,
            choices_pricing: serde_json::json!({}),
            inclusions_ko: None,
            inclusions_en: None,
            exclusions_ko: None,
            exclusions_en: None,
            price_type: Some("dynamic".to_string()),
        }
    }

    #[test]
    fn outcome_classification() {
        assert_eq!(
            BatchOutcome::from_counts(5, 0),
            BatchOutcome::AllSaved { total: 5 }
        );
        assert_eq!(
            BatchOutcome::from_counts(3, 2),
            BatchOutcome::PartiallySaved { saved: 3, failed: 2 }
        );
        assert_eq!(
            BatchOutcome::from_counts(0, 4),
            BatchOutcome::NoneSaved { total: 4 }
        );
    }

    #[test]
    fn outcome_counts_always_cover_the_batch() {
        for saved in 0..5usize {
            for failed in 0..5usize {
                if saved + failed == 0 {
                    continue;
                }
                match BatchOutcome::from_counts(saved, failed) {
                    BatchOutcome::AllSaved { total } => assert_eq!(total, saved + failed),
                    BatchOutcome::NoneSaved { total } => assert_eq!(total, saved + failed),
                    BatchOutcome::PartiallySaved { saved: s, failed: f } => {
                        assert_eq!(s + f, saved + failed)
                    }
                }
            }
        }
    }

    #[test]
    fn validation_rejects_empty_date_set() {
        let err = validate_payloads(&[]).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn validation_rejects_all_zero_prices() {
        let err = validate_payloads(&[payload(dec!(0))]).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn validation_accepts_choice_level_price() {
        let mut p = payload(dec!(0));
        p.choices_pricing = serde_json::json!({
            "no_choice": { "ota_sale_price": "120" }
        });
        assert!(validate_payloads(&[p]).is_ok());
    }

    #[test]
    fn validation_accepts_tier_price() {
        assert!(validate_payloads(&[payload(dec!(100))]).is_ok());
    }

    #[test]
    fn payload_rebuild_replaces_only_the_choice_map() {
        use super::super::models::ChoiceOverride;
        use chrono::Utc;

        let rule = PricingRule {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            channel_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            variant_key: "default".to_string(),
            adult_price: dec!(100),
            child_price: dec!(80),
            infant_price: dec!(0),
            price_adjustment_adult: dec!(10),
            price_adjustment_child: dec!(0),
            price_adjustment_infant: dec!(0),
            commission_percent: dec!(20),
            coupon_percent: dec!(0),
            markup_amount: dec!(0),
            markup_percent: dec!(0),
            not_included_price: dec!(5),
            is_sale_available: true,
            choices_pricing: Some(serde_json::json!({"a": {"ota_sale_price": "100"}})),
            inclusions_ko: Some("조식".to_string()),
            inclusions_en: None,
            exclusions_ko: None,
            exclusions_en: None,
            price_type: Some("dynamic".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let mut choices = ChoicesPricing::new();
        choices.insert(
            "a".to_string(),
            ChoiceOverride {
                ota_sale_price: Some(dec!(130)),
                ..Default::default()
            },
        );

        let rebuilt = payload_from_rule(&rule, &choices).unwrap();
        assert_eq!(rebuilt.adult_price, rule.adult_price);
        assert_eq!(rebuilt.commission_percent, rule.commission_percent);
        assert_eq!(rebuilt.inclusions_ko, rule.inclusions_ko);

        let round: ChoicesPricing = serde_json::from_value(rebuilt.choices_pricing).unwrap();
        assert_eq!(round["a"].ota_sale_price, Some(dec!(130)));
    }
}
