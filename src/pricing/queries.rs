//! Database queries for the pricing rule store.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

use crate::error::Result;

use super::models::PricingRule;

const RULE_COLUMNS: &str = r#"
    id, product_id, channel_id, date, variant_key,
    adult_price, child_price, infant_price,
    price_adjustment_adult, price_adjustment_child, price_adjustment_infant,
    commission_percent, coupon_percent, markup_amount, markup_percent,
    not_included_price, is_sale_available, choices_pricing,
    inclusions_ko, inclusions_en, exclusions_ko, exclusions_en,
    price_type, created_at, updated_at
"#;

/// One rule write: everything but the row id and timestamps.
#[derive(Debug, Clone)]
pub struct RulePayload {
    pub product_id: Uuid,
    pub channel_id: Uuid,
    pub date: NaiveDate,
    pub variant_key: String,
    pub adult_price: Decimal,
    pub child_price: Decimal,
    pub infant_price: Decimal,
    pub price_adjustment_adult: Decimal,
    pub price_adjustment_child: Decimal,
    pub price_adjustment_infant: Decimal,
    pub commission_percent: Decimal,
    pub coupon_percent: Decimal,
    pub markup_amount: Decimal,
    pub markup_percent: Decimal,
    pub not_included_price: Decimal,
    pub is_sale_available: bool,
    pub choices_pricing: serde_json::Value,
    pub inclusions_ko: Option<String>,
    pub inclusions_en: Option<String>,
    pub exclusions_ko: Option<String>,
    pub exclusions_en: Option<String>,
    pub price_type: Option<String>,
}

/// All persisted rows for one rule identity, newest first. More than one row
/// means racing writers collided; callers reconcile rather than pick one.
pub async fn fetch_rules_for_identity<'e>(
    exec: impl PgExecutor<'e>,
    product_id: Uuid,
    channel_id: Uuid,
    date: NaiveDate,
    variant_key: &str,
) -> Result<Vec<PricingRule>> {
    let rows = sqlx::query_as::<_, PricingRule>(&format!(
        r#"
        SELECT {RULE_COLUMNS}
        FROM dynamic_pricing
        WHERE product_id = $1
          AND channel_id = $2
          AND date = $3
          AND variant_key = $4
        ORDER BY updated_at DESC
        "#
    ))
    .bind(product_id)
    .bind(channel_id)
    .bind(date)
    .bind(variant_key)
    .fetch_all(exec)
    .await?;

    Ok(rows)
}

/// Insert a new rule row.
pub async fn insert_rule<'e>(
    exec: impl PgExecutor<'e>,
    payload: &RulePayload,
) -> Result<PricingRule> {
    let rule = sqlx::query_as::<_, PricingRule>(&format!(
        r#"
        INSERT INTO dynamic_pricing (
            id, product_id, channel_id, date, variant_key,
            adult_price, child_price, infant_price,
            price_adjustment_adult, price_adjustment_child, price_adjustment_infant,
            commission_percent, coupon_percent, markup_amount, markup_percent,
            not_included_price, is_sale_available, choices_pricing,
            inclusions_ko, inclusions_en, exclusions_ko, exclusions_en,
            price_type, created_at, updated_at
        )
        VALUES (
            $1, $2, $3, $4, $5,
            $6, $7, $8,
            $9, $10, $11,
            $12, $13, $14, $15,
            $16, $17, $18,
            $19, $20, $21, $22,
            $23, now(), now()
        )
        RETURNING {RULE_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(payload.product_id)
    .bind(payload.channel_id)
    .bind(payload.date)
    .bind(&payload.variant_key)
    .bind(payload.adult_price)
    .bind(payload.child_price)
    .bind(payload.infant_price)
    .bind(payload.price_adjustment_adult)
    .bind(payload.price_adjustment_child)
    .bind(payload.price_adjustment_infant)
    .bind(payload.commission_percent)
    .bind(payload.coupon_percent)
    .bind(payload.markup_amount)
    .bind(payload.markup_percent)
    .bind(payload.not_included_price)
    .bind(payload.is_sale_available)
    .bind(&payload.choices_pricing)
    .bind(&payload.inclusions_ko)
    .bind(&payload.inclusions_en)
    .bind(&payload.exclusions_ko)
    .bind(&payload.exclusions_en)
    .bind(&payload.price_type)
    .fetch_one(exec)
    .await?;

    Ok(rule)
}

/// Overwrite an existing rule row in place.
pub async fn update_rule<'e>(
    exec: impl PgExecutor<'e>,
    id: Uuid,
    payload: &RulePayload,
) -> Result<PricingRule> {
    let rule = sqlx::query_as::<_, PricingRule>(&format!(
        r#"
        UPDATE dynamic_pricing SET
            adult_price = $2, child_price = $3, infant_price = $4,
            price_adjustment_adult = $5, price_adjustment_child = $6, price_adjustment_infant = $7,
            commission_percent = $8, coupon_percent = $9,
            markup_amount = $10, markup_percent = $11,
            not_included_price = $12, is_sale_available = $13, choices_pricing = $14,
            inclusions_ko = $15, inclusions_en = $16,
            exclusions_ko = $17, exclusions_en = $18,
            price_type = $19, updated_at = now()
        WHERE id = $1
        RETURNING {RULE_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(payload.adult_price)
    .bind(payload.child_price)
    .bind(payload.infant_price)
    .bind(payload.price_adjustment_adult)
    .bind(payload.price_adjustment_child)
    .bind(payload.price_adjustment_infant)
    .bind(payload.commission_percent)
    .bind(payload.coupon_percent)
    .bind(payload.markup_amount)
    .bind(payload.markup_percent)
    .bind(payload.not_included_price)
    .bind(payload.is_sale_available)
    .bind(&payload.choices_pricing)
    .bind(&payload.inclusions_ko)
    .bind(&payload.inclusions_en)
    .bind(&payload.exclusions_ko)
    .bind(&payload.exclusions_en)
    .bind(&payload.price_type)
    .fetch_one(exec)
    .await?;

    Ok(rule)
}

/// Remove specific rows by id (used to collapse colliding duplicates).
pub async fn delete_rule_ids<'e>(exec: impl PgExecutor<'e>, ids: &[Uuid]) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let result = sqlx::query("DELETE FROM dynamic_pricing WHERE id = ANY($1)")
        .bind(ids)
        .execute(exec)
        .await?;
    Ok(result.rows_affected())
}

/// Remove every rule for the given product, channels, and dates.
pub async fn delete_rules<'e>(
    exec: impl PgExecutor<'e>,
    product_id: Uuid,
    channel_ids: &[Uuid],
    dates: &[NaiveDate],
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM dynamic_pricing
        WHERE product_id = $1
          AND channel_id = ANY($2)
          AND date = ANY($3)
        "#,
    )
    .bind(product_id)
    .bind(channel_ids)
    .bind(dates)
    .execute(exec)
    .await?;
    Ok(result.rows_affected())
}

/// Lightweight row for statistics scans. The date comes back as raw text on
/// purpose: historical rows hold several encodings and the aggregator does
/// its own best-effort parse.
#[derive(Debug, Clone, FromRow)]
pub struct StatsRow {
    pub channel_id: Uuid,
    pub date_raw: String,
}

/// One fixed-size page of a product's rule rows for statistics.
pub async fn fetch_stats_page<'e>(
    exec: impl PgExecutor<'e>,
    product_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<StatsRow>> {
    let rows = sqlx::query_as::<_, StatsRow>(
        r#"
        SELECT channel_id, date::text AS date_raw
        FROM dynamic_pricing
        WHERE product_id = $1
        ORDER BY id
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(product_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(exec)
    .await?;

    Ok(rows)
}
