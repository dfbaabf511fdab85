//! Database queries for channel, product, and choice combination descriptors.
//!
//! These tables are maintained by other parts of the dashboard; the pricing
//! engine only ever reads them.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Channel, ChoiceCombination, Product};

const CHANNEL_COLUMNS: &str = r#"
    id, name, category, pricing_type,
    commission_percent, commission_base_price_only, not_included_type
"#;

/// Get one channel descriptor by id
pub async fn get_channel(pool: &PgPool, id: Uuid) -> Result<Channel> {
    sqlx::query_as::<_, Channel>(&format!(
        r#"
        SELECT {CHANNEL_COLUMNS}
        FROM channels
        WHERE id = $1
        "#
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound)
}

/// Get every channel, ordered by name
pub async fn get_channels(pool: &PgPool) -> Result<Vec<Channel>> {
    let channels = sqlx::query_as::<_, Channel>(&format!(
        r#"
        SELECT {CHANNEL_COLUMNS}
        FROM channels
        ORDER BY name
        "#
    ))
    .fetch_all(pool)
    .await?;

    Ok(channels)
}

/// Get every channel of a category (used to expand channel-type group
/// selections, e.g. "delete these dates on every OTA channel")
pub async fn get_channels_by_category(pool: &PgPool, category: &str) -> Result<Vec<Channel>> {
    let channels = sqlx::query_as::<_, Channel>(&format!(
        r#"
        SELECT {CHANNEL_COLUMNS}
        FROM channels
        WHERE lower(category) = lower($1)
        ORDER BY name
        "#
    ))
    .bind(category)
    .fetch_all(pool)
    .await?;

    Ok(channels)
}

/// Get one product with its canonical base prices
pub async fn get_product(pool: &PgPool, id: Uuid) -> Result<Product> {
    sqlx::query_as::<_, Product>(
        r#"
        SELECT id, name, adult_base_price, child_base_price, infant_base_price,
               homepage_pricing_type
        FROM products
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound)
}

/// Get all choice combinations of a product. Empty for no-choice products.
pub async fn get_choice_combinations(
    pool: &PgPool,
    product_id: Uuid,
) -> Result<Vec<ChoiceCombination>> {
    let combinations = sqlx::query_as::<_, ChoiceCombination>(
        r#"
        SELECT id, product_id, name, adult_price, child_price, infant_price
        FROM choice_combinations
        WHERE product_id = $1
        ORDER BY name
        "#,
    )
    .bind(product_id)
    .fetch_all(pool)
    .await?;

    Ok(combinations)
}
