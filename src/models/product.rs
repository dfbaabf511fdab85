//! Tour products and their choice combinations.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Tour product from the `products` table. Canonical base prices live here;
/// pricing rules store signed adjustments against them.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub adult_base_price: Decimal,
    pub child_base_price: Decimal,
    pub infant_base_price: Decimal,
    pub homepage_pricing_type: String,
}

/// A selectable addon/combination for a product, with its intrinsic addon
/// cost per age tier. Channel-independent.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ChoiceCombination {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub adult_price: Decimal,
    pub child_price: Decimal,
    pub infant_price: Decimal,
}
