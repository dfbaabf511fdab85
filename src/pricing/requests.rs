//! Request DTOs for pricing API endpoints.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, Result};

use super::merge::OverrideField;
use super::models::{ChoicesPricing, NO_CHOICE_KEY};
use super::queries::RulePayload;

fn default_variant_key() -> String {
    "default".to_string()
}

/// Request to preview calculated prices for one day's configuration.
#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub channel_id: Uuid,
    pub product_id: Uuid,
    /// Resolved tier prices. Under single-price channels only `adult_price`
    /// is read and broadcast.
    #[serde(with = "rust_decimal::serde::str")]
    pub adult_price: Decimal,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub child_price: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub infant_price: Option<Decimal>,
    /// Selected choice combination; omitted for no-choice products.
    #[serde(default)]
    pub choice_id: Option<Uuid>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub markup_amount: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub markup_percent: Option<Decimal>,
    /// Omitted means inherit the channel's default commission.
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub commission_percent: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub coupon_percent: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub not_included_amount: Option<Decimal>,
}

/// One rule to save inside a batch request.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleEntry {
    pub date: NaiveDate,
    pub channel_id: Uuid,
    #[serde(default = "default_variant_key")]
    pub variant_key: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub adult_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub child_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub infant_price: Decimal,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub price_adjustment_adult: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub price_adjustment_child: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub price_adjustment_infant: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub commission_percent: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub coupon_percent: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub markup_amount: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub markup_percent: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub not_included_price: Option<Decimal>,
    #[serde(default = "default_sale_available")]
    pub is_sale_available: bool,
    /// Only the fields the operator actually touched in this save.
    #[serde(default)]
    pub choices_pricing: ChoicesPricing,
    #[serde(default)]
    pub inclusions_ko: Option<String>,
    #[serde(default)]
    pub inclusions_en: Option<String>,
    #[serde(default)]
    pub exclusions_ko: Option<String>,
    #[serde(default)]
    pub exclusions_en: Option<String>,
    #[serde(default)]
    pub price_type: Option<String>,
}

fn default_sale_available() -> bool {
    true
}

impl RuleEntry {
    /// Lower into the repository payload, filling defaults and resolving the
    /// channel-inherited commission.
    pub fn into_payload(self, product_id: Uuid, channel_commission: Decimal) -> RulePayload {
        let commission = crate::pricing::models::Inheritable::resolve(
            self.commission_percent,
            channel_commission,
        );
        RulePayload {
            product_id,
            channel_id: self.channel_id,
            date: self.date,
            variant_key: self.variant_key,
            adult_price: self.adult_price,
            child_price: self.child_price,
            infant_price: self.infant_price,
            price_adjustment_adult: self.price_adjustment_adult.unwrap_or_default(),
            price_adjustment_child: self.price_adjustment_child.unwrap_or_default(),
            price_adjustment_infant: self.price_adjustment_infant.unwrap_or_default(),
            commission_percent: commission.value(),
            coupon_percent: self.coupon_percent.unwrap_or_default(),
            markup_amount: self.markup_amount.unwrap_or_default(),
            markup_percent: self.markup_percent.unwrap_or_default(),
            not_included_price: self.not_included_price.unwrap_or_default(),
            is_sale_available: self.is_sale_available,
            choices_pricing: serde_json::to_value(&self.choices_pricing)
                .unwrap_or(serde_json::Value::Null),
            inclusions_ko: self.inclusions_ko,
            inclusions_en: self.inclusions_en,
            exclusions_ko: self.exclusions_ko,
            exclusions_en: self.exclusions_en,
            price_type: self.price_type,
        }
    }
}

/// Request to save a list of rules for one product.
#[derive(Debug, Deserialize)]
pub struct BatchSaveRequest {
    pub product_id: Uuid,
    pub rules: Vec<RuleEntry>,
}

impl BatchSaveRequest {
    /// Reject nil channel ids before any of them is resolved against the
    /// store, so a blank selection reads as a refused request rather than an
    /// unknown channel.
    pub fn ensure_channels_selected(&self) -> Result<()> {
        if self.rules.iter().any(|e| e.channel_id.is_nil()) {
            return Err(AppError::Validation(
                "No channel selected for one or more dates".to_string(),
            ));
        }
        Ok(())
    }
}

/// Request to delete rules for selected dates on a channel or a whole
/// channel category.
#[derive(Debug, Deserialize)]
pub struct DeleteRulesRequest {
    pub product_id: Uuid,
    pub dates: Vec<NaiveDate>,
    #[serde(default)]
    pub channel_id: Option<Uuid>,
    #[serde(default)]
    pub channel_category: Option<String>,
}

/// Point lookup of one rule for editing.
#[derive(Debug, Deserialize)]
pub struct RuleQuery {
    pub product_id: Uuid,
    pub channel_id: Uuid,
    pub date: NaiveDate,
    #[serde(default = "default_variant_key")]
    pub variant_key: String,
}

/// Inline edit of one numeric field inside one choice override.
#[derive(Debug, Deserialize)]
pub struct ChoiceFieldUpdateRequest {
    pub product_id: Uuid,
    pub channel_id: Uuid,
    pub date: NaiveDate,
    #[serde(default = "default_variant_key")]
    pub variant_key: String,
    #[serde(default = "default_choice_key")]
    pub choice_key: String,
    pub field: OverrideField,
    #[serde(with = "rust_decimal::serde::str")]
    pub value: Decimal,
}

fn default_choice_key() -> String {
    NO_CHOICE_KEY.to_string()
}

/// Sale status toggle for one day, optionally scoped to one choice.
#[derive(Debug, Deserialize)]
pub struct StatusToggleRequest {
    pub product_id: Uuid,
    pub channel_id: Uuid,
    pub date: NaiveDate,
    #[serde(default)]
    pub choice_id: Option<String>,
    pub actor: String,
    /// "sale" or "closed"
    pub state: String,
}

/// Audit history lookup.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub product_id: Uuid,
    pub channel_id: Uuid,
    pub date: NaiveDate,
    #[serde(default)]
    pub choice_id: Option<String>,
}

/// Current-status lookup. The variant key scopes the rule row that decides
/// purchasability.
#[derive(Debug, Deserialize)]
pub struct CurrentStatusQuery {
    pub product_id: Uuid,
    pub channel_id: Uuid,
    pub date: NaiveDate,
    #[serde(default)]
    pub choice_id: Option<String>,
    #[serde(default = "default_variant_key")]
    pub variant_key: String,
}

/// Checklist reset.
#[derive(Debug, Deserialize)]
pub struct ResetCategoryRequest {
    pub actor: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(channel_id: Uuid) -> RuleEntry {
        RuleEntry {
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            channel_id,
            variant_key: "default".to_string(),
            adult_price: dec!(100),
            child_price: dec!(0),
            infant_price: dec!(0),
            price_adjustment_adult: None,
            price_adjustment_child: None,
            price_adjustment_infant: None,
            commission_percent: None,
            coupon_percent: None,
            markup_amount: None,
            markup_percent: None,
            not_included_price: None,
            is_sale_available: true,
            choices_pricing: ChoicesPricing::new(),
            inclusions_ko: None,
            inclusions_en: None,
            exclusions_ko: None,
            exclusions_en: None,
            price_type: None,
        }
    }

    #[test]
    fn batch_request_rejects_nil_channel_before_resolution() {
        let req = BatchSaveRequest {
            product_id: Uuid::new_v4(),
            rules: vec![entry(Uuid::new_v4()), entry(Uuid::nil())],
        };
        let err = req.ensure_channels_selected().unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let req = BatchSaveRequest {
            product_id: Uuid::new_v4(),
            rules: vec![entry(Uuid::new_v4())],
        };
        assert!(req.ensure_channels_selected().is_ok());
    }
}
