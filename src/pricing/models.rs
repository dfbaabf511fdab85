//! Database models for pricing rules.
//!
//! `dynamic_pricing` holds one row per product x channel x date x variant.
//! The `choices_pricing` column is a JSON object keyed by choice-combination
//! id (or the `no_choice` sentinel); older writers stored it as a serialized
//! string, so it is parsed defensively.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Sentinel choice key for products without any choice combinations.
pub const NO_CHOICE_KEY: &str = "no_choice";

/// Pricing rule row from `dynamic_pricing`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PricingRule {
    pub id: Uuid,
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
    pub choices_pricing: Option<serde_json::Value>,
    pub inclusions_ko: Option<String>,
    pub inclusions_en: Option<String>,
    pub exclusions_ko: Option<String>,
    pub exclusions_en: Option<String>,
    /// "base" for seeded rows, "dynamic" for operator-entered rows. Both may
    /// exist for the same day; statistics deduplicate across them.
    pub price_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-choice price overrides, keyed by combination id or [`NO_CHOICE_KEY`].
pub type ChoicesPricing = BTreeMap<String, ChoiceOverride>;

/// Operator-entered overrides for one choice combination on one day.
///
/// Every field is optional and only serialized when present: `Some(0)` is a
/// real entered value and round-trips as `0`, while `None` means the operator
/// never touched the field. The unprefixed `adult`/`child`/`infant` fields
/// are legacy aliases older rows used; they are kept in sync with the
/// `_price` forms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ota_sale_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_included_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adult_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infant_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adult_cost_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_cost_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infant_cost_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_sale_available: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adult: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infant: Option<Decimal>,
}

impl ChoiceOverride {
    /// Reconcile the legacy unprefixed aliases with their canonical `_price`
    /// counterparts. A canonical value wins; an alias only fills a canonical
    /// field that was never set.
    pub fn sync_aliases(&mut self) {
        self.adult_price = self.adult_price.or(self.adult);
        self.child_price = self.child_price.or(self.child);
        self.infant_price = self.infant_price.or(self.infant);
        self.adult = self.adult_price;
        self.child = self.child_price;
        self.infant = self.infant_price;
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        *self == ChoiceOverride::default()
    }
}

impl PricingRule {
    /// Decode `choices_pricing` tolerantly.
    ///
    /// The column may hold a JSON object, a JSON string wrapping one, or
    /// garbage from an interrupted writer. Malformed data degrades to an
    /// empty map with a warning so an edit session can still open the day.
    pub fn parse_choices(&self) -> ChoicesPricing {
        let Some(value) = &self.choices_pricing else {
            return ChoicesPricing::new();
        };
        match decode_choices(value) {
            Some(mut map) => {
                for entry in map.values_mut() {
                    entry.sync_aliases();
                }
                map
            }
            None => {
                tracing::warn!(
                    rule_id = %self.id,
                    date = %self.date,
                    "malformed choices_pricing, treating as empty"
                );
                ChoicesPricing::new()
            }
        }
    }
}

fn decode_choices(value: &serde_json::Value) -> Option<ChoicesPricing> {
    match value {
        serde_json::Value::Null => Some(ChoicesPricing::new()),
        serde_json::Value::String(raw) => {
            if raw.trim().is_empty() {
                return Some(ChoicesPricing::new());
            }
            serde_json::from_str(raw).ok()
        }
        serde_json::Value::Object(_) => serde_json::from_value(value.clone()).ok(),
        _ => None,
    }
}

/// A value that is either set on the rule itself or inherited from the
/// channel's default. The rule's own value is authoritative once present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inheritable<T> {
    Explicit(T),
    Inherited(T),
}

impl<T: Copy> Inheritable<T> {
    pub fn resolve(explicit: Option<T>, default: T) -> Self {
        match explicit {
            Some(v) => Inheritable::Explicit(v),
            None => Inheritable::Inherited(default),
        }
    }

    pub fn value(&self) -> T {
        match self {
            Inheritable::Explicit(v) | Inheritable::Inherited(v) => *v,
        }
    }

    pub fn is_explicit(&self) -> bool {
        matches!(self, Inheritable::Explicit(_))
    }
}
