//! Sale channel descriptors.
//!
//! Channels are maintained elsewhere in the dashboard; the pricing engine
//! only reads them. The flags on a channel select the pricing strategy for
//! every rule saved against it.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// How a channel prices age tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingType {
    /// Distinct adult/child/infant prices.
    Separate,
    /// One price broadcast to every tier.
    Single,
}

/// How a channel treats the not-included amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotIncludedType {
    None,
    AmountOnly,
    /// The choice addon is moved out of the commission-bearing base and
    /// carried inside the not-included bucket instead.
    AmountAndChoice,
}

/// Sale channel from the `channels` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Channel {
    pub id: Uuid,
    pub name: String,
    /// Channel grouping, e.g. "ota", "direct", "partner".
    pub category: String,
    pub pricing_type: String,
    /// Default suggestion only; a rule's own commission is authoritative
    /// once set.
    pub commission_percent: Decimal,
    pub commission_base_price_only: bool,
    pub not_included_type: String,
}

impl Channel {
    pub fn pricing_type(&self) -> PricingType {
        match self.pricing_type.as_str() {
            "single" => PricingType::Single,
            _ => PricingType::Separate,
        }
    }

    pub fn not_included_type(&self) -> NotIncludedType {
        match self.not_included_type.as_str() {
            "amount_only" => NotIncludedType::AmountOnly,
            "amount_and_choice" => NotIncludedType::AmountAndChoice,
            _ => NotIncludedType::None,
        }
    }

    /// OTA channels get the reverse-derived sale price treatment.
    pub fn is_ota(&self) -> bool {
        self.category.eq_ignore_ascii_case("ota")
    }
}

/// Normalize a channel display name for grouping: trimmed, lowercased,
/// runs of whitespace collapsed.
pub fn normalize_channel_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn channel(pricing_type: &str, category: &str, nit: &str) -> Channel {
        Channel {
            id: Uuid::new_v4(),
            name: "Test Channel".to_string(),
            category: category.to_string(),
            pricing_type: pricing_type.to_string(),
            commission_percent: dec!(10),
            commission_base_price_only: false,
            not_included_type: nit.to_string(),
        }
    }

    #[test]
    fn pricing_type_defaults_to_separate() {
        assert_eq!(channel("separate", "direct", "none").pricing_type(), PricingType::Separate);
        assert_eq!(channel("single", "direct", "none").pricing_type(), PricingType::Single);
        // Unknown values fall back to separate rather than failing the load
        assert_eq!(channel("", "direct", "none").pricing_type(), PricingType::Separate);
    }

    #[test]
    fn not_included_type_parses() {
        assert_eq!(channel("separate", "ota", "amount_only").not_included_type(), NotIncludedType::AmountOnly);
        assert_eq!(
            channel("separate", "ota", "amount_and_choice").not_included_type(),
            NotIncludedType::AmountAndChoice
        );
        assert_eq!(channel("separate", "ota", "none").not_included_type(), NotIncludedType::None);
    }

    #[test]
    fn ota_detection_is_case_insensitive() {
        assert!(channel("separate", "OTA", "none").is_ota());
        assert!(!channel("separate", "direct", "none").is_ota());
    }

    #[test]
    fn name_normalization() {
        assert_eq!(normalize_channel_name("  Klook   Travel "), "klook travel");
        assert_eq!(normalize_channel_name("NAVER"), "naver");
    }
}
