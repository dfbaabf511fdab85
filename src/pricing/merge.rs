//! Choice price override merging.
//!
//! Overrides are merged field by field on presence, never on truthiness: an
//! explicit zero is a real value and survives, an absent field keeps whatever
//! was stored before. Each choice key is merged independently.

use rust_decimal::Decimal;
use serde::Deserialize;

use super::models::{ChoiceOverride, ChoicesPricing};

/// Merge a partial update over a stored override.
///
/// Every field present in `update` replaces the stored value; every field
/// absent from `update` keeps the stored value. Idempotent.
pub fn merge_override(existing: &ChoiceOverride, update: &ChoiceOverride) -> ChoiceOverride {
    let mut merged = ChoiceOverride {
        ota_sale_price: update.ota_sale_price.or(existing.ota_sale_price),
        not_included_price: update.not_included_price.or(existing.not_included_price),
        adult_price: update.adult_price.or(existing.adult_price),
        child_price: update.child_price.or(existing.child_price),
        infant_price: update.infant_price.or(existing.infant_price),
        adult_cost_price: update.adult_cost_price.or(existing.adult_cost_price),
        child_cost_price: update.child_cost_price.or(existing.child_cost_price),
        infant_cost_price: update.infant_cost_price.or(existing.infant_cost_price),
        is_sale_available: update.is_sale_available.or(existing.is_sale_available),
        adult: update.adult.or(existing.adult),
        child: update.child.or(existing.child),
        infant: update.infant.or(existing.infant),
    };
    merged.sync_aliases();
    merged
}

/// Merge updated overrides into a stored map, key by key. Keys only present
/// in the stored map are untouched.
pub fn merge_choices(existing: &ChoicesPricing, updates: &ChoicesPricing) -> ChoicesPricing {
    let mut merged = existing.clone();
    for (key, update) in updates {
        let base = existing.get(key).cloned().unwrap_or_default();
        merged.insert(key.clone(), merge_override(&base, update));
    }
    merged
}

/// Reduce an override to the fields that are persisted long-term.
///
/// Age-tier prices inside `choices_pricing` go stale against the canonical
/// combination prices, so only the operator-entered OTA sale price and
/// not-included amount survive a save.
fn persisted_fields(entry: &ChoiceOverride) -> ChoiceOverride {
    ChoiceOverride {
        ota_sale_price: entry.ota_sale_price,
        not_included_price: entry.not_included_price,
        ..Default::default()
    }
}

/// Build the `choices_pricing` map to persist for a day.
///
/// The stored map is stripped to its persisted fields, then the operator's
/// newly entered values overlay it per choice. A choice the operator did not
/// touch in this save keeps its stored values.
pub fn prepare_for_save(existing: &ChoicesPricing, entered: &ChoicesPricing) -> ChoicesPricing {
    let stripped: ChoicesPricing = existing
        .iter()
        .map(|(key, entry)| (key.clone(), persisted_fields(entry)))
        .collect();
    let entered_stripped: ChoicesPricing = entered
        .iter()
        .map(|(key, entry)| (key.clone(), persisted_fields(entry)))
        .collect();
    merge_choices(&stripped, &entered_stripped)
}

/// Reconcile colliding rows' choice maps, oldest first.
///
/// When racing writers left several rows for one (product, channel, date,
/// variant) identity, their maps are folded together so a later row's fields
/// win per key while keys only an earlier row carried still survive.
pub fn reconcile(maps_oldest_first: &[ChoicesPricing]) -> ChoicesPricing {
    maps_oldest_first
        .iter()
        .fold(ChoicesPricing::new(), |acc, map| merge_choices(&acc, map))
}

/// An update that only sets one numeric field, used by the inline cell edit
/// endpoint.
pub fn single_field_update(field: OverrideField, value: Decimal) -> ChoiceOverride {
    let mut entry = ChoiceOverride::default();
    match field {
        OverrideField::OtaSalePrice => entry.ota_sale_price = Some(value),
        OverrideField::NotIncludedPrice => entry.not_included_price = Some(value),
        OverrideField::AdultPrice => entry.adult_price = Some(value),
        OverrideField::ChildPrice => entry.child_price = Some(value),
        OverrideField::InfantPrice => entry.infant_price = Some(value),
        OverrideField::AdultCostPrice => entry.adult_cost_price = Some(value),
        OverrideField::ChildCostPrice => entry.child_cost_price = Some(value),
        OverrideField::InfantCostPrice => entry.infant_cost_price = Some(value),
    }
    entry.sync_aliases();
    entry
}

/// Editable numeric fields of a choice override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideField {
    OtaSalePrice,
    NotIncludedPrice,
    AdultPrice,
    ChildPrice,
    InfantPrice,
    AdultCostPrice,
    ChildCostPrice,
    InfantCostPrice,
}
