//! Core pricing calculation functions.
//!
//! Pure functions for pricing math - no database access. The full chain per
//! age tier is base -> markup -> maximum sale price -> coupon discount ->
//! net, plus the reverse-derived OTA-facing sale price.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::models::{Channel, NotIncludedType, PricingType};

/// Legacy platforms whose coupon/commission applies to the adult tier only.
/// Matched by channel name/id substring until a proper channel flag exists.
const ADULT_ONLY_COMMISSION_PLATFORMS: &[&str] = &["klook", "kkday", "trip.com"];

/// Fixed reference discount OTA retail pages are assumed to display.
fn reference_discount_factor() -> Decimal {
    dec!(0.8)
}

/// Round to specified decimal places using banker's rounding.
///
/// Midpoint values round to the nearest even digit, which keeps cumulative
/// rounding bias out of day-by-day price lists.
pub fn round_money(amount: Decimal, places: u32) -> Decimal {
    amount.round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven)
}

/// `1 - percent/100`, the multiplier for a percentage deduction.
fn deduction_factor(percent: Decimal) -> Decimal {
    Decimal::ONE - percent / dec!(100)
}

/// Apply a percentage deduction.
fn deduct(amount: Decimal, percent: Decimal) -> Decimal {
    amount * deduction_factor(percent)
}

/// Reverse a percentage deduction: `amount / (1 - percent/100)`.
///
/// A rate at or above 100% would divide by zero or flip the sign; those
/// fall back to the un-reversed amount instead of erroring.
pub fn reverse_deduction(amount: Decimal, percent: Decimal) -> Decimal {
    let denom = deduction_factor(percent);
    if denom <= Decimal::ZERO {
        amount
    } else {
        amount / denom
    }
}

/// Age tiers a separate-price channel distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeTier {
    Adult,
    Child,
    Infant,
}

/// Whether tiers are priced separately or one price covers them all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierMode {
    Separate,
    Single,
}

/// How a channel's commission and sale price interact, resolved once per
/// channel instead of re-branching on raw flags at every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStrategy {
    /// Non-OTA: forward coupon then commission deduction.
    Standard,
    /// OTA with commission on the base price only; the choice addon stays
    /// outside the commission arithmetic.
    OtaBaseOnly {
        /// `not_included_type = amount_and_choice`: the addon is carried in
        /// the not-included bucket, not re-added to net.
        amount_and_choice: bool,
    },
    /// OTA with commission on the full price: the sale price is derived in
    /// reverse from the maximum price, and net re-applies the deductions.
    OtaReverse,
}

/// Pricing strategy for one (channel, product) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingStrategy {
    pub tier_mode: TierMode,
    pub channel: ChannelStrategy,
    /// Legacy exception: coupon/commission multipliers skip child/infant.
    pub adult_only_commission: bool,
}

impl PricingStrategy {
    pub fn for_channel(channel: &Channel) -> Self {
        let tier_mode = match channel.pricing_type() {
            PricingType::Separate => TierMode::Separate,
            PricingType::Single => TierMode::Single,
        };
        // Base-only commission is an OTA shape; on a non-OTA channel the
        // flag has no defined meaning and the standard chain applies.
        let channel_strategy = if !channel.is_ota() {
            ChannelStrategy::Standard
        } else if channel.commission_base_price_only {
            ChannelStrategy::OtaBaseOnly {
                amount_and_choice: channel.not_included_type()
                    == NotIncludedType::AmountAndChoice,
            }
        } else {
            ChannelStrategy::OtaReverse
        };
        PricingStrategy {
            tier_mode,
            channel: channel_strategy,
            adult_only_commission: adult_only_commission_channel(channel),
        }
    }
}

/// Detect the legacy platforms whose coupon/commission is adult-tier only.
pub fn adult_only_commission_channel(channel: &Channel) -> bool {
    let name = crate::models::channel::normalize_channel_name(&channel.name);
    let id = channel.id.to_string();
    ADULT_ONLY_COMMISSION_PLATFORMS
        .iter()
        .any(|p| name.contains(p) || id.contains(p))
}

/// Inputs for one tier's calculation.
#[derive(Debug, Clone, Copy)]
pub struct PriceInput {
    /// Resolved tier price (canonical base + adjustment).
    pub tier_price: Decimal,
    /// Intrinsic addon price of the selected choice for this tier; zero when
    /// no choice is selected.
    pub choice_addon: Decimal,
    pub markup_amount: Decimal,
    pub markup_percent: Decimal,
    pub commission_percent: Decimal,
    pub coupon_percent: Decimal,
    /// Flat amount exempt from every percentage multiplier.
    pub not_included_amount: Decimal,
}

/// The calculated quantities for one tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceBreakdown {
    pub base: Decimal,
    pub markup: Decimal,
    /// Maximum sale price.
    pub max: Decimal,
    pub discount: Decimal,
    /// What the operator actually receives.
    pub net: Decimal,
    /// Retail price shown on the channel's page.
    pub ota_sale: Decimal,
}

/// Compute the full breakdown for one age tier.
pub fn compute_breakdown(
    strategy: &PricingStrategy,
    tier: AgeTier,
    input: &PriceInput,
) -> PriceBreakdown {
    // Under base-only commission the choice addon is excluded from the base
    // and tracked for re-addition after markup.
    let (base, excluded_addon) = match strategy.channel {
        ChannelStrategy::OtaBaseOnly { .. } => (input.tier_price, input.choice_addon),
        _ => (input.tier_price + input.choice_addon, Decimal::ZERO),
    };

    let markup = base + input.markup_amount + base * input.markup_percent / dec!(100);
    let max = markup + excluded_addon;

    // Child/infant tiers skip the percentage deductions entirely on the
    // legacy adult-only platforms.
    let skip_tier_rates = strategy.adult_only_commission && tier != AgeTier::Adult;

    let discount = if skip_tier_rates {
        max
    } else {
        deduct(max, input.coupon_percent)
    };

    let ota_sale = match strategy.channel {
        ChannelStrategy::OtaBaseOnly { amount_and_choice } => {
            let price_for_commission = if amount_and_choice {
                markup
            } else {
                markup + excluded_addon
            };
            reverse_deduction(price_for_commission, input.commission_percent)
        }
        _ => {
            // The retail page shows an already-discounted price; derive the
            // full price that produces it after the coupon and commission
            // lines.
            let reference = max * reference_discount_factor();
            let before_commission = reverse_deduction(reference, input.coupon_percent);
            reverse_deduction(before_commission, input.commission_percent)
        }
    };

    let net = match strategy.channel {
        ChannelStrategy::Standard => {
            if skip_tier_rates {
                discount + input.not_included_amount
            } else {
                deduct(discount, input.commission_percent) + input.not_included_amount
            }
        }
        ChannelStrategy::OtaBaseOnly { amount_and_choice: true } => {
            // The addon lives inside the not-included bucket here.
            deduct(base, input.commission_percent) + input.not_included_amount
        }
        ChannelStrategy::OtaBaseOnly { amount_and_choice: false } => {
            deduct(base, input.commission_percent) + excluded_addon + input.not_included_amount
        }
        ChannelStrategy::OtaReverse => {
            deduct(deduct(ota_sale, input.coupon_percent), input.commission_percent)
                + input.not_included_amount
        }
    };

    PriceBreakdown {
        base,
        markup,
        max,
        discount,
        net,
        ota_sale,
    }
}

/// Tier prices for a calculation: separate values, or one broadcast.
#[derive(Debug, Clone, Copy)]
pub struct PriceBasis {
    pub adult: Decimal,
    pub child: Decimal,
    pub infant: Decimal,
}

impl PriceBasis {
    pub fn single(price: Decimal) -> Self {
        PriceBasis {
            adult: price,
            child: price,
            infant: price,
        }
    }
}

/// Breakdown for every tier. Under single-price mode all three are equal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierBreakdowns {
    pub adult: PriceBreakdown,
    pub child: PriceBreakdown,
    pub infant: PriceBreakdown,
}

/// Shared per-day parameters for [`compute_for_tiers`].
#[derive(Debug, Clone, Copy)]
pub struct DayParameters {
    pub markup_amount: Decimal,
    pub markup_percent: Decimal,
    pub commission_percent: Decimal,
    pub coupon_percent: Decimal,
    pub not_included_amount: Decimal,
}

/// Compute breakdowns for all tiers of one day/choice.
///
/// `addons` carries the selected choice's intrinsic per-tier prices, or all
/// zeros for the `no_choice` case.
pub fn compute_for_tiers(
    strategy: &PricingStrategy,
    prices: &PriceBasis,
    addons: &PriceBasis,
    params: &DayParameters,
) -> TierBreakdowns {
    let input = |tier_price, choice_addon| PriceInput {
        tier_price,
        choice_addon,
        markup_amount: params.markup_amount,
        markup_percent: params.markup_percent,
        commission_percent: params.commission_percent,
        coupon_percent: params.coupon_percent,
        not_included_amount: params.not_included_amount,
    };

    match strategy.tier_mode {
        TierMode::Separate => TierBreakdowns {
            adult: compute_breakdown(strategy, AgeTier::Adult, &input(prices.adult, addons.adult)),
            child: compute_breakdown(strategy, AgeTier::Child, &input(prices.child, addons.child)),
            infant: compute_breakdown(
                strategy,
                AgeTier::Infant,
                &input(prices.infant, addons.infant),
            ),
        },
        TierMode::Single => {
            let single =
                compute_breakdown(strategy, AgeTier::Adult, &input(prices.adult, addons.adult));
            TierBreakdowns {
                adult: single,
                child: single,
                infant: single,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn strategy(channel: ChannelStrategy) -> PricingStrategy {
        PricingStrategy {
            tier_mode: TierMode::Separate,
            channel,
            adult_only_commission: false,
        }
    }

    fn input(tier_price: Decimal) -> PriceInput {
        PriceInput {
            tier_price,
            choice_addon: Decimal::ZERO,
            markup_amount: Decimal::ZERO,
            markup_percent: Decimal::ZERO,
            commission_percent: Decimal::ZERO,
            coupon_percent: Decimal::ZERO,
            not_included_amount: Decimal::ZERO,
        }
    }

    fn assert_close(actual: Decimal, expected: Decimal) {
        assert!(
            (actual - expected).abs() < dec!(0.0001),
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn markup_applies_amount_then_percent() {
        let b = compute_breakdown(
            &strategy(ChannelStrategy::Standard),
            AgeTier::Adult,
            &PriceInput {
                markup_amount: dec!(10),
                markup_percent: dec!(5),
                ..input(dec!(100))
            },
        );
        assert_eq!(b.base, dec!(100));
        assert_eq!(b.markup, dec!(115)); // 100 + 10 + 100*5%
        assert_eq!(b.max, dec!(115));
    }

    #[test]
    fn standard_net_applies_coupon_then_commission() {
        let b = compute_breakdown(
            &strategy(ChannelStrategy::Standard),
            AgeTier::Adult,
            &PriceInput {
                coupon_percent: dec!(10),
                commission_percent: dec!(20),
                ..input(dec!(100))
            },
        );
        assert_eq!(b.discount, dec!(90));
        assert_eq!(b.net, dec!(72)); // 90 * 0.8
    }

    #[test]
    fn ota_reverse_example_scenario() {
        // base $100, no markup, commission 20%, coupon 10%
        let b = compute_breakdown(
            &strategy(ChannelStrategy::OtaReverse),
            AgeTier::Adult,
            &PriceInput {
                coupon_percent: dec!(10),
                commission_percent: dec!(20),
                ..input(dec!(100))
            },
        );
        assert_eq!(b.max, dec!(100));
        // (100 * 0.8) / 0.9 / 0.8 = 111.11...
        assert_close(b.ota_sale, dec!(111.1111));
        // net reduces back to max * 0.8 exactly
        assert_close(b.net, dec!(80));
    }

    #[test]
    fn ota_reverse_round_trip_property() {
        let cases = [
            (dec!(100), dec!(10), dec!(20)),
            (dec!(55.5), dec!(0), dec!(15)),
            (dec!(1234.56), dec!(33), dec!(7.5)),
            (dec!(80), dec!(99), dec!(99)),
        ];
        for (max, coupon, commission) in cases {
            let b = compute_breakdown(
                &strategy(ChannelStrategy::OtaReverse),
                AgeTier::Adult,
                &PriceInput {
                    coupon_percent: coupon,
                    commission_percent: commission,
                    ..input(max)
                },
            );
            // Forward chain over the derived sale price reproduces the
            // 20%-discounted maximum.
            let forward = deduct(deduct(b.ota_sale, coupon), commission);
            assert_close(forward, max * dec!(0.8));
        }
    }

    #[test]
    fn base_only_excludes_addon_until_max() {
        let b = compute_breakdown(
            &strategy(ChannelStrategy::OtaBaseOnly {
                amount_and_choice: false,
            }),
            AgeTier::Adult,
            &PriceInput {
                choice_addon: dec!(20),
                commission_percent: dec!(10),
                ..input(dec!(50))
            },
        );
        assert_eq!(b.base, dec!(50)); // addon excluded
        assert_eq!(b.markup, dec!(50));
        assert_eq!(b.max, dec!(70)); // addon re-added
        // net = 50 * 0.9 + 20 (addon flat)
        assert_eq!(b.net, dec!(65));
        // sale price reverses commission over the addon-inclusive price
        assert_close(b.ota_sale, dec!(70) / dec!(0.9));
    }

    #[test]
    fn base_only_amount_and_choice_example_scenario() {
        // base $50, addon $20, not-included $5, commission 10%
        let b = compute_breakdown(
            &strategy(ChannelStrategy::OtaBaseOnly {
                amount_and_choice: true,
            }),
            AgeTier::Adult,
            &PriceInput {
                choice_addon: dec!(20),
                commission_percent: dec!(10),
                not_included_amount: dec!(5),
                ..input(dec!(50))
            },
        );
        // addon excluded from net, carried via the not-included bucket
        assert_eq!(b.net, dec!(50)); // 50 * 0.9 + 5
        // sale price reverses commission over markup only, addon excluded
        assert_close(b.ota_sale, dec!(50) / dec!(0.9));
    }

    #[test]
    fn not_included_amount_never_multiplied() {
        let b = compute_breakdown(
            &strategy(ChannelStrategy::Standard),
            AgeTier::Adult,
            &PriceInput {
                coupon_percent: dec!(50),
                commission_percent: dec!(50),
                not_included_amount: dec!(7),
                ..input(dec!(100))
            },
        );
        // (100 * 0.5 * 0.5) + 7, the 7 untouched by either rate
        assert_eq!(b.net, dec!(32));
    }

    #[test]
    fn reverse_deduction_guards_hundred_percent() {
        assert_eq!(reverse_deduction(dec!(80), dec!(100)), dec!(80));
        assert_eq!(reverse_deduction(dec!(80), dec!(150)), dec!(80));
        assert_eq!(reverse_deduction(dec!(80), dec!(20)), dec!(100));
    }

    #[test]
    fn adult_only_platform_skips_rates_for_child_and_infant() {
        let s = PricingStrategy {
            tier_mode: TierMode::Separate,
            channel: ChannelStrategy::Standard,
            adult_only_commission: true,
        };
        let params = PriceInput {
            coupon_percent: dec!(10),
            commission_percent: dec!(20),
            ..input(dec!(100))
        };

        let adult = compute_breakdown(&s, AgeTier::Adult, &params);
        let child = compute_breakdown(&s, AgeTier::Child, &params);

        assert_eq!(adult.discount, dec!(90));
        assert_eq!(adult.net, dec!(72));
        // Child skips both multipliers entirely
        assert_eq!(child.discount, dec!(100));
        assert_eq!(child.net, dec!(100));
    }

    #[test]
    fn single_mode_broadcasts_one_price() {
        let s = PricingStrategy {
            tier_mode: TierMode::Single,
            channel: ChannelStrategy::Standard,
            adult_only_commission: false,
        };
        let breakdowns = compute_for_tiers(
            &s,
            &PriceBasis::single(dec!(60)),
            &PriceBasis::single(Decimal::ZERO),
            &DayParameters {
                markup_amount: Decimal::ZERO,
                markup_percent: Decimal::ZERO,
                commission_percent: dec!(10),
                coupon_percent: Decimal::ZERO,
                not_included_amount: Decimal::ZERO,
            },
        );
        assert_eq!(breakdowns.adult, breakdowns.child);
        assert_eq!(breakdowns.child, breakdowns.infant);
        assert_eq!(breakdowns.adult.net, dec!(54));
    }

    #[test]
    fn legacy_platform_detection_by_name() {
        let mut channel = Channel {
            id: Uuid::new_v4(),
            name: "Klook Korea".to_string(),
            category: "ota".to_string(),
            pricing_type: "separate".to_string(),
            commission_percent: dec!(20),
            commission_base_price_only: false,
            not_included_type: "none".to_string(),
        };
        assert!(adult_only_commission_channel(&channel));

        channel.name = "Naver Booking".to_string();
        assert!(!adult_only_commission_channel(&channel));
    }

    #[test]
    fn strategy_selection_from_channel_flags() {
        let mut channel = Channel {
            id: Uuid::new_v4(),
            name: "Agoda".to_string(),
            category: "ota".to_string(),
            pricing_type: "separate".to_string(),
            commission_percent: dec!(20),
            commission_base_price_only: false,
            not_included_type: "none".to_string(),
        };
        assert_eq!(
            PricingStrategy::for_channel(&channel).channel,
            ChannelStrategy::OtaReverse
        );

        channel.commission_base_price_only = true;
        channel.not_included_type = "amount_and_choice".to_string();
        assert_eq!(
            PricingStrategy::for_channel(&channel).channel,
            ChannelStrategy::OtaBaseOnly {
                amount_and_choice: true
            }
        );

        channel.commission_base_price_only = false;
        channel.category = "direct".to_string();
        channel.pricing_type = "single".to_string();
        let s = PricingStrategy::for_channel(&channel);
        assert_eq!(s.channel, ChannelStrategy::Standard);
        assert_eq!(s.tier_mode, TierMode::Single);
    }

    #[test]
    fn base_only_flag_is_ignored_on_non_ota_channels() {
        let channel = Channel {
            id: Uuid::new_v4(),
            name: "Homepage".to_string(),
            category: "direct".to_string(),
            pricing_type: "separate".to_string(),
            commission_percent: dec!(5),
            commission_base_price_only: true,
            not_included_type: "amount_and_choice".to_string(),
        };
        assert_eq!(
            PricingStrategy::for_channel(&channel).channel,
            ChannelStrategy::Standard
        );
    }

    #[test]
    fn round_money_bankers_rounding() {
        assert_eq!(round_money(dec!(2.5), 0), dec!(2));
        assert_eq!(round_money(dec!(3.5), 0), dec!(4));
        assert_eq!(round_money(dec!(111.115), 2), dec!(111.12));
        assert_eq!(round_money(dec!(1.234), 2), dec!(1.23));
    }
}
