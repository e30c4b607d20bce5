// =============================================================================
// Order Normalization — exchange asset-pair rules applied exactly
// =============================================================================
//
// Volumes floor to `lot_decimals`, limit prices floor to the tick grid and
// then to `pair_decimals`, and `ordermin` / `costmin` are enforced. All
// arithmetic happens in `Decimal` via the value's shortest string form, so
// 0.10099 floors to 0.1009 instead of whatever its binary neighbour would
// give. Every failure is a typed [`OrderRejection`]; callers skip the order
// and carry on.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::errors::OrderRejection;
use crate::exchange::{AssetPairRules, OrderType};

/// A normalized `(volume, price)` pair ready for submission. The price is
/// `None` for market orders.
pub type NormalizedOrder = (f64, Option<f64>);

/// Apply `rules` to an order.
///
/// `current_price` stands in for the limit price in the cost check when the
/// order is a market order.
pub fn normalize_order(
    rules: &AssetPairRules,
    ordertype: OrderType,
    volume: f64,
    price: Option<f64>,
    current_price: Option<f64>,
) -> Result<NormalizedOrder, OrderRejection> {
    // --- Volume: floor to lot decimals, enforce ordermin ---------------------
    let volume_dec = trunc_to_decimals(to_decimal(volume), rules.lot_decimals);
    if volume_dec <= Decimal::ZERO {
        return Err(OrderRejection::VolumeRoundsToZero);
    }

    if let Some(ordermin) = rules.ordermin {
        if volume_dec < to_decimal(ordermin) {
            return Err(OrderRejection::VolumeBelowMin {
                volume: decimal_to_f64(volume_dec),
                ordermin,
            });
        }
    }

    // --- Price: floor to tick grid, then to pair decimals --------------------
    let mut normalized_price: Option<Decimal> = None;
    if ordertype != OrderType::Market {
        if let Some(price) = price {
            let mut price_dec = to_decimal(price);

            if let Some(tick) = rules.tick_size {
                let tick_dec = to_decimal(tick);
                if tick_dec > Decimal::ZERO {
                    price_dec = (price_dec / tick_dec).floor() * tick_dec;
                }
            }

            price_dec = trunc_to_decimals(price_dec, rules.pair_decimals);
            if price_dec <= Decimal::ZERO {
                return Err(OrderRejection::PriceRoundsToZero);
            }
            normalized_price = Some(price_dec);
        }
    }

    // --- Cost: enforce costmin when a price estimate exists ------------------
    if let Some(costmin) = rules.costmin {
        let price_for_cost = normalized_price.or_else(|| current_price.map(to_decimal));
        if let Some(price_for_cost) = price_for_cost {
            let cost = volume_dec * price_for_cost;
            if cost < to_decimal(costmin) {
                return Err(OrderRejection::CostBelowMin {
                    cost: decimal_to_f64(cost),
                    costmin,
                });
            }
        }
    }

    Ok((
        decimal_to_f64(volume_dec),
        normalized_price.map(decimal_to_f64),
    ))
}

/// Convert via the shortest round-trip string so the decimal the user saw is
/// the decimal that gets floored.
fn to_decimal(value: f64) -> Decimal {
    Decimal::from_str(&value.to_string()).unwrap_or_default()
}

fn decimal_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Truncate toward zero at `decimals` fractional digits.
fn trunc_to_decimals(value: Decimal, decimals: u32) -> Decimal {
    value.trunc_with_scale(decimals)
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> AssetPairRules {
        AssetPairRules {
            lot_decimals: 4,
            pair_decimals: 2,
            tick_size: Some(0.05),
            ordermin: Some(0.01),
            costmin: Some(10.0),
        }
    }

    #[test]
    fn floors_volume_and_price() {
        // volume 0.10099 -> 0.1009 (floor at 4 dp)
        // price 100.03   -> 100.00 (floor to 0.05 grid, then 2 dp)
        let (volume, price) =
            normalize_order(&rules(), OrderType::Limit, 0.10099, Some(100.03), None).unwrap();
        assert!((volume - 0.1009).abs() < 1e-12);
        assert_eq!(price, Some(100.00));
    }

    #[test]
    fn market_order_keeps_no_price() {
        let (volume, price) =
            normalize_order(&rules(), OrderType::Market, 0.5, None, Some(100.0)).unwrap();
        assert!((volume - 0.5).abs() < 1e-12);
        assert_eq!(price, None);
    }

    #[test]
    fn volume_below_ordermin_is_rejected() {
        let r = AssetPairRules {
            lot_decimals: 3,
            pair_decimals: 2,
            tick_size: None,
            ordermin: Some(0.100),
            costmin: None,
        };
        // 0.0999 floors to 0.099 < 0.100.
        let err = normalize_order(&r, OrderType::Market, 0.0999, None, None).unwrap_err();
        assert!(matches!(err, OrderRejection::VolumeBelowMin { .. }));
    }

    #[test]
    fn volume_rounding_to_zero_is_rejected() {
        let err = normalize_order(&rules(), OrderType::Market, 0.00001, None, None).unwrap_err();
        assert_eq!(err, OrderRejection::VolumeRoundsToZero);
    }

    #[test]
    fn price_rounding_to_zero_is_rejected() {
        let err =
            normalize_order(&rules(), OrderType::Limit, 0.5, Some(0.001), None).unwrap_err();
        assert_eq!(err, OrderRejection::PriceRoundsToZero);
    }

    #[test]
    fn cost_below_costmin_is_rejected() {
        // 0.05 * 100 = 5 < 10.
        let err =
            normalize_order(&rules(), OrderType::Limit, 0.05, Some(100.0), None).unwrap_err();
        assert!(matches!(err, OrderRejection::CostBelowMin { .. }));
    }

    #[test]
    fn cost_uses_current_price_for_market_orders() {
        // Market order: no limit price, cost checked against current price.
        let err =
            normalize_order(&rules(), OrderType::Market, 0.05, None, Some(100.0)).unwrap_err();
        assert!(matches!(err, OrderRejection::CostBelowMin { .. }));

        // No price estimate at all: costmin cannot be checked, order passes.
        let ok = normalize_order(&rules(), OrderType::Market, 0.05, None, None);
        assert!(ok.is_ok());
    }

    #[test]
    fn normalization_is_idempotent() {
        let (v1, p1) =
            normalize_order(&rules(), OrderType::Limit, 0.10099, Some(100.03), None).unwrap();
        let (v2, p2) = normalize_order(&rules(), OrderType::Limit, v1, p1, None).unwrap();
        assert_eq!(v1, v2);
        assert_eq!(p1, p2);
    }

    #[test]
    fn missing_rule_fields_skip_their_checks() {
        let r = AssetPairRules {
            lot_decimals: 8,
            pair_decimals: 5,
            tick_size: None,
            ordermin: None,
            costmin: None,
        };
        let (volume, price) =
            normalize_order(&r, OrderType::Limit, 0.123456789, Some(1.234567), None).unwrap();
        assert!((volume - 0.12345678).abs() < 1e-15);
        assert_eq!(price, Some(1.23456));
    }
}
