use serde::{Deserialize, Serialize};

use crate::product::{FoodLine, Priced, TicketLine};
use crate::voucher::{DiscountType, Voucher};
use crate::CatalogError;

/// Subtotal, discount and payable total for a checkout
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub subtotal: i64,
    pub discount: i64,
    pub total: i64,
}

/// Voucher discount calculation. Pure: no clock, no I/O.
pub struct DiscountEngine;

impl DiscountEngine {
    /// Discount a voucher yields on `subtotal`; always within `0..=subtotal`.
    pub fn compute(subtotal: i64, voucher: Option<&Voucher>) -> i64 {
        let voucher = match voucher {
            Some(v) => v,
            None => return 0,
        };
        if subtotal <= 0 || subtotal < voucher.min_order_amount {
            return 0;
        }

        let raw = match voucher.discount_type {
            DiscountType::Percent => {
                let percent = subtotal.saturating_mul(voucher.value) / 100;
                match voucher.max_discount_amount {
                    Some(cap) => percent.min(cap),
                    None => percent,
                }
            }
            DiscountType::Amount => voucher.value.min(subtotal),
        };

        raw.clamp(0, subtotal)
    }

    pub fn total(subtotal: i64, voucher: Option<&Voucher>) -> i64 {
        (subtotal - Self::compute(subtotal, voucher)).max(0)
    }

    /// Price a cart. Line items and the voucher are validated first.
    pub fn quote(
        tickets: &[TicketLine],
        food: &[FoodLine],
        voucher: Option<&Voucher>,
    ) -> Result<Quote, CatalogError> {
        for line in tickets {
            line.validate()?;
        }
        for line in food {
            line.validate()?;
        }
        if let Some(v) = voucher {
            v.validate()?;
        }

        let subtotal = tickets.iter().map(Priced::line_total)
            .chain(food.iter().map(Priced::line_total))
            .fold(0i64, i64::saturating_add);
        if subtotal < 0 {
            return Err(CatalogError::NegativeSubtotal(subtotal));
        }

        let discount = Self::compute(subtotal, voucher);
        Ok(Quote {
            subtotal,
            discount,
            total: (subtotal - discount).max(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn percent(value: i64, cap: Option<i64>, min: i64) -> Voucher {
        Voucher {
            code: "PCT".to_string(),
            discount_type: DiscountType::Percent,
            value,
            min_order_amount: min,
            max_discount_amount: cap,
            valid_from: None,
            valid_until: None,
        }
    }

    fn amount(value: i64, min: i64) -> Voucher {
        Voucher {
            code: "AMT".to_string(),
            discount_type: DiscountType::Amount,
            value,
            min_order_amount: min,
            max_discount_amount: None,
            valid_from: None,
            valid_until: None,
        }
    }

    #[test]
    fn test_percent_voucher_with_cap() {
        let v = percent(20, Some(40000), 100000);

        assert_eq!(DiscountEngine::compute(250000, Some(&v)), 40000);
        assert_eq!(DiscountEngine::total(250000, Some(&v)), 210000);
    }

    #[test]
    fn test_percent_voucher_without_cap() {
        let v = percent(10, None, 0);
        assert_eq!(DiscountEngine::compute(255555, Some(&v)), 25555);
    }

    #[test]
    fn test_below_minimum_gives_no_discount() {
        let v = percent(20, Some(40000), 100000);
        assert_eq!(DiscountEngine::compute(99999, Some(&v)), 0);
        assert_eq!(DiscountEngine::compute(100000, Some(&v)), 20000);
    }

    #[test]
    fn test_amount_voucher_never_exceeds_subtotal() {
        let v = amount(100000, 0);
        assert_eq!(DiscountEngine::compute(60000, Some(&v)), 60000);
        assert_eq!(DiscountEngine::total(60000, Some(&v)), 0);
        assert_eq!(DiscountEngine::compute(250000, Some(&v)), 100000);
    }

    #[test]
    fn test_no_voucher() {
        assert_eq!(DiscountEngine::compute(250000, None), 0);
        assert_eq!(DiscountEngine::total(250000, None), 250000);
    }

    #[test]
    fn test_discount_bounds_hold_across_inputs() {
        let vouchers = [
            percent(0, None, 0),
            percent(100, None, 0),
            percent(35, Some(1), 0),
            percent(50, Some(0), 10),
            amount(0, 0),
            amount(1, 0),
            amount(i64::MAX / 4, 0),
            amount(70000, 50000),
        ];
        let subtotals = [0, 1, 999, 50000, 100000, 250000, 1_000_000_000];

        for v in &vouchers {
            for &subtotal in &subtotals {
                let discount = DiscountEngine::compute(subtotal, Some(v));
                assert!(discount >= 0, "{:?} on {}", v, subtotal);
                assert!(discount <= subtotal, "{:?} on {}", v, subtotal);
                assert_eq!(DiscountEngine::total(subtotal, Some(v)), subtotal - discount);
            }
        }
    }

    #[test]
    fn test_quote_sums_tickets_and_food() {
        let tickets = vec![
            TicketLine { seat_id: 1, seat_label: "A1".to_string(), price: 100000 },
            TicketLine { seat_id: 2, seat_label: "A2".to_string(), price: 100000 },
        ];
        let food = vec![FoodLine {
            food_combo_id: 9,
            name: "Combo 1".to_string(),
            quantity: 1,
            unit_price: 50000,
        }];
        let v = percent(20, Some(40000), 100000);

        let quote = DiscountEngine::quote(&tickets, &food, Some(&v)).unwrap();
        assert_eq!(quote, Quote { subtotal: 250000, discount: 40000, total: 210000 });
    }

    #[test]
    fn test_quote_rejects_malformed_voucher() {
        let v = percent(150, None, 0);
        let result = DiscountEngine::quote(&[], &[], Some(&v));
        assert!(matches!(result, Err(CatalogError::InvalidVoucher { .. })));
    }
}
