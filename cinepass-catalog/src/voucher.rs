use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CatalogError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    Percent,
    Amount,
}

/// A voucher as fetched for a checkout. Treated as immutable once attached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Voucher {
    pub code: String,
    pub discount_type: DiscountType,
    /// Percentage points for `Percent`, VND for `Amount`
    pub value: i64,
    #[serde(default)]
    pub min_order_amount: i64,
    #[serde(default)]
    pub max_discount_amount: Option<i64>,
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
}

impl Voucher {
    /// Reject vouchers the discount engine is not defined for
    pub fn validate(&self) -> Result<(), CatalogError> {
        let invalid = |reason: &str| CatalogError::InvalidVoucher {
            code: self.code.clone(),
            reason: reason.to_string(),
        };

        if self.code.trim().is_empty() {
            return Err(invalid("missing code"));
        }
        if self.value < 0 {
            return Err(invalid("negative value"));
        }
        if self.discount_type == DiscountType::Percent && self.value > 100 {
            return Err(invalid("percentage above 100"));
        }
        if self.min_order_amount < 0 {
            return Err(invalid("negative minimum order amount"));
        }
        if matches!(self.max_discount_amount, Some(cap) if cap < 0) {
            return Err(invalid("negative discount cap"));
        }
        if let (Some(from), Some(until)) = (self.valid_from, self.valid_until) {
            if until < from {
                return Err(invalid("validity window ends before it starts"));
            }
        }
        Ok(())
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        let started = self.valid_from.map_or(true, |from| now >= from);
        let not_ended = self.valid_until.map_or(true, |until| now <= until);
        started && not_ended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn voucher(discount_type: DiscountType, value: i64) -> Voucher {
        Voucher {
            code: "SUMMER20".to_string(),
            discount_type,
            value,
            min_order_amount: 0,
            max_discount_amount: None,
            valid_from: None,
            valid_until: None,
        }
    }

    #[test]
    fn test_validity_window() {
        let now = Utc::now();
        let mut v = voucher(DiscountType::Percent, 20);
        v.valid_from = Some(now - Duration::days(1));
        v.valid_until = Some(now + Duration::days(1));

        assert!(v.is_active_at(now));
        assert!(!v.is_active_at(now + Duration::days(2)));
        assert!(!v.is_active_at(now - Duration::days(2)));
    }

    #[test]
    fn test_malformed_vouchers_rejected() {
        assert!(voucher(DiscountType::Percent, 120).validate().is_err());
        assert!(voucher(DiscountType::Amount, -1).validate().is_err());

        let mut blank = voucher(DiscountType::Amount, 10000);
        blank.code = "  ".to_string();
        assert!(blank.validate().is_err());

        assert!(voucher(DiscountType::Amount, 150000).validate().is_ok());
    }
}
