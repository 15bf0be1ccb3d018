use serde::{Deserialize, Serialize};

use crate::CatalogError;

/// Kinds of purchasable lines in a checkout
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductType {
    Ticket,
    Food,
}

/// Anything that contributes to the checkout subtotal
pub trait Priced {
    fn product_type(&self) -> ProductType;

    fn line_total(&self) -> i64;

    fn validate(&self) -> Result<(), CatalogError>;
}

/// One held seat with its price for the showtime
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TicketLine {
    pub seat_id: i64,
    pub seat_label: String,
    pub price: i64,
}

impl Priced for TicketLine {
    fn product_type(&self) -> ProductType {
        ProductType::Ticket
    }

    fn line_total(&self) -> i64 {
        self.price
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if self.price < 0 {
            return Err(CatalogError::InvalidLine(format!("seat {} has a negative price", self.seat_label)));
        }
        Ok(())
    }
}

/// A food or drink combo and its quantity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FoodLine {
    pub food_combo_id: i64,
    pub name: String,
    pub quantity: u32,
    pub unit_price: i64,
}

impl Priced for FoodLine {
    fn product_type(&self) -> ProductType {
        ProductType::Food
    }

    fn line_total(&self) -> i64 {
        self.unit_price.saturating_mul(self.quantity as i64)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if self.quantity == 0 {
            return Err(CatalogError::InvalidLine(format!("combo {} has zero quantity", self.name)));
        }
        if self.unit_price < 0 {
            return Err(CatalogError::InvalidLine(format!("combo {} has a negative price", self.name)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_food_line_total() {
        let line = FoodLine {
            food_combo_id: 1,
            name: "Couple combo".to_string(),
            quantity: 3,
            unit_price: 89000,
        };

        assert_eq!(line.line_total(), 267000);
        assert!(line.validate().is_ok());
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let line = FoodLine {
            food_combo_id: 1,
            name: "Popcorn".to_string(),
            quantity: 0,
            unit_price: 45000,
        };

        assert!(matches!(line.validate(), Err(CatalogError::InvalidLine(_))));
    }
}
