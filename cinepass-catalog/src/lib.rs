pub mod product;
pub mod pricing;
pub mod voucher;

pub use product::{FoodLine, Priced, ProductType, TicketLine};
pub use pricing::{DiscountEngine, Quote};
pub use voucher::{DiscountType, Voucher};

/// Errors raised at the catalog boundary, before values reach the discount engine
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Invalid voucher {code}: {reason}")]
    InvalidVoucher { code: String, reason: String },

    #[error("Subtotal cannot be negative: {0}")]
    NegativeSubtotal(i64),

    #[error("Invalid line item: {0}")]
    InvalidLine(String),
}
