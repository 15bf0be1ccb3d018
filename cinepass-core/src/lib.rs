pub mod channel;
pub mod clock;
pub mod notification;
pub mod order;
pub mod payment;
pub mod repository;

pub use clock::{Clock, MockClock, SystemClock};
pub use order::{Order, OrderItem, OrderItemType, OrderStatus, ShowtimeInfo};
pub use payment::GatewayType;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("A payment is already being submitted for this checkout")]
    DuplicateSubmission,
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),
    #[error("Seat channel unavailable: {0}")]
    ChannelUnavailable(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl CoreError {
    /// Whether the customer may simply try the same action again
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::GatewayUnavailable(_) | CoreError::ChannelUnavailable(_))
    }

    /// Customer-facing text; each variant maps to a distinct message.
    pub fn user_message(&self) -> String {
        match self {
            CoreError::ValidationError(msg) => msg.clone(),
            CoreError::DuplicateSubmission => {
                "Your payment is already being processed. Please wait.".to_string()
            }
            CoreError::GatewayUnavailable(_) => {
                "The payment service could not be reached. You have not been charged, please try again.".to_string()
            }
            CoreError::ChannelUnavailable(_) => {
                "The seat could not be reserved right now. Please try again.".to_string()
            }
            CoreError::InternalError(_) => "Unexpected error while processing checkout.".to_string(),
        }
    }
}

/// Transport-level failure reported by an adapter (HTTP backend, Redis, ...)
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Transport failure: {0}")]
    Transport(String),
    #[error("Unexpected response status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
    #[error("Malformed response: {0}")]
    Decode(String),
}

impl From<GatewayError> for CoreError {
    fn from(err: GatewayError) -> Self {
        CoreError::GatewayUnavailable(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
