pub mod models;
pub mod session;
pub mod holds;
pub mod guard;
pub mod orchestrator;
pub mod reconciliation;
pub mod notifier;
pub mod fulfillment;
pub mod checkout;

pub use models::{CheckoutResult, PendingTransaction, SubmitOutcome, SubmitRequest, WalletAuthorization};
pub use session::{Cart, CartStore};
pub use holds::{Hold, HoldManager, HoldState};
pub use guard::{SingleFlightGuard, SubmissionPermit};
pub use orchestrator::{PaymentOrchestrator, PaymentRules, MockOrderGateway};
pub use reconciliation::{confirmation_message, PollPolicy, PollState, ReconciliationOutcome, ReconciliationPoller};
pub use notifier::IdempotentNotifier;
pub use fulfillment::{BookingIdentifierCodec, CodecError, QrPayload, Ticket};
pub use checkout::{CheckoutPorts, CheckoutService, CheckoutSettings};
