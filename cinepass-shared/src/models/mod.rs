pub mod events;

pub use events::{PaymentSucceededNotice, SeatAction, SeatMessage};
