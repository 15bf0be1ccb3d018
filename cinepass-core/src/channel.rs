use async_trait::async_trait;
use cinepass_shared::models::{SeatAction, SeatMessage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::GatewayError;

/// Realtime seat channel shared with other customers' seat maps
#[async_trait]
pub trait SeatChannel: Send + Sync {
    async fn send(&self, message: &SeatMessage) -> Result<(), GatewayError>;
}

/// In-memory channel that records every message it is asked to send.
#[derive(Default)]
pub struct RecordingSeatChannel {
    sent: Mutex<Vec<SeatMessage>>,
    fail_select: AtomicBool,
    fail_deselect: AtomicBool,
}

impl RecordingSeatChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_selects(&self, fail: bool) {
        self.fail_select.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deselects(&self, fail: bool) {
        self.fail_deselect.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SeatMessage> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn count(&self, action: SeatAction) -> usize {
        self.sent().iter().filter(|m| m.action == action).count()
    }
}

#[async_trait]
impl SeatChannel for RecordingSeatChannel {
    async fn send(&self, message: &SeatMessage) -> Result<(), GatewayError> {
        // Attempts are recorded even when the simulated send fails
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).push(message.clone());

        let fail = match message.action {
            SeatAction::Select => self.fail_select.load(Ordering::SeqCst),
            SeatAction::Deselect => self.fail_deselect.load(Ordering::SeqCst),
        };
        if fail {
            return Err(GatewayError::Transport("seat channel closed".to_string()));
        }
        Ok(())
    }
}
