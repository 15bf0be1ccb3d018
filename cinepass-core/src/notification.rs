use async_trait::async_trait;
use cinepass_shared::models::PaymentSucceededNotice;
use std::sync::Mutex;

use crate::GatewayError;

/// Delivers the "payment succeeded" notification and confirmation email
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn payment_succeeded(&self, notice: &PaymentSucceededNotice) -> Result<(), GatewayError>;
}

#[derive(Default)]
pub struct RecordingNotificationSink {
    delivered: Mutex<Vec<i64>>,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<i64> {
        self.delivered.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn payment_succeeded(&self, notice: &PaymentSucceededNotice) -> Result<(), GatewayError> {
        self.delivered.lock().unwrap_or_else(|e| e.into_inner()).push(notice.order_id);
        Ok(())
    }
}
