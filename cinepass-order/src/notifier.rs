use chrono::{DateTime, Utc};
use cinepass_core::notification::NotificationSink;
use cinepass_core::Clock;
use cinepass_shared::models::PaymentSucceededNotice;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

const NOTICE_SOURCE: &str = "checkout-fallback";

/// Sends the payment-succeeded notice at most once per order.
///
/// The backend normally notifies on its own; this is the client-side
/// fallback fired after a confirmed reconciliation. Flags are kept for
/// `retention`; a reconciliation cannot reach the same order again after that.
pub struct IdempotentNotifier {
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    delay: Duration,
    retention: Duration,
    notified: Mutex<HashMap<i64, DateTime<Utc>>>,
}

impl IdempotentNotifier {
    pub fn new(
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        delay: Duration,
        retention: Duration,
    ) -> Self {
        Self {
            sink,
            clock,
            delay,
            retention,
            notified: Mutex::new(HashMap::new()),
        }
    }

    fn notified(&self) -> std::sync::MutexGuard<'_, HashMap<i64, DateTime<Utc>>> {
        self.notified.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Set the per-order flag. Returns false if it was already set.
    fn claim(&self, order_id: i64) -> bool {
        let now = self.clock.now();
        let mut notified = self.notified();
        let before = notified.len();
        notified.retain(|_, at| (now - *at).to_std().unwrap_or_default() < self.retention);
        if notified.len() < before {
            debug!(pruned = before - notified.len(), "Expired notification flags dropped");
        }
        if notified.contains_key(&order_id) {
            return false;
        }
        notified.insert(order_id, now);
        true
    }

    pub fn has_notified(&self, order_id: i64) -> bool {
        self.notified().contains_key(&order_id)
    }

    /// Number of orders currently flagged
    pub fn tracked(&self) -> usize {
        self.notified().len()
    }

    /// Wait out the delay and deliver the notice. Returns whether this call
    /// was the one that fired; a repeat call for the same order does nothing.
    pub async fn notify_once(&self, order_id: i64) -> bool {
        if !self.claim(order_id) {
            debug!(order_id, "Notification already sent");
            return false;
        }

        self.clock.sleep(self.delay).await;

        let notice = PaymentSucceededNotice {
            order_id,
            source: NOTICE_SOURCE.to_string(),
            timestamp: self.clock.now_millis(),
        };
        match self.sink.payment_succeeded(&notice).await {
            Ok(()) => info!(order_id, "Payment success notification sent"),
            Err(e) => warn!(order_id, error = %e, "Payment success notification failed"),
        }
        true
    }
}
