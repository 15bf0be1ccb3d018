use chrono::{DateTime, Utc};
use cinepass_catalog::Quote;
use cinepass_core::channel::SeatChannel;
use cinepass_core::notification::NotificationSink;
use cinepass_core::payment::WalletPinVerifier;
use cinepass_core::repository::OrderRepository;
use cinepass_core::{Clock, CoreError, CoreResult, GatewayType, Order};
use cinepass_shared::Masked;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::fulfillment::BookingIdentifierCodec;
use crate::holds::HoldManager;
use crate::models::{CheckoutResult, SubmitOutcome, SubmitRequest, WalletAuthorization};
use crate::notifier::IdempotentNotifier;
use crate::orchestrator::{PaymentOrchestrator, PaymentRules};
use crate::reconciliation::{confirmation_message, PollPolicy, ReconciliationOutcome, ReconciliationPoller};
use crate::session::{Cart, CartStore};

#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub poll: PollPolicy,
    pub notify_delay: Duration,
    pub notify_retention: Duration,
    /// Sessions untouched for this long are evicted by `sweep_idle`
    pub session_idle_ttl: Duration,
    pub rules: PaymentRules,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            poll: PollPolicy::default(),
            notify_delay: Duration::from_secs(2),
            notify_retention: Duration::from_secs(24 * 3600),
            session_idle_ttl: Duration::from_secs(30 * 60),
            rules: PaymentRules::default(),
        }
    }
}

/// External collaborators of the checkout flow
pub struct CheckoutPorts {
    pub orders: Arc<dyn OrderRepository>,
    pub wallet: Arc<dyn WalletPinVerifier>,
    pub notifications: Arc<dyn NotificationSink>,
    pub seats: Arc<dyn SeatChannel>,
    pub clock: Arc<dyn Clock>,
}

/// Per-session checkout flow: holds, cart, payment, return handling, ticket.
pub struct CheckoutService {
    carts: CartStore,
    holds: Arc<HoldManager>,
    orchestrator: PaymentOrchestrator,
    poller: ReconciliationPoller,
    notifier: Arc<IdempotentNotifier>,
    codec: BookingIdentifierCodec,
    pin_verifier: Arc<dyn WalletPinVerifier>,
    clock: Arc<dyn Clock>,
    idle_ttl: Duration,
    activity: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl CheckoutService {
    pub fn new(ports: CheckoutPorts, settings: CheckoutSettings) -> Self {
        let holds = Arc::new(HoldManager::new(ports.seats));
        Self {
            carts: CartStore::new(),
            orchestrator: PaymentOrchestrator::new(
                ports.orders.clone(),
                holds.clone(),
                ports.clock.clone(),
                settings.rules,
            ),
            poller: ReconciliationPoller::new(ports.orders, ports.clock.clone(), settings.poll),
            notifier: Arc::new(IdempotentNotifier::new(
                ports.notifications,
                ports.clock.clone(),
                settings.notify_delay,
                settings.notify_retention,
            )),
            codec: BookingIdentifierCodec::new(ports.clock.clone()),
            pin_verifier: ports.wallet,
            clock: ports.clock,
            idle_ttl: settings.session_idle_ttl,
            activity: Mutex::new(HashMap::new()),
            holds,
        }
    }

    fn activity(&self) -> std::sync::MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.activity.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn touch(&self, session: &str) {
        self.activity().insert(session.to_string(), self.clock.now());
    }

    fn is_idle(&self, last_seen: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        (now - last_seen).to_std().unwrap_or_default() >= self.idle_ttl
    }

    pub fn holds(&self) -> &HoldManager {
        &self.holds
    }

    pub fn orchestrator(&self) -> &PaymentOrchestrator {
        &self.orchestrator
    }

    pub fn notifier(&self) -> &IdempotentNotifier {
        &self.notifier
    }

    pub async fn reserve(&self, session: &str, showtime_id: i64, seat_id: i64) -> CoreResult<()> {
        self.touch(session);
        self.holds.reserve(session, showtime_id, seat_id).await
    }

    pub async fn release(&self, session: &str, showtime_id: i64, seat_id: i64) -> bool {
        self.touch(session);
        self.holds.release(session, showtime_id, seat_id).await
    }

    /// Customer left the checkout page
    pub async fn exit(&self, session: &str) -> usize {
        if self.holds.is_handed_off(session) {
            self.touch(session);
        } else {
            // Abandoned without paying; a redirect keeps the cart for the return
            self.carts.clear(session);
            self.activity().remove(session);
        }
        self.holds.exit(session).await
    }

    /// Replace the session's cart and return its price
    pub fn set_cart(&self, session: &str, cart: Cart) -> CoreResult<Quote> {
        self.touch(session);
        if self.orchestrator.guard().is_locked(session) {
            return Err(CoreError::DuplicateSubmission);
        }
        let quote = cart.quote().map_err(|e| CoreError::ValidationError(e.to_string()))?;
        self.carts.put(session, cart);
        Ok(quote)
    }

    pub fn cart(&self, session: &str) -> Option<Cart> {
        self.carts.get(session)
    }

    pub fn quote(&self, session: &str) -> CoreResult<Quote> {
        self.active_cart(session)?
            .quote()
            .map_err(|e| CoreError::ValidationError(e.to_string()))
    }

    /// Submit payment for the session's cart.
    ///
    /// The session's submission slot is taken before anything else and held
    /// until the create-order answer, so a second call fails with
    /// `DuplicateSubmission` even while the first awaits the PIN check. For
    /// WALLET the PIN is verified with the backend after the local amount and
    /// balance checks have passed.
    pub async fn pay(
        &self,
        session: &str,
        method: GatewayType,
        pin: Option<Masked<String>>,
        balance: Option<i64>,
    ) -> CoreResult<CheckoutResult> {
        self.touch(session);
        let permit = self.orchestrator.acquire(session)?;
        let cart = self.active_cart(session)?;
        self.ensure_seats_held(session, &cart)?;

        let request = match method {
            GatewayType::Wallet => {
                let pin = pin
                    .filter(|p| !p.is_blank())
                    .ok_or_else(|| CoreError::ValidationError("Enter your wallet PIN".to_string()))?;
                let balance = balance.ok_or_else(|| {
                    CoreError::ValidationError("Wallet balance is required to pay by wallet".to_string())
                })?;
                let mut authorization = WalletAuthorization {
                    pin,
                    pin_verified: false,
                    balance,
                };
                self.orchestrator.precheck(&cart, &SubmitRequest::wallet(authorization.clone()))?;

                let valid = self.pin_verifier.verify_pin(&authorization.pin).await?;
                if !valid {
                    return Err(CoreError::ValidationError("Incorrect wallet PIN".to_string()));
                }
                authorization.pin_verified = true;
                SubmitRequest::wallet(authorization)
            }
            redirect => SubmitRequest::redirect(redirect),
        };

        match self.orchestrator.submit_with_permit(permit, &cart, request).await? {
            SubmitOutcome::Redirect { redirect_url, txn_ref } => {
                Ok(CheckoutResult::Redirect { redirect_url, txn_ref })
            }
            SubmitOutcome::Completed(order) => {
                // The backend notifies for synchronous orders itself
                self.finish(session);
                Ok(self.confirmed(order))
            }
        }
    }

    /// Customer came back from a redirect gateway.
    ///
    /// Only the session's own pending transaction can be reconciled. A
    /// foreign or stray reference is rejected and the session is left as it
    /// was, so the real return can still complete.
    pub async fn handle_return(&self, session: &str, txn_ref: &str) -> CoreResult<CheckoutResult> {
        self.touch(session);
        let Some(pending) = self.orchestrator.guard().pending(session) else {
            warn!(session, txn_ref, "Return without a pending transaction");
            return Err(CoreError::ValidationError(
                "No payment is awaiting confirmation for this session".to_string(),
            ));
        };
        if let Some(expected) = pending.txn_ref.as_deref() {
            if expected != txn_ref {
                warn!(session, expected, txn_ref, "Return reference does not match pending transaction");
                return Err(CoreError::ValidationError(
                    "Payment reference does not match this checkout".to_string(),
                ));
            }
        }

        let outcome = self.poller.reconcile(txn_ref).await;
        self.finish(session);

        let message = outcome.user_message();
        Ok(match outcome {
            ReconciliationOutcome::Confirmed { order, .. } => {
                let notifier = self.notifier.clone();
                let order_id = order.order_id;
                tokio::spawn(async move {
                    notifier.notify_once(order_id).await;
                });
                self.confirmed(order)
            }
            ReconciliationOutcome::Indeterminate { txn_ref, .. } => {
                CheckoutResult::Indeterminate { txn_ref, message }
            }
        })
    }

    /// Evict sessions idle for longer than `session_idle_ttl`.
    ///
    /// Seats get a DESELECT unless a hand-off was raised. Sessions with a
    /// submission in flight or a live pending transaction are skipped; a
    /// pending transaction past its TTL is dropped. Returns the number of
    /// sessions evicted.
    pub async fn sweep_idle(&self) -> usize {
        let now = self.clock.now();
        let candidates: Vec<String> = self.activity().iter()
            .filter(|(_, last_seen)| self.is_idle(**last_seen, now))
            .map(|(session, _)| session.clone())
            .collect();

        let mut evicted = 0;
        for session in candidates {
            let guard = self.orchestrator.guard();
            if guard.is_busy(&session, now) {
                continue;
            }
            {
                let mut activity = self.activity();
                // Touched again since the scan
                if !activity.get(&session).is_some_and(|last_seen| self.is_idle(*last_seen, now)) {
                    continue;
                }
                activity.remove(&session);
            }
            if let Some(pending) = guard.complete(&session) {
                warn!(session = %session, txn_ref = ?pending.txn_ref, "Abandoned pending transaction dropped");
            }
            let released = self.holds.exit(&session).await;
            self.carts.clear(&session);
            info!(session = %session, released, "Idle checkout session evicted");
            evicted += 1;
        }
        evicted
    }

    /// Sessions currently tracked for idle eviction
    pub fn active_sessions(&self) -> usize {
        self.activity().len()
    }

    fn active_cart(&self, session: &str) -> CoreResult<Cart> {
        self.carts.get(session)
            .ok_or_else(|| CoreError::ValidationError("No active checkout for this session".to_string()))
    }

    fn ensure_seats_held(&self, session: &str, cart: &Cart) -> CoreResult<()> {
        let Some(showtime_id) = cart.showtime_id.filter(|_| cart.has_tickets()) else {
            return Ok(());
        };
        for ticket in &cart.tickets {
            if !self.holds.is_selected(session, showtime_id, ticket.seat_id) {
                return Err(CoreError::ValidationError(format!(
                    "Seat {} is no longer held, please select it again",
                    ticket.seat_label
                )));
            }
        }
        Ok(())
    }

    /// Terminal state reached: drop all session bookkeeping
    fn finish(&self, session: &str) {
        self.carts.clear(session);
        self.activity().remove(session);
        self.holds.clear(session);
        if let Some(pending) = self.orchestrator.guard().complete(session) {
            info!(session, txn_ref = ?pending.txn_ref, "Pending transaction closed");
        }
    }

    fn confirmed(&self, order: Order) -> CheckoutResult {
        let ticket = match self.codec.issue_ticket(&order) {
            Ok(ticket) => Some(ticket),
            Err(e) => {
                error!(order_id = order.order_id, error = %e, "Could not build ticket QR");
                None
            }
        };
        let message = confirmation_message(order.order_id);
        CheckoutResult::Confirmed { order, ticket, message }
    }
}
