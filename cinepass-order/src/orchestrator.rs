use async_trait::async_trait;
use chrono::NaiveDateTime;
use cinepass_catalog::Quote;
use cinepass_core::payment::{
    CreateOrderRequest, CreateOrderResponse, FoodComboRequest, RedirectResponse, WalletPinVerifier,
};
use cinepass_core::repository::OrderRepository;
use cinepass_core::{
    Clock, CoreError, CoreResult, GatewayError, GatewayType, Order, OrderStatus,
};
use cinepass_shared::Masked;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use crate::guard::{SingleFlightGuard, SubmissionPermit};
use crate::holds::HoldManager;
use crate::models::{PendingTransaction, SubmitOutcome, SubmitRequest};
use crate::session::Cart;

/// Amount limits and lock lifetime for payment submission
#[derive(Debug, Clone)]
pub struct PaymentRules {
    pub min_amount: i64,
    pub max_amount: i64,
    pub pending_ttl: Duration,
}

impl Default for PaymentRules {
    fn default() -> Self {
        Self {
            min_amount: 1_000,
            max_amount: 50_000_000,
            pending_ttl: Duration::from_secs(15 * 60),
        }
    }
}

/// Builds gateway requests and submits them, at most one at a time per session.
pub struct PaymentOrchestrator {
    repository: Arc<dyn OrderRepository>,
    holds: Arc<HoldManager>,
    clock: Arc<dyn Clock>,
    guard: SingleFlightGuard,
    rules: PaymentRules,
}

impl PaymentOrchestrator {
    pub fn new(
        repository: Arc<dyn OrderRepository>,
        holds: Arc<HoldManager>,
        clock: Arc<dyn Clock>,
        rules: PaymentRules,
    ) -> Self {
        Self {
            repository,
            holds,
            clock,
            guard: SingleFlightGuard::new(rules.pending_ttl),
            rules,
        }
    }

    pub fn guard(&self) -> &SingleFlightGuard {
        &self.guard
    }

    /// Take the session's submission slot. Callers that do their own network
    /// work before `submit_with_permit` (wallet PIN check) must hold it first.
    pub fn acquire(&self, session: &str) -> CoreResult<SubmissionPermit> {
        self.guard.try_acquire(session, self.clock.now())
    }

    /// Submit the session's cart to the selected gateway.
    pub async fn submit(
        &self,
        session: &str,
        cart: &Cart,
        request: SubmitRequest,
    ) -> CoreResult<SubmitOutcome> {
        // 1. Single-flight: rejected before any validation or network call
        let permit = self.acquire(session)?;
        self.submit_with_permit(permit, cart, request).await
    }

    /// Same as `submit`, for a caller already holding the session's slot
    pub async fn submit_with_permit(
        &self,
        permit: SubmissionPermit,
        cart: &Cart,
        request: SubmitRequest,
    ) -> CoreResult<SubmitOutcome> {
        let owner = permit.session().to_owned();
        let session = owner.as_str();

        // 2. Validate and price (dropping the permit on error frees the slot)
        let quote = self.precheck(cart, &request)?;
        if let Some(wallet) = &request.wallet {
            if !wallet.pin_verified || wallet.pin.is_blank() {
                return Err(CoreError::ValidationError("Wallet PIN has not been verified".to_string()));
            }
        }
        let payload = build_order_request(cart, quote.total, &request)?;

        // 3. Create the order / payment with the backend
        info!(session, method = %request.method, amount = quote.total, "Submitting payment");
        let response = self.repository.create_order(&payload).await.map_err(|e| {
            warn!(session, method = %request.method, error = %e, "Create-order call failed");
            CoreError::from(e)
        })?;

        // 4. Interpret the response for the chosen rail
        match response {
            CreateOrderResponse::Redirect(RedirectResponse { redirect_url, txn_ref }) => {
                if !request.method.is_redirect() {
                    error!(session, "Wallet payment answered with a redirect");
                    return Err(CoreError::InternalError("unexpected redirect for wallet payment".to_string()));
                }
                if redirect_url.trim().is_empty() {
                    return Err(CoreError::GatewayUnavailable("gateway returned no redirect URL".to_string()));
                }

                // The gateway owns the next step: seats must survive the page exit
                self.holds.raise_hand_off(session);
                permit.into_pending(PendingTransaction {
                    txn_ref: txn_ref.clone(),
                    gateway_type: request.method,
                    amount: quote.total,
                    created_at: self.clock.now(),
                });
                info!(session, txn_ref = ?txn_ref, "Redirecting to gateway");
                Ok(SubmitOutcome::Redirect { redirect_url, txn_ref })
            }
            CreateOrderResponse::Created(order) => {
                info!(session, order_id = order.order_id, "Order created synchronously");
                Ok(SubmitOutcome::Completed(order))
            }
        }
    }

    /// Validation performed before any network call, including the wallet
    /// balance check. PIN verification is not checked here so callers can
    /// fail fast ahead of the PIN round-trip.
    pub fn precheck(&self, cart: &Cart, request: &SubmitRequest) -> CoreResult<Quote> {
        if cart.is_empty() {
            return Err(CoreError::ValidationError("Your cart is empty".to_string()));
        }
        if !cart.has_tickets() && cart.cinema_complex_id.is_none() {
            return Err(CoreError::ValidationError("Select a cinema for your food order".to_string()));
        }
        if let Some(voucher) = &cart.voucher {
            if !voucher.is_active_at(self.clock.now()) {
                return Err(CoreError::ValidationError(format!("Voucher {} is not valid at this time", voucher.code)));
            }
        }

        let quote = cart.quote().map_err(|e| CoreError::ValidationError(e.to_string()))?;

        if quote.total < self.rules.min_amount {
            return Err(CoreError::ValidationError(format!(
                "Minimum payment amount is {} VND", self.rules.min_amount
            )));
        }
        if quote.total > self.rules.max_amount {
            return Err(CoreError::ValidationError(format!(
                "Maximum payment amount is {} VND", self.rules.max_amount
            )));
        }

        if request.method == GatewayType::Wallet {
            let wallet = request.wallet.as_ref().ok_or_else(|| {
                CoreError::ValidationError("Wallet PIN verification is required".to_string())
            })?;
            if wallet.balance < quote.total {
                return Err(CoreError::ValidationError(format!(
                    "Insufficient wallet balance: {} VND available, {} VND required",
                    wallet.balance, quote.total
                )));
            }
        }

        Ok(quote)
    }
}

/// Build the `POST /orders` body.
///
/// Ticket and food-only scopes are exclusive: whichever scope does not apply
/// is explicitly cleared, so leftovers from an earlier checkout never leak
/// into the payload.
pub fn build_order_request(
    cart: &Cart,
    amount: i64,
    request: &SubmitRequest,
) -> CoreResult<CreateOrderRequest> {
    let mut payload = CreateOrderRequest {
        amount,
        payment_method: request.method,
        voucher_code: cart.voucher.as_ref().map(|v| v.code.clone()),
        showtime_id: cart.showtime_id,
        seat_ids: Some(cart.seat_ids()),
        cinema_complex_id: cart.cinema_complex_id,
        food_combos: cart.food.iter()
            .map(|line| FoodComboRequest {
                food_combo_id: line.food_combo_id,
                quantity: line.quantity,
            })
            .collect(),
        wallet_pin: request.wallet.as_ref().map(|w| w.pin.clone()),
    };

    if cart.has_tickets() {
        payload.cinema_complex_id = None;
    } else {
        payload.showtime_id = None;
        payload.seat_ids = None;
        if payload.cinema_complex_id.is_none() {
            return Err(CoreError::ValidationError("Food-only orders need a cinema".to_string()));
        }
    }

    Ok(payload)
}

// ============================================================================
// In-memory backend used by tests and local runs
// ============================================================================

/// Scriptable stand-in for the order backend.
///
/// Create-order calls answer from a queue of scripted responses, falling back
/// to a redirect (MOMO/ZALOPAY) or a created order (WALLET). Lookups by
/// reference replay a script and then report "not found".
pub struct MockOrderGateway {
    create_calls: AtomicUsize,
    requests: Mutex<Vec<CreateOrderRequest>>,
    create_script: Mutex<VecDeque<Result<CreateOrderResponse, GatewayError>>>,
    lookup_calls: AtomicUsize,
    lookup_script: Mutex<VecDeque<Result<Option<Order>, GatewayError>>>,
    gated: AtomicBool,
    entered: Notify,
    release: Notify,
    valid_pin: String,
}

impl MockOrderGateway {
    pub fn new() -> Self {
        Self {
            create_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            create_script: Mutex::new(VecDeque::new()),
            lookup_calls: AtomicUsize::new(0),
            lookup_script: Mutex::new(VecDeque::new()),
            gated: AtomicBool::new(false),
            entered: Notify::new(),
            release: Notify::new(),
            valid_pin: "123456".to_string(),
        }
    }

    pub fn sample_order(order_id: i64, method: GatewayType, total_amount: i64) -> Order {
        let created_at = NaiveDateTime::parse_from_str("2024-05-01T10:15:00", "%Y-%m-%dT%H:%M:%S")
            .unwrap_or_default();
        Order {
            order_id,
            total_amount,
            payment_method: method,
            txn_ref: None,
            items: Vec::new(),
            status: OrderStatus::Paid,
            showtime: None,
            seats: Vec::new(),
            created_at,
        }
    }

    pub fn push_create(&self, response: Result<CreateOrderResponse, GatewayError>) {
        self.create_script.lock().unwrap_or_else(|e| e.into_inner()).push_back(response);
    }

    pub fn push_lookup(&self, result: Result<Option<Order>, GatewayError>) {
        self.lookup_script.lock().unwrap_or_else(|e| e.into_inner()).push_back(result);
    }

    /// Make create-order calls wait until `open_gate` is called
    pub fn close_gate(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn open_gate(&self) {
        self.gated.store(false, Ordering::SeqCst);
        self.release.notify_waiters();
        self.release.notify_one();
    }

    /// Resolves once a create-order call has started
    pub async fn create_started(&self) {
        self.entered.notified().await;
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CreateOrderRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for MockOrderGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderRepository for MockOrderGateway {
    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<CreateOrderResponse, GatewayError> {
        let call = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).push(request.clone());
        self.entered.notify_one();

        if self.gated.load(Ordering::SeqCst) {
            self.release.notified().await;
        }

        let scripted = self.create_script.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
        match scripted {
            Some(response) => response,
            None if request.payment_method.is_redirect() => {
                Ok(CreateOrderResponse::Redirect(RedirectResponse {
                    redirect_url: format!("https://pay.example/{}/{}", request.payment_method, call),
                    txn_ref: Some(format!("TXN-{}", call)),
                }))
            }
            None => Ok(CreateOrderResponse::Created(Self::sample_order(
                call as i64,
                request.payment_method,
                request.amount,
            ))),
        }
    }

    async fn find_order_by_ref(&self, _txn_ref: &str) -> Result<Option<Order>, GatewayError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.lookup_script.lock().unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(Ok(None))
    }
}

#[async_trait]
impl WalletPinVerifier for MockOrderGateway {
    async fn verify_pin(&self, pin: &Masked<String>) -> Result<bool, GatewayError> {
        Ok(pin.expose() == &self.valid_pin)
    }
}
