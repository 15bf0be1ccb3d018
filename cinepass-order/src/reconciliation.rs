use cinepass_core::repository::OrderRepository;
use cinepass_core::{Clock, Order};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Attempt budget for looking up an order after a gateway redirect
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            interval: Duration::from_secs(1),
        }
    }
}

/// Reconciliation state for one transaction reference
#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    Initiated,
    /// `attempt` lookups have come back empty so far
    Waiting { attempt: u32 },
    Confirmed { order: Order, attempts: u32 },
    Indeterminate { attempts: u32 },
}

impl PollState {
    /// Advance on the result of one lookup
    pub fn on_lookup(self, found: Option<Order>, max_attempts: u32) -> PollState {
        let attempt = match self {
            PollState::Initiated => 1,
            PollState::Waiting { attempt } => attempt + 1,
            terminal => return terminal,
        };

        match found {
            Some(order) => PollState::Confirmed { order, attempts: attempt },
            None if attempt >= max_attempts => PollState::Indeterminate { attempts: attempt },
            None => PollState::Waiting { attempt },
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PollState::Confirmed { .. } | PollState::Indeterminate { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationOutcome {
    Confirmed { order: Order, attempts: u32 },
    /// The backend never reported the order; it may still be processing
    Indeterminate { txn_ref: String, attempts: u32 },
}

impl ReconciliationOutcome {
    pub fn user_message(&self) -> String {
        match self {
            ReconciliationOutcome::Confirmed { order, .. } => confirmation_message(order.order_id),
            ReconciliationOutcome::Indeterminate { .. } => {
                "Your payment may still be processing. Please check your order history in a few minutes.".to_string()
            }
        }
    }
}

pub fn confirmation_message(order_id: i64) -> String {
    format!("Payment successful. Order #{} is confirmed.", order_id)
}

/// Looks up the order behind a gateway return, retrying at a fixed interval.
///
/// Outcome delivery from the gateways is asynchronous, so the order may not
/// exist yet when the customer lands on the return URL. Lookup failures are
/// treated the same as "not found". Running out of attempts is not an error.
pub struct ReconciliationPoller {
    repository: Arc<dyn OrderRepository>,
    clock: Arc<dyn Clock>,
    policy: PollPolicy,
}

impl ReconciliationPoller {
    pub fn new(repository: Arc<dyn OrderRepository>, clock: Arc<dyn Clock>, policy: PollPolicy) -> Self {
        Self { repository, clock, policy }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub async fn reconcile(&self, txn_ref: &str) -> ReconciliationOutcome {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut state = PollState::Initiated;

        loop {
            let found = match self.repository.find_order_by_ref(txn_ref).await {
                Ok(found) => found,
                Err(e) => {
                    warn!(txn_ref, error = %e, "Order lookup failed, treating as not found");
                    None
                }
            };

            state = state.on_lookup(found, max_attempts);
            match state {
                PollState::Confirmed { order, attempts } => {
                    info!(txn_ref, order_id = order.order_id, attempts, "Payment confirmed");
                    return ReconciliationOutcome::Confirmed { order, attempts };
                }
                PollState::Indeterminate { attempts } => {
                    warn!(txn_ref, attempts, "Order not found within attempt budget");
                    return ReconciliationOutcome::Indeterminate {
                        txn_ref: txn_ref.to_string(),
                        attempts,
                    };
                }
                PollState::Waiting { attempt } => {
                    debug!(txn_ref, attempt, "Order not visible yet, retrying");
                    self.clock.sleep(self.policy.interval).await;
                }
                PollState::Initiated => unreachable!("lookup always leaves the initial state"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::MockOrderGateway;
    use cinepass_core::{GatewayError, GatewayType, MockClock};

    fn poller(gateway: Arc<MockOrderGateway>, clock: Arc<MockClock>) -> ReconciliationPoller {
        ReconciliationPoller::new(gateway, clock, PollPolicy::default())
    }

    #[test]
    fn test_state_transitions() {
        let order = MockOrderGateway::sample_order(7, GatewayType::Momo, 1000);

        let state = PollState::Initiated.on_lookup(None, 2);
        assert_eq!(state, PollState::Waiting { attempt: 1 });
        assert!(!state.is_terminal());

        let done = state.clone().on_lookup(None, 2);
        assert_eq!(done, PollState::Indeterminate { attempts: 2 });
        assert!(done.is_terminal());
        // Terminal states absorb further lookups
        assert_eq!(done.clone().on_lookup(Some(order.clone()), 2), done);

        let confirmed = state.on_lookup(Some(order.clone()), 2);
        assert_eq!(confirmed, PollState::Confirmed { order, attempts: 2 });
    }

    #[tokio::test]
    async fn test_found_on_third_attempt() {
        let gateway = Arc::new(MockOrderGateway::new());
        let clock = Arc::new(MockClock::default());
        gateway.push_lookup(Ok(None));
        gateway.push_lookup(Ok(None));
        gateway.push_lookup(Ok(Some(MockOrderGateway::sample_order(77, GatewayType::Momo, 210000))));

        let outcome = poller(gateway.clone(), clock.clone()).reconcile("TXN-1").await;

        match outcome {
            ReconciliationOutcome::Confirmed { order, attempts } => {
                assert_eq!(order.order_id, 77);
                assert_eq!(attempts, 3);
            }
            other => panic!("expected confirmation, got {:?}", other),
        }
        assert_eq!(gateway.lookup_calls(), 3);
        assert_eq!(clock.total_slept(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_never_found_is_indeterminate() {
        let gateway = Arc::new(MockOrderGateway::new());
        let clock = Arc::new(MockClock::default());

        let outcome = poller(gateway.clone(), clock.clone()).reconcile("TXN-9").await;

        assert_eq!(
            outcome,
            ReconciliationOutcome::Indeterminate { txn_ref: "TXN-9".to_string(), attempts: 5 }
        );
        assert!(outcome.user_message().contains("order history"));
        assert_eq!(gateway.lookup_calls(), 5);
        // No sleep after the final attempt
        assert_eq!(clock.sleeps().len(), 4);
        assert_eq!(clock.total_slept(), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_lookup_errors_count_as_not_found() {
        let gateway = Arc::new(MockOrderGateway::new());
        let clock = Arc::new(MockClock::default());
        gateway.push_lookup(Err(GatewayError::UnexpectedStatus { status: 502, body: "bad gateway".to_string() }));
        gateway.push_lookup(Ok(Some(MockOrderGateway::sample_order(5, GatewayType::ZaloPay, 90000))));

        let outcome = poller(gateway.clone(), clock.clone()).reconcile("TXN-2").await;

        assert!(matches!(outcome, ReconciliationOutcome::Confirmed { attempts: 2, .. }));
        assert_eq!(clock.total_slept(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_zero_budget_still_looks_up_once() {
        let gateway = Arc::new(MockOrderGateway::new());
        let clock = Arc::new(MockClock::default());
        let poller = ReconciliationPoller::new(
            gateway.clone(),
            clock.clone(),
            PollPolicy { max_attempts: 0, interval: Duration::from_secs(1) },
        );

        let outcome = poller.reconcile("TXN-3").await;
        assert!(matches!(outcome, ReconciliationOutcome::Indeterminate { attempts: 1, .. }));
        assert_eq!(gateway.lookup_calls(), 1);
        assert!(clock.sleeps().is_empty());
    }
}
