use chrono::{DateTime, Utc};
use cinepass_core::{CoreError, CoreResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::PendingTransaction;

#[derive(Debug, Clone)]
enum Slot {
    /// A `submit` call is between lock acquisition and its create-order response
    InFlight,
    /// A redirect was issued; waiting for reconciliation
    Pending(PendingTransaction),
}

type Slots = Arc<Mutex<HashMap<String, Slot>>>;

fn lock(slots: &Slots) -> std::sync::MutexGuard<'_, HashMap<String, Slot>> {
    slots.lock().unwrap_or_else(|e| e.into_inner())
}

/// Per-session single-flight lock over payment submission.
///
/// At most one submission (in flight or pending reconciliation) exists per
/// session. Pending transactions older than `pending_ttl` are considered
/// abandoned and may be replaced by a new submission.
#[derive(Clone)]
pub struct SingleFlightGuard {
    slots: Slots,
    pending_ttl: Duration,
}

impl SingleFlightGuard {
    pub fn new(pending_ttl: Duration) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            pending_ttl,
        }
    }

    /// Take the session's submission slot or fail with `DuplicateSubmission`
    pub fn try_acquire(&self, session: &str, now: DateTime<Utc>) -> CoreResult<SubmissionPermit> {
        let mut slots = lock(&self.slots);

        match slots.get(session) {
            Some(Slot::InFlight) => return Err(CoreError::DuplicateSubmission),
            Some(Slot::Pending(pending)) => {
                let age = (now - pending.created_at).to_std().unwrap_or_default();
                if age < self.pending_ttl {
                    return Err(CoreError::DuplicateSubmission);
                }
                warn!(
                    session,
                    txn_ref = ?pending.txn_ref,
                    age_secs = age.as_secs(),
                    "Superseding abandoned pending transaction"
                );
            }
            None => {}
        }

        slots.insert(session.to_string(), Slot::InFlight);
        debug!(session, "Submission slot acquired");
        Ok(SubmissionPermit {
            slots: self.slots.clone(),
            session: session.to_string(),
            armed: true,
        })
    }

    /// Reconciliation reached a terminal state; drop the pending transaction
    pub fn complete(&self, session: &str) -> Option<PendingTransaction> {
        let mut slots = lock(&self.slots);
        if !matches!(slots.get(session), Some(Slot::Pending(_))) {
            return None;
        }
        match slots.remove(session) {
            Some(Slot::Pending(pending)) => Some(pending),
            _ => None,
        }
    }

    pub fn pending(&self, session: &str) -> Option<PendingTransaction> {
        match lock(&self.slots).get(session) {
            Some(Slot::Pending(pending)) => Some(pending.clone()),
            _ => None,
        }
    }

    pub fn is_locked(&self, session: &str) -> bool {
        lock(&self.slots).contains_key(session)
    }

    /// True while a submission is in flight or a pending transaction is
    /// younger than `pending_ttl`
    pub fn is_busy(&self, session: &str, now: DateTime<Utc>) -> bool {
        match lock(&self.slots).get(session) {
            Some(Slot::InFlight) => true,
            Some(Slot::Pending(pending)) => {
                (now - pending.created_at).to_std().unwrap_or_default() < self.pending_ttl
            }
            None => false,
        }
    }
}

/// Proof of holding a session's submission slot.
///
/// Dropping the permit frees the slot; `into_pending` keeps it occupied by a
/// pending transaction until `SingleFlightGuard::complete`.
pub struct SubmissionPermit {
    slots: Slots,
    session: String,
    armed: bool,
}

impl SubmissionPermit {
    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn into_pending(mut self, pending: PendingTransaction) {
        lock(&self.slots).insert(self.session.clone(), Slot::Pending(pending));
        self.armed = false;
    }
}

impl Drop for SubmissionPermit {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut slots = lock(&self.slots);
        if matches!(slots.get(&self.session), Some(Slot::InFlight)) {
            slots.remove(&self.session);
            debug!(session = %self.session, "Submission slot released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinepass_core::GatewayType;

    fn pending(created_at: DateTime<Utc>) -> PendingTransaction {
        PendingTransaction {
            txn_ref: Some("T1".to_string()),
            gateway_type: GatewayType::Momo,
            amount: 210000,
            created_at,
        }
    }

    #[test]
    fn test_second_acquire_is_rejected_while_in_flight() {
        let guard = SingleFlightGuard::new(Duration::from_secs(900));
        let now = Utc::now();

        let permit = guard.try_acquire("s1", now).unwrap();
        assert!(matches!(guard.try_acquire("s1", now), Err(CoreError::DuplicateSubmission)));
        // Other sessions are unaffected
        assert!(guard.try_acquire("s2", now).is_ok());

        drop(permit);
        assert!(!guard.is_locked("s1"));
        assert!(guard.try_acquire("s1", now).is_ok());
    }

    #[test]
    fn test_pending_holds_lock_until_complete() {
        let guard = SingleFlightGuard::new(Duration::from_secs(900));
        let now = Utc::now();

        guard.try_acquire("s1", now).unwrap().into_pending(pending(now));
        assert!(guard.is_locked("s1"));
        assert!(matches!(guard.try_acquire("s1", now), Err(CoreError::DuplicateSubmission)));

        let done = guard.complete("s1").unwrap();
        assert_eq!(done.txn_ref.as_deref(), Some("T1"));
        assert!(guard.complete("s1").is_none());
        assert!(guard.try_acquire("s1", now).is_ok());
    }

    #[test]
    fn test_stale_pending_can_be_superseded() {
        let guard = SingleFlightGuard::new(Duration::from_secs(900));
        let then = Utc::now();
        guard.try_acquire("s1", then).unwrap().into_pending(pending(then));

        let later = then + chrono::Duration::seconds(901);
        let permit = guard.try_acquire("s1", later).unwrap();
        assert!(guard.pending("s1").is_none());
        drop(permit);
    }

    #[test]
    fn test_busy_until_pending_goes_stale() {
        let guard = SingleFlightGuard::new(Duration::from_secs(900));
        let then = Utc::now();
        assert!(!guard.is_busy("s1", then));

        let permit = guard.try_acquire("s1", then).unwrap();
        assert!(guard.is_busy("s1", then + chrono::Duration::hours(1)));

        permit.into_pending(pending(then));
        assert!(guard.is_busy("s1", then + chrono::Duration::seconds(899)));
        assert!(!guard.is_busy("s1", then + chrono::Duration::seconds(900)));
    }
}
