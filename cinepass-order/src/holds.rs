use cinepass_core::channel::SeatChannel;
use cinepass_core::{CoreError, CoreResult};
use cinepass_shared::models::SeatMessage;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HoldState {
    Selected,
    Released,
    HandedOff,
}

/// A session's claim on one seat of a showtime
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Hold {
    pub showtime_id: i64,
    pub seat_id: i64,
    pub owner_session: String,
    pub state: HoldState,
}

#[derive(Default)]
struct SessionHolds {
    seats: BTreeMap<(i64, i64), HoldState>,
    handed_off: bool,
}

impl SessionHolds {
    fn selected(&self) -> Vec<(i64, i64)> {
        self.seats.iter()
            .filter(|(_, state)| **state == HoldState::Selected)
            .map(|(key, _)| *key)
            .collect()
    }
}

/// Tracks seat holds per session and releases them when the customer leaves
/// checkout, unless a gateway redirect has taken over the transaction.
pub struct HoldManager {
    channel: Arc<dyn SeatChannel>,
    sessions: Mutex<HashMap<String, SessionHolds>>,
}

impl HoldManager {
    pub fn new(channel: Arc<dyn SeatChannel>) -> Self {
        Self {
            channel,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionHolds>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Select a seat. Re-selecting a seat the session already holds is a no-op.
    pub async fn reserve(&self, session: &str, showtime_id: i64, seat_id: i64) -> CoreResult<()> {
        {
            let mut sessions = self.sessions();
            let holds = sessions.entry(session.to_string()).or_default();
            if holds.seats.get(&(showtime_id, seat_id)) == Some(&HoldState::Selected) {
                debug!(session, showtime_id, seat_id, "Seat already held by session");
                return Ok(());
            }
            holds.seats.insert((showtime_id, seat_id), HoldState::Selected);
        }

        if let Err(e) = self.channel.send(&SeatMessage::select(showtime_id, seat_id)).await {
            warn!(session, showtime_id, seat_id, error = %e, "SELECT failed, dropping hold");
            if let Some(holds) = self.sessions().get_mut(session) {
                holds.seats.remove(&(showtime_id, seat_id));
            }
            return Err(CoreError::ChannelUnavailable(e.to_string()));
        }

        info!(session, showtime_id, seat_id, "Seat held");
        Ok(())
    }

    /// Deselect a seat. Returns whether a DESELECT message was sent;
    /// unknown or already released seats are a no-op.
    pub async fn release(&self, session: &str, showtime_id: i64, seat_id: i64) -> bool {
        {
            let mut sessions = self.sessions();
            let state = sessions.get_mut(session)
                .and_then(|holds| holds.seats.get_mut(&(showtime_id, seat_id)));
            match state {
                Some(state) if *state == HoldState::Selected => *state = HoldState::Released,
                _ => return false,
            }
        }

        self.send_deselect(session, showtime_id, seat_id).await;
        true
    }

    /// Mark the session as handed off to an external gateway. Seats stay held on exit.
    pub fn raise_hand_off(&self, session: &str) {
        self.sessions().entry(session.to_string()).or_default().handed_off = true;
        info!(session, "Hand-off raised, holds will survive checkout exit");
    }

    pub fn is_handed_off(&self, session: &str) -> bool {
        self.sessions().get(session).map_or(false, |holds| holds.handed_off)
    }

    pub fn is_selected(&self, session: &str, showtime_id: i64, seat_id: i64) -> bool {
        self.sessions().get(session)
            .and_then(|holds| holds.seats.get(&(showtime_id, seat_id)).copied())
            == Some(HoldState::Selected)
    }

    /// Seats currently held by the session, reported as `HandedOff` once a
    /// gateway redirect owns them
    pub fn selected(&self, session: &str) -> Vec<Hold> {
        self.sessions().get(session)
            .map(|holds| holds.selected().into_iter()
                .map(|(showtime_id, seat_id)| Hold {
                    showtime_id,
                    seat_id,
                    owner_session: session.to_string(),
                    state: if holds.handed_off { HoldState::HandedOff } else { HoldState::Selected },
                })
                .collect())
            .unwrap_or_default()
    }

    /// Leave checkout: every selected seat gets exactly one DESELECT, or none
    /// at all if a hand-off was raised. Returns the number of DESELECTs sent.
    pub async fn exit(&self, session: &str) -> usize {
        let holds = match self.sessions().remove(session) {
            Some(holds) => holds,
            None => return 0,
        };
        let seats = holds.selected();

        if holds.handed_off {
            info!(session, held = seats.len(), "Checkout exit during hand-off, keeping holds");
            return 0;
        }

        for (showtime_id, seat_id) in &seats {
            self.send_deselect(session, *showtime_id, *seat_id).await;
        }
        info!(session, released = seats.len(), "Checkout exit released holds");
        seats.len()
    }

    /// Forget the session's hold bookkeeping without messaging the channel
    pub fn clear(&self, session: &str) -> usize {
        self.sessions().remove(session)
            .map(|holds| holds.selected().len())
            .unwrap_or(0)
    }

    async fn send_deselect(&self, session: &str, showtime_id: i64, seat_id: i64) {
        // Not retried: a lost DESELECT only makes the seat available sooner
        if let Err(e) = self.channel.send(&SeatMessage::deselect(showtime_id, seat_id)).await {
            warn!(session, showtime_id, seat_id, error = %e, "DESELECT failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinepass_core::channel::RecordingSeatChannel;
    use cinepass_shared::models::SeatAction;

    fn manager() -> (Arc<RecordingSeatChannel>, HoldManager) {
        let channel = Arc::new(RecordingSeatChannel::new());
        (channel.clone(), HoldManager::new(channel))
    }

    #[tokio::test]
    async fn test_exit_releases_every_selected_seat_once() {
        let (channel, holds) = manager();
        for seat in [11, 12, 13] {
            holds.reserve("s1", 42, seat).await.unwrap();
        }
        // Re-selecting must not create a second hold
        holds.reserve("s1", 42, 12).await.unwrap();

        let released = holds.exit("s1").await;
        assert_eq!(released, 3);
        assert_eq!(channel.count(SeatAction::Select), 3);
        assert_eq!(channel.count(SeatAction::Deselect), 3);

        let mut deselected: Vec<i64> = channel.sent().iter()
            .filter(|m| m.action == SeatAction::Deselect)
            .map(|m| m.seat_id)
            .collect();
        deselected.sort();
        assert_eq!(deselected, vec![11, 12, 13]);

        // A second exit has nothing left to release
        assert_eq!(holds.exit("s1").await, 0);
        assert_eq!(channel.count(SeatAction::Deselect), 3);
    }

    #[tokio::test]
    async fn test_exit_after_hand_off_sends_nothing() {
        let (channel, holds) = manager();
        holds.reserve("s1", 42, 11).await.unwrap();
        holds.reserve("s1", 42, 12).await.unwrap();

        holds.raise_hand_off("s1");
        assert_eq!(holds.exit("s1").await, 0);
        assert_eq!(channel.count(SeatAction::Deselect), 0);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let (channel, holds) = manager();
        holds.reserve("s1", 42, 11).await.unwrap();

        assert!(holds.release("s1", 42, 11).await);
        assert!(!holds.release("s1", 42, 11).await);
        assert!(!holds.release("s1", 42, 99).await);
        assert!(!holds.release("unknown", 42, 11).await);
        assert_eq!(channel.count(SeatAction::Deselect), 1);

        // Released seats are not released again on exit
        assert_eq!(holds.exit("s1").await, 0);
    }

    #[tokio::test]
    async fn test_failed_deselect_is_not_retried() {
        let (channel, holds) = manager();
        holds.reserve("s1", 42, 11).await.unwrap();
        channel.fail_deselects(true);

        assert!(holds.release("s1", 42, 11).await);
        assert!(!holds.is_selected("s1", 42, 11));
        assert_eq!(holds.exit("s1").await, 0);
        assert_eq!(channel.count(SeatAction::Deselect), 1);
    }

    #[tokio::test]
    async fn test_failed_select_does_not_record_hold() {
        let (channel, holds) = manager();
        channel.fail_selects(true);

        let result = holds.reserve("s1", 42, 11).await;
        assert!(matches!(result, Err(CoreError::ChannelUnavailable(_))));
        assert!(holds.selected("s1").is_empty());
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let (channel, holds) = manager();
        holds.reserve("alice", 42, 11).await.unwrap();
        holds.reserve("bob", 42, 12).await.unwrap();
        holds.raise_hand_off("bob");

        assert_eq!(holds.exit("alice").await, 1);
        assert_eq!(holds.selected("bob")[0].state, HoldState::HandedOff);
        assert_eq!(holds.selected("alice").len(), 0);
        assert!(holds.is_handed_off("bob"));
        assert!(!holds.is_handed_off("alice"));
        assert_eq!(holds.clear("bob"), 1);
        assert_eq!(channel.count(SeatAction::Deselect), 1);
    }
}
