use cinepass_order::CheckoutService;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Periodically evicts checkout sessions nobody has touched for the idle TTL.
/// Runs until the task is dropped.
pub async fn start_session_sweeper(checkout: Arc<CheckoutService>, every: Duration) {
    let mut ticker = interval(every.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(every_secs = every.as_secs(), "Session sweeper started");

    loop {
        ticker.tick().await;
        let evicted = checkout.sweep_idle().await;
        if evicted > 0 {
            info!(evicted, remaining = checkout.active_sessions(), "Idle sessions evicted");
        } else {
            debug!("Session sweep found nothing idle");
        }
    }
}
