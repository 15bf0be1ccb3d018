use async_trait::async_trait;
use cinepass_core::channel::SeatChannel;
use cinepass_core::GatewayError;
use cinepass_shared::models::SeatMessage;
use redis::{AsyncCommands, RedisResult};
use tracing::debug;

/// Pub/sub topic shared by every seat map open on a showtime
pub fn seat_channel_name(showtime_id: i64) -> String {
    format!("seats:{}", showtime_id)
}

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Returns the number of subscribers that received the message
    pub async fn publish(&self, channel: &str, payload: &str) -> RedisResult<i64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.publish(channel, payload).await
    }

    /// Fixed-window counter. Returns false once `limit` is exceeded within the window.
    pub async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, window_seconds).ignore()
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }
}

#[async_trait]
impl SeatChannel for RedisClient {
    async fn send(&self, message: &SeatMessage) -> Result<(), GatewayError> {
        let payload = serde_json::to_string(message)
            .map_err(|e| GatewayError::Decode(format!("seat message encoding failed: {}", e)))?;
        let receivers = self.publish(&seat_channel_name(message.showtime_id), &payload)
            .await
            .map_err(|e| GatewayError::Transport(format!("seat publish failed: {}", e)))?;
        debug!(
            showtime_id = message.showtime_id,
            seat_id = message.seat_id,
            action = ?message.action,
            receivers,
            "Seat message published"
        );
        Ok(())
    }
}
