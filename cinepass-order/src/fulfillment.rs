use chrono::{DateTime, NaiveDateTime};
use cinepass_core::{Clock, Order};
use serde::Serialize;
use std::sync::Arc;

const DEFAULT_FORMAT: &str = "2D";
const ROOM_TYPE_PREFIX: &str = "TYPE_";

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Unrecognised showtime start: {0}")]
    InvalidShowtimeStart(String),
    #[error("QR payload serialization failed: {0}")]
    Serialization(String),
}

/// Parse a showtime start keeping its local wall-clock fields.
///
/// An explicit offset is accepted but not applied: `19:30+07:00` stays 19:30.
pub fn parse_showtime_start(input: &str) -> Result<NaiveDateTime, CodecError> {
    let trimmed = input.trim();
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(with_offset.naive_local());
    }

    let local = trimmed.strip_suffix('Z').unwrap_or(trimmed);
    NAIVE_FORMATS.iter()
        .find_map(|format| NaiveDateTime::parse_from_str(local, format).ok())
        .ok_or_else(|| CodecError::InvalidShowtimeStart(input.to_string()))
}

/// Ticket QR contents. Field order is part of the wire contract.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QrPayload {
    pub booking_id: String,
    pub order_id: i64,
    pub movie: String,
    pub cinema: String,
    /// dd/MM/yyyy
    pub date: String,
    /// HH:mm
    pub time: String,
    pub seats: Vec<String>,
    pub format: String,
}

impl QrPayload {
    pub fn to_json(&self) -> Result<String, CodecError> {
        serde_json::to_string(self).map_err(|e| CodecError::Serialization(e.to_string()))
    }
}

/// What the confirmation page displays
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub booking_id: String,
    pub qr_payload: QrPayload,
    pub qr_json: String,
}

/// Derives booking identifiers and QR payloads from confirmed orders
pub struct BookingIdentifierCodec {
    clock: Arc<dyn Clock>,
}

impl BookingIdentifierCodec {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// `{order}-{showtime}-{yyyy-MM-ddTHH:mm:ss}` when the screening is known.
    ///
    /// Otherwise `{order}-{epoch_millis}`, which is not reproducible and must
    /// be stored alongside the order.
    pub fn encode(
        &self,
        order_id: i64,
        showtime_id: Option<i64>,
        showtime_start: Option<NaiveDateTime>,
    ) -> String {
        match (showtime_id, showtime_start) {
            (Some(showtime_id), Some(start)) => format!(
                "{}-{}-{}",
                order_id,
                showtime_id,
                start.format("%Y-%m-%dT%H:%M:%S")
            ),
            _ => format!("{}-{}", order_id, self.clock.now_millis()),
        }
    }

    pub fn encode_order(&self, order: &Order) -> Result<String, CodecError> {
        match &order.showtime {
            Some(showtime) => {
                let start = parse_showtime_start(&showtime.start_time)?;
                Ok(self.encode(order.order_id, Some(showtime.showtime_id), Some(start)))
            }
            None => Ok(self.encode(order.order_id, None, None)),
        }
    }

    /// Pure: the same order and booking id always give the same payload.
    pub fn build_qr_payload(order: &Order, booking_id: &str) -> Result<QrPayload, CodecError> {
        let (movie, cinema, when, format) = match &order.showtime {
            Some(showtime) => (
                showtime.movie_title.clone(),
                showtime.cinema_name.clone(),
                parse_showtime_start(&showtime.start_time)?,
                Self::normalize_room_format(showtime.room_type.as_deref()),
            ),
            // Food-only: no screening, so the purchase time is printed instead
            None => (String::new(), String::new(), order.created_at, DEFAULT_FORMAT.to_string()),
        };

        let mut seats = if order.showtime.is_some() { order.seats.clone() } else { Vec::new() };
        seats.sort();

        Ok(QrPayload {
            booking_id: booking_id.to_string(),
            order_id: order.order_id,
            movie,
            cinema,
            date: when.format("%d/%m/%Y").to_string(),
            time: when.format("%H:%M").to_string(),
            seats,
            format,
        })
    }

    pub fn issue_ticket(&self, order: &Order) -> Result<Ticket, CodecError> {
        let booking_id = self.encode_order(order)?;
        let qr_payload = Self::build_qr_payload(order, &booking_id)?;
        let qr_json = qr_payload.to_json()?;
        Ok(Ticket { booking_id, qr_payload, qr_json })
    }

    /// `TYPE_3D` → `3D`; missing or blank → `2D`
    pub fn normalize_room_format(room_type: Option<&str>) -> String {
        match room_type.map(str::trim).filter(|r| !r.is_empty()) {
            Some(room) => room.strip_prefix(ROOM_TYPE_PREFIX).unwrap_or(room).to_string(),
            None => DEFAULT_FORMAT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use cinepass_core::{GatewayType, MockClock, OrderStatus, ShowtimeInfo};

    fn ticket_order() -> Order {
        Order {
            order_id: 981,
            total_amount: 210000,
            payment_method: GatewayType::Momo,
            txn_ref: Some("T1".to_string()),
            items: Vec::new(),
            status: OrderStatus::Paid,
            showtime: Some(ShowtimeInfo {
                showtime_id: 42,
                start_time: "2024-05-01T19:30:00".to_string(),
                movie_title: "Dune: Part Two".to_string(),
                cinema_name: "Cinepass Landmark".to_string(),
                room_type: Some("TYPE_3D".to_string()),
            }),
            seats: vec!["B10".to_string(), "A2".to_string(), "A1".to_string()],
            created_at: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(10, 15, 0).unwrap(),
        }
    }

    fn codec() -> (BookingIdentifierCodec, Arc<MockClock>) {
        let clock = Arc::new(MockClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 3, 0, 0).unwrap()));
        (BookingIdentifierCodec::new(clock.clone()), clock)
    }

    #[test]
    fn test_parse_keeps_local_fields() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(19, 30, 0).unwrap();
        for input in [
            "2024-05-01T19:30:00",
            "2024-05-01T19:30",
            "2024-05-01T19:30:00.000",
            "2024-05-01T19:30:00+07:00",
            "2024-05-01T19:30:00Z",
            "2024-05-01 19:30:00",
        ] {
            assert_eq!(parse_showtime_start(input).unwrap(), expected, "input {}", input);
        }
        assert!(matches!(parse_showtime_start("tomorrow"), Err(CodecError::InvalidShowtimeStart(_))));
    }

    #[test]
    fn test_ticket_booking_id_is_deterministic() {
        let (codec, clock) = codec();
        let order = ticket_order();

        let first = codec.encode_order(&order).unwrap();
        clock.advance(std::time::Duration::from_secs(3600));
        let second = codec.encode_order(&order).unwrap();

        assert_eq!(first, "981-42-2024-05-01T19:30:00");
        assert_eq!(first, second);
    }

    #[test]
    fn test_offset_is_not_converted() {
        let (codec, _) = codec();
        let mut order = ticket_order();
        if let Some(showtime) = order.showtime.as_mut() {
            showtime.start_time = "2024-05-01T19:30:00+07:00".to_string();
        }
        assert_eq!(codec.encode_order(&order).unwrap(), "981-42-2024-05-01T19:30:00");
    }

    #[test]
    fn test_qr_payload_wire_format() {
        let order = ticket_order();
        let payload = BookingIdentifierCodec::build_qr_payload(&order, "981-42-2024-05-01T19:30:00").unwrap();

        assert_eq!(payload.seats, vec!["A1", "A2", "B10"]);
        assert_eq!(payload.format, "3D");
        assert_eq!(
            payload.to_json().unwrap(),
            r#"{"bookingId":"981-42-2024-05-01T19:30:00","orderId":981,"movie":"Dune: Part Two","cinema":"Cinepass Landmark","date":"01/05/2024","time":"19:30","seats":["A1","A2","B10"],"format":"3D"}"#
        );

        // Byte-identical on repeat
        let again = BookingIdentifierCodec::build_qr_payload(&order, "981-42-2024-05-01T19:30:00").unwrap();
        assert_eq!(payload.to_json().unwrap(), again.to_json().unwrap());
    }

    #[test]
    fn test_room_format_normalization() {
        assert_eq!(BookingIdentifierCodec::normalize_room_format(Some("TYPE_3D")), "3D");
        assert_eq!(BookingIdentifierCodec::normalize_room_format(Some("TYPE_IMAX")), "IMAX");
        assert_eq!(BookingIdentifierCodec::normalize_room_format(Some("4DX")), "4DX");
        assert_eq!(BookingIdentifierCodec::normalize_room_format(Some("  ")), "2D");
        assert_eq!(BookingIdentifierCodec::normalize_room_format(None), "2D");
    }

    #[test]
    fn test_food_only_uses_clock_and_creation_time() {
        let (codec, clock) = codec();
        let mut order = ticket_order();
        order.showtime = None;

        let ticket = codec.issue_ticket(&order).unwrap();
        assert_eq!(ticket.booking_id, format!("981-{}", clock.now_millis()));
        assert_eq!(ticket.qr_payload.movie, "");
        assert_eq!(ticket.qr_payload.cinema, "");
        assert_eq!(ticket.qr_payload.date, "01/05/2024");
        assert_eq!(ticket.qr_payload.time, "10:15");
        assert!(ticket.qr_payload.seats.is_empty());
        assert_eq!(ticket.qr_payload.format, "2D");

        // Not reproducible once time moves on
        clock.advance(std::time::Duration::from_millis(5));
        assert_ne!(codec.encode_order(&order).unwrap(), ticket.booking_id);
    }

    #[test]
    fn test_malformed_start_is_an_error() {
        let (codec, _) = codec();
        let mut order = ticket_order();
        if let Some(showtime) = order.showtime.as_mut() {
            showtime.start_time = "soon".to_string();
        }
        assert!(codec.issue_ticket(&order).is_err());
    }
}
