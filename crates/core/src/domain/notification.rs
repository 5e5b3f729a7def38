use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const NEW_SALE_NOTIFICATION: &str = "new_sale_notification";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleNotification {
    pub status: String,
    pub message: String,
    pub product: String,
    pub client: String,
    /// RFC 3339 / ISO-8601, UTC.
    pub timestamp: String,
}

impl SaleNotification {
    pub fn new(product: &str, client: &str, at: DateTime<Utc>) -> Self {
        Self {
            status: "OK".to_string(),
            message: format!("New sale generated: {product} for {client}!"),
            product: product.to_string(),
            client: client.to_string(),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Side-effect events broadcast to real-time subscribers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    NewSale(SaleNotification),
}

impl Notification {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::NewSale(_) => NEW_SALE_NOTIFICATION,
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            Self::NewSale(sale) => serde_json::to_value(sale).unwrap_or(Value::Null),
        }
    }

    /// Frame sent to subscribers: `{"event": <name>, "payload": {...}}`.
    pub fn frame(&self) -> Value {
        serde_json::json!({ "event": self.event_name(), "payload": self.payload() })
    }
}

/// Fire-and-forget broadcast channel. Implementations must not block and
/// must not report delivery.
pub trait NotificationSink: Send + Sync {
    fn publish(&self, notification: Notification);
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use super::{Notification, SaleNotification, NEW_SALE_NOTIFICATION};

    #[test]
    fn sale_notification_carries_iso_timestamp_and_fields() {
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).single().expect("valid instant");
        let sale = SaleNotification::new("Laptop Pro", "Ana", at);

        assert_eq!(sale.status, "OK");
        assert_eq!(sale.timestamp, "2026-03-14T15:09:26.000Z");
        assert!(DateTime::parse_from_rfc3339(&sale.timestamp).is_ok());
        assert!(sale.message.contains("Laptop Pro"));
        assert!(sale.message.contains("Ana"));
    }

    #[test]
    fn frame_wraps_payload_with_event_name() {
        let sale = SaleNotification::new("Monitor", "Luis", Utc::now());
        let frame = Notification::NewSale(sale).frame();

        assert_eq!(frame["event"], NEW_SALE_NOTIFICATION);
        assert_eq!(frame["payload"]["product"], "Monitor");
        assert_eq!(frame["payload"]["client"], "Luis");
        assert_eq!(frame["payload"]["status"], "OK");
    }
}
