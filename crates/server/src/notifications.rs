//! Real-time notification fan-out over WebSocket.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use concierge_core::domain::notification::{Notification, NotificationSink};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Broadcast hub. Publishing never blocks; with no subscribers the event is
/// dropped, and subscribers that fall behind skip what they missed.
#[derive(Clone)]
pub struct NotificationHub {
    sender: broadcast::Sender<Notification>,
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl NotificationSink for NotificationHub {
    fn publish(&self, notification: Notification) {
        let event = notification.event_name();
        match self.sender.send(notification) {
            Ok(receivers) => {
                debug!(event_name = "notifications.published", event, receivers, "notification published")
            }
            Err(_) => debug!(
                event_name = "notifications.dropped",
                event,
                "no notification subscribers connected"
            ),
        }
    }
}

pub fn router(hub: NotificationHub) -> Router {
    Router::new().route("/ws/notifications", get(notifications_ws)).with_state(hub)
}

async fn notifications_ws(ws: WebSocketUpgrade, State(hub): State<NotificationHub>) -> Response {
    let events = hub.subscribe();
    ws.on_upgrade(move |socket| serve_subscriber(socket, events))
}

async fn serve_subscriber(mut socket: WebSocket, mut events: broadcast::Receiver<Notification>) {
    let subscriber_id = Uuid::new_v4();
    info!(
        event_name = "notifications.subscriber.connected",
        %subscriber_id,
        "notification subscriber connected"
    );

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(notification) => {
                    let frame = notification.frame().to_string();
                    if socket.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        event_name = "notifications.subscriber.lagged",
                        %subscriber_id,
                        skipped,
                        "notification subscriber lagged, skipping missed events"
                    );
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    info!(
        event_name = "notifications.subscriber.disconnected",
        %subscriber_id,
        "notification subscriber disconnected"
    );
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tokio::sync::broadcast::error::RecvError;

    use super::NotificationHub;
    use concierge_core::domain::notification::{
        Notification, NotificationSink, SaleNotification, NEW_SALE_NOTIFICATION,
    };

    fn sale(product: &str) -> Notification {
        Notification::NewSale(SaleNotification::new(product, "Ana", Utc::now()))
    }

    #[tokio::test]
    async fn every_subscriber_receives_published_events() {
        let hub = NotificationHub::default();
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        hub.publish(sale("Laptop"));

        for receiver in [&mut first, &mut second] {
            let received = receiver.recv().await.expect("notification");
            let frame = received.frame();
            assert_eq!(frame["event"], NEW_SALE_NOTIFICATION);
            assert_eq!(frame["payload"]["product"], "Laptop");
        }
    }

    #[test]
    fn publishing_without_subscribers_is_a_no_op() {
        let hub = NotificationHub::default();
        hub.publish(sale("Laptop"));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_missed_events() {
        let hub = NotificationHub::new(2);
        let mut receiver = hub.subscribe();

        for product in ["a", "b", "c", "d"] {
            hub.publish(sale(product));
        }

        assert!(matches!(receiver.recv().await, Err(RecvError::Lagged(2))));
        let Notification::NewSale(next) = receiver.recv().await.expect("next");
        assert_eq!(next.product, "c");
    }
}
