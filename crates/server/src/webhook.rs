//! `POST /webhook`: Dialogflow ES fulfillment.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

use concierge_agent::router::IntentRouter;
use concierge_core::domain::event::{ConversationalEvent, SessionId};
use concierge_core::domain::reply::ReplyEnvelope;

/// The subset of the Dialogflow ES request the router needs. Every field is
/// optional so partial payloads still route.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DialogflowRequest {
    pub session: Option<String>,
    pub query_result: Option<QueryResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryResult {
    pub query_text: Option<String>,
    pub intent: Option<IntentRef>,
    pub parameters: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntentRef {
    pub display_name: Option<String>,
}

impl From<DialogflowRequest> for ConversationalEvent {
    fn from(request: DialogflowRequest) -> Self {
        let query_result = request.query_result.unwrap_or_default();
        Self {
            session_id: SessionId::parse(request.session.as_deref()),
            intent_label: query_result.intent.and_then(|intent| intent.display_name),
            raw_text: query_result.query_text.unwrap_or_default().trim().to_string(),
            slots: query_result.parameters.unwrap_or_default(),
        }
    }
}

/// Dialogflow requests are a few kilobytes; anything past this is refused
/// with an apology envelope.
pub const WEBHOOK_BODY_LIMIT: usize = 1024 * 1024;

pub fn router(intent_router: Arc<IntentRouter>) -> Router {
    Router::new()
        .route("/webhook", post(webhook))
        .layer(DefaultBodyLimit::max(WEBHOOK_BODY_LIMIT))
        .with_state(intent_router)
}

/// Always answers 200 with an envelope, whatever the body looks like. The
/// body is read raw so a missing or wrong content type is not rejected, and
/// an unreadable or oversized body becomes an apology.
pub async fn webhook(
    State(intent_router): State<Arc<IntentRouter>>,
    body: Result<Bytes, BytesRejection>,
) -> Json<ReplyEnvelope> {
    let request_id = Uuid::new_v4();
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!(
                event_name = "webhook.request.rejected",
                %request_id,
                status = rejection.status().as_u16(),
                error = %rejection.body_text(),
                "webhook body could not be read"
            );
            return Json(ReplyEnvelope::apology());
        }
    };
    let request = match serde_json::from_slice::<DialogflowRequest>(&body) {
        Ok(request) => request,
        Err(error) => {
            warn!(
                event_name = "webhook.request.unparseable",
                %request_id,
                body_bytes = body.len(),
                error = %error,
                "webhook body is not a valid Dialogflow request"
            );
            return Json(ReplyEnvelope::apology());
        }
    };

    let reply = intent_router
        .handle(request.into())
        .instrument(info_span!("webhook", %request_id))
        .await;
    Json(reply)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::DialogflowRequest;
    use concierge_core::domain::event::ConversationalEvent;

    #[test]
    fn dialogflow_payload_maps_to_event() {
        let request: DialogflowRequest = serde_json::from_value(json!({
            "responseId": "r-1",
            "session": "projects/demo/agent/sessions/123",
            "queryResult": {
                "queryText": "  confirm the sale  ",
                "parameters": { "producto": "Laptop", "cliente": { "name": "Ana" } },
                "intent": { "name": "projects/demo/agent/intents/9", "displayName": "Confirmar_Venta_Intent" },
                "languageCode": "es"
            }
        }))
        .expect("request");

        let event = ConversationalEvent::from(request);

        assert_eq!(event.session_id.expect("session").as_str(), "projects/demo/agent/sessions/123");
        assert_eq!(event.intent_label.as_deref(), Some("Confirmar_Venta_Intent"));
        assert_eq!(event.raw_text, "confirm the sale");
        assert_eq!(event.slots.len(), 2);
    }

    #[test]
    fn sparse_payload_still_maps() {
        let request: DialogflowRequest =
            serde_json::from_value(json!({ "queryResult": { "parameters": null } }))
                .expect("request");

        let event = ConversationalEvent::from(request);

        assert!(event.session_id.is_none());
        assert!(event.intent_label.is_none());
        assert!(event.raw_text.is_empty());
        assert!(event.slots.is_empty());
    }
}
