use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use concierge_db::DbPool;
use serde::Serialize;
use tracing::warn;

use crate::notifications::NotificationHub;

#[derive(Clone)]
pub struct HealthState {
    pub db_pool: DbPool,
    pub knowledge_chunks: usize,
    pub notifications: NotificationHub,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub knowledge: HealthCheck,
    pub notification_subscribers: usize,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// Readiness. Only the database gates the status code; an empty knowledge
/// index is reported but still serves (answers fall back to "no information").
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let ready = database.status == "ready";

    let knowledge = if state.knowledge_chunks > 0 {
        HealthCheck { status: "ready", detail: format!("{} chunks indexed", state.knowledge_chunks) }
    } else {
        HealthCheck { status: "empty", detail: "knowledge index has no chunks".to_string() }
    };

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck { status: "ready", detail: "webhook router initialized".to_string() },
        database,
        knowledge,
        notification_subscribers: state.notifications.subscriber_count(),
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM conversation_turn").fetch_one(pool).await
    {
        Ok(turns) => HealthCheck { status: "ready", detail: format!("{turns} conversation turns stored") },
        Err(error) => {
            warn!(
                event_name = "system.health.database_degraded",
                error = %error,
                "database readiness check failed"
            );
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}
