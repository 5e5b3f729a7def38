use axum::Router;

use crate::bootstrap::Application;
use crate::health::{self, HealthState};
use crate::{notifications, webhook};

/// Every HTTP route the service exposes.
pub fn router(app: &Application) -> Router {
    Router::new()
        .merge(webhook::router(app.intent_router.clone()))
        .merge(notifications::router(app.notifications.clone()))
        .merge(health::router(HealthState {
            db_pool: app.db_pool.clone(),
            knowledge_chunks: app.knowledge_chunks,
            notifications: app.notifications.clone(),
        }))
}
