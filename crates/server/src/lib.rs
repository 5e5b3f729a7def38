//! HTTP surface: the Dialogflow webhook, the notification WebSocket and the
//! readiness probe, plus startup wiring.

pub mod app;
pub mod bootstrap;
pub mod health;
pub mod notifications;
pub mod telemetry;
pub mod webhook;
