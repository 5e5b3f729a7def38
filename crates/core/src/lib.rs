//! Core types for the Dialogflow fulfillment webhook: configuration, the
//! intent dispatch table, menu templates, and the event/reply/session domain.

pub mod config;
pub mod domain;
pub mod errors;
pub mod intent;
pub mod menu;

pub use domain::event::{ConversationalEvent, SessionId};
pub use domain::notification::{
    Notification, NotificationSink, SaleNotification, NEW_SALE_NOTIFICATION,
};
pub use domain::reply::{ReplyBuilder, ReplyEnvelope, DEFAULT_APOLOGY};
pub use domain::session::{Speaker, Turn};
pub use errors::{AnswerError, DomainError, FulfillmentError, SERVICE_UNAVAILABLE_APOLOGY};
pub use intent::IntentKind;
pub use menu::{MenuOption, MenuTemplates};
