//! Intent routing for one webhook turn.
//!
//! `IntentRouter::handle` never fails: every failure is logged and rendered
//! into the reply text so the caller always gets a usable envelope. Only
//! answered fallback turns touch session memory.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use concierge_core::domain::event::{ConversationalEvent, SessionId};
use concierge_core::domain::reply::{ReplyBuilder, ReplyEnvelope};
use concierge_core::domain::session::Turn;
use concierge_core::errors::AnswerError;
use concierge_core::intent::{IntentKind, SALE_CLIENT_SLOT, SALE_PRODUCT_SLOT};
use concierge_core::menu::MenuTemplates;
use concierge_db::repositories::SessionRepository;

use crate::knowledge::NO_RELEVANT_INFO;
use crate::runtime::AnsweringService;
use crate::tools::SaleFinalizer;

pub const AWAITING_SALE_DETAILS_CONTEXT: &str = "awaiting_sale_details";
pub const MENU_CONTEXT: &str = "menu";
pub const SALE_DETAILS_PROMPT: &str =
    "I need more information (product and client) to finalize the sale.";
pub const REPHRASE_PROMPT: &str =
    "I didn't catch your question. Could you rephrase it, or type 'menu' to see the options?";

pub fn no_information_reply(query: &str) -> String {
    format!(
        "I'm sorry, I don't have specific information about '{query}' in my knowledge base. \
         Is there anything else I can help you with, or would you like to see the menu?"
    )
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouterSettings {
    pub answer_timeout: Duration,
    pub max_history_turns: u32,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self { answer_timeout: Duration::from_secs(60), max_history_turns: 20 }
    }
}

pub struct IntentRouter {
    answering: Arc<dyn AnsweringService>,
    sales: SaleFinalizer,
    sessions: Arc<dyn SessionRepository>,
    menu: MenuTemplates,
    settings: RouterSettings,
}

impl IntentRouter {
    pub fn new(
        answering: Arc<dyn AnsweringService>,
        sales: SaleFinalizer,
        sessions: Arc<dyn SessionRepository>,
        menu: MenuTemplates,
        settings: RouterSettings,
    ) -> Self {
        Self { answering, sales, sessions, menu, settings }
    }

    pub async fn handle(&self, event: ConversationalEvent) -> ReplyEnvelope {
        let correlation_id = event.session_id.as_ref().map_or("anonymous", SessionId::as_str);
        let kind = IntentKind::from_label(event.intent_label.as_deref());
        info!(
            event_name = "webhook.event.received",
            correlation_id,
            intent_label = event.intent_label.as_deref().unwrap_or(""),
            intent_kind = kind.kind_name(),
            query_text = %event.raw_text,
            slots = %serde_json::to_string(&event.slots).unwrap_or_default(),
            "conversational event received"
        );

        let reply = match kind {
            IntentKind::Menu(option) => ReplyBuilder::new(event.session_id.as_ref())
                .text(self.menu.reply_for(option))
                .build(),
            IntentKind::ConfirmSale => self.confirm_sale(&event),
            IntentKind::Fallback => self.answer(&event, correlation_id).await,
        };

        info!(
            event_name = "webhook.event.handled",
            correlation_id,
            intent_kind = kind.kind_name(),
            contexts = reply.output_contexts.len(),
            "conversational event handled"
        );
        reply
    }

    fn confirm_sale(&self, event: &ConversationalEvent) -> ReplyEnvelope {
        let builder = ReplyBuilder::new(event.session_id.as_ref());
        match (event.slot(SALE_PRODUCT_SLOT), event.slot(SALE_CLIENT_SLOT)) {
            (Some(product), Some(client)) => {
                builder.text(self.sales.finalize(&product, &client)).build()
            }
            _ => builder
                .text(SALE_DETAILS_PROMPT)
                .context(AWAITING_SALE_DETAILS_CONTEXT, 2)
                .build(),
        }
    }

    async fn answer(&self, event: &ConversationalEvent, correlation_id: &str) -> ReplyEnvelope {
        let builder = ReplyBuilder::new(event.session_id.as_ref());
        let query = event.query_text();
        if query.is_empty() {
            return builder.text(REPHRASE_PROMPT).build();
        }

        let history = match &event.session_id {
            Some(session_id) => self.history(session_id).await,
            None => Vec::new(),
        };

        let reply = match self.run_answering(query, history).await {
            Ok(answer) if answer.contains(NO_RELEVANT_INFO) => {
                info!(
                    event_name = "agent.answer.no_information",
                    correlation_id,
                    "answering service found no relevant information"
                );
                builder.text(no_information_reply(query)).context(MENU_CONTEXT, 1).build()
            }
            Ok(answer) => builder.text(answer).build(),
            Err(answer_error) => {
                let failure = answer_error.into_fulfillment(correlation_id);
                error!(
                    event_name = "agent.answer.error",
                    correlation_id = failure.correlation_id(),
                    error_class = failure.error_class(),
                    error = %failure,
                    "answering service failed"
                );
                // Apologies are never recorded as history.
                return builder.text(failure.user_message()).build();
            }
        };

        if let Some(session_id) = &event.session_id {
            self.remember(session_id, query, &reply.fulfillment_text).await;
        }
        reply
    }

    /// Runs the answering call on its own task so a panic or a hang stays
    /// contained to this turn.
    async fn run_answering(&self, query: &str, history: Vec<Turn>) -> Result<String, AnswerError> {
        let answering = Arc::clone(&self.answering);
        let query = query.to_string();
        let mut task = tokio::spawn(async move { answering.answer(&query, &history).await });

        match tokio::time::timeout(self.settings.answer_timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => {
                Err(AnswerError::Unexpected(format!("answering task failed: {join_error}")))
            }
            Err(_) => {
                task.abort();
                Err(AnswerError::ServiceUnavailable(format!(
                    "answer timed out after {}s",
                    self.settings.answer_timeout.as_secs()
                )))
            }
        }
    }

    async fn history(&self, session_id: &SessionId) -> Vec<Turn> {
        match self.sessions.load_recent(session_id, self.settings.max_history_turns).await {
            Ok(turns) => turns,
            Err(repository_error) => {
                warn!(
                    event_name = "memory.load.error",
                    correlation_id = session_id.as_str(),
                    error = %repository_error,
                    "could not load session history, continuing without it"
                );
                Vec::new()
            }
        }
    }

    async fn remember(&self, session_id: &SessionId, utterance: &str, reply: &str) {
        let turns = [Turn::user(utterance), Turn::assistant(reply)];
        if let Err(repository_error) = self.sessions.append(session_id, &turns).await {
            warn!(
                event_name = "memory.append.error",
                correlation_id = session_id.as_str(),
                error = %repository_error,
                "could not record conversation turn"
            );
        }
    }
}
