use serde::{Deserialize, Serialize};

use crate::domain::event::SessionId;

pub const DEFAULT_APOLOGY: &str = "Sorry, I couldn't process your request.";

/// Webhook response body in the shape Dialogflow expects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyEnvelope {
    pub fulfillment_text: String,
    #[serde(default)]
    pub fulfillment_messages: Vec<FulfillmentMessage>,
    #[serde(default)]
    pub output_contexts: Vec<OutputContext>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentMessage {
    pub text: TextMessage,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMessage {
    pub text: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputContext {
    pub name: String,
    pub lifespan_count: u32,
}

impl ReplyEnvelope {
    pub fn text(fulfillment_text: impl Into<String>) -> Self {
        ReplyBuilder::new(None).text(fulfillment_text).build()
    }

    pub fn apology() -> Self {
        Self::text(DEFAULT_APOLOGY)
    }
}

/// Accumulates reply parts while an event is handled. `build` guarantees a
/// non-empty fulfillment text.
#[derive(Clone, Debug, Default)]
pub struct ReplyBuilder {
    session_id: Option<SessionId>,
    fulfillment_text: Option<String>,
    output_contexts: Vec<OutputContext>,
}

impl ReplyBuilder {
    pub fn new(session_id: Option<&SessionId>) -> Self {
        Self { session_id: session_id.cloned(), ..Self::default() }
    }

    pub fn text(mut self, fulfillment_text: impl Into<String>) -> Self {
        self.fulfillment_text = Some(fulfillment_text.into());
        self
    }

    /// Contexts are scoped to a session; without one the update is dropped.
    pub fn context(mut self, context: &str, lifespan_count: u32) -> Self {
        if let Some(session_id) = &self.session_id {
            self.output_contexts
                .push(OutputContext { name: session_id.context_name(context), lifespan_count });
        }
        self
    }

    pub fn build(self) -> ReplyEnvelope {
        let fulfillment_text = self
            .fulfillment_text
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_APOLOGY.to_string());

        ReplyEnvelope {
            fulfillment_messages: vec![FulfillmentMessage {
                text: TextMessage { text: vec![fulfillment_text.clone()] },
            }],
            fulfillment_text,
            output_contexts: self.output_contexts,
        }
    }
}
