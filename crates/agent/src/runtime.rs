use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use concierge_core::domain::session::{Speaker, Turn};
use concierge_core::errors::AnswerError;

use crate::llm::{ChatMessage, LlmClient, LlmError};
use crate::tools::ToolRegistry;

pub const NO_ANSWER_TEXT: &str = "I couldn't generate a response.";

const SYSTEM_PROMPT: &str = "You are a helpful customer assistant. Use the available tools when \
they help: weather questions go to get_current_weather, questions about products, policies or \
other internal topics go to process_knowledge_query, and a sale is only finalized with \
finalize_sale_process once the product and client are confirmed. If process_knowledge_query \
returns NO_RELEVANT_INFO, reply with exactly NO_RELEVANT_INFO.";

/// Free-form question answering over the running conversation.
#[async_trait]
pub trait AnsweringService: Send + Sync {
    async fn answer(&self, query: &str, history: &[Turn]) -> Result<String, AnswerError>;
}

impl From<LlmError> for AnswerError {
    fn from(error: LlmError) -> Self {
        match error {
            LlmError::Transport(_) | LlmError::Status { .. } => {
                Self::ServiceUnavailable(error.to_string())
            }
            LlmError::Decode(_) | LlmError::Config(_) => Self::Unexpected(error.to_string()),
        }
    }
}

/// Tool-calling loop over a chat-completions model.
pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    max_iterations: u32,
}

impl AgentRuntime {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>, max_iterations: u32) -> Self {
        Self { llm, tools, max_iterations: max_iterations.max(1) }
    }

    fn initial_messages(query: &str, history: &[Turn]) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::System(SYSTEM_PROMPT.to_string()));
        messages.extend(history.iter().map(|turn| match turn.speaker {
            Speaker::User => ChatMessage::User(turn.utterance.clone()),
            Speaker::Assistant => ChatMessage::assistant(turn.utterance.clone()),
        }));
        messages.push(ChatMessage::User(query.to_string()));
        messages
    }
}

#[async_trait]
impl AnsweringService for AgentRuntime {
    async fn answer(&self, query: &str, history: &[Turn]) -> Result<String, AnswerError> {
        let descriptors = self.tools.descriptors();
        let mut messages = Self::initial_messages(query, history);

        for iteration in 0..self.max_iterations {
            let completion = self.llm.complete(&messages, &descriptors).await?;

            if completion.tool_calls.is_empty() {
                debug!(iteration, "agent produced final answer");
                return Ok(completion.text.unwrap_or_else(|| NO_ANSWER_TEXT.to_string()));
            }

            let calls = completion.tool_calls.clone();
            messages.push(ChatMessage::Assistant {
                content: completion.text,
                tool_calls: completion.tool_calls,
            });

            for call in calls {
                info!(
                    event_name = "agent.tool.invoked",
                    tool = %call.name,
                    iteration,
                    "agent invoked tool"
                );
                let content = match self.tools.invoke(&call.name, call.arguments).await {
                    Ok(output) => output,
                    Err(error) => {
                        warn!(
                            event_name = "agent.tool.error",
                            tool = %call.name,
                            error = %error,
                            "tool invocation failed, reporting to model"
                        );
                        format!("Error: {error}")
                    }
                };
                messages.push(ChatMessage::Tool { tool_call_id: call.id, content });
            }
        }

        warn!(
            event_name = "agent.loop.exhausted",
            max_iterations = self.max_iterations,
            "agent reached the iteration limit without an answer"
        );
        Ok(NO_ANSWER_TEXT.to_string())
    }
}
