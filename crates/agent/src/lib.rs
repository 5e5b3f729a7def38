//! Answering side of the webhook.
//!
//! - `router` decides how each turn is handled (menu template, sale fast
//!   path, or the answering agent) and records session memory.
//! - `runtime` drives the chat-completions tool-calling loop.
//! - `tools` holds the capability registry and the shared sale finalizer.
//! - `knowledge` chunks and indexes the corpus and answers from retrieved
//!   chunks.
//! - `llm` is the OpenAI-compatible client.

pub mod knowledge;
pub mod llm;
pub mod router;
pub mod runtime;
pub mod tools;

pub use knowledge::{ChunkIndex, KnowledgeBase, LexicalRetriever, Retriever, NO_RELEVANT_INFO};
pub use llm::{LlmClient, LlmError, OpenAiClient};
pub use router::{IntentRouter, RouterSettings};
pub use runtime::{AgentRuntime, AnsweringService};
pub use tools::{default_registry, SaleFinalizer, ToolRegistry};
