use async_trait::async_trait;
use thiserror::Error;

use concierge_core::domain::event::SessionId;
use concierge_core::domain::session::Turn;

pub mod memory;
pub mod session;

pub use memory::InMemorySessionRepository;
pub use session::SqlSessionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Session-keyed conversation history.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Most recent `limit` turns of the session, oldest first.
    async fn load_recent(
        &self,
        session_id: &SessionId,
        limit: u32,
    ) -> Result<Vec<Turn>, RepositoryError>;

    /// Appends turns after the last recorded one, preserving their order.
    async fn append(&self, session_id: &SessionId, turns: &[Turn]) -> Result<(), RepositoryError>;
}
