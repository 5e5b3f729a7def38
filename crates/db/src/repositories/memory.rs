use std::collections::HashMap;

use tokio::sync::RwLock;

use concierge_core::domain::event::SessionId;
use concierge_core::domain::session::Turn;

use super::{RepositoryError, SessionRepository};

/// Process-local history. Lost on restart; used by tests and when no
/// database is configured.
#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<String, Vec<Turn>>>,
}

#[async_trait::async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn load_recent(
        &self,
        session_id: &SessionId,
        limit: u32,
    ) -> Result<Vec<Turn>, RepositoryError> {
        let sessions = self.sessions.read().await;
        let Some(turns) = sessions.get(session_id.as_str()) else {
            return Ok(Vec::new());
        };

        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let skip = turns.len().saturating_sub(limit);
        Ok(turns[skip..].to_vec())
    }

    async fn append(&self, session_id: &SessionId, turns: &[Turn]) -> Result<(), RepositoryError> {
        if turns.is_empty() {
            return Ok(());
        }

        let mut sessions = self.sessions.write().await;
        sessions.entry(session_id.as_str().to_string()).or_default().extend_from_slice(turns);
        Ok(())
    }
}
