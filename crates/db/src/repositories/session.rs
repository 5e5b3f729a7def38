use chrono::{SecondsFormat, Utc};
use sqlx::Row;

use concierge_core::domain::event::SessionId;
use concierge_core::domain::session::{Speaker, Turn};

use super::{RepositoryError, SessionRepository};
use crate::DbPool;

pub struct SqlSessionRepository {
    pool: DbPool,
}

impl SqlSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SessionRepository for SqlSessionRepository {
    async fn load_recent(
        &self,
        session_id: &SessionId,
        limit: u32,
    ) -> Result<Vec<Turn>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT speaker, utterance FROM (
                 SELECT speaker, utterance, turn_number
                 FROM conversation_turn
                 WHERE session_id = ?
                 ORDER BY turn_number DESC
                 LIMIT ?
             ) ORDER BY turn_number ASC",
        )
        .bind(session_id.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_turn).collect()
    }

    async fn append(&self, session_id: &SessionId, turns: &[Turn]) -> Result<(), RepositoryError> {
        if turns.is_empty() {
            return Ok(());
        }

        let recorded_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut tx = self.pool.begin().await?;
        for turn in turns {
            // Numbering is computed inside the statement so concurrent writers cannot interleave.
            sqlx::query(
                "INSERT INTO conversation_turn (session_id, turn_number, speaker, utterance, recorded_at)
                 SELECT ?, COALESCE(MAX(turn_number), 0) + 1, ?, ?, ?
                 FROM conversation_turn
                 WHERE session_id = ?",
            )
            .bind(session_id.as_str())
            .bind(turn.speaker.as_str())
            .bind(&turn.utterance)
            .bind(&recorded_at)
            .bind(session_id.as_str())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }
}

fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<Turn, RepositoryError> {
    let speaker: String =
        row.try_get("speaker").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let utterance: String =
        row.try_get("utterance").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let speaker =
        speaker.parse::<Speaker>().map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Turn { speaker, utterance })
}

#[cfg(test)]
mod tests {
    use concierge_core::domain::event::SessionId;
    use concierge_core::domain::session::Turn;

    use super::SqlSessionRepository;
    use crate::repositories::SessionRepository;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn session(id: &str) -> SessionId {
        SessionId(format!("projects/demo/agent/sessions/{id}"))
    }

    #[tokio::test]
    async fn appended_turns_are_replayed_in_order() {
        let pool = setup().await;
        let repo = SqlSessionRepository::new(pool.clone());
        let session = session("ordered");

        repo.append(&session, &[Turn::user("hola"), Turn::assistant("Hi! How can I help?")])
            .await
            .expect("first append");
        repo.append(&session, &[Turn::user("what is the weather in Cali?")])
            .await
            .expect("second append");

        let history = repo.load_recent(&session, 10).await.expect("load");
        assert_eq!(
            history,
            vec![
                Turn::user("hola"),
                Turn::assistant("Hi! How can I help?"),
                Turn::user("what is the weather in Cali?"),
            ]
        );

        let numbers: Vec<i64> = sqlx::query_scalar(
            "SELECT turn_number FROM conversation_turn WHERE session_id = ? ORDER BY turn_number",
        )
        .bind(session.as_str())
        .fetch_all(&pool)
        .await
        .expect("turn numbers");
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn load_recent_keeps_only_the_latest_turns() {
        let repo = SqlSessionRepository::new(setup().await);
        let session = session("window");

        for index in 0..6 {
            repo.append(&session, &[Turn::user(format!("message {index}"))])
                .await
                .expect("append");
        }

        let history = repo.load_recent(&session, 2).await.expect("load");
        assert_eq!(history, vec![Turn::user("message 4"), Turn::user("message 5")]);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let repo = SqlSessionRepository::new(setup().await);
        let first = session("first");
        let second = session("second");

        repo.append(&first, &[Turn::user("only in first")]).await.expect("append");

        assert_eq!(repo.load_recent(&first, 10).await.expect("load").len(), 1);
        assert!(repo.load_recent(&second, 10).await.expect("load").is_empty());
    }

    #[tokio::test]
    async fn empty_append_is_a_no_op() {
        let repo = SqlSessionRepository::new(setup().await);
        let session = session("empty");

        repo.append(&session, &[]).await.expect("append nothing");
        assert!(repo.load_recent(&session, 10).await.expect("load").is_empty());
    }
}
