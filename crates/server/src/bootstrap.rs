use std::sync::Arc;
use std::time::Duration;

use concierge_agent::knowledge::{ChunkIndex, KnowledgeBase, KnowledgeError, LexicalRetriever};
use concierge_agent::llm::{LlmClient, LlmError, OpenAiClient};
use concierge_agent::router::{IntentRouter, RouterSettings};
use concierge_agent::runtime::AgentRuntime;
use concierge_agent::tools::{default_registry, SaleFinalizer};
use concierge_core::config::{AppConfig, ConfigError};
use concierge_db::repositories::SqlSessionRepository;
use concierge_db::{connect, migrations, DbPool};
use thiserror::Error;
use tracing::{info, warn};

use crate::notifications::NotificationHub;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub intent_router: Arc<IntentRouter>,
    pub notifications: NotificationHub,
    pub knowledge_chunks: usize,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("knowledge index unavailable: {0}")]
    Knowledge(#[from] KnowledgeError),
    #[error("llm client setup failed: {0}")]
    Llm(#[source] LlmError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    config.validate()?;
    let llm = OpenAiClient::from_config(&config.llm).map_err(BootstrapError::Llm)?;
    info!(
        event_name = "system.bootstrap.llm_configured",
        correlation_id = "bootstrap",
        model = %llm.model(),
        "llm client configured"
    );
    bootstrap_with_llm(config, Arc::new(llm)).await
}

/// Wires the application around an already-built model client.
pub async fn bootstrap_with_llm(
    config: AppConfig,
    llm: Arc<dyn LlmClient>,
) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let (index, origin) = ChunkIndex::load_or_build(&config.knowledge, false)?;
    let retriever = LexicalRetriever::new(index);
    let knowledge_chunks = retriever.len();
    if retriever.is_empty() {
        warn!(
            event_name = "system.bootstrap.knowledge_empty",
            correlation_id = "bootstrap",
            "knowledge index has no chunks; every lookup will report no information"
        );
    }
    info!(
        event_name = "system.bootstrap.knowledge_ready",
        correlation_id = "bootstrap",
        origin = ?origin,
        chunks = knowledge_chunks,
        "knowledge index ready"
    );

    let knowledge = Arc::new(KnowledgeBase::new(
        Arc::new(retriever),
        Arc::clone(&llm),
        config.knowledge.top_k,
    ));
    let notifications = NotificationHub::default();
    let sales = SaleFinalizer::new(Arc::new(notifications.clone()));
    let tools = Arc::new(default_registry(knowledge, sales.clone()));
    let runtime = AgentRuntime::new(llm, tools, config.agent.max_iterations);

    let intent_router = IntentRouter::new(
        Arc::new(runtime),
        sales,
        Arc::new(SqlSessionRepository::new(db_pool.clone())),
        config.menu.clone(),
        RouterSettings {
            answer_timeout: Duration::from_secs(config.agent.answer_timeout_secs),
            max_history_turns: config.memory.max_history_turns,
        },
    );

    Ok(Application {
        config,
        db_pool,
        intent_router: Arc::new(intent_router),
        notifications,
        knowledge_chunks,
    })
}
