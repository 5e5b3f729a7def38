use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use concierge_agent::llm::{ChatCompletion, ChatMessage, LlmClient, LlmError};
use concierge_agent::tools::ToolDescriptor;
use concierge_core::config::AppConfig;
use concierge_core::domain::notification::NEW_SALE_NOTIFICATION;
use concierge_core::domain::reply::DEFAULT_APOLOGY;
use concierge_core::menu::MenuTemplates;
use concierge_server::app;
use concierge_server::bootstrap::{bootstrap_with_llm, Application};
use concierge_server::webhook::WEBHOOK_BODY_LIMIT;

/// Echoes the latest user message and records how many messages it saw.
#[derive(Default)]
struct EchoLlm {
    message_counts: Mutex<Vec<usize>>,
}

#[async_trait]
impl LlmClient for EchoLlm {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolDescriptor],
    ) -> Result<ChatCompletion, LlmError> {
        self.message_counts.lock().expect("counts").push(messages.len());
        let last_user = messages
            .iter()
            .rev()
            .find_map(|message| match message {
                ChatMessage::User(text) => Some(text.clone()),
                _ => None,
            })
            .unwrap_or_default();
        Ok(ChatCompletion { text: Some(format!("echo: {last_user}")), tool_calls: Vec::new() })
    }
}

struct TestApp {
    app: Application,
    routes: Router,
    llm: Arc<EchoLlm>,
    _dir: tempfile::TempDir,
}

async fn start() -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let document = dir.path().join("documento.txt");
    std::fs::write(&document, "Store hours are listed on the website.").expect("write corpus");

    let mut config = AppConfig::default();
    config.database.url = "sqlite::memory:".to_string();
    config.database.max_connections = 1;
    config.llm.api_key = Some("sk-test-placeholder".to_string().into());
    config.knowledge.document_path = document;
    config.knowledge.index_path = dir.path().join("knowledge_index");

    let llm = Arc::new(EchoLlm::default());
    let app = bootstrap_with_llm(config, llm.clone()).await.expect("bootstrap");
    let routes = app::router(&app);
    TestApp { app, routes, llm, _dir: dir }
}

async fn post_webhook(routes: &Router, body: impl Into<Body>, content_type: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", content_type)
        .body(body.into())
        .expect("request");
    let response = routes.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

fn dialogflow(intent: &str, text: &str, parameters: Value) -> String {
    json!({
        "session": "projects/demo/agent/sessions/integration",
        "queryResult": {
            "queryText": text,
            "intent": { "displayName": intent },
            "parameters": parameters,
        }
    })
    .to_string()
}

#[tokio::test]
async fn menu_intent_answers_with_template_regardless_of_content_type() {
    let test = start().await;

    let (status, body) = post_webhook(
        &test.routes,
        dialogflow("MenuOpcion_Contacto", "contact", json!({})),
        "text/plain",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fulfillmentText"], MenuTemplates::default().contact);
    assert_eq!(body["fulfillmentMessages"][0]["text"]["text"][0], body["fulfillmentText"]);
    assert!(test.llm.message_counts.lock().expect("counts").is_empty());
    assert_eq!(stored_turns(&test).await, 0, "menu replies are not remembered");
}

async fn stored_turns(test: &TestApp) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM conversation_turn")
        .fetch_one(&test.app.db_pool)
        .await
        .expect("count")
}

#[tokio::test]
async fn unparseable_body_still_gets_an_apology() {
    let test = start().await;

    let (status, body) = post_webhook(&test.routes, "{ definitely not json", "application/json").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fulfillmentText"], DEFAULT_APOLOGY);
}

#[tokio::test]
async fn oversized_body_gets_an_apology_instead_of_413() {
    let test = start().await;
    let text = "a".repeat(WEBHOOK_BODY_LIMIT + 1024);

    let (status, body) = post_webhook(
        &test.routes,
        dialogflow("Default Fallback Intent", &text, json!({})),
        "application/json",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fulfillmentText"], DEFAULT_APOLOGY);
    assert!(test.llm.message_counts.lock().expect("counts").is_empty());
}

#[tokio::test]
async fn fallback_turns_reach_the_agent_with_history() {
    let test = start().await;

    let (_, first) =
        post_webhook(&test.routes, dialogflow("Default Fallback Intent", "hello", json!({})), "application/json")
            .await;
    let (_, second) =
        post_webhook(&test.routes, dialogflow("Default Fallback Intent", "again", json!({})), "application/json")
            .await;

    assert_eq!(first["fulfillmentText"], "echo: hello");
    assert_eq!(second["fulfillmentText"], "echo: again");
    // system + query, then system + two remembered turns + query
    assert_eq!(*test.llm.message_counts.lock().expect("counts"), vec![2, 4]);

    assert_eq!(stored_turns(&test).await, 4);
}

#[tokio::test]
async fn confirmed_sale_is_broadcast_to_subscribers() {
    let test = start().await;
    let mut subscriber = test.app.notifications.subscribe();

    let (status, body) = post_webhook(
        &test.routes,
        dialogflow(
            "Confirmar_Venta_Intent",
            "yes",
            json!({ "producto": "Laptop Pro", "cliente": "Ana" }),
        ),
        "application/json",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let text = body["fulfillmentText"].as_str().expect("text");
    assert!(text.contains("Laptop Pro") && text.contains("Ana"));

    let frame = subscriber.recv().await.expect("notification").frame();
    assert_eq!(frame["event"], NEW_SALE_NOTIFICATION);
    assert_eq!(frame["payload"]["product"], "Laptop Pro");
    assert_eq!(frame["payload"]["client"], "Ana");
    assert!(subscriber.try_recv().is_err(), "exactly one notification per sale");
    assert_eq!(stored_turns(&test).await, 0);
}

#[tokio::test]
async fn health_reports_ready_after_bootstrap() {
    let test = start().await;

    let response = test
        .routes
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let body: Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(body["database"]["status"], "ready");
    assert_eq!(body["knowledge"]["status"], "ready");
}
