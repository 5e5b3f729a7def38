use std::env;
use std::fs;
use std::path::Path;

use concierge_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG};

/// One displayed setting: dotted key, env override (if any) and rendered value.
struct Field {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult {
                exit_code: EXIT_CONFIG,
                output: format!("config validation failed: {error}"),
            };
        }
    };

    let file_path = resolve_config_path(None);
    let file_doc = file_path.as_deref().and_then(load_file_doc);

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(&field, file_doc.as_ref(), file_path.as_deref());
        lines.push(format!("- {} = {} (source: {source})", field.key, field.value));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };

    vec![
        field("database.url", &["CONCIERGE_DATABASE_URL"], config.database.url.clone()),
        field(
            "database.max_connections",
            &["CONCIERGE_DATABASE_MAX_CONNECTIONS"],
            config.database.max_connections.to_string(),
        ),
        field("llm.api_key", &["CONCIERGE_LLM_API_KEY", "OPENAI_API_KEY"], api_key.to_string()),
        field("llm.base_url", &["CONCIERGE_LLM_BASE_URL"], config.llm.base_url.clone()),
        field("llm.model", &["CONCIERGE_LLM_MODEL"], config.llm.model.clone()),
        field("llm.temperature", &["CONCIERGE_LLM_TEMPERATURE"], config.llm.temperature.to_string()),
        field("llm.max_retries", &["CONCIERGE_LLM_MAX_RETRIES"], config.llm.max_retries.to_string()),
        field(
            "agent.max_iterations",
            &["CONCIERGE_AGENT_MAX_ITERATIONS"],
            config.agent.max_iterations.to_string(),
        ),
        field(
            "agent.answer_timeout_secs",
            &["CONCIERGE_AGENT_ANSWER_TIMEOUT_SECS"],
            config.agent.answer_timeout_secs.to_string(),
        ),
        field(
            "knowledge.document_path",
            &["CONCIERGE_KNOWLEDGE_DOCUMENT_PATH"],
            config.knowledge.document_path.display().to_string(),
        ),
        field(
            "knowledge.index_path",
            &["CONCIERGE_KNOWLEDGE_INDEX_PATH"],
            config.knowledge.index_path.display().to_string(),
        ),
        field(
            "knowledge.chunk_size",
            &["CONCIERGE_KNOWLEDGE_CHUNK_SIZE"],
            config.knowledge.chunk_size.to_string(),
        ),
        field(
            "knowledge.chunk_overlap",
            &["CONCIERGE_KNOWLEDGE_CHUNK_OVERLAP"],
            config.knowledge.chunk_overlap.to_string(),
        ),
        field("knowledge.top_k", &["CONCIERGE_KNOWLEDGE_TOP_K"], config.knowledge.top_k.to_string()),
        field(
            "memory.max_history_turns",
            &["CONCIERGE_MEMORY_MAX_HISTORY_TURNS"],
            config.memory.max_history_turns.to_string(),
        ),
        field(
            "server.bind_address",
            &["CONCIERGE_SERVER_BIND_ADDRESS"],
            config.server.bind_address.clone(),
        ),
        field("server.port", &["CONCIERGE_SERVER_PORT"], config.server.port.to_string()),
        field(
            "logging.level",
            &["CONCIERGE_LOGGING_LEVEL", "CONCIERGE_LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        field(
            "logging.format",
            &["CONCIERGE_LOGGING_FORMAT", "CONCIERGE_LOG_FORMAT"],
            format!("{:?}", config.logging.format),
        ),
    ]
}

fn field(key: &'static str, env_keys: &'static [&'static str], value: String) -> Field {
    Field { key, env_keys, value }
}

fn load_file_doc(path: &Path) -> Option<Value> {
    fs::read_to_string(path).ok()?.parse::<Value>().ok()
}

fn field_source(field: &Field, file_doc: Option<&Value>, file_path: Option<&Path>) -> String {
    if let Some(env_key) = field.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if file_doc.is_some_and(|doc| contains_path(doc, field.key)) {
        let file_path = file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    key_path.split('.').try_fold(root, |current, key| current.get(key)).is_some()
}

#[cfg(test)]
mod tests {
    use super::contains_path;

    #[test]
    fn nested_keys_are_found_in_toml_documents() {
        let doc: toml::Value = "[llm]\nmodel = \"gpt-4o-mini\"\n".parse().expect("toml");
        assert!(contains_path(&doc, "llm.model"));
        assert!(!contains_path(&doc, "llm.base_url"));
        assert!(!contains_path(&doc, "server.port"));
    }
}
