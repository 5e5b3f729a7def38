use concierge_agent::knowledge::{ChunkIndex, IndexOrigin};
use serde_json::json;

use crate::commands::{load_config, CommandResult, EXIT_KNOWLEDGE};

pub fn run(rebuild: bool) -> CommandResult {
    let config = match load_config("index") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    match ChunkIndex::load_or_build(&config.knowledge, rebuild) {
        Ok((index, origin)) => {
            let verb = match origin {
                IndexOrigin::Loaded => "loaded existing",
                IndexOrigin::Built => "built",
            };
            CommandResult::success_with(
                "index",
                format!("{verb} knowledge index with {} chunks", index.chunks.len()),
                Some(json!({
                    "origin": verb,
                    "chunks": index.chunks.len(),
                    "document_path": config.knowledge.document_path.display().to_string(),
                    "index_file": ChunkIndex::file_path(&config.knowledge.index_path).display().to_string(),
                })),
            )
        }
        Err(error) => CommandResult::failure("index", "knowledge_index", error.to_string(), EXIT_KNOWLEDGE),
    }
}
