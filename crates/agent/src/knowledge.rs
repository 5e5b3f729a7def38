//! Knowledge corpus: chunking, the on-disk chunk index, retrieval, and the
//! retrieval-augmented answer step used by `process_knowledge_query`.
//!
//! Retrieval sits behind [`Retriever`]. The shipped [`LexicalRetriever`]
//! scores chunks by shared terms weighted by inverse chunk frequency; a vector
//! store can replace it without touching callers.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use concierge_core::config::KnowledgeConfig;

use crate::llm::{ChatMessage, LlmClient, LlmError};

/// Marker returned when the corpus has nothing useful for a query.
pub const NO_RELEVANT_INFO: &str = "NO_RELEVANT_INFO";

pub const INDEX_FILE_NAME: &str = "index.json";
pub const PLACEHOLDER_CORPUS: &str = "No knowledge documents were found for retrieval.";
pub const KNOWLEDGE_SERVICE_APOLOGY: &str =
    "Sorry, there was a problem with the AI service while searching for information.";

const INDEX_FORMAT_VERSION: u32 = 1;

const ANSWER_PROMPT: &str = "Use the following pieces of context to answer the question at the \
end. If the context does not contain the answer, reply with exactly NO_RELEVANT_INFO and nothing \
else. Do not make up an answer.";

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("could not access `{path}`: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("knowledge index `{path}` is corrupt: {source}")]
    Corrupt { path: PathBuf, source: serde_json::Error },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: usize,
    /// Character offset of the chunk in the source document.
    pub start_index: usize,
    pub text: String,
}

/// Splits `text` into windows of at most `chunk_size` characters that overlap
/// by roughly `chunk_overlap`, cutting at whitespace where one is available.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = (start + chunk_size).min(chars.len());
        if end < chars.len() {
            if let Some(split) = (start + 1..end).rev().find(|&index| chars[index].is_whitespace())
            {
                end = split;
            }
        }

        let window = &chars[start..end];
        let leading = window.iter().take_while(|c| c.is_whitespace()).count();
        let body: String = window[leading..].iter().collect();
        let body = body.trim_end();
        if !body.is_empty() {
            chunks.push(Chunk {
                id: chunks.len(),
                start_index: start + leading,
                text: body.to_string(),
            });
        }

        if end >= chars.len() {
            break;
        }
        let mut next = end.saturating_sub(chunk_overlap).max(start + 1);
        // Start the next window on a word boundary when the overlap lands mid-word.
        while next < end && !chars[next - 1].is_whitespace() {
            next += 1;
        }
        start = next;
    }

    chunks
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexOrigin {
    Loaded,
    Built,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkIndex {
    pub version: u32,
    pub source: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub chunks: Vec<Chunk>,
}

impl ChunkIndex {
    pub fn build(source: &Path, text: &str, chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            version: INDEX_FORMAT_VERSION,
            source: source.to_path_buf(),
            chunk_size,
            chunk_overlap,
            chunks: chunk_text(text, chunk_size, chunk_overlap),
        }
    }

    pub fn file_path(index_dir: &Path) -> PathBuf {
        index_dir.join(INDEX_FILE_NAME)
    }

    pub fn load(index_dir: &Path) -> Result<Option<Self>, KnowledgeError> {
        let path = Self::file_path(index_dir);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(KnowledgeError::Io { path, source }),
        };
        serde_json::from_str(&raw).map(Some).map_err(|source| KnowledgeError::Corrupt { path, source })
    }

    pub fn save(&self, index_dir: &Path) -> Result<(), KnowledgeError> {
        std::fs::create_dir_all(index_dir)
            .map_err(|source| KnowledgeError::Io { path: index_dir.to_path_buf(), source })?;
        let path = Self::file_path(index_dir);
        let raw = serde_json::to_string_pretty(self)
            .map_err(|source| KnowledgeError::Corrupt { path: path.clone(), source })?;
        std::fs::write(&path, raw).map_err(|source| KnowledgeError::Io { path, source })
    }

    /// Loads the persisted index, or builds it from the source document and
    /// saves it. `rebuild` ignores any existing index.
    pub fn load_or_build(
        config: &KnowledgeConfig,
        rebuild: bool,
    ) -> Result<(Self, IndexOrigin), KnowledgeError> {
        if !rebuild {
            if let Some(index) = Self::load(&config.index_path)? {
                info!(
                    event_name = "agent.knowledge.index_loaded",
                    path = %config.index_path.display(),
                    chunks = index.chunks.len(),
                    "knowledge index loaded"
                );
                return Ok((index, IndexOrigin::Loaded));
            }
        }

        let text = read_corpus(&config.document_path)?;
        let index =
            Self::build(&config.document_path, &text, config.chunk_size, config.chunk_overlap);
        index.save(&config.index_path)?;
        info!(
            event_name = "agent.knowledge.index_built",
            path = %config.index_path.display(),
            chunks = index.chunks.len(),
            "knowledge index built"
        );
        Ok((index, IndexOrigin::Built))
    }
}

fn read_corpus(path: &Path) -> Result<String, KnowledgeError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            warn!(
                event_name = "agent.knowledge.document_missing",
                path = %path.display(),
                "knowledge document not found, indexing placeholder text"
            );
            Ok(PLACEHOLDER_CORPUS.to_string())
        }
        Err(source) => Err(KnowledgeError::Io { path: path.to_path_buf(), source }),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f64,
}

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Up to `limit` chunks relevant to `query`, best first. Never returns
    /// chunks with a zero score.
    async fn retrieve(&self, query: &str, limit: usize) -> Vec<ScoredChunk>;
}

fn terms(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|term| term.chars().count() > 1)
        .map(str::to_lowercase)
        .collect()
}

pub struct LexicalRetriever {
    chunks: Vec<(Chunk, BTreeSet<String>)>,
    chunk_frequency: HashMap<String, usize>,
}

impl LexicalRetriever {
    pub fn new(index: ChunkIndex) -> Self {
        let chunks: Vec<(Chunk, BTreeSet<String>)> = index
            .chunks
            .into_iter()
            .map(|chunk| {
                let chunk_terms = terms(&chunk.text);
                (chunk, chunk_terms)
            })
            .collect();

        let mut chunk_frequency = HashMap::new();
        for (_, chunk_terms) in &chunks {
            for term in chunk_terms {
                *chunk_frequency.entry(term.clone()).or_insert(0) += 1;
            }
        }

        Self { chunks, chunk_frequency }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn weight(&self, term: &str) -> f64 {
        let total = self.chunks.len() as f64;
        let frequency = self.chunk_frequency.get(term).copied().unwrap_or(0) as f64;
        if frequency == 0.0 {
            return 0.0;
        }
        (1.0 + total / frequency).ln()
    }
}

#[async_trait]
impl Retriever for LexicalRetriever {
    async fn retrieve(&self, query: &str, limit: usize) -> Vec<ScoredChunk> {
        let query_terms = terms(query);
        let mut scored: Vec<ScoredChunk> = self
            .chunks
            .iter()
            .filter_map(|(chunk, chunk_terms)| {
                let score: f64 = query_terms
                    .iter()
                    .filter(|term| chunk_terms.contains(*term))
                    .map(|term| self.weight(term))
                    .sum();
                (score > 0.0).then(|| ScoredChunk { chunk: chunk.clone(), score })
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.chunk.id.cmp(&b.chunk.id)));
        scored.truncate(limit);
        scored
    }
}

/// Retrieval plus a single grounded LLM call.
pub struct KnowledgeBase {
    retriever: Arc<dyn Retriever>,
    llm: Arc<dyn LlmClient>,
    top_k: usize,
}

impl KnowledgeBase {
    pub fn new(retriever: Arc<dyn Retriever>, llm: Arc<dyn LlmClient>, top_k: usize) -> Self {
        Self { retriever, llm, top_k }
    }

    /// Tool-facing answer. Yields [`NO_RELEVANT_INFO`] when nothing relevant
    /// was found or the step failed unexpectedly, and a short apology when the
    /// model service is down.
    pub async fn answer(&self, query: &str) -> String {
        match self.grounded_answer(query).await {
            Ok(Some(answer)) => answer,
            Ok(None) => NO_RELEVANT_INFO.to_string(),
            Err(error) if !matches!(error, LlmError::Decode(_)) => {
                warn!(
                    event_name = "agent.knowledge.llm_error",
                    error = %error,
                    "knowledge answer failed on the model service"
                );
                KNOWLEDGE_SERVICE_APOLOGY.to_string()
            }
            Err(error) => {
                warn!(
                    event_name = "agent.knowledge.unexpected_error",
                    error = %error,
                    "knowledge answer failed unexpectedly"
                );
                NO_RELEVANT_INFO.to_string()
            }
        }
    }

    async fn grounded_answer(&self, query: &str) -> Result<Option<String>, LlmError> {
        let hits = self.retriever.retrieve(query, self.top_k).await;
        if hits.is_empty() {
            return Ok(None);
        }

        let context =
            hits.iter().map(|hit| hit.chunk.text.as_str()).collect::<Vec<_>>().join("\n\n");
        let messages = vec![
            ChatMessage::System(ANSWER_PROMPT.to_string()),
            ChatMessage::User(format!("Context:\n{context}\n\nQuestion: {query}\nHelpful answer:")),
        ];

        let completion = self.llm.complete(&messages, &[]).await?;
        Ok(completion.text.filter(|text| !text.contains(NO_RELEVANT_INFO)))
    }
}
