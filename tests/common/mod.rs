//! In-process fakes for the LLM, retrieval and rerank ports

#![allow(dead_code)]

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use tierrag::difficulty::DifficultyTier;
use tierrag::index::MetadataFilter;
use tierrag::index::RetrievalIndex;
use tierrag::llm::ChatMessage;
use tierrag::llm::TextCompletionService;
use tierrag::models::Chunk;
use tierrag::models::Document;
use tierrag::models::Metadata;
use tierrag::models::SearchResult;
use tierrag::rerank::RerankModel;
use tierrag::AppConfig;
use tierrag::QaAgent;
use tierrag::Result;
use tierrag::TierRagError;

pub fn metadata(source: &str, page: i64) -> Metadata {
    json!({"source": source, "page": page})
        .as_object()
        .cloned()
        .unwrap_or_default()
}

pub fn hit(source: &str, page: i64, content: &str) -> SearchResult {
    SearchResult {
        content: content.to_string(),
        metadata: metadata(source, page),
        distance: Some(0.1),
    }
}

/// One recorded completion request
#[derive(Debug, Clone)]
pub struct CompletionCall {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

/// Language model replying from a queue, then with a default answer
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    default_reply: String,
    calls: Mutex<Vec<CompletionCall>>,
}

impl ScriptedLlm {
    pub fn new(default_reply: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            default_reply: default_reply.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(self, text: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(self, message: &str) -> Self {
        self.replies.lock().unwrap().push_back(Err(message.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<CompletionCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextCompletionService for ScriptedLlm {
    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String> {
        self.calls.lock().unwrap().push(CompletionCall {
            messages: messages.to_vec(),
            temperature,
        });
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(TierRagError::upstream("llm", message)),
            None => Ok(self.default_reply.clone()),
        }
    }
}

/// Index returning canned hits per tier, optionally per exact query
#[derive(Default)]
pub struct CannedIndex {
    by_tier: HashMap<DifficultyTier, Vec<SearchResult>>,
    by_query: HashMap<String, Vec<SearchResult>>,
    searches: Mutex<Vec<(String, DifficultyTier, usize)>>,
}

impl CannedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tier(mut self, tier: DifficultyTier, hits: Vec<SearchResult>) -> Self {
        self.by_tier.insert(tier, hits);
        self
    }

    pub fn with_query(mut self, query: &str, hits: Vec<SearchResult>) -> Self {
        self.by_query.insert(query.to_string(), hits);
        self
    }

    pub fn searches(&self) -> Vec<(String, DifficultyTier, usize)> {
        self.searches.lock().unwrap().clone()
    }
}

#[async_trait]
impl RetrievalIndex for CannedIndex {
    async fn search(
        &self,
        query: &str,
        tier: DifficultyTier,
        top_k: usize,
        _filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        self.searches
            .lock()
            .unwrap()
            .push((query.to_string(), tier, top_k));
        let hits = self
            .by_query
            .get(query)
            .or_else(|| self.by_tier.get(&tier))
            .cloned()
            .unwrap_or_default();
        Ok(hits.into_iter().take(top_k).collect())
    }

    async fn add_documents(&self, chunks: Vec<Chunk>, _tier: DifficultyTier) -> Result<usize> {
        Ok(chunks.len())
    }

    async fn stats(&self, tier: DifficultyTier) -> Result<usize> {
        Ok(self.by_tier.get(&tier).map_or(0, Vec::len))
    }

    async fn clear(&self, _tier: DifficultyTier) -> Result<()> {
        Ok(())
    }
}

/// Scores a document by how many times it mentions `needle`
pub struct NeedleRerank {
    pub needle: String,
}

#[async_trait]
impl RerankModel for NeedleRerank {
    async fn score(&self, _query: &str, document: &str) -> Result<f32> {
        Ok(document.matches(self.needle.as_str()).count() as f32)
    }
}

pub fn agent_with(index: Arc<dyn RetrievalIndex>, llm: Arc<ScriptedLlm>) -> QaAgent {
    let documents: Vec<Document> = Vec::new();
    QaAgent::from_parts(
        &AppConfig::default(),
        Arc::new(documents),
        index,
        llm,
        Arc::new(NeedleRerank {
            needle: "interlocking".to_string(),
        }),
    )
    .unwrap()
}
