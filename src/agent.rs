//! Question answering agent: index lifecycle, difficulty routing and batching

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::chunker::Chunker;
use crate::config::AppConfig;
use crate::corpus::CorpusLoader;
use crate::corpus::DocumentSource;
use crate::difficulty::DifficultyClassifier;
use crate::difficulty::DifficultyTier;
use crate::embeddings::create_embedding_service;
use crate::errors::Result;
use crate::errors::TierRagError;
use crate::index::EmbeddingIndex;
use crate::index::RetrievalIndex;
use crate::llm::create_completion_service;
use crate::llm::TextCompletionService;
use crate::models::AnswerRecord;
use crate::models::SearchResult;
use crate::rag::create_strategy;
use crate::rag::AnswerAssembler;
use crate::rag::StrategyDeps;
use crate::rerank::create_rerank_model;
use crate::rerank::RerankModel;
use crate::rerank::Reranker;

/// Chunk counts per tier
pub type TierCounts = BTreeMap<DifficultyTier, usize>;

/// Result of an indexing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    /// The collections were rebuilt from the document source
    Indexed { counts: TierCounts },
    /// The index already holds chunks and no rebuild was forced
    Existing { counts: TierCounts },
}

impl IndexOutcome {
    pub const fn counts(&self) -> &TierCounts {
        match self {
            Self::Indexed { counts } | Self::Existing { counts } => counts,
        }
    }
}

pub struct QaAgent {
    classifier: DifficultyClassifier,
    source: Arc<dyn DocumentSource>,
    chunker: Chunker,
    deps: StrategyDeps,
    assembler: AnswerAssembler,
}

impl QaAgent {
    /// Build the agent and its collaborators from configuration
    ///
    /// # Errors
    /// - Invalid configuration (chunk sizes, override patterns, providers)
    /// - Missing API keys for remote providers
    /// - Unreadable index snapshot directory
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let embedder = create_embedding_service(&config.embeddings)?;
        info!("Using embedding model {}", embedder.model_name());
        let index = EmbeddingIndex::open(
            embedder,
            config.embeddings.batch_size,
            config.index.path.clone(),
        )
        .await?;
        let llm = create_completion_service(&config.llm)?;
        let rerank_model = create_rerank_model(&config.reranker)?;

        Self::from_parts(
            config,
            Arc::new(CorpusLoader::from_config(&config.corpus)),
            Arc::new(index),
            llm,
            rerank_model,
        )
    }

    /// Build the agent around already constructed collaborators
    ///
    /// # Errors
    /// Returns `InvalidConfiguration` when `config` does not validate
    pub fn from_parts(
        config: &AppConfig,
        source: Arc<dyn DocumentSource>,
        index: Arc<dyn RetrievalIndex>,
        llm: Arc<dyn TextCompletionService>,
        rerank_model: Arc<dyn RerankModel>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            classifier: DifficultyClassifier::with_overrides(&config.difficulty.overrides)?,
            source,
            chunker: Chunker::new(config.chunking.clone()),
            deps: StrategyDeps::new(config, index, llm, Reranker::new(rerank_model)),
            assembler: AnswerAssembler::new(),
        })
    }

    pub fn classifier(&self) -> &DifficultyClassifier {
        &self.classifier
    }

    /// Chunk counts of every tier collection
    pub async fn stats(&self) -> Result<TierCounts> {
        let mut counts = TierCounts::new();
        for tier in DifficultyTier::ALL {
            counts.insert(tier, self.deps.index.stats(tier).await?);
        }
        Ok(counts)
    }

    /// Empty every tier collection and flush the change
    pub async fn clear(&self) -> Result<()> {
        for tier in DifficultyTier::ALL {
            self.deps.index.clear(tier).await?;
        }
        self.deps.index.persist().await?;
        info!("Cleared all tier collections");
        Ok(())
    }

    /// Load, chunk and index the corpus for all three tiers.
    ///
    /// An index that already holds chunks is left untouched unless `force`
    /// is set; the caller decides whether to confirm a rebuild.
    ///
    /// # Errors
    /// - Corpus root missing
    /// - Chunking policy invalid for a tier
    /// - Embedding service failures
    pub async fn index_documents(&self, force: bool) -> Result<IndexOutcome> {
        let existing = self.stats().await?;
        if !force && existing.values().any(|&n| n > 0) {
            info!("Index already populated: {:?}", existing);
            return Ok(IndexOutcome::Existing { counts: existing });
        }

        let documents = self.source.load()?;
        if documents.is_empty() {
            warn!("Document source returned no documents");
        }
        info!("Indexing {} documents", documents.len());

        // Existing collections survive until every tier has chunked cleanly
        let mut batches = Vec::with_capacity(DifficultyTier::ALL.len());
        for tier in DifficultyTier::ALL {
            batches.push((tier, self.chunker.chunk(tier, &documents)?));
        }

        for tier in DifficultyTier::ALL {
            self.deps.index.clear(tier).await?;
        }

        let mut counts = TierCounts::new();
        for (tier, chunks) in batches {
            let start = Instant::now();
            let added = self.deps.index.add_documents(chunks, tier).await?;
            info!(
                "Indexed {} {} chunks in {:.2}s",
                added,
                tier,
                start.elapsed().as_secs_f64()
            );
            counts.insert(tier, added);
        }

        self.deps.index.persist().await?;
        Ok(IndexOutcome::Indexed { counts })
    }

    /// Answer one question, classifying it when no tier is given
    ///
    /// # Errors
    /// - `InvalidInput` for an empty question
    /// - Upstream failures from retrieval, reranking or the language model
    pub async fn answer_question(
        &self,
        question_id: &str,
        question: &str,
        tier: Option<DifficultyTier>,
    ) -> Result<AnswerRecord> {
        if question.trim().is_empty() {
            return Err(TierRagError::InvalidInput(format!(
                "question {question_id} has no text"
            )));
        }

        let tier = tier.unwrap_or_else(|| self.classifier.classify_question(question_id, Some(question)));
        info!("Question {} routed to {} strategy", question_id, tier);

        let start = Instant::now();
        let strategy = create_strategy(tier, self.deps.clone());
        let outcome = strategy.retrieve_and_answer(question).await?;
        let elapsed = start.elapsed();
        debug!("Question {} answered in {:.2}s", question_id, elapsed.as_secs_f64());

        Ok(self
            .assembler
            .assemble(question_id, question, tier, outcome, elapsed))
    }

    /// Answer questions one after another; a failing question becomes an
    /// error record and the batch continues.
    pub async fn batch_answer(&self, questions: &[(String, String)]) -> Vec<AnswerRecord> {
        let total = questions.len();
        let mut records = Vec::with_capacity(total);

        for (i, (question_id, question)) in questions.iter().enumerate() {
            info!("Processing question {}/{}: {}", i + 1, total, question_id);
            let start = Instant::now();
            let record = match self.answer_question(question_id, question, None).await {
                Ok(record) => record,
                Err(e) => {
                    warn!("Question {} failed: {}", question_id, e);
                    let tier = self.classifier.classify_question(question_id, Some(question));
                    self.assembler
                        .error_record(question_id, question, tier, &e, start.elapsed())
                }
            };
            records.push(record);
        }

        let failed = records.iter().filter(|r| r.is_error()).count();
        info!("Batch finished: {} answered, {} failed", total - failed, failed);
        records
    }

    /// Raw similarity search against one tier collection
    pub async fn search(
        &self,
        query: &str,
        tier: DifficultyTier,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        self.deps.index.search(query, tier, limit, None).await
    }
}
