//! Tiered retrieval-augmented answering
//!
//! Each difficulty tier has its own strategy:
//! - Basic: precise retrieval, metadata prefilter and rerank to one passage
//! - Intermediate: broad retrieval synthesized over the dominant source
//! - Advanced: question decomposition and multi-document synthesis
//!
//! # Examples
//!
//! ```rust,no_run
//! use tierrag::difficulty::DifficultyTier;
//! use tierrag::rag::create_strategy;
//! # use tierrag::rag::StrategyDeps;
//!
//! # async fn run(deps: StrategyDeps) -> tierrag::Result<()> {
//! let strategy = create_strategy(DifficultyTier::Intermediate, deps);
//! let outcome = strategy.retrieve_and_answer("Summarize the safety chapter").await?;
//! println!("{} ({} sources)", outcome.answer, outcome.sources.len());
//! # Ok(())
//! # }
//! ```

pub mod advanced;
pub mod assembler;
pub mod basic;
pub mod intermediate;

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

pub use advanced::AdvancedStrategy;
pub use assembler::AnswerAssembler;
pub use assembler::AnswerCard;
pub use basic::BasicStrategy;
pub use intermediate::IntermediateStrategy;

use crate::config::AppConfig;
use crate::config::MetadataFilterConfig;
use crate::config::RetrievalConfig;
use crate::difficulty::DifficultyTier;
use crate::errors::Result;
use crate::index::RetrievalIndex;
use crate::llm::TextCompletionService;
use crate::models::SearchResult;
use crate::models::StrategyOutcome;
use crate::rerank::Reranker;

/// Retrieve-then-answer behavior of one difficulty tier
#[async_trait]
pub trait Strategy: Send + Sync {
    fn tier(&self) -> DifficultyTier;

    /// Never fails on empty retrieval; returns [`StrategyOutcome::empty`] instead
    async fn retrieve_and_answer(&self, question: &str) -> Result<StrategyOutcome>;
}

/// Collaborators and settings shared by every strategy
#[derive(Clone)]
pub struct StrategyDeps {
    pub index: Arc<dyn RetrievalIndex>,
    pub llm: Arc<dyn TextCompletionService>,
    pub reranker: Reranker,
    pub retrieval: RetrievalConfig,
    pub metadata_filter: MetadataFilterConfig,
}

impl StrategyDeps {
    pub fn new(
        config: &AppConfig,
        index: Arc<dyn RetrievalIndex>,
        llm: Arc<dyn TextCompletionService>,
        reranker: Reranker,
    ) -> Self {
        Self {
            index,
            llm,
            reranker,
            retrieval: config.retrieval.clone(),
            metadata_filter: config.metadata_filter,
        }
    }
}

pub fn create_strategy(tier: DifficultyTier, deps: StrategyDeps) -> Box<dyn Strategy> {
    match tier {
        DifficultyTier::Basic => Box::new(BasicStrategy::new(deps)),
        DifficultyTier::Intermediate => Box::new(IntermediateStrategy::new(deps)),
        DifficultyTier::Advanced => Box::new(AdvancedStrategy::new(deps)),
    }
}

/// Factory keyed on a tier tag; an unrecognized tag is an `UnknownTier` error
pub fn create_strategy_for_tag(tag: &str, deps: StrategyDeps) -> Result<Box<dyn Strategy>> {
    let tier: DifficultyTier = tag.parse()?;
    Ok(create_strategy(tier, deps))
}

/// `[source, page]` citations in first-seen order, without duplicates
pub fn ordered_citations(documents: &[SearchResult]) -> Vec<String> {
    let mut citations: Vec<String> = Vec::new();
    for doc in documents {
        let citation = doc.citation();
        if !citations.contains(&citation) {
            citations.push(citation);
        }
    }
    citations
}

/// `[source, page]` citations as a sorted set
pub fn sorted_citations(documents: &[SearchResult]) -> Vec<String> {
    documents
        .iter()
        .map(SearchResult::citation)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;
    use serde_json::json;

    fn hit(source: &str, page: i64) -> SearchResult {
        let metadata: Metadata = json!({"source": source, "page": page})
            .as_object()
            .cloned()
            .unwrap();
        SearchResult {
            content: String::new(),
            metadata,
            distance: None,
        }
    }

    #[test]
    fn test_ordered_citations_dedupe_first_seen() {
        let docs = vec![hit("b.txt", 2), hit("a.txt", 1), hit("b.txt", 2)];
        assert_eq!(ordered_citations(&docs), vec!["[b.txt, 2]", "[a.txt, 1]"]);
    }

    #[test]
    fn test_sorted_citations() {
        let docs = vec![hit("b.txt", 2), hit("a.txt", 1), hit("b.txt", 2)];
        assert_eq!(sorted_citations(&docs), vec!["[a.txt, 1]", "[b.txt, 2]"]);
    }
}
