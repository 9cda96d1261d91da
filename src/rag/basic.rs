//! Basic tier: needle-in-a-haystack retrieval grounded in a single passage

use async_trait::async_trait;
use tracing::debug;
use tracing::info;

use super::Strategy;
use super::StrategyDeps;
use crate::difficulty::DifficultyTier;
use crate::errors::Result;
use crate::filter::filter_candidates;
use crate::llm::prompts;
use crate::models::Metadata;
use crate::models::StrategyOutcome;

pub struct BasicStrategy {
    deps: StrategyDeps,
}

impl BasicStrategy {
    pub const fn new(deps: StrategyDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Strategy for BasicStrategy {
    fn tier(&self) -> DifficultyTier {
        DifficultyTier::Basic
    }

    async fn retrieve_and_answer(&self, question: &str) -> Result<StrategyOutcome> {
        let retrieval = &self.deps.retrieval;
        let top_k = retrieval.basic_top_k;
        let candidate_k = top_k.saturating_mul(retrieval.basic_candidate_multiplier);

        // Step 1: wide candidate retrieval
        let candidates = self
            .deps
            .index
            .search(question, DifficultyTier::Basic, candidate_k, None)
            .await?;
        debug!("Basic retrieval returned {} candidates", candidates.len());
        if candidates.is_empty() {
            return Ok(StrategyOutcome::empty(DifficultyTier::Basic));
        }

        // Step 2: metadata prefilter
        let filtered = filter_candidates(question, candidates, top_k, &self.deps.metadata_filter);
        info!(
            "Metadata filter {} ({} candidates kept)",
            if filtered.applied { "applied" } else { "skipped" },
            filtered.candidates.len()
        );

        // Step 3: rerank to the single best passage
        let documents: Vec<String> = filtered.candidates.iter().map(|c| c.content.clone()).collect();
        let metadatas: Vec<Metadata> = filtered.candidates.iter().map(|c| c.metadata.clone()).collect();
        let order = self
            .deps
            .reranker
            .rerank(question, &documents, 1, Some(&metadatas))
            .await?;
        let Some(best) = order
            .first()
            .and_then(|&i| filtered.candidates.get(i))
            .cloned()
        else {
            return Ok(StrategyOutcome::empty(DifficultyTier::Basic));
        };
        debug!("Best passage: {}", best.citation());

        // Step 4: grounded synthesis
        let messages = prompts::basic_answer(question, &best);
        let answer = self.deps.llm.complete(&messages, retrieval.temperature).await?;

        Ok(StrategyOutcome {
            answer,
            sources: vec![best.citation()],
            retrieved_docs: vec![best],
            strategy: DifficultyTier::Basic,
            sub_questions: None,
            sub_answers: None,
        })
    }
}
