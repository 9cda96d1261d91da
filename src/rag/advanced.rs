//! Advanced tier: decomposition into sub-questions and multi-document synthesis

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::debug;
use tracing::info;

use super::sorted_citations;
use super::Strategy;
use super::StrategyDeps;
use crate::difficulty::DifficultyTier;
use crate::errors::Result;
use crate::llm::prompts;
use crate::models::SearchResult;
use crate::models::StrategyOutcome;
use crate::models::SubAnswer;
use crate::text::truncate_chars;

/// Pooled hits sharing this many leading characters are duplicates
pub const DEDUP_PREFIX_CHARS: usize = 100;

pub struct AdvancedStrategy {
    deps: StrategyDeps,
}

impl AdvancedStrategy {
    pub const fn new(deps: StrategyDeps) -> Self {
        Self { deps }
    }

    /// Ask the model for sub-questions, falling back to the question itself
    pub async fn decompose(&self, question: &str) -> Result<Vec<String>> {
        let max = self.deps.retrieval.max_sub_questions;
        let messages = prompts::decomposition(question, max);
        let response = self
            .deps
            .llm
            .complete(&messages, self.deps.retrieval.temperature)
            .await?;
        let sub_questions = prompts::parse_sub_questions(&response, question, max);
        info!("Decomposed into {} sub-questions", sub_questions.len());
        Ok(sub_questions)
    }
}

/// Drop hits whose first 100 characters were already seen, keeping order
pub fn dedupe_by_prefix(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen: HashSet<String> = HashSet::new();
    results
        .into_iter()
        .filter(|r| seen.insert(truncate_chars(&r.content, DEDUP_PREFIX_CHARS).to_string()))
        .collect()
}

#[async_trait]
impl Strategy for AdvancedStrategy {
    fn tier(&self) -> DifficultyTier {
        DifficultyTier::Advanced
    }

    async fn retrieve_and_answer(&self, question: &str) -> Result<StrategyOutcome> {
        let retrieval = &self.deps.retrieval;

        if self.deps.index.stats(DifficultyTier::Advanced).await? == 0 {
            debug!("Advanced index is empty");
            return Ok(StrategyOutcome::empty(DifficultyTier::Advanced));
        }

        let sub_questions = self.decompose(question).await?;

        // Sequential: later steps need the complete pool
        let mut pooled: Vec<SearchResult> = Vec::new();
        let mut sub_answers: Vec<SubAnswer> = Vec::new();
        for sub_question in &sub_questions {
            let hits = self
                .deps
                .index
                .search(
                    sub_question,
                    DifficultyTier::Advanced,
                    retrieval.sub_question_top_k,
                    None,
                )
                .await?;
            debug!("Sub-question '{}' retrieved {} hits", sub_question, hits.len());
            if hits.is_empty() {
                continue;
            }

            let messages = prompts::sub_answer(sub_question, &hits);
            let answer = self.deps.llm.complete(&messages, retrieval.temperature).await?;
            sub_answers.push(SubAnswer {
                question: sub_question.clone(),
                answer,
                sources: sorted_citations(&hits),
            });
            pooled.extend(hits);
        }

        if pooled.is_empty() {
            let mut outcome = StrategyOutcome::empty(DifficultyTier::Advanced);
            outcome.sub_questions = Some(sub_questions);
            return Ok(outcome);
        }

        let pooled_count = pooled.len();
        let unique = dedupe_by_prefix(pooled);
        info!("Pooled {} hits, {} after deduplication", pooled_count, unique.len());

        let messages = prompts::final_synthesis(question, &sub_answers, &unique);
        let answer = self
            .deps
            .llm
            .complete(&messages, retrieval.synthesis_temperature)
            .await?;

        Ok(StrategyOutcome {
            answer,
            sources: sorted_citations(&unique),
            retrieved_docs: unique,
            strategy: DifficultyTier::Advanced,
            sub_questions: Some(sub_questions),
            sub_answers: Some(sub_answers),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(content: String) -> SearchResult {
        SearchResult {
            content,
            metadata: serde_json::Map::new(),
            distance: None,
        }
    }

    #[test]
    fn test_dedupe_by_first_hundred_chars() {
        let prefix = "p".repeat(100);
        let results = vec![
            hit(format!("{prefix} first tail")),
            hit("short".to_string()),
            hit(format!("{prefix} second tail")),
            hit("short".to_string()),
            hit(format!("{} different", "p".repeat(99))),
        ];

        let unique = dedupe_by_prefix(results);
        let contents: Vec<&str> = unique.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents.len(), 3);
        assert!(contents[0].ends_with("first tail"));
        assert_eq!(contents[1], "short");
        assert!(contents[2].ends_with("different"));
    }
}
