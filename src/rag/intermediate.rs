//! Intermediate tier: synthesis over the passages of one dominant source

use async_trait::async_trait;
use tracing::debug;
use tracing::info;

use super::ordered_citations;
use super::Strategy;
use super::StrategyDeps;
use crate::difficulty::DifficultyTier;
use crate::errors::Result;
use crate::llm::prompts;
use crate::models::SearchResult;
use crate::models::StrategyOutcome;

pub struct IntermediateStrategy {
    deps: StrategyDeps,
}

impl IntermediateStrategy {
    pub const fn new(deps: StrategyDeps) -> Self {
        Self { deps }
    }
}

/// Group hits by source (first-seen order) and return the largest group.
/// On a tie the group encountered first wins.
pub fn largest_source_group(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut groups: Vec<(String, Vec<SearchResult>)> = Vec::new();
    for result in results {
        let source = result.source().to_string();
        match groups.iter_mut().find(|(s, _)| *s == source) {
            Some((_, members)) => members.push(result),
            None => groups.push((source, vec![result])),
        }
    }

    let mut best: Option<(String, Vec<SearchResult>)> = None;
    for group in groups {
        if best.as_ref().map_or(true, |(_, b)| group.1.len() > b.len()) {
            best = Some(group);
        }
    }
    best.map(|(_, members)| members).unwrap_or_default()
}

#[async_trait]
impl Strategy for IntermediateStrategy {
    fn tier(&self) -> DifficultyTier {
        DifficultyTier::Intermediate
    }

    async fn retrieve_and_answer(&self, question: &str) -> Result<StrategyOutcome> {
        let retrieval = &self.deps.retrieval;

        let results = self
            .deps
            .index
            .search(
                question,
                DifficultyTier::Intermediate,
                retrieval.intermediate_top_k,
                None,
            )
            .await?;
        debug!("Intermediate retrieval returned {} passages", results.len());
        if results.is_empty() {
            return Ok(StrategyOutcome::empty(DifficultyTier::Intermediate));
        }

        // Passages from minority sources are discarded
        let total = results.len();
        let selected = largest_source_group(results);
        info!(
            "Selected source '{}' with {}/{} passages",
            selected.first().map_or("unknown", SearchResult::source),
            selected.len(),
            total
        );

        let messages = prompts::intermediate_answer(question, &selected);
        let answer = self.deps.llm.complete(&messages, retrieval.temperature).await?;

        Ok(StrategyOutcome {
            answer,
            sources: ordered_citations(&selected),
            retrieved_docs: selected,
            strategy: DifficultyTier::Intermediate,
            sub_questions: None,
            sub_answers: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;
    use serde_json::json;

    fn hit(source: &str, n: usize) -> SearchResult {
        let metadata: Metadata = json!({"source": source, "page": n})
            .as_object()
            .cloned()
            .unwrap();
        SearchResult {
            content: format!("{source} passage {n}"),
            metadata,
            distance: None,
        }
    }

    #[test]
    fn test_largest_group_wins() {
        let results = vec![hit("a.txt", 1), hit("b.txt", 1), hit("b.txt", 2), hit("a.txt", 2), hit("b.txt", 3)];
        let group = largest_source_group(results);
        assert_eq!(group.len(), 3);
        assert!(group.iter().all(|r| r.source() == "b.txt"));
        assert_eq!(group[0].content, "b.txt passage 1");
    }

    #[test]
    fn test_tie_resolves_to_first_encountered() {
        let results = vec![hit("b.txt", 1), hit("a.txt", 1), hit("a.txt", 2), hit("b.txt", 2)];
        let group = largest_source_group(results);
        assert!(group.iter().all(|r| r.source() == "b.txt"));
    }

    #[test]
    fn test_empty_input() {
        assert!(largest_source_group(Vec::new()).is_empty());
    }
}
