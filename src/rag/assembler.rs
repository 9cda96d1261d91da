//! Normalizes strategy output into answer records and answer cards

use std::collections::BTreeSet;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::difficulty::DifficultyTier;
use crate::errors::TierRagError;
use crate::models::AnswerRecord;
use crate::models::PageRef;
use crate::models::StrategyOutcome;

/// Prefix of the answer text recorded for a failed question
pub const ERROR_ANSWER_PREFIX: &str = "error: ";

#[derive(Debug, Clone, Copy, Default)]
pub struct AnswerAssembler;

impl AnswerAssembler {
    pub const fn new() -> Self {
        Self
    }

    /// Build the externally visible record for one answered question
    pub fn assemble(
        &self,
        question_id: &str,
        question: &str,
        difficulty: DifficultyTier,
        outcome: StrategyOutcome,
        elapsed: Duration,
    ) -> AnswerRecord {
        let sources = match outcome.strategy {
            DifficultyTier::Advanced => outcome
                .sources
                .into_iter()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            DifficultyTier::Basic | DifficultyTier::Intermediate => dedupe_first_seen(outcome.sources),
        };

        AnswerRecord {
            question_id: question_id.to_string(),
            question: question.to_string(),
            answer: outcome.answer,
            sources,
            retrieved_docs: outcome.retrieved_docs,
            difficulty,
            strategy: outcome.strategy,
            sub_questions: outcome.sub_questions,
            sub_answers: outcome.sub_answers,
            time_used: elapsed.as_secs_f64(),
            error: None,
        }
    }

    /// Record for a question whose retrieval or synthesis failed
    pub fn error_record(
        &self,
        question_id: &str,
        question: &str,
        difficulty: DifficultyTier,
        error: &TierRagError,
        elapsed: Duration,
    ) -> AnswerRecord {
        let message = error.to_string();
        AnswerRecord {
            question_id: question_id.to_string(),
            question: question.to_string(),
            answer: format!("{ERROR_ANSWER_PREFIX}{message}"),
            sources: Vec::new(),
            retrieved_docs: Vec::new(),
            difficulty,
            strategy: difficulty,
            sub_questions: None,
            sub_answers: None,
            time_used: elapsed.as_secs_f64(),
            error: Some(message),
        }
    }
}

fn dedupe_first_seen(sources: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(sources.len());
    for source in sources {
        if !out.contains(&source) {
            out.push(source);
        }
    }
    out
}

/// One retrieved passage as shown on an answer card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardResult {
    pub position: usize,
    pub content: String,
    pub source: String,
    pub page: PageRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardMetadata {
    pub difficulty: String,
    pub strategy: String,
    pub time_used: f64,
    pub sources: Vec<String>,
}

/// Persisted answer card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerCard {
    pub query: String,
    pub result: Vec<CardResult>,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CardMetadata>,
}

impl AnswerCard {
    pub fn from_record(record: &AnswerRecord) -> Self {
        Self {
            query: record.question.clone(),
            result: card_results(record),
            answer: record.answer.clone(),
            metadata: Some(CardMetadata {
                difficulty: record.difficulty.to_string(),
                strategy: record.strategy.to_string(),
                time_used: record.time_used,
                sources: record.sources.clone(),
            }),
        }
    }

    /// Card for a request that could not be answered at all
    pub fn rejected(query: &str, reason: &str) -> Self {
        Self {
            query: query.to_string(),
            result: Vec::new(),
            answer: format!("{ERROR_ANSWER_PREFIX}{reason}"),
            metadata: None,
        }
    }
}

/// Retrieved passages numbered from 1
pub fn card_results(record: &AnswerRecord) -> Vec<CardResult> {
    record
        .retrieved_docs
        .iter()
        .enumerate()
        .map(|(i, doc)| CardResult {
            position: i + 1,
            content: doc.content.clone(),
            source: doc.source().to_string(),
            page: doc.page(),
        })
        .collect()
}
