//! JSON exchange formats: query cards, question and answer sheets, evaluation export

use std::path::Path;
use std::time::Duration;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::agent::QaAgent;
use crate::errors::Result;
use crate::models::AnswerRecord;
use crate::rag::assembler::card_results;
use crate::rag::assembler::CardResult;
use crate::rag::AnswerCard;

/// Question id used for a query card that does not carry one
pub const AUTO_QUESTION_ID: &str = "Q_AUTO";
const UNKNOWN_CATEGORY: &str = "unknown";
const NO_QUERY_REASON: &str = "no query provided";

/// Single query request: `{"query": "...", "question_id": "B001"}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionSheet {
    #[serde(default)]
    pub exam_info: Value,
    #[serde(default)]
    pub questions: Vec<SheetQuestion>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetQuestion {
    #[serde(default)]
    pub question_id: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetAnswer {
    pub question_id: String,
    pub category: String,
    pub query: String,
    pub result: Vec<CardResult>,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingInfo {
    pub processed_at: String,
    pub total_questions: usize,
    pub time_used: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerSheet {
    pub exam_info: Value,
    pub answers: Vec<SheetAnswer>,
    pub processing_info: ProcessingInfo,
}

/// Evaluation dataset: one item per answered question
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalExport {
    pub items: Vec<EvalItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalItem {
    pub question: String,
    pub retrieved_contexts: Vec<String>,
    pub answer: String,
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Pretty-print `value` to `path`, creating parent directories
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// Answer a single query request. Failures are reported inside the card.
pub async fn answer_query_card(agent: &QaAgent, request: &QueryRequest) -> AnswerCard {
    let Some(query) = request.query.as_deref().filter(|q| !q.trim().is_empty()) else {
        return AnswerCard::rejected("", NO_QUERY_REASON);
    };
    let question_id = request.question_id.as_deref().unwrap_or(AUTO_QUESTION_ID);

    let questions = [(question_id.to_string(), query.to_string())];
    let records = agent.batch_answer(&questions).await;
    records.first().map_or_else(
        || AnswerCard::rejected(query, NO_QUERY_REASON),
        AnswerCard::from_record,
    )
}

/// `(question_id, query)` pairs of a sheet; entries without an id become `Q{n}`
pub fn sheet_questions(sheet: &QuestionSheet) -> Vec<(String, String)> {
    sheet
        .questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let id = q
                .question_id
                .clone()
                .unwrap_or_else(|| format!("Q{}", i + 1));
            (id, q.query.clone())
        })
        .collect()
}

/// Answer every question of a sheet in order
pub async fn answer_sheet(agent: &QaAgent, sheet: &QuestionSheet) -> AnswerSheet {
    let start = Instant::now();
    let questions = sheet_questions(sheet);
    info!("Answering sheet with {} questions", questions.len());
    let records = agent.batch_answer(&questions).await;
    build_answer_sheet(sheet, &records, start.elapsed())
}

pub fn build_answer_sheet(
    sheet: &QuestionSheet,
    records: &[AnswerRecord],
    elapsed: Duration,
) -> AnswerSheet {
    let answers = sheet
        .questions
        .iter()
        .zip(records)
        .map(|(question, record)| SheetAnswer {
            question_id: record.question_id.clone(),
            category: question
                .category
                .clone()
                .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()),
            query: record.question.clone(),
            result: card_results(record),
            answer: record.answer.clone(),
        })
        .collect();

    AnswerSheet {
        exam_info: sheet.exam_info.clone(),
        answers,
        processing_info: ProcessingInfo {
            processed_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            total_questions: sheet.questions.len(),
            time_used: round2(elapsed.as_secs_f64()),
        },
    }
}

/// Convert an answer sheet into the evaluation dataset layout
pub fn to_eval_export(sheet: &AnswerSheet) -> EvalExport {
    EvalExport {
        items: sheet
            .answers
            .iter()
            .map(|a| EvalItem {
                question: a.query.clone(),
                retrieved_contexts: a.result.iter().map(|r| r.content.clone()).collect(),
                answer: a.answer.clone(),
            })
            .collect(),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
