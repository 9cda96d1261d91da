//! Question answering handlers

use std::path::Path;

use crate::agent::QaAgent;
use crate::cli::output::print_answer;
use crate::cli::output::print_info;
use crate::cli::output::print_success;
use crate::cli::output::print_warning;
use crate::difficulty::DifficultyTier;
use crate::errors::Result;
use crate::errors::TierRagError;
use crate::sheet;
use crate::sheet::AnswerSheet;
use crate::sheet::EvalExport;
use crate::sheet::QueryRequest;
use crate::sheet::QuestionSheet;

pub async fn handle_ask(
    agent: &QaAgent,
    question: &str,
    question_id: &str,
    tier: Option<DifficultyTier>,
    details: bool,
) -> Result<()> {
    let record = agent.answer_question(question_id, question, tier).await?;
    print_answer(&record, details);
    Ok(())
}

pub async fn handle_card(agent: &QaAgent, input: &Path, output: &Path) -> Result<()> {
    let request: QueryRequest = sheet::read_json(input)?;
    let card = sheet::answer_query_card(agent, &request).await;
    if card.answer.starts_with(crate::rag::assembler::ERROR_ANSWER_PREFIX) {
        print_warning(&card.answer);
    }
    sheet::write_json(output, &card)?;
    print_success(&format!("Answer card saved to: {}", output.display()));
    Ok(())
}

pub async fn handle_exam(agent: &QaAgent, input: &Path, output: &Path) -> Result<()> {
    let questions: QuestionSheet = sheet::read_json(input)?;
    if questions.questions.is_empty() {
        return Err(TierRagError::InvalidInput(format!(
            "question sheet {} has no questions",
            input.display()
        )));
    }

    print_info(&format!("Answering {} questions...", questions.questions.len()));
    let answers = sheet::answer_sheet(agent, &questions).await;
    sheet::write_json(output, &answers)?;

    print_success(&format!("Answer sheet saved to: {}", output.display()));
    println!("Total time: {} s", answers.processing_info.time_used);
    Ok(())
}

pub fn handle_export(answersheet: &Path, output: &Path) -> Result<()> {
    let answers: AnswerSheet = sheet::read_json(answersheet)?;
    let export: EvalExport = sheet::to_eval_export(&answers);
    sheet::write_json(output, &export)?;
    print_success(&format!(
        "Exported {} items to: {}",
        export.items.len(),
        output.display()
    ));
    Ok(())
}
