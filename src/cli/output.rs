//! CLI output formatting utilities

use crate::agent::TierCounts;
use crate::models::AnswerRecord;
use crate::models::SearchResult;
use crate::text::truncate_str;

const PREVIEW_CHARS: usize = 200;

pub fn print_info(message: &str) {
    println!("ℹ️  {message}");
}

pub fn print_success(message: &str) {
    println!("✅ {message}");
}

pub fn print_warning(message: &str) {
    println!("⚠️  {message}");
}

pub fn print_error(message: &str) {
    eprintln!("❌ {message}");
}

/// Print chunk counts per tier
pub fn print_tier_counts(counts: &TierCounts) {
    println!("📊 Index statistics");
    println!("===================");
    for (tier, count) in counts {
        println!("  {:<13} {count} chunks", tier.as_str());
    }
    println!("  {:<13} {} chunks", "total", counts.values().sum::<usize>());
}

/// Print an answer record; `details` adds sub-questions and passages
pub fn print_answer(record: &AnswerRecord, details: bool) {
    println!();
    println!("❓ {} [{}]", record.question, record.question_id);
    println!(
        "🧭 difficulty: {} | strategy: {} | {:.2}s",
        record.difficulty, record.strategy, record.time_used
    );
    println!();
    println!("{}", record.answer);

    if !record.sources.is_empty() {
        println!();
        println!("📚 Sources: {}", record.sources.join(", "));
    }

    if !details {
        return;
    }

    if let Some(sub_answers) = &record.sub_answers {
        println!();
        println!("🧩 Sub-questions:");
        for (i, sub) in sub_answers.iter().enumerate() {
            println!("  {}. {}", i + 1, sub.question);
            println!("     {}", truncate_str(&sub.answer, PREVIEW_CHARS));
        }
    }

    if !record.retrieved_docs.is_empty() {
        println!();
        print_search_results(&record.retrieved_docs);
    }
}

/// Print retrieved passages with their citation and distance
pub fn print_search_results(results: &[SearchResult]) {
    println!("Found {} passages:", results.len());
    for (i, result) in results.iter().enumerate() {
        let distance = result
            .distance
            .map_or_else(|| "n/a".to_string(), |d| format!("{d:.4}"));
        println!();
        println!("  {}. {} (distance {})", i + 1, result.citation(), distance);
        println!("     {}", truncate_str(&result.content.replace('\n', " "), PREVIEW_CHARS));
    }
}
