//! Information display handlers

use crate::agent::QaAgent;
use crate::cli::output::print_search_results;
use crate::cli::output::print_tier_counts;
use crate::cli::output::print_warning;
use crate::difficulty::DifficultyTier;
use crate::errors::Result;

pub async fn handle_stats(agent: &QaAgent) -> Result<()> {
    let counts = agent.stats().await?;
    print_tier_counts(&counts);
    if counts.values().all(|&n| n == 0) {
        print_warning("The index is empty. Run: tierrag index");
    }
    Ok(())
}

pub async fn handle_search(
    agent: &QaAgent,
    query: &str,
    tier: DifficultyTier,
    limit: usize,
) -> Result<()> {
    println!("🔍 Searching {tier} collection for: \"{query}\"");
    let results = agent.search(query, tier, limit).await?;
    if results.is_empty() {
        print_warning("No passages found");
        return Ok(());
    }
    print_search_results(&results);
    Ok(())
}
