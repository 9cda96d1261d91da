//! Index lifecycle handlers

use std::io;
use std::io::Write;

use crate::agent::IndexOutcome;
use crate::agent::QaAgent;
use crate::cli::output::print_info;
use crate::cli::output::print_success;
use crate::cli::output::print_tier_counts;
use crate::cli::output::print_warning;
use crate::errors::Result;

/// Build the index, asking before replacing an existing one unless `yes`
pub async fn handle_index(agent: &QaAgent, force: bool, yes: bool) -> Result<()> {
    let outcome = match agent.index_documents(force).await? {
        IndexOutcome::Existing { counts } => {
            print_warning("The index already holds chunks:");
            print_tier_counts(&counts);
            if !yes && !confirm("Rebuild the index from the corpus?")? {
                print_info("Keeping the existing index");
                return Ok(());
            }
            agent.index_documents(true).await?
        }
        indexed @ IndexOutcome::Indexed { .. } => indexed,
    };

    print_success("Indexing finished");
    print_tier_counts(outcome.counts());
    Ok(())
}

pub async fn handle_clear(agent: &QaAgent, yes: bool) -> Result<()> {
    if !yes && !confirm("Remove all indexed chunks?")? {
        println!("❌ Aborted");
        return Ok(());
    }
    agent.clear().await?;
    print_success("Index cleared");
    Ok(())
}

/// Ask a y/N question on stdin
pub fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}
