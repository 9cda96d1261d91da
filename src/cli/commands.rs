//! CLI command definitions and argument parsing

use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

use crate::difficulty::DifficultyTier;

#[derive(Parser)]
#[command(name = "tierrag")]
#[command(about = "Difficulty-tiered retrieval-augmented question answering over a document corpus")]
#[command(version)]
pub struct Cli {
    /// Enable verbose debug logging (default: info level)
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log warnings to the console
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (default: config.toml, then config.example.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load, chunk and embed the corpus into the three tier collections
    Index {
        /// Rebuild even if the index already holds chunks
        #[arg(short, long)]
        force: bool,
        /// Skip the rebuild confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Answer a single question
    Ask {
        /// The question text
        question: String,
        /// Question identifier used for difficulty classification
        #[arg(long, default_value = "Q_AUTO")]
        id: String,
        /// Force a difficulty tier instead of classifying
        #[arg(long, value_enum)]
        tier: Option<TierArg>,
        /// Print sub-questions and retrieved passages
        #[arg(long)]
        details: bool,
    },
    /// Answer a query JSON file and write an answer card
    Card {
        /// Input file: {"query": "...", "question_id": "..."}
        input: PathBuf,
        /// Output answer card
        output: PathBuf,
    },
    /// Answer every question of a question sheet
    Exam {
        /// Question sheet: {"exam_info": {...}, "questions": [...]}
        input: PathBuf,
        /// Output answer sheet
        output: PathBuf,
    },
    /// Convert an answer sheet into an evaluation dataset
    Export {
        /// Answer sheet produced by `exam`
        answersheet: PathBuf,
        /// Output evaluation file
        output: PathBuf,
    },
    /// Similarity search against one tier collection
    Search {
        /// Search query
        query: String,
        /// Collection to search
        #[arg(long, value_enum, default_value = "basic")]
        tier: TierArg,
        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },
    /// Show chunk counts per tier
    Stats,
    /// Remove all indexed chunks
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum TierArg {
    /// Precise single-passage retrieval
    Basic,
    /// Synthesis over the dominant source
    Intermediate,
    /// Decomposition and multi-document synthesis
    Advanced,
}

impl From<TierArg> for DifficultyTier {
    fn from(arg: TierArg) -> Self {
        match arg {
            TierArg::Basic => Self::Basic,
            TierArg::Intermediate => Self::Intermediate,
            TierArg::Advanced => Self::Advanced,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask_with_tier() {
        let cli = Cli::parse_from(["tierrag", "ask", "What is CBTC?", "--id", "B001", "--tier", "advanced"]);
        match cli.command {
            Commands::Ask { question, id, tier, .. } => {
                assert_eq!(question, "What is CBTC?");
                assert_eq!(id, "B001");
                assert_eq!(tier.map(DifficultyTier::from), Some(DifficultyTier::Advanced));
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn test_parse_index_flags() {
        let cli = Cli::parse_from(["tierrag", "index", "--force", "-y"]);
        assert!(matches!(cli.command, Commands::Index { force: true, yes: true }));
    }
}
