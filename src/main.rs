use clap::Parser;
use tierrag::cli::handle_ask;
use tierrag::cli::handle_card;
use tierrag::cli::handle_clear;
use tierrag::cli::handle_exam;
use tierrag::cli::handle_export;
use tierrag::cli::handle_index;
use tierrag::cli::handle_search;
use tierrag::cli::handle_stats;
use tierrag::cli::print_error;
use tierrag::cli::Cli;
use tierrag::cli::Commands;
use tierrag::AppConfig;
use tierrag::QaAgent;
use tierrag::Result;
use tracing::info;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Export only converts files and needs no configuration
    if let Commands::Export {
        answersheet,
        output,
    } = &cli.command
    {
        tierrag::logging::init_simple_logging()?;
        return handle_export(answersheet, output);
    }

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load()?,
    };

    if cli.quiet {
        tierrag::logging::init_simple_logging()?;
    } else if cli.verbose {
        tierrag::logging::init_logging_with_level("debug")?;
    } else {
        tierrag::logging::init_logging_with_config(&config.logging)?;
    }
    info!("Configuration loaded successfully");

    let agent = QaAgent::from_config(&config).await?;

    match cli.command {
        Commands::Index { force, yes } => handle_index(&agent, force, yes).await,
        Commands::Ask {
            question,
            id,
            tier,
            details,
        } => handle_ask(&agent, &question, &id, tier.map(Into::into), details).await,
        Commands::Card { input, output } => handle_card(&agent, &input, &output).await,
        Commands::Exam { input, output } => handle_exam(&agent, &input, &output).await,
        Commands::Search { query, tier, limit } => {
            handle_search(&agent, &query, tier.into(), limit).await
        }
        Commands::Stats => handle_stats(&agent).await,
        Commands::Clear { yes } => handle_clear(&agent, yes).await,
        Commands::Export {
            answersheet,
            output,
        } => handle_export(&answersheet, &output),
    }
}
