//! Difficulty-tiered retrieval-augmented question answering over a document corpus.
//!
//! Questions are classified as basic, intermediate or advanced and each tier
//! has its own chunking policy, retrieval collection and answering strategy.

pub mod agent;
pub mod chunker;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod difficulty;
pub mod embeddings;
pub mod errors;
pub mod filter;
pub mod index;
pub mod llm;
pub mod logging;
pub mod models;
pub mod rag;
pub mod rerank;
pub mod sheet;
pub mod text;

#[cfg(test)]
mod config_tests;

pub use agent::IndexOutcome;
pub use agent::QaAgent;
pub use config::AppConfig;
pub use difficulty::DifficultyTier;
pub use errors::*;
