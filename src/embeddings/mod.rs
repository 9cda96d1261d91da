//! Embeddings generation module
//!
//! Text embeddings come from one of several providers:
//! - OpenAI (any OpenAI-compatible `/embeddings` endpoint)
//! - Ollama (local models)
//! - Hashing (offline, deterministic; for tests and air-gapped runs)
//!
//! # Examples
//!
//! ```rust,no_run
//! use tierrag::config::AppConfig;
//! use tierrag::embeddings::create_embedding_service;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let service = create_embedding_service(&config.embeddings)?;
//!
//!     let embedding = service.embed_one("Hello, world!").await?;
//!     println!("Generated embedding with {} dimensions", embedding.len());
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod hashing;

use std::sync::Arc;

use async_trait::async_trait;

pub use client::EmbeddingClient;
pub use client::EmbeddingProvider;
pub use hashing::HashingEmbedder;

use crate::config::EmbeddingsConfig;
use crate::errors::Result;
use crate::errors::TierRagError;

/// Turns text into dense vectors for the retrieval index
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Identifier persisted alongside the index; a snapshot built with a
    /// different model is discarded on load
    fn model_name(&self) -> String;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts; implementations may batch upstream calls
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed_one(text).await?);
        }
        Ok(out)
    }
}

/// Build the embedding service selected by `embeddings.provider`
pub fn create_embedding_service(config: &EmbeddingsConfig) -> Result<Arc<dyn EmbeddingService>> {
    match config.provider.to_lowercase().as_str() {
        "hashing" => Ok(Arc::new(HashingEmbedder::new(config.dimension))),
        "openai" | "ollama" => Ok(Arc::new(EmbeddingClient::from_config(config)?)),
        other => Err(TierRagError::InvalidConfiguration(format!(
            "unsupported embeddings provider: {other}"
        ))),
    }
}
