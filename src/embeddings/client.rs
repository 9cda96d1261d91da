//! Embedding API clients for OpenAI-compatible and Ollama endpoints

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::EmbeddingService;
use crate::config::EmbeddingsConfig;
use crate::errors::Result;
use crate::errors::TierRagError;

const SERVICE: &str = "embeddings";

/// Supported embedding providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// `OpenAI` embeddings API
    OpenAI,
    /// Ollama local embeddings
    Ollama,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = TierRagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            other => Err(TierRagError::InvalidConfiguration(format!(
                "unsupported embeddings provider: {other}"
            ))),
        }
    }
}

/// Client for generating embeddings from remote providers
pub struct EmbeddingClient {
    provider: EmbeddingProvider,
    model: String,
    endpoint: String,
    api_key: Option<String>,
    batch_size: usize,
    client: Client,
}

impl EmbeddingClient {
    /// Create a new embedding client
    ///
    /// # Errors
    /// - HTTP client build errors (invalid configuration)
    pub fn new(
        provider: EmbeddingProvider,
        model: String,
        endpoint: String,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .pool_idle_timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| TierRagError::InvalidConfiguration(format!("http client: {e}")))?;

        Ok(Self {
            provider,
            model,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            batch_size: crate::config::default_batch_size(),
            client,
        })
    }

    pub fn from_config(config: &EmbeddingsConfig) -> Result<Self> {
        let provider: EmbeddingProvider = config.provider.parse()?;
        let mut client = Self::new(
            provider,
            config.model.clone(),
            config.endpoint.clone(),
            Some(config.key.clone()),
            config.timeout_secs,
        )?;
        client.batch_size = config.batch_size.max(1);
        Ok(client)
    }

    pub const fn provider(&self) -> EmbeddingProvider {
        self.provider
    }

    /// Generate embeddings in batch using `OpenAI` API
    async fn generate_batch_openai(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            TierRagError::InvalidConfiguration("embeddings API key not provided".to_string())
        })?;

        #[derive(Serialize)]
        struct OpenAIBatchRequest<'a> {
            input: &'a [String],
            model: &'a str,
        }

        #[derive(Deserialize)]
        struct OpenAIResponse {
            data: Vec<EmbeddingData>,
        }

        #[derive(Deserialize)]
        struct EmbeddingData {
            #[serde(default)]
            index: usize,
            embedding: Vec<f32>,
        }

        let url = format!("{}/embeddings", self.endpoint);
        debug!("Calling OpenAI batch embeddings API: {} items", texts.len());

        let request = OpenAIBatchRequest {
            input: texts,
            model: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TierRagError::upstream(
                SERVICE,
                format!("OpenAI API error ({status}): {error_text}"),
            ));
        }

        let mut result: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| TierRagError::upstream(SERVICE, format!("Failed to parse response: {e}")))?;

        if result.data.len() != texts.len() {
            return Err(TierRagError::upstream(
                SERVICE,
                format!(
                    "expected {} embeddings, received {}",
                    texts.len(),
                    result.data.len()
                ),
            ));
        }
        result.data.sort_by_key(|d| d.index);
        Ok(result.data.into_iter().map(|d| d.embedding).collect())
    }

    /// Generate embedding using Ollama API
    async fn generate_ollama(&self, text: &str) -> Result<Vec<f32>> {
        #[derive(Serialize)]
        struct OllamaRequest<'a> {
            model: &'a str,
            prompt: &'a str,
        }

        #[derive(Deserialize)]
        struct OllamaResponse {
            embedding: Vec<f32>,
        }

        let url = format!("{}/api/embeddings", self.endpoint);
        debug!("Calling Ollama embeddings API: {}", url);

        let request = OllamaRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TierRagError::upstream(
                SERVICE,
                format!("Ollama API error ({status}): {error_text}"),
            ));
        }

        let result: OllamaResponse = response
            .json()
            .await
            .map_err(|e| TierRagError::upstream(SERVICE, format!("Failed to parse response: {e}")))?;

        Ok(result.embedding)
    }
}

#[async_trait]
impl EmbeddingService for EmbeddingClient {
    fn model_name(&self) -> String {
        let provider = match self.provider {
            EmbeddingProvider::OpenAI => "openai",
            EmbeddingProvider::Ollama => "ollama",
        };
        format!("{provider}:{}", self.model)
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        match self.provider {
            EmbeddingProvider::OpenAI => {
                let mut batch = self.generate_batch_openai(&[text.to_string()]).await?;
                batch
                    .pop()
                    .ok_or_else(|| TierRagError::upstream(SERVICE, "No embedding in response"))
            }
            EmbeddingProvider::Ollama => self.generate_ollama(text).await,
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match self.provider {
            EmbeddingProvider::OpenAI => {
                let mut embeddings = Vec::with_capacity(texts.len());
                for batch in texts.chunks(self.batch_size) {
                    embeddings.extend(self.generate_batch_openai(batch).await?);
                }
                Ok(embeddings)
            }
            // Ollama has no batch endpoint
            EmbeddingProvider::Ollama => {
                let mut embeddings = Vec::with_capacity(texts.len());
                for text in texts {
                    embeddings.push(self.generate_ollama(text).await?);
                }
                Ok(embeddings)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parsing() {
        assert_eq!("OpenAI".parse::<EmbeddingProvider>().unwrap(), EmbeddingProvider::OpenAI);
        assert_eq!("ollama".parse::<EmbeddingProvider>().unwrap(), EmbeddingProvider::Ollama);
        assert!("word2vec".parse::<EmbeddingProvider>().is_err());
    }

    #[test]
    fn test_model_name_and_endpoint_normalization() {
        let client = EmbeddingClient::new(
            EmbeddingProvider::Ollama,
            "nomic-embed-text".to_string(),
            "http://localhost:11434/".to_string(),
            None,
            5,
        )
        .unwrap();
        assert_eq!(client.model_name(), "ollama:nomic-embed-text");
        assert_eq!(client.endpoint, "http://localhost:11434");
    }

    #[tokio::test]
    async fn test_openai_without_key_is_configuration_error() {
        let client = EmbeddingClient::new(
            EmbeddingProvider::OpenAI,
            "text-embedding-3-small".to_string(),
            "https://api.openai.com/v1".to_string(),
            Some(String::new()),
            5,
        )
        .unwrap();
        let err = client.embed_one("hello").await.unwrap_err();
        assert!(matches!(err, TierRagError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    #[ignore = "Requires API key"]
    async fn test_openai_embedding() {
        let client = EmbeddingClient::new(
            EmbeddingProvider::OpenAI,
            "text-embedding-3-small".to_string(),
            "https://api.openai.com/v1".to_string(),
            std::env::var("OPENAI_API_KEY").ok(),
            120,
        )
        .unwrap();

        let embedding = client.embed_one("Hello, world!").await.unwrap();
        assert_eq!(embedding.len(), 1536);
    }
}
