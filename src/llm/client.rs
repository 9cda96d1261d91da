//! Chat completion client for OpenAI-compatible and Ollama endpoints

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::ChatMessage;
use super::TextCompletionService;
use crate::config::LlmConfig;
use crate::errors::Result;
use crate::errors::TierRagError;

const SERVICE: &str = "llm";

/// Supported chat providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    /// `OpenAI` `/chat/completions` (also DeepSeek, vLLM and other compatible servers)
    OpenAI,
    /// Ollama `/api/chat`
    Ollama,
}

impl std::str::FromStr for LlmProvider {
    type Err = TierRagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            other => Err(TierRagError::InvalidConfiguration(format!(
                "unsupported llm provider: {other}"
            ))),
        }
    }
}

pub struct LlmClient {
    provider: LlmProvider,
    model: String,
    endpoint: String,
    api_key: Option<String>,
    client: Client,
}

impl LlmClient {
    /// Create a new chat client
    ///
    /// # Errors
    /// - HTTP client build errors (invalid configuration)
    pub fn new(
        provider: LlmProvider,
        model: String,
        endpoint: String,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| TierRagError::InvalidConfiguration(format!("http client: {e}")))?;

        Ok(Self {
            provider,
            model,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            client,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Self::new(
            config.provider.parse()?,
            config.model.clone(),
            config.endpoint.clone(),
            Some(config.key.clone()),
            config.timeout_secs,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete_openai(&self, messages: &[ChatMessage], temperature: f32) -> Result<String> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            TierRagError::InvalidConfiguration("llm API key not provided".to_string())
        })?;

        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: &'a [ChatMessage],
            temperature: f32,
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: ResponseMessage,
        }

        #[derive(Deserialize)]
        struct ResponseMessage {
            #[serde(default)]
            content: Option<String>,
        }

        let url = format!("{}/chat/completions", self.endpoint);
        debug!("Calling chat completions API: {} ({} messages)", url, messages.len());

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&ChatRequest {
                model: &self.model,
                messages,
                temperature,
            })
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
                format!("chat API error ({status}): {error_text}"),
            ));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| TierRagError::upstream(SERVICE, format!("Failed to parse response: {e}")))?;

        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| TierRagError::upstream(SERVICE, "No completion in response"))
    }

    async fn complete_ollama(&self, messages: &[ChatMessage], temperature: f32) -> Result<String> {
        #[derive(Serialize)]
        struct OllamaOptions {
            temperature: f32,
        }

        #[derive(Serialize)]
        struct OllamaRequest<'a> {
            model: &'a str,
            messages: &'a [ChatMessage],
            stream: bool,
            options: OllamaOptions,
        }

        #[derive(Deserialize)]
        struct OllamaResponse {
            message: OllamaMessage,
        }

        #[derive(Deserialize)]
        struct OllamaMessage {
            content: String,
        }

        let url = format!("{}/api/chat", self.endpoint);
        debug!("Calling Ollama chat API: {}", url);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&OllamaRequest {
                model: &self.model,
                messages,
                stream: false,
                options: OllamaOptions { temperature },
            })
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

        Ok(result.message.content.trim().to_string())
    }
}

#[async_trait]
impl TextCompletionService for LlmClient {
    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String> {
        match self.provider {
            LlmProvider::OpenAI => self.complete_openai(messages, temperature).await,
            LlmProvider::Ollama => self.complete_ollama(messages, temperature).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parsing() {
        assert_eq!("OPENAI".parse::<LlmProvider>().unwrap(), LlmProvider::OpenAI);
        assert!(matches!(
            "claude-local".parse::<LlmProvider>(),
            Err(TierRagError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_any_request() {
        let client = LlmClient::new(
            LlmProvider::OpenAI,
            "gpt-4-turbo-preview".to_string(),
            "https://api.openai.com/v1/".to_string(),
            None,
            5,
        )
        .unwrap();
        assert_eq!(client.endpoint, "https://api.openai.com/v1");

        let err = client
            .complete(&[ChatMessage::user("hi")], 0.1)
            .await
            .unwrap_err();
        assert!(matches!(err, TierRagError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_upstream_failure() {
        let client = LlmClient::new(
            LlmProvider::Ollama,
            "qwen2".to_string(),
            "http://127.0.0.1:1".to_string(),
            None,
            2,
        )
        .unwrap();

        let err = client
            .complete(&[ChatMessage::user("hi")], 0.1)
            .await
            .unwrap_err();
        assert!(err.is_upstream());
    }
}
