use thiserror::Error;

#[derive(Error, Debug)]
pub enum TierRagError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Upstream failure ({service}): {message}")]
    UpstreamFailure { service: String, message: String },

    #[error("Unknown difficulty tier: {0}")]
    UnknownTier(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TierRagError {
    /// Build an upstream failure for the named external service
    pub fn upstream(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UpstreamFailure {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Whether this error came from an external collaborator (LLM, embeddings, rerank)
    pub const fn is_upstream(&self) -> bool {
        matches!(self, Self::UpstreamFailure { .. })
    }
}

impl From<reqwest::Error> for TierRagError {
    fn from(err: reqwest::Error) -> Self {
        let service = err
            .url()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| "http".to_string());
        let message = if err.is_timeout() {
            format!("request timed out: {err}")
        } else {
            err.to_string()
        };
        Self::UpstreamFailure { service, message }
    }
}

pub type Result<T> = std::result::Result<T, TierRagError>;
