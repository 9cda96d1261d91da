use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::difficulty::DifficultyOverride;
use crate::difficulty::DifficultyTier;
use crate::errors::Result;
use crate::errors::TierRagError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Root directory holding the document corpus
    #[serde(default = "default_corpus_root")]
    pub root: PathBuf,
    /// File extension of ingestible text files
    #[serde(default = "default_corpus_extension")]
    pub extension: String,
}

fn default_corpus_root() -> PathBuf {
    PathBuf::from("corpus")
}

fn default_corpus_extension() -> String {
    "txt".to_string()
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            root: default_corpus_root(),
            extension: default_corpus_extension(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Snapshot file of the embedded collections
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
}

fn default_index_path() -> PathBuf {
    PathBuf::from("index/tierrag-index.json")
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// `openai` (any OpenAI-compatible endpoint) or `ollama`
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub key: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_llm_provider() -> String {
    "openai".to_string()
}

fn default_llm_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4-turbo-preview".to_string()
}

const fn default_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            endpoint: default_llm_endpoint(),
            key: String::new(),
            model: default_llm_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    /// `openai`, `ollama` or `hashing` (offline, deterministic)
    #[serde(default = "default_embeddings_provider")]
    pub provider: String,
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub key: String,
    #[serde(default = "default_embeddings_model")]
    pub model: String,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_embeddings_provider() -> String {
    "openai".to_string()
}

fn default_embeddings_model() -> String {
    "text-embedding-3-small".to_string()
}

const fn default_dimension() -> usize {
    1536
}

pub const fn default_batch_size() -> usize {
    100
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: default_embeddings_provider(),
            endpoint: default_llm_endpoint(),
            key: String::new(),
            model: default_embeddings_model(),
            dimension: default_dimension(),
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    /// `http` (cross-encoder service) or `lexical` (offline token overlap)
    #[serde(default = "default_reranker_provider")]
    pub provider: String,
    #[serde(default = "default_reranker_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_reranker_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_reranker_provider() -> String {
    "lexical".to_string()
}

fn default_reranker_endpoint() -> String {
    "http://localhost:8081".to_string()
}

fn default_reranker_model() -> String {
    "BAAI/bge-reranker-large".to_string()
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            provider: default_reranker_provider(),
            endpoint: default_reranker_endpoint(),
            model: default_reranker_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Window size and overlap (in characters) for one tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierChunking {
    pub size: usize,
    pub overlap: usize,
}

impl TierChunking {
    pub fn validate(&self, tier: DifficultyTier) -> Result<()> {
        if self.size == 0 {
            return Err(TierRagError::InvalidConfiguration(format!(
                "{tier} chunk size must be greater than zero"
            )));
        }
        if self.overlap >= self.size {
            return Err(TierRagError::InvalidConfiguration(format!(
                "{tier} chunk overlap ({}) must be smaller than chunk size ({})",
                self.overlap, self.size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_basic_chunking")]
    pub basic: TierChunking,
    #[serde(default = "default_intermediate_chunking")]
    pub intermediate: TierChunking,
    #[serde(default = "default_advanced_chunking")]
    pub advanced: TierChunking,
}

const fn default_basic_chunking() -> TierChunking {
    TierChunking {
        size: 512,
        overlap: 50,
    }
}

const fn default_intermediate_chunking() -> TierChunking {
    TierChunking {
        size: 1024,
        overlap: 100,
    }
}

const fn default_advanced_chunking() -> TierChunking {
    TierChunking {
        size: 1024,
        overlap: 150,
    }
}

impl ChunkingConfig {
    pub const fn for_tier(&self, tier: DifficultyTier) -> TierChunking {
        match tier {
            DifficultyTier::Basic => self.basic,
            DifficultyTier::Intermediate => self.intermediate,
            DifficultyTier::Advanced => self.advanced,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            basic: default_basic_chunking(),
            intermediate: default_intermediate_chunking(),
            advanced: default_advanced_chunking(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_basic_top_k")]
    pub basic_top_k: usize,
    #[serde(default = "default_intermediate_top_k")]
    pub intermediate_top_k: usize,
    /// Hits retrieved per decomposed sub-question
    #[serde(default = "default_sub_question_top_k")]
    pub sub_question_top_k: usize,
    /// Basic tier retrieves `multiplier * basic_top_k` candidates before filtering
    #[serde(default = "default_candidate_multiplier")]
    pub basic_candidate_multiplier: usize,
    #[serde(default = "default_max_sub_questions")]
    pub max_sub_questions: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_synthesis_temperature")]
    pub synthesis_temperature: f32,
}

const fn default_basic_top_k() -> usize {
    5
}

const fn default_intermediate_top_k() -> usize {
    10
}

const fn default_sub_question_top_k() -> usize {
    5
}

const fn default_candidate_multiplier() -> usize {
    3
}

const fn default_max_sub_questions() -> usize {
    4
}

const fn default_temperature() -> f32 {
    0.1
}

const fn default_synthesis_temperature() -> f32 {
    0.2
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            basic_top_k: default_basic_top_k(),
            intermediate_top_k: default_intermediate_top_k(),
            sub_question_top_k: default_sub_question_top_k(),
            basic_candidate_multiplier: default_candidate_multiplier(),
            max_sub_questions: default_max_sub_questions(),
            temperature: default_temperature(),
            synthesis_temperature: default_synthesis_temperature(),
        }
    }
}

/// Heuristic constants of the Basic tier metadata filter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilterConfig {
    /// Minimum top score for the filter to apply at all
    #[serde(default = "default_filter_threshold")]
    pub threshold: f32,
    /// Candidates scoring at least `retention_ratio * top` are kept
    #[serde(default = "default_retention_ratio")]
    pub retention_ratio: f32,
    #[serde(default = "default_year_full_points")]
    pub year_full_points: f32,
    #[serde(default = "default_year_partial_points")]
    pub year_partial_points: f32,
    #[serde(default = "default_keyword_points")]
    pub keyword_points: f32,
    #[serde(default = "default_filename_points")]
    pub filename_points: f32,
}

const fn default_filter_threshold() -> f32 {
    50.0
}

const fn default_retention_ratio() -> f32 {
    0.5
}

const fn default_year_full_points() -> f32 {
    100.0
}

const fn default_year_partial_points() -> f32 {
    50.0
}

const fn default_keyword_points() -> f32 {
    30.0
}

const fn default_filename_points() -> f32 {
    20.0
}

impl Default for MetadataFilterConfig {
    fn default() -> Self {
        Self {
            threshold: default_filter_threshold(),
            retention_ratio: default_retention_ratio(),
            year_full_points: default_year_full_points(),
            year_partial_points: default_year_partial_points(),
            keyword_points: default_keyword_points(),
            filename_points: default_filename_points(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DifficultyConfig {
    /// Ordered `(pattern, tier)` overrides, first match wins
    #[serde(default)]
    pub overrides: Vec<DifficultyOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_dir")]
    pub directory: PathBuf,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: default_log_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub reranker: RerankerConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub metadata_filter: MetadataFilterConfig,
    #[serde(default)]
    pub difficulty: DifficultyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse, apply environment overrides and validate
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default config file path
    pub fn load() -> Result<Self> {
        // Try to load from config.toml first, then fall back to config.example.toml
        if Path::new("config.toml").exists() {
            Self::from_file("config.toml")
        } else if Path::new("config.example.toml").exists() {
            tracing::warn!(
                "Using config.example.toml. Please create config.toml for production use."
            );
            Self::from_file("config.example.toml")
        } else {
            Err(TierRagError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No config file found. Please create config.toml or config.example.toml",
            )))
        }
    }

    /// Secrets may come from the environment instead of the config file
    pub fn apply_env_overrides(&mut self) {
        if let Some(key) = env_non_empty("TIERRAG_LLM_KEY").or_else(|| env_non_empty("OPENAI_API_KEY")) {
            self.llm.key = key;
        }
        if let Some(key) = env_non_empty("TIERRAG_EMBEDDINGS_KEY") {
            self.embeddings.key = key;
        } else if self.embeddings.key.is_empty() {
            self.embeddings.key = self.llm.key.clone();
        }
    }

    /// Reject configurations that cannot work, never correct them silently
    pub fn validate(&self) -> Result<()> {
        for tier in DifficultyTier::ALL {
            self.chunking.for_tier(tier).validate(tier)?;
        }

        let retrieval = &self.retrieval;
        for (name, value) in [
            ("basic_top_k", retrieval.basic_top_k),
            ("intermediate_top_k", retrieval.intermediate_top_k),
            ("sub_question_top_k", retrieval.sub_question_top_k),
            ("basic_candidate_multiplier", retrieval.basic_candidate_multiplier),
            ("max_sub_questions", retrieval.max_sub_questions),
        ] {
            if value == 0 {
                return Err(TierRagError::InvalidConfiguration(format!(
                    "retrieval.{name} must be greater than zero"
                )));
            }
        }

        let ratio = self.metadata_filter.retention_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(TierRagError::InvalidConfiguration(format!(
                "metadata_filter.retention_ratio must be in (0, 1], got {ratio}"
            )));
        }

        if self.embeddings.batch_size == 0 {
            return Err(TierRagError::InvalidConfiguration(
                "embeddings.batch_size must be greater than zero".to_string(),
            ));
        }

        // Compiles the override patterns
        crate::difficulty::DifficultyClassifier::with_overrides(&self.difficulty.overrides)?;

        Ok(())
    }

    /// Top-K used for the final candidate set of a tier
    pub const fn top_k(&self, tier: DifficultyTier) -> usize {
        match tier {
            DifficultyTier::Basic => self.retrieval.basic_top_k,
            DifficultyTier::Intermediate => self.retrieval.intermediate_top_k,
            DifficultyTier::Advanced => self.retrieval.sub_question_top_k,
        }
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
