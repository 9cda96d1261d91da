use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::difficulty::DifficultyTier;

/// Free-form document metadata (source, page, category, years, keywords, title, chunk info)
pub type Metadata = serde_json::Map<String, Value>;

/// Metadata keys shared by ingestion, chunking, filtering and reranking
pub mod keys {
    pub const SOURCE: &str = "source";
    pub const FILE_PATH: &str = "file_path";
    pub const PAGE: &str = "page";
    pub const CATEGORY: &str = "category";
    pub const TITLE: &str = "title";
    pub const FILE_TITLE: &str = "file_title";
    pub const YEAR: &str = "year";
    pub const YEAR_RANGE_START: &str = "year_range_start";
    pub const YEAR_RANGE_END: &str = "year_range_end";
    pub const YEAR_RANGE_TEXT: &str = "year_range_text";
    pub const KEYWORDS: &str = "keywords";
    pub const CHUNK_ID: &str = "chunk_id";
    pub const CHUNK_TYPE: &str = "chunk_type";
    pub const TOTAL_CHUNKS: &str = "total_chunks";
    pub const SPLIT_MODE: &str = "split_mode";
}

const UNKNOWN_SOURCE: &str = "unknown";
const UNKNOWN_PAGE: &str = "?";

/// A page (or other unit) of source text produced by ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
}

/// A chunk is a document produced by splitting; its metadata carries
/// `chunk_id`, `chunk_type` and `total_chunks` on top of the parent's metadata.
pub type Chunk = Document;

impl Document {
    pub fn new(content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            content: content.into(),
            metadata,
            page_number: None,
        }
    }

    #[must_use]
    pub const fn with_page_number(mut self, page_number: u32) -> Self {
        self.page_number = Some(page_number);
        self
    }

    /// Source file name, `"unknown"` when absent
    pub fn source(&self) -> &str {
        source_of(&self.metadata)
    }

    /// Tier tag this chunk was produced for, if it is a chunk
    pub fn chunk_type(&self) -> Option<&str> {
        self.metadata.get(keys::CHUNK_TYPE).and_then(Value::as_str)
    }
}

/// A hit returned by the retrieval index, most similar first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub distance: Option<f32>,
}

impl SearchResult {
    pub fn source(&self) -> &str {
        source_of(&self.metadata)
    }

    pub fn page(&self) -> PageRef {
        page_of(&self.metadata)
    }

    /// `[source, page]` citation string for this hit
    pub fn citation(&self) -> String {
        citation_for(&self.metadata)
    }
}

/// Page reference as it appears in answer cards: a number when known, text otherwise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageRef {
    Number(i64),
    Text(String),
}

impl std::fmt::Display for PageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

pub fn source_of(metadata: &Metadata) -> &str {
    metadata
        .get(keys::SOURCE)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_SOURCE)
}

pub fn page_of(metadata: &Metadata) -> PageRef {
    match metadata.get(keys::PAGE) {
        Some(Value::Number(n)) => n
            .as_i64()
            .map_or_else(|| PageRef::Text(n.to_string()), PageRef::Number),
        Some(Value::String(s)) if !s.is_empty() => PageRef::Text(s.clone()),
        _ => PageRef::Text(UNKNOWN_PAGE.to_string()),
    }
}

/// Format the `[source, page]` citation for a metadata record
pub fn citation_for(metadata: &Metadata) -> String {
    format!("[{}, {}]", source_of(metadata), page_of(metadata))
}

/// Integer metadata value, accepting numbers or numeric strings
pub fn meta_i64(metadata: &Metadata, key: &str) -> Option<i64> {
    match metadata.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Keyword list metadata, accepting a JSON array or a comma separated string
pub fn meta_keywords(metadata: &Metadata) -> Vec<String> {
    match metadata.get(keys::KEYWORDS) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Document title, falling back from `title` to `file_title`
pub fn meta_title(metadata: &Metadata) -> Option<&str> {
    metadata
        .get(keys::TITLE)
        .or_else(|| metadata.get(keys::FILE_TITLE))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Answer to one decomposed sub-question (Advanced tier)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAnswer {
    pub question: String,
    pub answer: String,
    pub sources: Vec<String>,
}

/// Raw output of a strategy before assembly
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOutcome {
    pub answer: String,
    pub sources: Vec<String>,
    pub retrieved_docs: Vec<SearchResult>,
    pub strategy: DifficultyTier,
    pub sub_questions: Option<Vec<String>>,
    pub sub_answers: Option<Vec<SubAnswer>>,
}

/// Answer returned when retrieval produced nothing usable
pub const NO_RELEVANT_INFORMATION: &str = "no relevant information found";

impl StrategyOutcome {
    /// The defined empty-retrieval result for a strategy
    pub fn empty(strategy: DifficultyTier) -> Self {
        Self {
            answer: NO_RELEVANT_INFORMATION.to_string(),
            sources: Vec::new(),
            retrieved_docs: Vec::new(),
            strategy,
            sub_questions: None,
            sub_answers: None,
        }
    }

    pub fn is_empty_retrieval(&self) -> bool {
        self.retrieved_docs.is_empty() && self.sources.is_empty()
    }
}

/// Final per-question answer record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: String,
    pub question: String,
    pub answer: String,
    pub sources: Vec<String>,
    pub retrieved_docs: Vec<SearchResult>,
    pub difficulty: DifficultyTier,
    pub strategy: DifficultyTier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_questions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_answers: Option<Vec<SubAnswer>>,
    pub time_used: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnswerRecord {
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
