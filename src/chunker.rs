//! Tier-specific chunking of ingested documents
//!
//! - Basic / Advanced: character sliding window over each document on its own
//! - Intermediate: pages of one source are joined, split on section headings
//!   when at least two headings of one style exist, windowed otherwise

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::config::ChunkingConfig;
use crate::config::TierChunking;
use crate::difficulty::DifficultyTier;
use crate::errors::Result;
use crate::models::keys;
use crate::models::Chunk;
use crate::models::Document;
use crate::models::Metadata;

/// How an intermediate chunk was produced
const SPLIT_SECTION: &str = "section";
const SPLIT_WINDOW: &str = "window";

/// Heading styles tried in order; a style wins with two or more matches
fn section_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"\n第[一二三四五六七八九十百\d]+章[^\n]*\n",
            r"\n第[一二三四五六七八九十百\d]+节[^\n]*\n",
            r"\n(?:Chapter|CHAPTER|Section|SECTION)\s+[\dIVXLC]+[^\n]*\n",
            r"\n\d+\.\d+[^\n]*\n",
            r"\n[A-Z\d]+\.[^\n]*\n",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static heading pattern is valid"))
        .collect()
    })
}

/// Chunker bound to the configured per-tier window sizes
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub const fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// Chunk documents with the configured policy of `tier`
    pub fn chunk(&self, tier: DifficultyTier, documents: &[Document]) -> Result<Vec<Chunk>> {
        let policy = self.config.for_tier(tier);
        chunk_for_tier(tier, documents, policy.size, policy.overlap)
    }
}

/// Split documents into the chunk set of one tier
pub fn chunk_for_tier(
    tier: DifficultyTier,
    documents: &[Document],
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>> {
    TierChunking {
        size: chunk_size,
        overlap,
    }
    .validate(tier)?;

    let chunks = match tier {
        DifficultyTier::Basic | DifficultyTier::Advanced => {
            chunk_per_document(tier, documents, chunk_size, overlap)?
        }
        DifficultyTier::Intermediate => chunk_by_source(documents, chunk_size, overlap)?,
    };

    debug!(
        "Chunked {} documents into {} {} chunks",
        documents.len(),
        chunks.len(),
        tier
    );
    Ok(chunks)
}

pub fn chunk_for_basic(documents: &[Document], chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    chunk_for_tier(DifficultyTier::Basic, documents, chunk_size, overlap)
}

pub fn chunk_for_intermediate(
    documents: &[Document],
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>> {
    chunk_for_tier(DifficultyTier::Intermediate, documents, chunk_size, overlap)
}

pub fn chunk_for_advanced(
    documents: &[Document],
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>> {
    chunk_for_tier(DifficultyTier::Advanced, documents, chunk_size, overlap)
}

fn chunk_per_document(
    tier: DifficultyTier,
    documents: &[Document],
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>> {
    let mut chunks = Vec::new();
    for doc in documents {
        let windows = sliding_windows(&doc.content, chunk_size, overlap)?;
        let total = windows.len();
        for (i, window) in windows.into_iter().enumerate() {
            chunks.push(Chunk {
                content: window,
                metadata: chunk_metadata(&doc.metadata, tier, i, total),
                page_number: doc.page_number,
            });
        }
    }
    Ok(chunks)
}

fn chunk_by_source(documents: &[Document], chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    // Group pages by source, keeping first-seen source order and page order
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&Document>> = HashMap::new();
    for doc in documents {
        let source = doc.source();
        groups
            .entry(source)
            .or_insert_with(|| {
                order.push(source);
                Vec::new()
            })
            .push(doc);
    }

    let mut chunks = Vec::new();
    for source in order {
        let pages = &groups[source];
        let full_text = pages
            .iter()
            .map(|d| d.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let base = &pages[0].metadata;

        let (pieces, mode) = match split_by_sections(&full_text) {
            Some(sections) => (sections, SPLIT_SECTION),
            None => (sliding_windows(&full_text, chunk_size, overlap)?, SPLIT_WINDOW),
        };
        debug!("Source '{}' split by {} into {} chunks", source, mode, pieces.len());

        let total = pieces.len();
        for (i, piece) in pieces.into_iter().enumerate() {
            let mut metadata = chunk_metadata(base, DifficultyTier::Intermediate, i, total);
            metadata.insert(keys::SPLIT_MODE.to_string(), Value::from(mode));
            chunks.push(Chunk::new(piece, metadata));
        }
    }
    Ok(chunks)
}

fn chunk_metadata(parent: &Metadata, tier: DifficultyTier, chunk_id: usize, total: usize) -> Metadata {
    let mut metadata = parent.clone();
    metadata.insert(keys::CHUNK_ID.to_string(), Value::from(chunk_id));
    metadata.insert(keys::CHUNK_TYPE.to_string(), Value::from(tier.as_str()));
    metadata.insert(keys::TOTAL_CHUNKS.to_string(), Value::from(total));
    metadata
}

/// Fixed-size character windows advancing by `chunk_size - overlap`.
///
/// Whitespace-only windows are dropped.
pub fn sliding_windows(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    TierChunking {
        size: chunk_size,
        overlap,
    }
    .validate(DifficultyTier::Basic)?;

    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size - overlap;
    let mut windows = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        let window: String = chars[start..end].iter().collect();
        if !window.trim().is_empty() {
            windows.push(window);
        }
        start += step;
    }

    Ok(windows)
}

/// Split on the first heading style with at least two matches.
///
/// Text before the first heading is kept as its own section.
pub fn split_by_sections(text: &str) -> Option<Vec<String>> {
    for pattern in section_patterns() {
        let starts: Vec<usize> = pattern.find_iter(text).map(|m| m.start()).collect();
        if starts.len() < 2 {
            continue;
        }

        let mut sections = Vec::with_capacity(starts.len() + 1);
        let mut boundaries = Vec::with_capacity(starts.len() + 2);
        boundaries.push(0);
        boundaries.extend(starts);
        boundaries.push(text.len());

        for pair in boundaries.windows(2) {
            let section = text[pair[0]..pair[1]].trim();
            if !section.is_empty() {
                sections.push(section.to_string());
            }
        }
        return Some(sections);
    }
    None
}
