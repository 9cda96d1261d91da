//! Hybrid reranking: learned relevance scores blended with metadata signals

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::config::RerankerConfig;
use crate::errors::Result;
use crate::errors::TierRagError;
use crate::models::keys;
use crate::models::meta_i64;
use crate::models::meta_keywords;
use crate::models::meta_title;
use crate::models::Metadata;
use crate::text;

const SEMANTIC_WEIGHT: f32 = 0.7;
const METADATA_WEIGHT: f32 = 0.3;

const YEAR_WEIGHT: f32 = 0.6;
const KEYWORD_WEIGHT: f32 = 0.25;
const TITLE_WEIGHT: f32 = 0.15;

/// Score given when a document year is one year off a query year
const NEAR_YEAR_SCORE: f32 = 0.5;

/// Pairwise (query, document) relevance model
#[async_trait]
pub trait RerankModel: Send + Sync {
    async fn score(&self, query: &str, document: &str) -> Result<f32>;

    async fn score_batch(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        let mut scores = Vec::with_capacity(documents.len());
        for document in documents {
            scores.push(self.score(query, document).await?);
        }
        Ok(scores)
    }
}

/// Orders candidate documents by blended relevance
#[derive(Clone)]
pub struct Reranker {
    model: Arc<dyn RerankModel>,
}

impl Reranker {
    pub fn new(model: Arc<dyn RerankModel>) -> Self {
        Self { model }
    }

    /// Indices into `documents`, most relevant first, at most `top_k` of them
    ///
    /// Final score is `0.7 * normalized model score + 0.3 * metadata score`;
    /// ties keep their original order.
    pub async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_k: usize,
        metadatas: Option<&[Metadata]>,
    ) -> Result<Vec<usize>> {
        match documents.len() {
            0 => return Ok(Vec::new()),
            1 => return Ok(vec![0]),
            _ => {}
        }
        if let Some(metadatas) = metadatas {
            if metadatas.len() != documents.len() {
                return Err(TierRagError::InvalidInput(format!(
                    "rerank got {} documents but {} metadata records",
                    documents.len(),
                    metadatas.len()
                )));
            }
        }

        let raw = self.model.score_batch(query, documents).await?;
        if raw.len() != documents.len() {
            return Err(TierRagError::upstream(
                "reranker",
                format!("expected {} scores, received {}", documents.len(), raw.len()),
            ));
        }
        let semantic = normalize_scores(&raw);

        let mut ranked: Vec<(usize, f32)> = semantic
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let meta = metadatas.map_or(0.0, |m| metadata_score(query, &m[i]));
                (i, SEMANTIC_WEIGHT * s + METADATA_WEIGHT * meta)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        debug!(
            "Reranked {} candidates, best index {} (score {:.3})",
            ranked.len(),
            ranked[0].0,
            ranked[0].1
        );
        Ok(ranked.into_iter().take(top_k).map(|(i, _)| i).collect())
    }
}

/// Min-max normalize into `[0, 1]`; all zeros when every score is equal
pub fn normalize_scores(scores: &[f32]) -> Vec<f32> {
    let min = scores.iter().copied().fold(f32::INFINITY, f32::min);
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let span = max - min;
    if !(span > 0.0) {
        return vec![0.0; scores.len()];
    }
    scores.iter().map(|s| (s - min) / span).collect()
}

/// Weighted metadata relevance in `[0, 1]`
pub fn metadata_score(query: &str, metadata: &Metadata) -> f32 {
    let years = text::extract_query_years(query);
    YEAR_WEIGHT * year_score(&years, metadata)
        + KEYWORD_WEIGHT * keyword_score(query, metadata)
        + TITLE_WEIGHT * title_score(query, metadata)
}

/// Declared year span of a document: a range, or a single year
pub fn document_year_span(metadata: &Metadata) -> Option<(i64, i64)> {
    match (
        meta_i64(metadata, keys::YEAR_RANGE_START),
        meta_i64(metadata, keys::YEAR_RANGE_END),
    ) {
        (Some(start), Some(end)) if start <= end => Some((start, end)),
        _ => meta_i64(metadata, keys::YEAR).map(|y| (y, y)),
    }
}

/// 1.0 when every query year is covered, else the covered fraction,
/// else 0.5 when some query year is one year off the span, else 0
pub fn year_score(query_years: &[i32], metadata: &Metadata) -> f32 {
    let Some((start, end)) = document_year_span(metadata) else {
        return 0.0;
    };
    if query_years.is_empty() {
        return 0.0;
    }

    let covered = query_years
        .iter()
        .filter(|&&y| (start..=end).contains(&i64::from(y)))
        .count();
    if covered == query_years.len() {
        return 1.0;
    }
    if covered > 0 {
        return covered as f32 / query_years.len() as f32;
    }

    let near = query_years.iter().any(|&y| {
        let y = i64::from(y);
        y == start - 1 || y == end + 1
    });
    if near {
        NEAR_YEAR_SCORE
    } else {
        0.0
    }
}

/// Fraction of the document's keywords that occur in the query
pub fn keyword_score(query: &str, metadata: &Metadata) -> f32 {
    let keywords = meta_keywords(metadata);
    if keywords.is_empty() {
        return 0.0;
    }
    let query = query.to_lowercase();
    let hits = keywords
        .iter()
        .filter(|k| query.contains(&k.to_lowercase()))
        .count();
    hits as f32 / keywords.len() as f32
}

/// Share of title words that also appear in the query
pub fn title_score(query: &str, metadata: &Metadata) -> f32 {
    let Some(title) = meta_title(metadata) else {
        return 0.0;
    };
    let title_words = text::word_set(title);
    if title_words.is_empty() {
        return 0.0;
    }
    let query_words = text::word_set(query);
    title_words.intersection(&query_words).count() as f32 / title_words.len() as f32
}

/// Cross-encoder served over HTTP (`POST {endpoint}/rerank`)
pub struct RerankClient {
    endpoint: String,
    client: Client,
}

impl RerankClient {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| TierRagError::InvalidConfiguration(format!("http client: {e}")))?;
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl RerankModel for RerankClient {
    async fn score(&self, query: &str, document: &str) -> Result<f32> {
        let scores = self.score_batch(query, &[document.to_string()]).await?;
        scores
            .first()
            .copied()
            .ok_or_else(|| TierRagError::upstream("reranker", "No score in response"))
    }

    async fn score_batch(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        #[derive(Serialize)]
        struct RerankRequest<'a> {
            query: &'a str,
            texts: &'a [String],
        }

        #[derive(Deserialize)]
        struct RankedText {
            index: usize,
            score: f64,
        }

        let url = format!("{}/rerank", self.endpoint);
        debug!("Calling rerank API: {} ({} texts)", url, documents.len());

        let response = self
            .client
            .post(&url)
            .json(&RerankRequest {
                query,
                texts: documents,
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
                "reranker",
                format!("rerank API error ({status}): {error_text}"),
            ));
        }

        let ranked: Vec<RankedText> = response
            .json()
            .await
            .map_err(|e| TierRagError::upstream("reranker", format!("Failed to parse response: {e}")))?;

        let mut scores = vec![f32::NEG_INFINITY; documents.len()];
        for item in ranked {
            if let Some(slot) = scores.get_mut(item.index) {
                *slot = item.score as f32;
            }
        }
        if scores.iter().any(|s| s.is_infinite()) {
            return Err(TierRagError::upstream(
                "reranker",
                "response did not score every text",
            ));
        }
        Ok(scores)
    }
}

/// Offline relevance: share of query tokens present in the document
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalOverlapModel;

#[async_trait]
impl RerankModel for LexicalOverlapModel {
    async fn score(&self, query: &str, document: &str) -> Result<f32> {
        let query_tokens: HashSet<String> = text::tokenize(query).into_iter().collect();
        if query_tokens.is_empty() {
            return Ok(0.0);
        }
        let doc_tokens: HashSet<String> = text::tokenize(document).into_iter().collect();
        Ok(query_tokens.intersection(&doc_tokens).count() as f32 / query_tokens.len() as f32)
    }
}

/// Build the rerank model selected by `reranker.provider`
pub fn create_rerank_model(config: &RerankerConfig) -> Result<Arc<dyn RerankModel>> {
    match config.provider.to_lowercase().as_str() {
        "lexical" => Ok(Arc::new(LexicalOverlapModel)),
        "http" => Ok(Arc::new(RerankClient::new(
            config.endpoint.clone(),
            config.timeout_secs,
        )?)),
        other => Err(TierRagError::InvalidConfiguration(format!(
            "unsupported reranker provider: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FixedScores(Vec<f32>);

    #[async_trait]
    impl RerankModel for FixedScores {
        async fn score(&self, _query: &str, _document: &str) -> Result<f32> {
            Err(TierRagError::InvalidInput("batch only".into()))
        }

        async fn score_batch(&self, _query: &str, _documents: &[String]) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    fn meta(value: serde_json::Value) -> Metadata {
        value.as_object().cloned().unwrap()
    }

    fn docs(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("doc {i}")).collect()
    }

    // ====== Rerank Ordering Tests ======

    #[tokio::test]
    async fn test_single_document_is_trivially_first() {
        let reranker = Reranker::new(Arc::new(FixedScores(vec![])));
        assert_eq!(reranker.rerank("q", &docs(1), 5, None).await.unwrap(), vec![0]);
        assert!(reranker.rerank("q", &[], 5, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_orders_by_semantic_score() {
        let reranker = Reranker::new(Arc::new(FixedScores(vec![0.1, 0.9, 0.5])));
        assert_eq!(
            reranker.rerank("q", &docs(3), 2, None).await.unwrap(),
            vec![1, 2]
        );
    }

    #[tokio::test]
    async fn test_equal_scores_keep_original_order() {
        let reranker = Reranker::new(Arc::new(FixedScores(vec![0.3, 0.3, 0.3])));
        assert_eq!(
            reranker.rerank("q", &docs(3), 3, None).await.unwrap(),
            vec![0, 1, 2]
        );
    }

    #[tokio::test]
    async fn test_metadata_can_overturn_close_semantic_scores() {
        let reranker = Reranker::new(Arc::new(FixedScores(vec![1.0, 0.9, 0.0])));
        let metadatas = vec![
            meta(json!({"year": 2019})),
            meta(json!({"year_range_start": 2025, "year_range_end": 2027, "keywords": ["ERA"]})),
            meta(json!({})),
        ];
        let order = reranker
            .rerank("ERA targets for 2026", &docs(3), 3, Some(&metadatas))
            .await
            .unwrap();
        assert_eq!(order, vec![1, 0, 2]);
    }

    #[tokio::test]
    async fn test_metadata_length_mismatch_is_invalid_input() {
        let reranker = Reranker::new(Arc::new(FixedScores(vec![0.1, 0.2])));
        let metadatas = vec![Metadata::new()];
        assert!(matches!(
            reranker.rerank("q", &docs(2), 1, Some(&metadatas)).await,
            Err(TierRagError::InvalidInput(_))
        ));
    }

    // ====== Score Component Tests ======

    #[test]
    fn test_normalize_scores() {
        assert_eq!(normalize_scores(&[2.0, 4.0, 3.0]), vec![0.0, 1.0, 0.5]);
        assert_eq!(normalize_scores(&[0.7, 0.7]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_year_score_inside_range_is_full() {
        let m = meta(json!({"year_range_start": 2025, "year_range_end": 2027}));
        assert_eq!(year_score(&[2026], &m), 1.0);
        assert_eq!(year_score(&[2025, 2026, 2027], &m), 1.0);
    }

    #[test]
    fn test_year_score_partial_and_near() {
        let m = meta(json!({"year_range_start": 2025, "year_range_end": 2026}));
        assert_eq!(year_score(&[2024, 2025, 2026, 2027], &m), 0.5);
        assert_eq!(year_score(&[2026, 2030], &m), 0.5);

        let single = meta(json!({"year": "2024"}));
        assert_eq!(year_score(&[2024], &single), 1.0);
        assert_eq!(year_score(&[2025], &single), 0.5);
        assert_eq!(year_score(&[2030], &single), 0.0);
        assert_eq!(year_score(&[], &single), 0.0);
        assert_eq!(year_score(&[2024], &Metadata::new()), 0.0);
    }

    #[test]
    fn test_keyword_and_title_scores() {
        let m = meta(json!({"keywords": ["ERA", "SPD", "TSI"], "title": "ERA Single Programming Document"}));
        let query = "what does the era single programming document say";
        assert!((keyword_score(query, &m) - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(title_score(query, &m), 1.0);
        assert_eq!(title_score("unrelated words", &m), 0.0);
    }

    #[test]
    fn test_metadata_score_weights() {
        let m = meta(json!({"year": 2025, "keywords": ["ERA"], "title": "plan"}));
        let score = metadata_score("ERA plan 2025", &m);
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_lexical_overlap_model() {
        let model = LexicalOverlapModel;
        assert_eq!(model.score("budget 2025", "the 2025 budget").await.unwrap(), 1.0);
        assert_eq!(model.score("budget 2025", "weather").await.unwrap(), 0.0);
        assert_eq!(model.score("", "anything").await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_unreachable_rerank_service_is_upstream_failure() {
        let client = RerankClient::new("http://127.0.0.1:1/", 2).unwrap();
        let err = client.score("q", "d").await.unwrap_err();
        assert!(err.is_upstream());
    }
}
