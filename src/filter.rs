//! Metadata prefilter for Basic tier candidates

use tracing::debug;

use crate::config::MetadataFilterConfig;
use crate::models::meta_keywords;
use crate::models::SearchResult;
use crate::rerank::document_year_span;
use crate::text;

/// Year and acronym signals extracted from a question
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySignals {
    pub years: Vec<i32>,
    pub keywords: Vec<String>,
}

impl QuerySignals {
    pub fn from_question(question: &str) -> Self {
        Self {
            years: text::extract_query_years(question),
            keywords: text::extract_acronyms(question),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty() && self.keywords.is_empty()
    }
}

/// Result of filtering: the candidates to rerank and whether the filter held
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub candidates: Vec<SearchResult>,
    pub applied: bool,
    pub top_score: f32,
}

/// Heuristic relevance points of one candidate
pub fn candidate_score(
    signals: &QuerySignals,
    candidate: &SearchResult,
    config: &MetadataFilterConfig,
) -> f32 {
    let mut score = 0.0;

    if !signals.years.is_empty() {
        if let Some((start, end)) = document_year_span(&candidate.metadata) {
            let covered = signals
                .years
                .iter()
                .filter(|&&y| (start..=end).contains(&i64::from(y)))
                .count();
            if covered == signals.years.len() {
                score += config.year_full_points;
            } else if covered > 0 {
                score += config.year_partial_points;
            }
        }
    }

    if !signals.keywords.is_empty() {
        let doc_keywords: Vec<String> = meta_keywords(&candidate.metadata)
            .iter()
            .map(|k| k.to_lowercase())
            .collect();
        let source = candidate.source().to_lowercase();

        for keyword in &signals.keywords {
            let keyword = keyword.to_lowercase();
            if doc_keywords.contains(&keyword) {
                score += config.keyword_points;
            }
            if source.contains(&keyword) {
                score += config.filename_points;
            }
        }
    }

    score
}

/// Keep candidates scoring within `retention_ratio` of the best when the
/// best reaches `threshold`; otherwise fall back to the unfiltered head.
/// Either way at most `top_k` candidates are returned.
pub fn filter_candidates(
    question: &str,
    candidates: Vec<SearchResult>,
    top_k: usize,
    config: &MetadataFilterConfig,
) -> FilterOutcome {
    let signals = QuerySignals::from_question(question);
    let mut scored: Vec<(f32, SearchResult)> = candidates
        .into_iter()
        .map(|c| (candidate_score(&signals, &c, config), c))
        .collect();
    let top_score = scored.iter().map(|(s, _)| *s).fold(0.0, f32::max);

    if scored.is_empty() || top_score < config.threshold {
        debug!(
            "Metadata filter skipped (top score {:.0}, signals {:?})",
            top_score, signals
        );
        return FilterOutcome {
            candidates: scored.into_iter().take(top_k).map(|(_, c)| c).collect(),
            applied: false,
            top_score,
        };
    }

    let floor = top_score * config.retention_ratio;
    scored.retain(|(s, _)| *s >= floor);
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.truncate(top_k);

    debug!(
        "Metadata filter kept {} candidates (top score {:.0}, floor {:.0})",
        scored.len(),
        top_score,
        floor
    );
    FilterOutcome {
        candidates: scored.into_iter().map(|(_, c)| c).collect(),
        applied: true,
        top_score,
    }
}
