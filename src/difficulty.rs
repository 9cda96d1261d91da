//! Question difficulty tiers and the identifier-based classifier

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use regex::RegexBuilder;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::errors::Result;
use crate::errors::TierRagError;

/// Difficulty tier driving the retrieval strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyTier {
    /// Needle in a haystack: one precise passage
    Basic,
    /// Single-document synthesis
    Intermediate,
    /// Multi-document synthesis via decomposition
    Advanced,
}

impl DifficultyTier {
    pub const ALL: [Self; 3] = [Self::Basic, Self::Intermediate, Self::Advanced];

    /// Tier tag used for collections, chunk types and answer metadata
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Basic => "basic: precise retrieval of a single passage (needle in a haystack)",
            Self::Intermediate => "intermediate: synthesis across sections of one document",
            Self::Advanced => "advanced: multi-document synthesis via sub-question decomposition",
        }
    }
}

impl fmt::Display for DifficultyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DifficultyTier {
    type Err = TierRagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" | "b" => Ok(Self::Basic),
            "intermediate" | "i" => Ok(Self::Intermediate),
            "advanced" | "a" => Ok(Self::Advanced),
            other => Err(TierRagError::UnknownTier(other.to_string())),
        }
    }
}

/// Custom `(pattern, tier)` rule checked before the default rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyOverride {
    pub pattern: String,
    pub tier: DifficultyTier,
}

const ADVANCED_TERMS: &[&str] = &[
    "compare",
    "comparison",
    "contrast",
    "synthesize",
    "synthesise",
    "versus",
    "比较",
    "对比",
    "综合",
    "异同",
];

const INTERMEDIATE_TERMS: &[&str] = &[
    "summarize",
    "summarise",
    "summary",
    "overview",
    "总结",
    "概述",
    "概括",
];

const FALLBACK_TIER: DifficultyTier = DifficultyTier::Intermediate;

/// Maps question identifiers to difficulty tiers.
///
/// Rules, first match wins: custom overrides, leading letter (`B`/`I`/`A`),
/// first embedded integer (`<100`, `100-199`, `>=200`), keyword terms, then
/// the intermediate fallback. Never fails once constructed.
#[derive(Debug, Clone)]
pub struct DifficultyClassifier {
    overrides: Vec<(Regex, DifficultyTier)>,
    number: Regex,
}

impl DifficultyClassifier {
    /// Classifier with the default rules only
    pub fn new() -> Self {
        Self {
            overrides: Vec::new(),
            number: number_pattern(),
        }
    }

    /// Classifier with an ordered list of custom overrides
    pub fn with_overrides(overrides: &[DifficultyOverride]) -> Result<Self> {
        let overrides = overrides
            .iter()
            .map(|rule| {
                RegexBuilder::new(&rule.pattern)
                    .case_insensitive(true)
                    .build()
                    .map(|re| (re, rule.tier))
                    .map_err(|e| {
                        TierRagError::InvalidConfiguration(format!(
                            "invalid difficulty override pattern '{}': {e}",
                            rule.pattern
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            overrides,
            number: number_pattern(),
        })
    }

    /// Classify by question identifier alone
    pub fn classify(&self, question_id: &str) -> DifficultyTier {
        self.classify_question(question_id, None)
    }

    /// Classify by identifier, falling back to the question text for keyword hints
    pub fn classify_question(&self, question_id: &str, question: Option<&str>) -> DifficultyTier {
        let id = question_id.trim();

        if let Some((_, tier)) = self.overrides.iter().find(|(re, _)| re.is_match(id)) {
            debug!("Question '{}' matched custom difficulty override", id);
            return *tier;
        }

        if let Some(tier) = tier_from_prefix(id) {
            return tier;
        }

        if let Some(tier) = self.tier_from_number(id) {
            return tier;
        }

        if let Some(tier) = tier_from_keywords(id) {
            return tier;
        }

        if let Some(tier) = question.and_then(tier_from_keywords) {
            return tier;
        }

        FALLBACK_TIER
    }

    fn tier_from_number(&self, id: &str) -> Option<DifficultyTier> {
        let digits = self.number.find(id)?.as_str();
        // Integers too large for u64 are far beyond the advanced threshold
        let value = digits.parse::<u64>().unwrap_or(u64::MAX);
        Some(match value {
            0..=99 => DifficultyTier::Basic,
            100..=199 => DifficultyTier::Intermediate,
            _ => DifficultyTier::Advanced,
        })
    }
}

impl Default for DifficultyClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn number_pattern() -> Regex {
    Regex::new(r"\d+").expect("static integer pattern is valid")
}

fn tier_from_prefix(id: &str) -> Option<DifficultyTier> {
    match id.chars().next()?.to_ascii_uppercase() {
        'B' => Some(DifficultyTier::Basic),
        'I' => Some(DifficultyTier::Intermediate),
        'A' => Some(DifficultyTier::Advanced),
        _ => None,
    }
}

fn tier_from_keywords(text: &str) -> Option<DifficultyTier> {
    let lowered = text.to_lowercase();
    if ADVANCED_TERMS.iter().any(|term| lowered.contains(term)) {
        Some(DifficultyTier::Advanced)
    } else if INTERMEDIATE_TERMS.iter().any(|term| lowered.contains(term)) {
        Some(DifficultyTier::Intermediate)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_rule() {
        let classifier = DifficultyClassifier::new();
        for id in ["B001", "b-17", "BASIC_001", "  B999  "] {
            assert_eq!(classifier.classify(id), DifficultyTier::Basic, "{id}");
        }
        for id in ["I001", "i42"] {
            assert_eq!(classifier.classify(id), DifficultyTier::Intermediate, "{id}");
        }
        for id in ["A001", "a7"] {
            assert_eq!(classifier.classify(id), DifficultyTier::Advanced, "{id}");
        }
    }

    #[test]
    fn test_numeric_rule() {
        let classifier = DifficultyClassifier::new();
        assert_eq!(classifier.classify("42"), DifficultyTier::Basic);
        assert_eq!(classifier.classify("99"), DifficultyTier::Basic);
        assert_eq!(classifier.classify("100"), DifficultyTier::Intermediate);
        assert_eq!(classifier.classify("150"), DifficultyTier::Intermediate);
        assert_eq!(classifier.classify("199"), DifficultyTier::Intermediate);
        assert_eq!(classifier.classify("200"), DifficultyTier::Advanced);
        assert_eq!(classifier.classify("Q-250"), DifficultyTier::Advanced);
        assert_eq!(
            classifier.classify("99999999999999999999999"),
            DifficultyTier::Advanced
        );
    }

    #[test]
    fn test_keyword_rule() {
        let classifier = DifficultyClassifier::new();
        assert_eq!(classifier.classify("q-compare"), DifficultyTier::Advanced);
        assert_eq!(classifier.classify("overview"), DifficultyTier::Intermediate);
        assert_eq!(
            classifier.classify_question("Q_AUTO", Some("Compare CBTC and ERTMS")),
            DifficultyTier::Advanced
        );
    }

    #[test]
    fn test_fallback_is_intermediate() {
        let classifier = DifficultyClassifier::new();
        assert_eq!(classifier.classify("Q_AUTO"), DifficultyTier::Intermediate);
        assert_eq!(classifier.classify(""), DifficultyTier::Intermediate);
        assert_eq!(classifier.classify("   "), DifficultyTier::Intermediate);
    }

    #[test]
    fn test_overrides_take_precedence_in_order() {
        let classifier = DifficultyClassifier::with_overrides(&[
            DifficultyOverride {
                pattern: "^exam-hard".to_string(),
                tier: DifficultyTier::Advanced,
            },
            DifficultyOverride {
                pattern: "^exam".to_string(),
                tier: DifficultyTier::Basic,
            },
        ])
        .unwrap();

        assert_eq!(classifier.classify("EXAM-HARD-3"), DifficultyTier::Advanced);
        assert_eq!(classifier.classify("exam-150"), DifficultyTier::Basic);
        assert_eq!(classifier.classify("A001"), DifficultyTier::Advanced);
    }

    #[test]
    fn test_invalid_override_pattern() {
        let result = DifficultyClassifier::with_overrides(&[DifficultyOverride {
            pattern: "([".to_string(),
            tier: DifficultyTier::Basic,
        }]);
        assert!(matches!(result, Err(TierRagError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_tier_round_trip() {
        for tier in DifficultyTier::ALL {
            assert_eq!(tier.as_str().parse::<DifficultyTier>().unwrap(), tier);
        }
        assert!(matches!(
            "expert".parse::<DifficultyTier>(),
            Err(TierRagError::UnknownTier(_))
        ));
    }
}
