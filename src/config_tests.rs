//! Unit tests for configuration module
//!
//! These tests validate configuration parsing, defaults, and validation.

#[cfg(test)]
mod tests {
    use crate::config::*;
    use crate::difficulty::DifficultyTier;
    use crate::errors::TierRagError;

    // ====== Default Value Tests ======

    #[test]
    fn test_default_chunking_matches_tiers() {
        let config = ChunkingConfig::default();
        assert_eq!(config.for_tier(DifficultyTier::Basic), TierChunking { size: 512, overlap: 50 });
        assert_eq!(
            config.for_tier(DifficultyTier::Intermediate),
            TierChunking { size: 1024, overlap: 100 }
        );
        assert_eq!(
            config.for_tier(DifficultyTier::Advanced),
            TierChunking { size: 1024, overlap: 150 }
        );
    }

    #[test]
    fn test_default_retrieval() {
        let config = AppConfig::default();
        assert_eq!(config.top_k(DifficultyTier::Basic), 5);
        assert_eq!(config.top_k(DifficultyTier::Intermediate), 10);
        assert_eq!(config.top_k(DifficultyTier::Advanced), 5);
        assert_eq!(config.retrieval.basic_candidate_multiplier, 3);
        assert_eq!(config.retrieval.max_sub_questions, 4);
    }

    #[test]
    fn test_default_filter_constants() {
        let filter = MetadataFilterConfig::default();
        assert_eq!(filter.threshold, 50.0);
        assert_eq!(filter.retention_ratio, 0.5);
        assert_eq!(filter.year_full_points, 100.0);
        assert_eq!(filter.keyword_points, 30.0);
        assert_eq!(filter.filename_points, 20.0);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    // ====== Parsing Tests ======

    #[test]
    fn test_parse_partial_toml_uses_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
[corpus]
root = "/data/docs"

[chunking.basic]
size = 256
overlap = 32

[[difficulty.overrides]]
pattern = "^hard-"
tier = "advanced"
"#,
        )
        .unwrap();

        assert_eq!(config.corpus.root.to_str(), Some("/data/docs"));
        assert_eq!(config.corpus.extension, "txt");
        assert_eq!(config.chunking.basic, TierChunking { size: 256, overlap: 32 });
        assert_eq!(config.chunking.advanced.overlap, 150);
        assert_eq!(config.difficulty.overrides.len(), 1);
        assert_eq!(config.difficulty.overrides[0].tier, DifficultyTier::Advanced);
        assert_eq!(config.llm.timeout_secs, 120);
    }

    #[test]
    fn test_parse_empty_toml() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.retrieval.temperature, 0.1);
        assert_eq!(config.retrieval.synthesis_temperature, 0.2);
    }

    // ====== Validation Tests ======

    #[test]
    fn test_overlap_not_smaller_than_size_is_rejected() {
        let result = AppConfig::from_toml_str(
            r"
[chunking.intermediate]
size = 100
overlap = 100
",
        );
        assert!(matches!(result, Err(TierRagError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_zero_top_k_is_rejected() {
        let mut config = AppConfig::default();
        config.retrieval.basic_top_k = 0;
        assert!(matches!(
            config.validate(),
            Err(TierRagError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_retention_ratio_bounds() {
        let mut config = AppConfig::default();
        config.metadata_filter.retention_ratio = 1.5;
        assert!(config.validate().is_err());
        config.metadata_filter.retention_ratio = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_override_pattern_is_rejected() {
        let result = AppConfig::from_toml_str(
            r#"
[[difficulty.overrides]]
pattern = "(unclosed"
tier = "basic"
"#,
        );
        assert!(matches!(result, Err(TierRagError::InvalidConfiguration(_))));
    }
}
