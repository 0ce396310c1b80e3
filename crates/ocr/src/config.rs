use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Image normalization knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Images whose smaller side is below this are upscaled.
    pub min_dimension: u32,
    /// Images whose larger side is above this are downscaled.
    pub max_dimension: u32,
    /// Skew (degrees) below which no rotation is applied.
    pub deskew_threshold_deg: f32,
    /// Median filter radius used for denoising; 0 disables the step.
    pub denoise_radius: u32,
    pub binarize: bool,
    pub binarize_block_radius: u32,
    /// Subtracted from the local mean before thresholding.
    pub binarize_offset: i32,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            min_dimension: 500,
            max_dimension: 4000,
            deskew_threshold_deg: 5.0,
            denoise_radius: 1,
            binarize: true,
            binarize_block_radius: 15,
            binarize_offset: 10,
        }
    }
}

/// Engine pool policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PoolConfig {
    /// Below this many fragments the next engine is consulted as well.
    pub min_fragments: usize,
    /// Per-engine wall-clock budget; a hung engine counts as failed.
    pub engine_timeout_ms: u64,
}

impl PoolConfig {
    pub fn engine_timeout(&self) -> Duration {
        Duration::from_millis(self.engine_timeout_ms)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { min_fragments: 3, engine_timeout_ms: 30_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConsolidatorConfig {
    pub min_text_len: usize,
    pub min_confidence: f32,
    /// Share of alphanumerics a fragment needs to be kept.
    pub min_text_quality: f32,
    /// Grouping keys are truncated to this many chars.
    pub key_length: usize,
    /// Shortest key allowed to group with a longer key it prefixes.
    pub min_prefix_overlap: usize,
}

impl Default for ConsolidatorConfig {
    fn default() -> Self {
        Self {
            min_text_len: 2,
            min_confidence: 0.3,
            min_text_quality: 0.5,
            key_length: 20,
            min_prefix_overlap: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    pub recognition_weight: f32,
    pub completeness_weight: f32,
    /// Added per secondary field (place of birth, expiry date).
    pub secondary_field_bonus: f32,
    pub max_coherence_bonus: f32,
    pub valid_threshold: f32,
    pub suspect_threshold: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            recognition_weight: 0.7,
            completeness_weight: 0.3,
            secondary_field_bonus: 0.1,
            max_coherence_bonus: 0.2,
            valid_threshold: 0.8,
            suspect_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Unlabeled dates outside this year range are never taken as a birth date.
    pub min_birth_year: i32,
    pub max_birth_year: i32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self { min_birth_year: 1900, max_birth_year: 2030 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub normalizer: NormalizerConfig,
    pub pool: PoolConfig,
    pub consolidator: ConsolidatorConfig,
    pub extraction: ExtractionConfig,
    pub scoring: ScoringConfig,
    pub cache_ttl_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            normalizer: NormalizerConfig::default(),
            pool: PoolConfig::default(),
            consolidator: ConsolidatorConfig::default(),
            extraction: ExtractionConfig::default(),
            scoring: ScoringConfig::default(),
            cache_ttl_secs: 24 * 60 * 60,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(toml_content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.scoring;
        if !(0.0..=1.0).contains(&s.suspect_threshold)
            || !(0.0..=1.0).contains(&s.valid_threshold)
            || s.suspect_threshold > s.valid_threshold
        {
            return Err(ConfigError::Invalid(format!(
                "validity thresholds must satisfy 0 <= suspect ({}) <= valid ({}) <= 1",
                s.suspect_threshold, s.valid_threshold
            )));
        }
        if s.recognition_weight < 0.0 || s.completeness_weight < 0.0 {
            return Err(ConfigError::Invalid("scoring weights must be non-negative".into()));
        }
        let n = &self.normalizer;
        if n.min_dimension == 0 || n.min_dimension > n.max_dimension {
            return Err(ConfigError::Invalid(format!(
                "min_dimension ({}) must be in 1..=max_dimension ({})",
                n.min_dimension, n.max_dimension
            )));
        }
        if self.pool.engine_timeout_ms == 0 {
            return Err(ConfigError::Invalid("pool.engine_timeout_ms must be positive".into()));
        }
        if self.consolidator.key_length == 0 {
            return Err(ConfigError::Invalid("consolidator.key_length must be positive".into()));
        }
        if self.extraction.min_birth_year > self.extraction.max_birth_year {
            return Err(ConfigError::Invalid("min_birth_year exceeds max_birth_year".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_constants() {
        let c = PipelineConfig::default();
        assert_eq!(c.pool.min_fragments, 3);
        assert_eq!(c.scoring.valid_threshold, 0.8);
        assert_eq!(c.scoring.suspect_threshold, 0.5);
        assert_eq!(c.cache_ttl(), Duration::from_secs(86_400));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = PipelineConfig::from_toml(
            r#"
            cache_ttl_secs = 60

            [pool]
            engine_timeout_ms = 5000

            [scoring]
            valid_threshold = 0.9
            "#,
        )
        .unwrap();
        assert_eq!(c.cache_ttl_secs, 60);
        assert_eq!(c.pool.engine_timeout(), Duration::from_secs(5));
        assert_eq!(c.pool.min_fragments, 3);
        assert_eq!(c.scoring.valid_threshold, 0.9);
        assert_eq!(c.scoring.suspect_threshold, 0.5);
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let err = PipelineConfig::from_toml(
            r#"
            [scoring]
            valid_threshold = 0.4
            suspect_threshold = 0.6
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            PipelineConfig::from_toml("pool = 3"),
            Err(ConfigError::Parse(_))
        ));
    }
}
