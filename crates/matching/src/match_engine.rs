use docmatch_core::text::{fold_text, normalize_identifier, similarity_ratio};
use docmatch_core::{AppliedWeight, IdentityFields, MatchCriteria};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse match config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid match config: {0}")]
    Invalid(String),
}

/// Field weights and the acceptance threshold. Weights are fixed shares of
/// the final score, so a record with few fields can never reach a high score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatchConfig {
    pub given_name_weight: f32,
    pub family_name_weight: f32,
    pub date_of_birth_weight: f32,
    pub document_number_weight: f32,
    /// A pair is accepted when its score is strictly above this value.
    pub acceptance_threshold: f32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            given_name_weight: 0.30,
            family_name_weight: 0.30,
            date_of_birth_weight: 0.25,
            document_number_weight: 0.15,
            acceptance_threshold: 0.5,
        }
    }
}

impl MatchConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let config: MatchConfig = toml::from_str(toml_content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = [
            ("given_name_weight", self.given_name_weight),
            ("family_name_weight", self.family_name_weight),
            ("date_of_birth_weight", self.date_of_birth_weight),
            ("document_number_weight", self.document_number_weight),
        ];
        for (name, w) in weights {
            if !w.is_finite() || w < 0.0 {
                return Err(ConfigError::Invalid(format!("{name} must be a non-negative number, got {w}")));
            }
        }
        let total: f32 = weights.iter().map(|(_, w)| w).sum();
        if total > 1.0 + 1e-6 {
            return Err(ConfigError::Invalid(format!("weights sum to {total}, must not exceed 1.0")));
        }
        if !(0.0..=1.0).contains(&self.acceptance_threshold) {
            return Err(ConfigError::Invalid(format!(
                "acceptance_threshold must be within [0, 1], got {}",
                self.acceptance_threshold
            )));
        }
        Ok(())
    }
}

/// Weighted identity comparison of a lost and a found declaration.
#[derive(Debug, Clone, Default)]
pub struct MatchEngine {
    config: MatchConfig,
}

impl MatchEngine {
    pub fn new(config: MatchConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn score<A, B>(&self, a: &A, b: &B) -> f32
    where
        A: IdentityFields + ?Sized,
        B: IdentityFields + ?Sized,
    {
        self.score_with_criteria(a, b).0
    }

    /// Sum of the gated sub-scores, clamped to 1.0, together with the
    /// per-field breakdown. A comparison only counts when both sides carry
    /// the field.
    pub fn score_with_criteria<A, B>(&self, a: &A, b: &B) -> (f32, MatchCriteria)
    where
        A: IdentityFields + ?Sized,
        B: IdentityFields + ?Sized,
    {
        let c = &self.config;
        let mut applied = Vec::new();

        if let (Some(x), Some(y)) = (a.first_name(), b.first_name()) {
            applied.push(weighted("given_name", c.given_name_weight, name_similarity(x, y)));
        }
        if let (Some(x), Some(y)) = (a.last_name(), b.last_name()) {
            applied.push(weighted("family_name", c.family_name_weight, name_similarity(x, y)));
        }
        if let (Some(x), Some(y)) = (a.date_of_birth(), b.date_of_birth()) {
            applied.push(weighted("date_of_birth", c.date_of_birth_weight, if x == y { 1.0 } else { 0.0 }));
        }
        let numbers = (
            a.document_number().map(normalize_identifier).filter(|n| !n.is_empty()),
            b.document_number().map(normalize_identifier).filter(|n| !n.is_empty()),
        );
        if let (Some(x), Some(y)) = numbers {
            applied.push(weighted("document_number", c.document_number_weight, similarity_ratio(&x, &y)));
        }

        let score = applied.iter().map(|w| w.contribution).sum::<f32>().clamp(0.0, 1.0);
        (score, MatchCriteria::basic(applied))
    }

    pub fn is_accepted(&self, score: f32) -> bool {
        score > self.config.acceptance_threshold
    }
}

fn name_similarity(a: &str, b: &str) -> f32 {
    similarity_ratio(&fold_text(a), &fold_text(b))
}

fn weighted(field: &str, weight: f32, similarity: f32) -> AppliedWeight {
    AppliedWeight { field: field.to_string(), weight, similarity, contribution: weight * similarity }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use docmatch_core::{DocumentType, FoundRecord, LostRecord};

    fn lost(first: &str, last: &str, dob: Option<(i32, u32, u32)>, number: Option<&str>) -> LostRecord {
        let mut r = LostRecord::new(1, DocumentType::NationalId);
        r.first_name = Some(first.to_string());
        r.last_name = Some(last.to_string());
        r.date_of_birth = dob.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d));
        r.document_number = number.map(str::to_string);
        r
    }

    fn found(first: &str, last: &str, dob: Option<(i32, u32, u32)>, number: Option<&str>) -> FoundRecord {
        let mut r = FoundRecord::new(2, DocumentType::NationalId);
        r.first_name = Some(first.to_string());
        r.last_name = Some(last.to_string());
        r.date_of_birth = dob.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d));
        r.document_number = number.map(str::to_string);
        r
    }

    #[test]
    fn identical_records_score_high() {
        let engine = MatchEngine::default();
        let a = lost("Aminata", "Diallo", Some((1991, 6, 15)), Some("1 234 567 890 123"));
        let b = found("AMINATA", "DIALLO", Some((1991, 6, 15)), Some("1234567890123"));
        let (score, criteria) = engine.score_with_criteria(&a, &b);
        assert!(score > 0.9, "score was {score}");
        assert!(engine.is_accepted(score));
        assert_eq!(criteria.method, "basic");
        assert_eq!(criteria.weights_applied.len(), 4);
    }

    #[test]
    fn punctuated_document_numbers_compare_exactly() {
        let engine = MatchEngine::default();
        let a = lost("Aminata", "Diallo", Some((1991, 6, 15)), Some("CI-XYZ-12345"));
        let b = found("Aminata", "Diallo", Some((1991, 6, 15)), Some("CI-XYZ-12345"));
        assert!((engine.score(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn accents_and_case_do_not_matter() {
        let engine = MatchEngine::default();
        let a = lost("Marième", "Ndiaye", None, None);
        let b = found("MARIEME", "NDIAYE", None, None);
        assert!((engine.score(&a, &b) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn missing_fields_contribute_nothing() {
        let engine = MatchEngine::default();
        let mut a = lost("", "", None, Some("AB123456"));
        a.first_name = None;
        let b = found("Awa", "  ", Some((1990, 1, 1)), Some("ab 123456"));
        let (score, criteria) = engine.score_with_criteria(&a, &b);
        assert!((score - 0.15).abs() < 1e-6);
        assert_eq!(criteria.weights_applied.len(), 1);
        assert_eq!(criteria.weights_applied[0].field, "document_number");
        assert!(!engine.is_accepted(score));
    }

    #[test]
    fn near_miss_document_number_gets_partial_credit() {
        let engine = MatchEngine::default();
        let a = lost("Awa", "Sarr", None, Some("1234567890"));
        let b = found("Awa", "Sarr", None, Some("1234567899"));
        let score = engine.score(&a, &b);
        assert!((score - (0.6 + 0.15 * 0.9)).abs() < 1e-5, "score was {score}");
    }

    #[test]
    fn date_of_birth_must_match_exactly() {
        let engine = MatchEngine::default();
        let a = lost("Awa", "Sarr", Some((1990, 1, 1)), None);
        let b = found("Awa", "Sarr", Some((1990, 1, 2)), None);
        assert!((engine.score(&a, &b) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn threshold_is_strict() {
        let config = MatchConfig {
            given_name_weight: 0.5,
            family_name_weight: 0.0,
            date_of_birth_weight: 0.0,
            document_number_weight: 0.0,
            acceptance_threshold: 0.5,
        };
        let engine = MatchEngine::new(config).unwrap();
        let score = engine.score(&lost("Awa", "Sarr", None, None), &found("Awa", "Fall", None, None));
        assert_eq!(score, 0.5);
        assert!(!engine.is_accepted(score));
    }

    #[test]
    fn config_validation() {
        assert!(MatchConfig::default().validate().is_ok());
        let heavy = MatchConfig { given_name_weight: 0.6, ..Default::default() };
        assert!(matches!(heavy.validate(), Err(ConfigError::Invalid(_))));
        let negative = MatchConfig { date_of_birth_weight: -0.1, ..Default::default() };
        assert!(MatchEngine::new(negative).is_err());

        let parsed = MatchConfig::from_toml("acceptance_threshold = 0.7").unwrap();
        assert_eq!(parsed.acceptance_threshold, 0.7);
        assert_eq!(parsed.given_name_weight, 0.30);
        assert!(MatchConfig::from_toml("given_name_weight = 0.9").is_err());
    }
}
