use crate::config::ScoringConfig;
use crate::consolidate::mean_confidence;
use crate::types::{ConsolidatedLine, ExtractedFields, ValidityStatus};

/// Where an extracted value came from; determines how far it is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// Machine-readable zone with a verified check digit.
    Mrz,
    /// Value next to a recognised label.
    Labeled,
    /// Guessed from layout (first uppercase run, unlabeled dates).
    Positional,
    /// Filled from a named-entity span.
    Entity,
}

impl FieldSource {
    pub fn reliability(self) -> f32 {
        match self {
            FieldSource::Mrz => 0.95,
            FieldSource::Labeled => 0.9,
            FieldSource::Positional => 0.6,
            FieldSource::Entity => 0.5,
        }
    }

    /// Per-field confidence: the recognition confidence of the line the
    /// value was read from, scaled by the source reliability.
    pub fn field_confidence(self, line_confidence: f32) -> f32 {
        (line_confidence * self.reliability()).clamp(0.0, 1.0)
    }
}

/// Overall confidence and validity verdict for one recognition.
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    config: ScoringConfig,
}

impl Scorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// recognition × mean line confidence + completeness × core fields / 4
    /// + a capped bonus for secondary fields, clamped to [0, 1].
    pub fn confidence(&self, lines: &[ConsolidatedLine], fields: &ExtractedFields) -> f32 {
        let c = &self.config;
        let completeness = fields.core_fields_present() as f32 / 4.0;
        let secondary = [fields.place_of_birth.is_some(), fields.expiry_date.is_some()]
            .iter()
            .filter(|present| **present)
            .count() as f32;
        let bonus = (secondary * c.secondary_field_bonus).min(c.max_coherence_bonus);

        let score = c.recognition_weight * mean_confidence(lines) + c.completeness_weight * completeness + bonus;
        score.clamp(0.0, 1.0)
    }

    pub fn validity(&self, confidence: f32) -> ValidityStatus {
        if confidence >= self.config.valid_threshold {
            ValidityStatus::Valid
        } else if confidence >= self.config.suspect_threshold {
            ValidityStatus::Suspect
        } else {
            ValidityStatus::Invalid
        }
    }

    pub fn evaluate(&self, lines: &[ConsolidatedLine], fields: &ExtractedFields) -> (f32, ValidityStatus) {
        let confidence = self.confidence(lines, fields);
        (confidence, self.validity(confidence))
    }
}
