use chrono::NaiveDate;
use docmatch_core::{DocumentType, FoundRecord, Sex};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single extracted value with an associated confidence score (0.0–1.0).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedField<T> {
    pub value: T,
    /// Confidence in this extraction (0.0 = guessed, 1.0 = certain).
    pub confidence: f32,
}

impl<T> ExtractedField<T> {
    pub fn new(value: T, confidence: f32) -> Self {
        Self { value, confidence: confidence.clamp(0.0, 1.0) }
    }
}

/// Axis-aligned box in pixel coordinates of the normalized image.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// From engine coordinates, which may be negative near the page edge.
    pub fn from_signed(x: i32, y: i32, width: i32, height: i32) -> Self {
        let clamp = |v: i32| v.max(0) as u32;
        BoundingBox { x: clamp(x), y: clamp(y), width: clamp(width), height: clamp(height) }
    }
}

/// One engine's detection of a text region.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawTextFragment {
    pub region: Option<BoundingBox>,
    pub text: String,
    pub engine_confidence: f32,
    pub source_engine: String,
}

impl RawTextFragment {
    pub fn new(text: impl Into<String>, engine_confidence: f32, source_engine: impl Into<String>) -> Self {
        Self {
            region: None,
            text: text.into(),
            engine_confidence: engine_confidence.clamp(0.0, 1.0),
            source_engine: source_engine.into(),
        }
    }

    pub fn with_region(mut self, region: BoundingBox) -> Self {
        self.region = Some(region);
        self
    }
}

/// A line agreed on by one or more engines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsolidatedLine {
    pub text: String,
    pub best_confidence: f32,
    pub contributing_engines: Vec<String>,
}

/// The fixed identity-field schema. Every field may legitimately stay empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ExtractedFields {
    pub family_name: Option<ExtractedField<String>>,
    pub given_name: Option<ExtractedField<String>>,
    pub date_of_birth: Option<ExtractedField<NaiveDate>>,
    pub document_number: Option<ExtractedField<String>>,
    pub place_of_birth: Option<ExtractedField<String>>,
    pub nationality: Option<ExtractedField<String>>,
    pub sex: Option<ExtractedField<Sex>>,
    pub expiry_date: Option<ExtractedField<NaiveDate>>,
    pub photo_detected: Option<ExtractedField<bool>>,
}

impl ExtractedFields {
    /// Number of core fields (family name, given name, date of birth,
    /// document number) that were filled.
    pub fn core_fields_present(&self) -> usize {
        [
            self.family_name.is_some(),
            self.given_name.is_some(),
            self.date_of_birth.is_some(),
            self.document_number.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }

    pub fn is_empty(&self) -> bool {
        *self == ExtractedFields::default()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValidityStatus {
    Valid,
    Suspect,
    Invalid,
}

impl fmt::Display for ValidityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidityStatus::Valid => write!(f, "valid"),
            ValidityStatus::Suspect => write!(f, "suspect"),
            ValidityStatus::Invalid => write!(f, "invalid"),
        }
    }
}

impl std::str::FromStr for ValidityStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "valid" => Ok(ValidityStatus::Valid),
            "suspect" => Ok(ValidityStatus::Suspect),
            "invalid" => Ok(ValidityStatus::Invalid),
            other => Err(format!("Unknown validity status: '{other}'")),
        }
    }
}

/// The outcome of one recognition run. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecognitionResult {
    pub document_type: DocumentType,
    pub fields: ExtractedFields,
    pub raw_text: String,
    pub confidence_score: f32,
    pub validity_status: ValidityStatus,
    /// Wall-clock seconds spent producing the result.
    pub processing_time: f64,
}

impl RecognitionResult {
    /// The sentinel returned when nothing could be read: unknown type, empty
    /// fields, confidence 0.0 and `invalid`.
    pub fn degraded(processing_time: f64) -> Self {
        RecognitionResult {
            document_type: DocumentType::Unknown,
            fields: ExtractedFields::default(),
            raw_text: String::new(),
            confidence_score: 0.0,
            validity_status: ValidityStatus::Invalid,
            processing_time,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.confidence_score == 0.0 && self.fields.is_empty() && self.raw_text.is_empty()
    }

    pub fn to_flat(&self) -> FlatRecognition {
        let text = |f: &Option<ExtractedField<String>>| {
            f.as_ref().map(|f| f.value.clone()).unwrap_or_default()
        };
        let date = |f: &Option<ExtractedField<NaiveDate>>| {
            f.as_ref().map(|f| f.value.format("%Y-%m-%d").to_string())
        };
        FlatRecognition {
            document_type: self.document_type,
            family_name: text(&self.fields.family_name),
            given_name: text(&self.fields.given_name),
            date_of_birth: date(&self.fields.date_of_birth),
            document_number: text(&self.fields.document_number),
            place_of_birth: text(&self.fields.place_of_birth),
            nationality: text(&self.fields.nationality),
            sex: self.fields.sex.as_ref().map(|f| f.value.to_string()),
            expiry_date: date(&self.fields.expiry_date),
            photo_detected: self.fields.photo_detected.as_ref().is_some_and(|f| f.value),
            confidence_score: self.confidence_score,
            validity_status: self.validity_status,
            raw_text: self.raw_text.clone(),
            processing_time: self.processing_time,
        }
    }

    /// Copy the recognised identity fields onto a found-item declaration.
    /// Fields the recognition left empty are not overwritten.
    pub fn apply_to(&self, record: &mut FoundRecord) {
        if self.document_type.is_known() {
            record.document_type = self.document_type;
        }
        if let Some(f) = &self.fields.given_name {
            record.first_name = Some(f.value.clone());
        }
        if let Some(f) = &self.fields.family_name {
            record.last_name = Some(f.value.clone());
        }
        if let Some(f) = &self.fields.date_of_birth {
            record.date_of_birth = Some(f.value);
        }
        if let Some(f) = &self.fields.document_number {
            record.document_number = Some(f.value.clone());
        }
    }
}

/// Flat, string-valued view of a [`RecognitionResult`] for API consumers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlatRecognition {
    pub document_type: DocumentType,
    pub family_name: String,
    pub given_name: String,
    pub date_of_birth: Option<String>,
    pub document_number: String,
    pub place_of_birth: String,
    pub nationality: String,
    pub sex: Option<String>,
    pub expiry_date: Option<String>,
    pub photo_detected: bool,
    pub confidence_score: f32,
    pub validity_status: ValidityStatus,
    pub raw_text: String,
    pub processing_time: f64,
}
