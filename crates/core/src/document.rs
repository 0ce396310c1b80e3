use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification tag driving which extraction rule-set and number formats apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    NationalId,
    Passport,
    DrivingLicense,
    ForeignNationalId,
    #[default]
    Unknown,
}

impl DocumentType {
    pub const ALL: [DocumentType; 5] = [
        DocumentType::NationalId,
        DocumentType::Passport,
        DocumentType::DrivingLicense,
        DocumentType::ForeignNationalId,
        DocumentType::Unknown,
    ];

    pub fn is_known(self) -> bool {
        self != DocumentType::Unknown
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentType::NationalId => write!(f, "national_id"),
            DocumentType::Passport => write!(f, "passport"),
            DocumentType::DrivingLicense => write!(f, "driving_license"),
            DocumentType::ForeignNationalId => write!(f, "foreign_national_id"),
            DocumentType::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for DocumentType {
    type Err = String;

    /// Accepts the canonical snake_case names plus the labels used by the
    /// legacy French-language records (`carte_nationale`, `passeport`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "national_id" | "carte_nationale" => Ok(DocumentType::NationalId),
            "passport" | "passeport" => Ok(DocumentType::Passport),
            "driving_license" | "driving_licence" | "permis_conduire" | "permis_de_conduire" => {
                Ok(DocumentType::DrivingLicense)
            }
            "foreign_national_id" | "carte_senegalaise" | "cni_cedeao" => {
                Ok(DocumentType::ForeignNationalId)
            }
            "unknown" | "inconnu" => Ok(DocumentType::Unknown),
            other => Err(format!("Unknown document type: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Sex {
    /// Parse the sex markers found on French and English documents.
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker.trim().to_uppercase().as_str() {
            "M" | "H" | "MASCULIN" | "HOMME" | "MALE" => Some(Sex::Male),
            "F" | "FEMININ" | "FÉMININ" | "FEMME" | "FEMALE" => Some(Sex::Female),
            _ => None,
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sex::Male => write!(f, "M"),
            Sex::Female => write!(f, "F"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn document_type_roundtrip() {
        for doc_type in DocumentType::ALL {
            assert_eq!(DocumentType::from_str(&doc_type.to_string()).unwrap(), doc_type);
        }
    }

    #[test]
    fn document_type_accepts_legacy_labels() {
        assert_eq!(DocumentType::from_str("carte_nationale").unwrap(), DocumentType::NationalId);
        assert_eq!(DocumentType::from_str("Permis de conduire").unwrap(), DocumentType::DrivingLicense);
        assert_eq!(DocumentType::from_str("inconnu").unwrap(), DocumentType::Unknown);
        assert!(DocumentType::from_str("library card").is_err());
    }

    #[test]
    fn document_type_serde_is_snake_case() {
        let json = serde_json::to_string(&DocumentType::ForeignNationalId).unwrap();
        assert_eq!(json, "\"foreign_national_id\"");
    }

    #[test]
    fn sex_markers() {
        assert_eq!(Sex::from_marker("féminin"), Some(Sex::Female));
        assert_eq!(Sex::from_marker(" m "), Some(Sex::Male));
        assert_eq!(Sex::from_marker("X"), None);
        assert_eq!(Sex::Female.to_string(), "F");
    }
}
