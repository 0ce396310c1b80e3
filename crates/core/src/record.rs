use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::document::DocumentType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub i64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The identity fields shared by lost and found declarations.
/// Only these are read when comparing two records.
pub trait IdentityFields {
    fn document_type(&self) -> DocumentType;
    fn first_name(&self) -> Option<&str>;
    fn last_name(&self) -> Option<&str>;
    fn date_of_birth(&self) -> Option<NaiveDate>;
    fn document_number(&self) -> Option<&str>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LostStatus {
    #[default]
    Active,
    Found,
    Closed,
}

impl fmt::Display for LostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LostStatus::Active => write!(f, "active"),
            LostStatus::Found => write!(f, "found"),
            LostStatus::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FoundStatus {
    #[default]
    Pending,
    Processed,
    Matched,
    HandedOver,
}

impl fmt::Display for FoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FoundStatus::Pending => write!(f, "pending"),
            FoundStatus::Processed => write!(f, "processed"),
            FoundStatus::Matched => write!(f, "matched"),
            FoundStatus::HandedOver => write!(f, "handed_over"),
        }
    }
}

/// A declaration that an identity document was lost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LostRecord {
    pub id: ItemId,
    #[serde(default)]
    pub owner: Option<UserId>,
    #[serde(default)]
    pub document_type: DocumentType,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub document_number: Option<String>,
    #[serde(default)]
    pub status: LostStatus,
}

impl LostRecord {
    pub fn new(id: i64, document_type: DocumentType) -> Self {
        LostRecord {
            id: ItemId(id),
            owner: None,
            document_type,
            first_name: None,
            last_name: None,
            date_of_birth: None,
            document_number: None,
            status: LostStatus::Active,
        }
    }

    /// Only active declarations take part in matching.
    pub fn is_open(&self) -> bool {
        self.status == LostStatus::Active
    }
}

/// A declaration that an identity document was found, usually filled in
/// from a recognition result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundRecord {
    pub id: ItemId,
    #[serde(default)]
    pub owner: Option<UserId>,
    #[serde(default)]
    pub document_type: DocumentType,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub document_number: Option<String>,
    #[serde(default)]
    pub status: FoundStatus,
}

impl FoundRecord {
    pub fn new(id: i64, document_type: DocumentType) -> Self {
        FoundRecord {
            id: ItemId(id),
            owner: None,
            document_type,
            first_name: None,
            last_name: None,
            date_of_birth: None,
            document_number: None,
            status: FoundStatus::Pending,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.status, FoundStatus::Pending | FoundStatus::Processed)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

macro_rules! impl_identity_fields {
    ($ty:ty) => {
        impl IdentityFields for $ty {
            fn document_type(&self) -> DocumentType {
                self.document_type
            }
            fn first_name(&self) -> Option<&str> {
                non_empty(&self.first_name)
            }
            fn last_name(&self) -> Option<&str> {
                non_empty(&self.last_name)
            }
            fn date_of_birth(&self) -> Option<NaiveDate> {
                self.date_of_birth
            }
            fn document_number(&self) -> Option<&str> {
                non_empty(&self.document_number)
            }
        }
    };
}

impl_identity_fields!(LostRecord);
impl_identity_fields!(FoundRecord);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_read_as_absent() {
        let mut lost = LostRecord::new(1, DocumentType::NationalId);
        lost.first_name = Some("   ".into());
        lost.last_name = Some(" Diallo ".into());
        assert_eq!(IdentityFields::first_name(&lost), None);
        assert_eq!(IdentityFields::last_name(&lost), Some("Diallo"));
    }

    #[test]
    fn open_statuses() {
        let mut found = FoundRecord::new(7, DocumentType::Passport);
        assert!(found.is_open());
        found.status = FoundStatus::Processed;
        assert!(found.is_open());
        found.status = FoundStatus::Matched;
        assert!(!found.is_open());

        let mut lost = LostRecord::new(3, DocumentType::Passport);
        assert!(lost.is_open());
        lost.status = LostStatus::Closed;
        assert!(!lost.is_open());
    }

    #[test]
    fn record_deserializes_with_missing_fields() {
        let found: FoundRecord =
            serde_json::from_str(r#"{"id": 4, "document_type": "passport", "last_name": "NDIAYE"}"#)
                .unwrap();
        assert_eq!(found.id, ItemId(4));
        assert_eq!(found.status, FoundStatus::Pending);
        assert_eq!(found.date_of_birth, None);
    }
}
