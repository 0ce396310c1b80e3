use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::record::ItemId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchId(pub i64);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a persisted candidate. Only `Pending` is ever written by the
/// matching engine; the other transitions belong to the review workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    #[default]
    Pending,
    Confirmed,
    Rejected,
    HandedOver,
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStatus::Pending => write!(f, "pending"),
            MatchStatus::Confirmed => write!(f, "confirmed"),
            MatchStatus::Rejected => write!(f, "rejected"),
            MatchStatus::HandedOver => write!(f, "handed_over"),
        }
    }
}

impl std::str::FromStr for MatchStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MatchStatus::Pending),
            "confirmed" => Ok(MatchStatus::Confirmed),
            "rejected" => Ok(MatchStatus::Rejected),
            "handed_over" => Ok(MatchStatus::HandedOver),
            other => Err(format!("Unknown match status: '{other}'")),
        }
    }
}

/// One gated comparison that contributed to a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedWeight {
    pub field: String,
    pub weight: f32,
    /// Raw similarity of the two values (1.0 for exact matches).
    pub similarity: f32,
    /// `weight * similarity`, the amount added to the score.
    pub contribution: f32,
}

/// Explanation blob stored alongside a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCriteria {
    pub method: String,
    pub weights_applied: Vec<AppliedWeight>,
}

impl MatchCriteria {
    pub fn basic(weights_applied: Vec<AppliedWeight>) -> Self {
        MatchCriteria { method: "basic".to_string(), weights_applied }
    }
}

/// A candidate that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMatch {
    pub lost_ref: ItemId,
    pub found_ref: ItemId,
    pub confidence_score: f32,
    pub match_criteria: MatchCriteria,
}

/// A proposed correspondence between a lost and a found record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub id: MatchId,
    pub lost_ref: ItemId,
    pub found_ref: ItemId,
    pub confidence_score: f32,
    pub match_criteria: MatchCriteria,
    pub status: MatchStatus,
    pub created_at: DateTime<Utc>,
}

impl MatchCandidate {
    pub fn from_new(id: MatchId, new: NewMatch, created_at: DateTime<Utc>) -> Self {
        MatchCandidate {
            id,
            lost_ref: new.lost_ref,
            found_ref: new.found_ref,
            confidence_score: new.confidence_score,
            match_criteria: new.match_criteria,
            status: MatchStatus::Pending,
            created_at,
        }
    }

    pub fn pair(&self) -> (ItemId, ItemId) {
        (self.lost_ref, self.found_ref)
    }
}
