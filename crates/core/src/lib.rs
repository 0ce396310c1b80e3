pub mod candidate;
pub mod document;
pub mod record;
pub mod text;

pub use candidate::{AppliedWeight, MatchCandidate, MatchCriteria, MatchId, MatchStatus, NewMatch};
pub use document::{DocumentType, Sex};
pub use record::{FoundRecord, FoundStatus, IdentityFields, ItemId, LostRecord, LostStatus, UserId};
