use docmatch_core::text::fold_text;
use docmatch_core::DocumentType;
use tracing::debug;

use crate::correct::Corrections;

/// Keyword vocabularies, in tie-break order: when two types score the same,
/// the one listed first wins.
const KEYWORDS: &[(DocumentType, &[&str])] = &[
    (DocumentType::Passport, &["passeport", "passport"]),
    (
        DocumentType::DrivingLicense,
        &["permis de conduire", "permis conduire", "driving licence", "driving license", "driver license", "driver's license"],
    ),
    (
        DocumentType::ForeignNationalId,
        &["cedeao", "ecowas", "carte de sejour", "titre de sejour", "residence permit", "etranger", "senegal"],
    ),
    (
        DocumentType::NationalId,
        &["carte nationale", "identite", "identity card", "national identity", "cni", "republique francaise"],
    ),
];

/// Weight of a passport MRZ line (`P<`) compared to one keyword hit.
const MRZ_PASSPORT_EVIDENCE: usize = 2;

/// Map raw recognized text to a document type by keyword scoring. Text with
/// no evidence at all is `Unknown`.
pub fn classify(text: &str, corrections: &Corrections) -> DocumentType {
    let folded = fold_text(&corrections.correct_labels(text)).to_lowercase();
    let mrz_passport = text
        .lines()
        .any(|l| l.trim_start().to_uppercase().starts_with("P<"));

    let mut best = (DocumentType::Unknown, 0usize);
    for (doc_type, keywords) in KEYWORDS {
        let mut score = keywords.iter().filter(|k| contains_phrase(&folded, k)).count();
        if *doc_type == DocumentType::Passport && mrz_passport {
            score += MRZ_PASSPORT_EVIDENCE;
        }
        if score > best.1 {
            best = (*doc_type, score);
        }
    }
    debug!(document_type = %best.0, score = best.1, "classified document");
    best.0
}

/// Whole-word containment, so `cni` does not fire inside a longer word.
fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    haystack.match_indices(phrase).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + phrase.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}
