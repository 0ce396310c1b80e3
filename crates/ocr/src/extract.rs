use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use docmatch_core::text::{collapse_whitespace, fold_text};
use docmatch_core::{DocumentType, Sex};
use regex::Regex;
use tracing::{debug, warn};

use crate::classify::classify;
use crate::config::ExtractionConfig;
use crate::consolidate::join_lines;
use crate::correct::Corrections;
use crate::dates::{find_dates, parse_date};
use crate::mrz::parse_mrz;
use crate::ner::{EntityLabel, EntityRecognizer, UnavailableRecognizer};
use crate::score::FieldSource;
use crate::types::{ConsolidatedLine, ExtractedField, ExtractedFields};

// ── Label vocabulary ─────────────────────────────────────────────────────────

re!(re_label_family,
    r"(?i)\b(?:NOM\s+DE\s+FAMILLE|NOMS?|SURNAME|FAMILY\s+NAME|LAST\s+NAME)\b");
re!(re_label_given,
    r"(?i)\b(?:PR[ÉE]NOMS?|GIVEN\s+NAMES?|FIRST\s+NAMES?|FORENAMES?)\b");
re!(re_label_birth_date,
    r"(?i)\b(?:DATE\s+DE\s+NAISSANCE|DATE\s+OF\s+BIRTH|BIRTH\s+DATE|N[ÉE](?:E|\(E\))?\s+LE)\b");
re!(re_label_birth_place,
    r"(?i)\b(?:LIEU\s+DE\s+NAISSANCE|PLACE\s+OF\s+BIRTH|N[ÉE](?:E|\(E\))?\s+[ÀA])\b");
re!(re_label_expiry,
    r"(?i)\b(?:DATE\s+D['’]\s?EXPIRATION|DATE\s+OF\s+EXPIRY|EXPIRY\s+DATE|EXPIRATION|EXPIRY|EXPIRES?(?:\s+LE)?|VALABLE\s+JUSQU['’]\s?AU|VALID\s+UNTIL)\b");
re!(re_label_issue,
    r"(?i)\b(?:DATE\s+DE\s+D[ÉE]LIVRANCE|D[ÉE]LIVR[ÉE]E?\s+LE|DATE\s+OF\s+ISSUE|ISSUED(?:\s+ON)?)\b");
re!(re_label_number,
    r"(?i)(?:\bN[°º]|\bNO\.|\bNUM[ÉE]RO\b|\bDOCUMENT\s+(?:NO|NUMBER)\b|\b(?:CARD|ID|PASSPORT|LICEN[CS]E)\s+(?:NO|NUMBER)\b|\bNIN\b)");
re!(re_label_sex,
    r"(?i)\b(?:SEXE|SEX)\b");
re!(re_label_nationality,
    r"(?i)\bNATIONALIT(?:[ÉE]|Y)\b");
re!(re_label_photo,
    r"(?i)\bPHOTO\b");

re!(re_place_after_date,
    r"(?i)^[\s,;]*(?:À|A|AT|IN)\s+(\p{L}[\p{L}'\- ]+)");
re!(re_place_value,
    r"(?i)^[\s,;]*(?:(?:À|A|AT|IN)\s+)?(\p{L}[\p{L}'\- ]+)");

// ── Per-type document number shapes ──────────────────────────────────────────

re!(re_digits_12, r"\b\d{12}\b");
re!(re_digits_13, r"\b\d{13}\b");
re!(re_digits_9, r"\b\d{9}\b");
re!(re_prefix2_digits9, r"\b[A-Z]{2}\d{9}\b");
re!(re_prefix2_digits10, r"\b[A-Z]{2}\d{10}\b");
re!(re_prefix2_digits11, r"\b[A-Z]{2}\d{11}\b");
re!(re_passport_number, r"\b[A-Z]{1,2}\d{6,9}\b");
re!(re_generic_number, r"\b[A-Z0-9]{8,15}\b");

type Pattern = fn() -> &'static Regex;

const NATIONAL_ID_NUMBERS: &[Pattern] = &[re_digits_12, re_prefix2_digits9];
const PASSPORT_NUMBERS: &[Pattern] = &[re_passport_number, re_digits_9];
const DRIVING_LICENSE_NUMBERS: &[Pattern] = &[re_digits_12, re_prefix2_digits10];
const FOREIGN_ID_NUMBERS: &[Pattern] = &[re_digits_13, re_prefix2_digits11];
const ANY_NUMBER: &[Pattern] = &[re_generic_number];

fn number_patterns(document_type: DocumentType) -> &'static [Pattern] {
    match document_type {
        DocumentType::NationalId => NATIONAL_ID_NUMBERS,
        DocumentType::Passport => PASSPORT_NUMBERS,
        DocumentType::DrivingLicense => DRIVING_LICENSE_NUMBERS,
        DocumentType::ForeignNationalId => FOREIGN_ID_NUMBERS,
        DocumentType::Unknown => ANY_NUMBER,
    }
}

/// Words that mark a line as a heading rather than a name.
const HEADING_WORDS: &[&str] = &[
    "republique", "du", "de", "des", "la", "le", "l'interieur", "carte", "nationale", "national",
    "identite", "d'identite", "identity", "card", "passeport", "passport", "permis", "conduire",
    "driving", "licence", "license", "senegal", "cedeao", "ecowas", "sejour", "residence",
    "permit", "titre", "france", "francaise", "ministere", "interieur", "signature", "etat",
    "civil", "titulaire", "holder", "photo", "oui", "non", "adresse", "taille", "nom", "noms",
    "prenom", "prenoms", "sexe", "date", "naissance", "lieu", "nationalite", "expiration",
    "delivrance", "specimen",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    FamilyName,
    GivenName,
    BirthDate,
    BirthPlace,
    ExpiryDate,
    IssueDate,
    DocumentNumber,
    Sex,
    Nationality,
    Photo,
}

impl Label {
    fn is_date(self) -> bool {
        matches!(self, Label::BirthDate | Label::BirthPlace | Label::ExpiryDate | Label::IssueDate)
    }
}

const LABELS: &[(Label, Pattern)] = &[
    (Label::FamilyName, re_label_family),
    (Label::GivenName, re_label_given),
    (Label::BirthDate, re_label_birth_date),
    (Label::BirthPlace, re_label_birth_place),
    (Label::ExpiryDate, re_label_expiry),
    (Label::IssueDate, re_label_issue),
    (Label::DocumentNumber, re_label_number),
    (Label::Sex, re_label_sex),
    (Label::Nationality, re_label_nationality),
    (Label::Photo, re_label_photo),
];

/// A value read next to a label: `line` and the byte range inside it.
#[derive(Debug, Clone, Copy)]
struct LabeledValue {
    label: Label,
    line: usize,
    start: usize,
    end: usize,
}

/// Document type and fields read from consolidated lines.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Extraction {
    pub document_type: DocumentType,
    pub fields: ExtractedFields,
}

/// Per-recognition working set: the date-corrected line texts and the
/// lines that belong to the machine-readable zone.
struct Lines<'a> {
    lines: &'a [ConsolidatedLine],
    texts: Vec<String>,
    mrz: HashSet<usize>,
}

impl Lines<'_> {
    fn confidence(&self, index: usize) -> f32 {
        self.lines.get(index).map_or(0.0, |l| l.best_confidence)
    }

    fn readable(&self) -> impl Iterator<Item = (usize, &str)> {
        let mrz = &self.mrz;
        self.texts
            .iter()
            .enumerate()
            .filter(move |(i, _)| !mrz.contains(i))
            .map(|(i, t)| (i, t.as_str()))
    }
}

/// Rule-based identity field extraction, optionally assisted by a
/// named-entity recognizer for fields the rules leave empty.
#[derive(Clone)]
pub struct FieldExtractor {
    config: ExtractionConfig,
    corrections: Corrections,
    recognizer: Arc<dyn EntityRecognizer>,
}

impl FieldExtractor {
    pub fn new(config: ExtractionConfig, recognizer: Arc<dyn EntityRecognizer>) -> Self {
        Self { config, corrections: Corrections::standard(), recognizer }
    }

    pub fn rules_only(config: ExtractionConfig) -> Self {
        Self::new(config, Arc::new(UnavailableRecognizer))
    }

    pub fn with_corrections(mut self, corrections: Corrections) -> Self {
        self.corrections = corrections;
        self
    }

    /// Extract from plain text, one line per text line, every line trusted
    /// at full confidence.
    pub fn extract_text(&self, text: &str) -> Extraction {
        let lines: Vec<ConsolidatedLine> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| ConsolidatedLine { text: l.to_string(), best_confidence: 1.0, contributing_engines: Vec::new() })
            .collect();
        self.extract(&lines)
    }

    pub fn extract(&self, lines: &[ConsolidatedLine]) -> Extraction {
        let raw: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        let mrz = parse_mrz(&raw);
        let ctx = Lines {
            lines,
            texts: lines.iter().map(|l| self.corrections.correct_dates(&l.text)).collect(),
            mrz: mrz.as_ref().map(|m| m.line_indices.iter().copied().collect()).unwrap_or_default(),
        };

        let mut document_type = classify(&join_lines(lines), &self.corrections);
        let mut fields = ExtractedFields::default();

        let (labeled, used) = labeled_values(&ctx);
        self.apply_labels(&ctx, &labeled, &mut fields);

        if let Some(mrz) = &mrz {
            let line_conf = mrz.line_indices.iter().map(|i| ctx.confidence(*i)).sum::<f32>()
                / mrz.line_indices.len().max(1) as f32;
            let verified = FieldSource::Mrz.field_confidence(line_conf);
            let read = FieldSource::Labeled.field_confidence(line_conf);

            if let Some(number) = &mrz.document_number {
                fields.document_number = Some(ExtractedField::new(number.replace(' ', ""), verified));
            }
            if let Some(date) = mrz.date_of_birth {
                fields.date_of_birth = Some(ExtractedField::new(date, verified));
            }
            if let Some(date) = mrz.expiry_date {
                fields.expiry_date = Some(ExtractedField::new(date, verified));
            }
            fill(&mut fields.family_name, mrz.family_name.clone(), read);
            fill(&mut fields.given_name, mrz.given_names.clone(), read);
            fill(&mut fields.sex, mrz.sex, read);
            fill(&mut fields.nationality, mrz.nationality.clone(), read);

            if document_type == DocumentType::Unknown {
                document_type = mrz.document_type();
            }
        }

        self.apply_positional_dates(&ctx, &labeled, &mut fields);
        apply_positional_names(&ctx, &used, &mut fields);
        if fields.document_number.is_none() {
            fields.document_number = self.positional_number(&ctx, document_type);
        }
        self.apply_entities(&ctx, &mut fields);
        resolve_duplicate_names(&mut fields);

        debug!(
            document_type = %document_type,
            core_fields = fields.core_fields_present(),
            mrz = mrz.is_some(),
            "extracted identity fields"
        );
        Extraction { document_type, fields }
    }

    fn apply_labels(&self, ctx: &Lines<'_>, labeled: &[LabeledValue], fields: &mut ExtractedFields) {
        for v in labeled {
            let text = &ctx.texts[v.line][v.start..v.end];
            let conf = FieldSource::Labeled.field_confidence(ctx.confidence(v.line));
            match v.label {
                Label::FamilyName => fill(&mut fields.family_name, clean_name(text), conf),
                Label::GivenName => fill(&mut fields.given_name, clean_name(text), conf),
                Label::BirthDate | Label::BirthPlace => {
                    let first_date = find_dates(text).into_iter().next();
                    match first_date {
                        Some(d) => {
                            fill(&mut fields.date_of_birth, Some(d.date), conf);
                            let place = place_in(&text[d.end..], v.label == Label::BirthDate);
                            fill(&mut fields.place_of_birth, place, conf);
                        }
                        None if v.label == Label::BirthPlace => {
                            fill(&mut fields.place_of_birth, place_in(text, false), conf)
                        }
                        None => {}
                    }
                }
                Label::ExpiryDate => fill(&mut fields.expiry_date, parse_date(text), conf),
                Label::IssueDate => {}
                Label::DocumentNumber => {
                    let number = identifier_in(text).map(|raw| self.corrections.correct_identifier(&raw));
                    fill(&mut fields.document_number, number.filter(|n| n.len() >= 4), conf);
                }
                Label::Sex => {
                    let sex = text.split_whitespace().next().and_then(Sex::from_marker);
                    fill(&mut fields.sex, sex, conf);
                }
                Label::Nationality => fill(&mut fields.nationality, clean_name(text), conf),
                Label::Photo => {
                    let present = match fold_text(text).split(' ').next() {
                        Some("oui" | "yes" | "presente" | "present") => Some(true),
                        Some("non" | "no" | "absente" | "absent") => Some(false),
                        _ => None,
                    };
                    fill(&mut fields.photo_detected, present, conf);
                }
            }
        }
    }

    /// Dates nobody labeled: the earliest plausible birth year is the date of
    /// birth, the latest date after it is the expiry.
    fn apply_positional_dates(&self, ctx: &Lines<'_>, labeled: &[LabeledValue], fields: &mut ExtractedFields) {
        let mut unlabeled: Vec<(NaiveDate, usize)> = Vec::new();
        for (i, text) in ctx.readable() {
            for d in find_dates(text) {
                let inside_label = labeled
                    .iter()
                    .any(|v| v.label.is_date() && v.line == i && d.start >= v.start && d.end <= v.end);
                if !inside_label {
                    unlabeled.push((d.date, i));
                }
            }
        }

        let mut birth_slot = None;
        if fields.date_of_birth.is_none() {
            let (min, max) = (self.config.min_birth_year, self.config.max_birth_year);
            let earliest = unlabeled
                .iter()
                .enumerate()
                .filter(|(_, (date, _))| (min..=max).contains(&date.year()))
                .min_by_key(|(_, (date, _))| *date);
            if let Some((slot, (date, line))) = earliest {
                fields.date_of_birth =
                    Some(ExtractedField::new(*date, FieldSource::Positional.field_confidence(ctx.confidence(*line))));
                birth_slot = Some(slot);
            }
        }

        if fields.expiry_date.is_none() {
            let birth = fields.date_of_birth.as_ref().map(|f| f.value);
            let latest = unlabeled
                .iter()
                .enumerate()
                .filter(|(slot, (date, _))| Some(*slot) != birth_slot && birth.map_or(true, |b| *date > b))
                .max_by_key(|(_, (date, _))| *date);
            if let Some((_, (date, line))) = latest {
                fields.expiry_date =
                    Some(ExtractedField::new(*date, FieldSource::Positional.field_confidence(ctx.confidence(*line))));
            }
        }
    }

    fn positional_number(&self, ctx: &Lines<'_>, document_type: DocumentType) -> Option<ExtractedField<String>> {
        for pattern in number_patterns(document_type) {
            for (i, text) in ctx.readable() {
                let joined = join_digit_groups(&text.to_uppercase());
                let found = pattern().find_iter(&joined).find(|m| m.as_str().chars().any(|c| c.is_ascii_digit()));
                if let Some(m) = found {
                    let value = self.corrections.correct_identifier(m.as_str());
                    return Some(ExtractedField::new(value, FieldSource::Positional.field_confidence(ctx.confidence(i))));
                }
            }
        }
        None
    }

    fn apply_entities(&self, ctx: &Lines<'_>, fields: &mut ExtractedFields) {
        let wanted = fields.family_name.is_none()
            || fields.given_name.is_none()
            || fields.date_of_birth.is_none()
            || fields.place_of_birth.is_none();
        if !wanted || !self.recognizer.is_available() {
            return;
        }

        let text = ctx.texts.join("\n");
        let spans = match self.recognizer.recognize(&text) {
            Ok(spans) => spans,
            Err(e) => {
                warn!(recognizer = self.recognizer.name(), error = %e, "entity recognition failed, keeping rule results");
                return;
            }
        };

        let mut line_starts = Vec::with_capacity(ctx.texts.len());
        let mut offset = 0;
        for t in &ctx.texts {
            line_starts.push(offset);
            offset += t.len() + 1;
        }

        let (min, max) = (self.config.min_birth_year, self.config.max_birth_year);
        for span in spans {
            let line = line_starts.partition_point(|s| *s <= span.start).saturating_sub(1);
            if ctx.mrz.contains(&line) {
                continue;
            }
            let conf = FieldSource::Entity.field_confidence(ctx.confidence(line));
            match span.label {
                EntityLabel::Person => {
                    let Some(name) = clean_name(&span.text) else { continue };
                    match name.rsplit_once(' ') {
                        Some((given, family)) => {
                            fill(&mut fields.family_name, Some(family.to_string()), conf);
                            fill(&mut fields.given_name, Some(given.to_string()), conf);
                        }
                        None => fill(&mut fields.given_name, Some(name), conf),
                    }
                }
                EntityLabel::Location => fill(&mut fields.place_of_birth, clean_name(&span.text), conf),
                EntityLabel::Date => {
                    let date = parse_date(&span.text).filter(|d| (min..=max).contains(&d.year()));
                    fill(&mut fields.date_of_birth, date, conf);
                }
                EntityLabel::Organization => {}
            }
        }
    }
}

fn fill<T>(slot: &mut Option<ExtractedField<T>>, value: Option<T>, confidence: f32) {
    if slot.is_none() {
        if let Some(value) = value {
            *slot = Some(ExtractedField::new(value, confidence));
        }
    }
}

/// Label matches in one line, leftmost first, overlaps dropped.
fn label_matches(line: &str) -> Vec<(Label, usize, usize)> {
    let mut found: Vec<(Label, usize, usize)> = LABELS
        .iter()
        .flat_map(|(label, re)| re().find_iter(line).map(move |m| (*label, m.start(), m.end())))
        .collect();
    found.sort_by_key(|(_, start, end)| (*start, Reverse(*end)));

    let mut kept: Vec<(Label, usize, usize)> = Vec::with_capacity(found.len());
    for m in found {
        if kept.last().map_or(true, |prev| m.1 >= prev.2) {
            kept.push(m);
        }
    }
    kept
}

/// Byte range of `text[start..end]` without surrounding separators.
fn trimmed_range(text: &str, start: usize, end: usize) -> (usize, usize) {
    let is_sep = |c: char| c.is_whitespace() || matches!(c, ':' | '/' | '.' | '-' | '=' | ',');
    let slice = &text[start..end];
    let lead = slice.len() - slice.trim_start_matches(is_sep).len();
    let trail = slice.trim_end_matches(is_sep).len();
    if trail <= lead {
        (start + lead, start + lead)
    } else {
        (start + lead, start + trail)
    }
}

/// Every labeled value in reading order, plus the set of lines that carried
/// a label or were consumed as the value of one.
fn labeled_values(ctx: &Lines<'_>) -> (Vec<LabeledValue>, HashSet<usize>) {
    let mut values = Vec::new();
    let mut used = HashSet::new();

    for (i, line) in ctx.readable() {
        let matches = label_matches(line);
        if matches.is_empty() {
            continue;
        }
        used.insert(i);

        for (k, (label, _, label_end)) in matches.iter().enumerate() {
            let next_start = matches.get(k + 1).map_or(line.len(), |m| m.1);
            let (start, end) = trimmed_range(line, *label_end, next_start);
            if start < end {
                values.push(LabeledValue { label: *label, line: i, start, end });
                continue;
            }
            // A label alone at the end of its line takes the next line.
            let next = i + 1;
            if k + 1 == matches.len() && next < ctx.texts.len() && !ctx.mrz.contains(&next) {
                let next_text = &ctx.texts[next];
                let cut = label_matches(next_text).first().map_or(next_text.len(), |m| m.1);
                let (start, end) = trimmed_range(next_text, 0, cut);
                if start < end {
                    values.push(LabeledValue { label: *label, line: next, start, end });
                    used.insert(next);
                }
            }
        }
    }
    (values, used)
}

/// Upper-cased name with punctuation other than `-` and `'` removed. The
/// letters themselves are never altered.
fn clean_name(value: &str) -> Option<String> {
    let kept: String = value
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '\'' { c } else { ' ' })
        .collect();
    let name = collapse_whitespace(&kept.to_uppercase());
    name.chars().any(char::is_alphabetic).then_some(name)
}

fn place_in(rest: &str, require_preposition: bool) -> Option<String> {
    let re = if require_preposition { re_place_after_date() } else { re_place_value() };
    let caps = re.captures(rest)?;
    clean_name(&caps[1]).filter(|p| p.chars().filter(|c| c.is_alphabetic()).count() >= 2)
}

/// The digit-bearing run of tokens in a labeled value, with an optional
/// short letter prefix (`AB 1234567`).
fn identifier_in(value: &str) -> Option<String> {
    let tokens: Vec<&str> = value.split_whitespace().collect();
    let has_digit = |t: &str| t.chars().any(|c| c.is_ascii_digit());
    let first = tokens.iter().position(|t| has_digit(t))?;
    let end = tokens[first..].iter().position(|t| !has_digit(t)).map_or(tokens.len(), |p| first + p);

    let is_prefix = |t: &str| (1..=3).contains(&t.len()) && t.chars().all(|c| c.is_ascii_alphabetic());
    let start = if first > 0 && is_prefix(tokens[first - 1]) { first - 1 } else { first };
    Some(tokens[start..end].concat())
}

/// `1 234 567` → `1234567`; whitespace between letters is kept.
fn join_digit_groups(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, c) in chars.iter().enumerate() {
        if c.is_whitespace() {
            let prev = out.chars().next_back();
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if prev.is_some_and(|p| p.is_ascii_digit()) && next.is_some_and(|n| n.is_ascii_digit()) {
                continue;
            }
        }
        out.push(*c);
    }
    out
}

/// An unlabeled line that reads like a name: upper-case words only, no
/// digits, no heading vocabulary.
fn name_line(text: &str) -> Option<String> {
    if text.chars().any(|c| c.is_ascii_digit() || c == '<') {
        return None;
    }
    if !text.chars().filter(|c| c.is_alphabetic()).all(char::is_uppercase) {
        return None;
    }
    let name = clean_name(text)?;
    let words: Vec<&str> = name.split(' ').collect();
    let plausible = words.len() <= 4
        && words
            .iter()
            .all(|w| w.chars().count() >= 2 && !HEADING_WORDS.contains(&fold_text(w).as_str()));
    plausible.then_some(name)
}

fn apply_positional_names(ctx: &Lines<'_>, used: &HashSet<usize>, fields: &mut ExtractedFields) {
    if fields.family_name.is_some() && fields.given_name.is_some() {
        return;
    }
    let known: Vec<String> = [&fields.family_name, &fields.given_name]
        .into_iter()
        .flatten()
        .map(|f| fold_text(&f.value))
        .collect();
    let candidates: Vec<(usize, String)> = ctx
        .readable()
        .filter(|(i, _)| !used.contains(i))
        .filter_map(|(i, t)| name_line(t).map(|n| (i, n)))
        .filter(|(_, n)| !known.contains(&fold_text(n)))
        .collect();
    let positional = |line: usize| FieldSource::Positional.field_confidence(ctx.confidence(line));

    // A single "GIVEN FAMILY" line when nothing else names the holder.
    if fields.family_name.is_none() && fields.given_name.is_none() && candidates.len() == 1 {
        let (line, name) = &candidates[0];
        if let Some((given, family)) = name.rsplit_once(' ') {
            fields.family_name = Some(ExtractedField::new(family.to_string(), positional(*line)));
            fields.given_name = Some(ExtractedField::new(given.to_string(), positional(*line)));
            return;
        }
    }

    let mut rest = candidates.into_iter();
    if fields.family_name.is_none() {
        if let Some((line, name)) = rest.next() {
            fields.family_name = Some(ExtractedField::new(name, positional(line)));
        }
    }
    if fields.given_name.is_none() {
        if let Some((line, name)) = rest.next() {
            fields.given_name = Some(ExtractedField::new(name, positional(line)));
        }
    }
}

/// The same text read as both names: split a multi-word value into given
/// names and family name, otherwise keep it as the family name only.
fn resolve_duplicate_names(fields: &mut ExtractedFields) {
    let (Some(family), Some(given)) = (&fields.family_name, &fields.given_name) else { return };
    if fold_text(&family.value) != fold_text(&given.value) {
        return;
    }
    let (value, family_conf, given_conf) = (family.value.clone(), family.confidence, given.confidence);
    match value.rsplit_once(' ') {
        Some((rest, last)) => {
            fields.family_name = Some(ExtractedField::new(last.to_string(), family_conf));
            fields.given_name = Some(ExtractedField::new(rest.to_string(), given_conf));
        }
        None => fields.given_name = None,
    }
}
