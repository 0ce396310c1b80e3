//! Machine-readable zone parsing for TD3 (passport, 2×44) and TD1 (ID card,
//! 3×30) layouts. Numbers and dates are only reported when their ICAO 9303
//! check digit verifies.

use chrono::NaiveDate;
use docmatch_core::{DocumentType, Sex};

use crate::dates::expand_year;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MrzFormat {
    Td1,
    Td3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MrzData {
    pub format: MrzFormat,
    pub document_code: String,
    pub family_name: Option<String>,
    pub given_names: Option<String>,
    pub document_number: Option<String>,
    pub nationality: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub sex: Option<Sex>,
    pub expiry_date: Option<NaiveDate>,
    /// Indices of the input lines that formed the zone.
    pub line_indices: Vec<usize>,
}

impl MrzData {
    pub fn document_type(&self) -> DocumentType {
        match self.document_code.chars().next() {
            Some('P') => DocumentType::Passport,
            Some('I') | Some('A') | Some('C') => DocumentType::NationalId,
            _ => DocumentType::Unknown,
        }
    }
}

/// ICAO 9303 check digit: weights 7-3-1, `<` counts as zero.
pub fn check_digit(field: &str) -> Option<u32> {
    const WEIGHTS: [u32; 3] = [7, 3, 1];
    let mut sum = 0u32;
    for (i, c) in field.chars().enumerate() {
        let value = match c {
            '0'..='9' => c.to_digit(10)?,
            'A'..='Z' => c as u32 - 'A' as u32 + 10,
            '<' => 0,
            _ => return None,
        };
        sum += value * WEIGHTS[i % 3];
    }
    Some(sum % 10)
}

fn verifies(field: &str, check: char) -> bool {
    check_digit(field).is_some_and(|d| check.to_digit(10) == Some(d))
}

/// Locate and parse an MRZ in the given lines. Spaces inside a line are
/// ignored; line length must match the layout exactly.
pub fn parse_mrz(lines: &[&str]) -> Option<MrzData> {
    let candidates: Vec<(usize, String)> = lines
        .iter()
        .enumerate()
        .map(|(i, l)| (i, l.split_whitespace().collect::<String>().to_uppercase()))
        .filter(|(_, l)| l.contains('<') && l.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '<'))
        .collect();

    for pair in candidates.windows(2) {
        let (i, a) = &pair[0];
        let (j, b) = &pair[1];
        if a.len() == 44 && b.len() == 44 && a.starts_with('P') {
            return Some(parse_td3(a, b, vec![*i, *j]));
        }
    }
    for triple in candidates.windows(3) {
        let [(i, a), (j, b), (k, c)] = triple else { continue };
        if a.len() == 30 && b.len() == 30 && c.len() == 30 {
            return Some(parse_td1(a, b, c, vec![*i, *j, *k]));
        }
    }
    None
}

fn parse_td3(line1: &str, line2: &str, line_indices: Vec<usize>) -> MrzData {
    let (family_name, given_names) = parse_names(&line1[5..]);
    MrzData {
        format: MrzFormat::Td3,
        document_code: filler_trimmed(&line1[0..2]).unwrap_or_default(),
        family_name,
        given_names,
        document_number: checked(&line2[0..9], line2.as_bytes()[9] as char).and_then(filler_trimmed),
        nationality: filler_trimmed(&line2[10..13]),
        date_of_birth: checked(&line2[13..19], line2.as_bytes()[19] as char).and_then(birth_date),
        sex: parse_sex(line2.as_bytes()[20] as char),
        expiry_date: checked(&line2[21..27], line2.as_bytes()[27] as char).and_then(expiry_date),
        line_indices,
    }
}

fn parse_td1(line1: &str, line2: &str, line3: &str, line_indices: Vec<usize>) -> MrzData {
    let (family_name, given_names) = parse_names(line3);
    MrzData {
        format: MrzFormat::Td1,
        document_code: filler_trimmed(&line1[0..2]).unwrap_or_default(),
        family_name,
        given_names,
        document_number: checked(&line1[5..14], line1.as_bytes()[14] as char).and_then(filler_trimmed),
        nationality: filler_trimmed(&line2[15..18]),
        date_of_birth: checked(&line2[0..6], line2.as_bytes()[6] as char).and_then(birth_date),
        sex: parse_sex(line2.as_bytes()[7] as char),
        expiry_date: checked(&line2[8..14], line2.as_bytes()[14] as char).and_then(expiry_date),
        line_indices,
    }
}

fn checked(field: &str, check: char) -> Option<&str> {
    verifies(field, check).then_some(field)
}

fn filler_trimmed(field: &str) -> Option<String> {
    let value = field.trim_end_matches('<').replace('<', " ");
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// `FAMILY<NAME<<GIVEN<NAMES<<<`
fn parse_names(field: &str) -> (Option<String>, Option<String>) {
    let (family, given) = field.split_once("<<").unwrap_or((field, ""));
    (filler_trimmed(family), filler_trimmed(given))
}

fn parse_sex(c: char) -> Option<Sex> {
    match c {
        'M' => Some(Sex::Male),
        'F' => Some(Sex::Female),
        _ => None,
    }
}

fn yymmdd(field: &str) -> Option<(i32, u32, u32)> {
    if !field.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((field[0..2].parse().ok()?, field[2..4].parse().ok()?, field[4..6].parse().ok()?))
}

fn birth_date(field: &str) -> Option<NaiveDate> {
    let (yy, mm, dd) = yymmdd(field)?;
    NaiveDate::from_ymd_opt(expand_year(yy), mm, dd)
}

fn expiry_date(field: &str) -> Option<NaiveDate> {
    let (yy, mm, dd) = yymmdd(field)?;
    NaiveDate::from_ymd_opt(2000 + yy, mm, dd)
}
