use chrono::NaiveDate;
use docmatch_core::text::strip_accents;

/// Two-digit years up to this value are read as 20xx, the rest as 19xx.
const TWO_DIGIT_PIVOT: i32 = 30;

re!(re_date_numeric,
    r"\b(\d{1,2})\s?[/.\-]\s?(\d{1,2})\s?[/.\-]\s?(\d{4}|\d{2})\b");
re!(re_date_iso,
    r"\b(\d{4})[/.\-](\d{1,2})[/.\-](\d{1,2})\b");
re!(re_date_day_month_name,
    r"(?i)\b(\d{1,2})(?:er)?\s+(janvier|janv|january|jan|f[eé]vrier|f[eé]vr|february|feb|f[eé]v|mars|march|mar|avril|april|apr|avr|mai|may|juin|june|jun|juillet|juil|july|jul|ao[uû]t|august|aug|septembre|september|sept|sep|octobre|october|oct|novembre|november|nov|d[eé]cembre|december|d[eé]c)\.?\s+(\d{4})\b");
re!(re_date_month_name_day,
    r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec)\.?\s+(\d{1,2}),?\s+(\d{4})\b");

/// A date found in free text, with its byte span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateMatch {
    pub date: NaiveDate,
    pub start: usize,
    pub end: usize,
}

/// Every parseable date in `text`, in reading order. Numeric dates are read
/// day-first; impossible dates (31/02) are skipped.
pub fn find_dates(text: &str) -> Vec<DateMatch> {
    let mut found: Vec<DateMatch> = Vec::new();

    let mut push = |start: usize, end: usize, date: Option<NaiveDate>| {
        if let Some(date) = date {
            found.push(DateMatch { date, start, end });
        }
    };

    for c in re_date_numeric().captures_iter(text) {
        let span = c.get(0).map(|g| (g.start(), g.end())).unwrap_or_default();
        push(span.0, span.1, ymd(&c[3], &c[2], &c[1]));
    }
    for c in re_date_iso().captures_iter(text) {
        let span = c.get(0).map(|g| (g.start(), g.end())).unwrap_or_default();
        push(span.0, span.1, ymd(&c[1], &c[2], &c[3]));
    }
    for c in re_date_day_month_name().captures_iter(text) {
        let span = c.get(0).map(|g| (g.start(), g.end())).unwrap_or_default();
        let date = month_from_name(&c[2]).and_then(|m| ymd_with_month(&c[3], m, &c[1]));
        push(span.0, span.1, date);
    }
    for c in re_date_month_name_day().captures_iter(text) {
        let span = c.get(0).map(|g| (g.start(), g.end())).unwrap_or_default();
        let date = month_from_name(&c[1]).and_then(|m| ymd_with_month(&c[3], m, &c[2]));
        push(span.0, span.1, date);
    }

    found.sort_by_key(|d| (d.start, std::cmp::Reverse(d.end)));
    let mut result: Vec<DateMatch> = Vec::with_capacity(found.len());
    for d in found {
        if result.last().map_or(true, |prev| d.start >= prev.end) {
            result.push(d);
        }
    }
    result
}

/// Permissive single-date parse: the first date found anywhere in `value`.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    find_dates(value).first().map(|d| d.date)
}

/// Month number for French or English month names and abbreviations.
pub fn month_from_name(name: &str) -> Option<u32> {
    let folded = strip_accents(name).to_lowercase();
    let month = match folded.trim_end_matches('.') {
        "janvier" | "janv" | "january" | "jan" => 1,
        "fevrier" | "fevr" | "fev" | "february" | "feb" => 2,
        "mars" | "march" | "mar" => 3,
        "avril" | "avr" | "april" | "apr" => 4,
        "mai" | "may" => 5,
        "juin" | "june" | "jun" => 6,
        "juillet" | "juil" | "july" | "jul" => 7,
        "aout" | "august" | "aug" => 8,
        "septembre" | "september" | "sept" | "sep" => 9,
        "octobre" | "october" | "oct" => 10,
        "novembre" | "november" | "nov" => 11,
        "decembre" | "december" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Expand a two-digit year around the fixed pivot.
pub fn expand_year(two_digits: i32) -> i32 {
    if two_digits <= TWO_DIGIT_PIVOT {
        2000 + two_digits
    } else {
        1900 + two_digits
    }
}

fn parse_year(year: &str) -> Option<i32> {
    let value: i32 = year.parse().ok()?;
    Some(if year.len() == 2 { expand_year(value) } else { value })
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    ymd_with_month(year, month.parse().ok()?, day)
}

fn ymd_with_month(year: &str, month: u32, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(parse_year(year)?, month, day.parse().ok()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn numeric_dates_are_day_first() {
        assert_eq!(parse_date("15/06/1991"), Some(d(1991, 6, 15)));
        assert_eq!(parse_date("05.11.2030"), Some(d(2030, 11, 5)));
        assert_eq!(parse_date("01-02-2003"), Some(d(2003, 2, 1)));
        assert_eq!(parse_date("15 / 06 / 1991"), Some(d(1991, 6, 15)));
    }

    #[test]
    fn two_digit_years_pivot() {
        assert_eq!(parse_date("15/06/91"), Some(d(1991, 6, 15)));
        assert_eq!(parse_date("15/06/28"), Some(d(2028, 6, 15)));
    }

    #[test]
    fn iso_and_month_names() {
        assert_eq!(parse_date("1991-06-15"), Some(d(1991, 6, 15)));
        assert_eq!(parse_date("né le 1er août 1985"), Some(d(1985, 8, 1)));
        assert_eq!(parse_date("15 JUIN 1991"), Some(d(1991, 6, 15)));
        assert_eq!(parse_date("12 Déc. 2029"), Some(d(2029, 12, 12)));
        assert_eq!(parse_date("June 15, 1991"), Some(d(1991, 6, 15)));
        assert_eq!(parse_date("3 Feb 2001"), Some(d(2001, 2, 3)));
    }

    #[test]
    fn impossible_or_missing_dates() {
        assert_eq!(parse_date("31/02/1990"), None);
        assert_eq!(parse_date("NDIAYE"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn find_dates_in_reading_order() {
        let text = "DELIVREE LE 01/03/2020\nNE LE 15/06/1991 EXPIRE 28 février 2030";
        let dates: Vec<_> = find_dates(text).iter().map(|m| m.date).collect();
        assert_eq!(dates, vec![d(2020, 3, 1), d(1991, 6, 15), d(2030, 2, 28)]);

        let first = find_dates(text)[0];
        assert_eq!(&text[first.start..first.end], "01/03/2020");
    }

    #[test]
    fn month_lookup() {
        assert_eq!(month_from_name("Février"), Some(2));
        assert_eq!(month_from_name("SEPT."), Some(9));
        assert_eq!(month_from_name("brumaire"), None);
    }
}
