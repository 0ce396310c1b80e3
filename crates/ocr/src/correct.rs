use docmatch_core::text::normalize_identifier;
use regex::Regex;

/// Which kind of text a correction rule may touch. Names and other free
/// text have no scope, so no rule can ever reach them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldScope {
    /// The numeric tail of a document number.
    Identifier,
    /// Characters inside date-shaped tokens.
    Date,
    /// Label vocabulary, used for classification only.
    Label,
}

#[derive(Debug, Clone)]
pub struct CorrectionRule {
    pub pattern: Regex,
    pub replacement: String,
    pub scope: FieldScope,
}

impl CorrectionRule {
    pub fn new(pattern: &str, replacement: &str, scope: FieldScope) -> Result<Self, regex::Error> {
        Ok(Self { pattern: Regex::new(pattern)?, replacement: replacement.to_string(), scope })
    }
}

re!(re_date_token, r"\b[0-9OoIlSB|]{1,2}[/.\-][0-9OoIlSB|]{1,2}[/.\-][0-9OoIlSB|]{2,4}\b");

/// Ordered confusable-character rules. Within a scope, rules run in the
/// order they were added.
#[derive(Debug, Clone)]
pub struct Corrections {
    rules: Vec<CorrectionRule>,
}

impl Default for Corrections {
    fn default() -> Self {
        Self::standard()
    }
}

impl Corrections {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// The built-in table for French/English identity documents.
    pub fn standard() -> Self {
        use FieldScope::*;
        let table: &[(&str, &str, FieldScope)] = &[
            ("[OQD]", "0", Identifier),
            ("[IL|]", "1", Identifier),
            ("Z", "2", Identifier),
            ("S", "5", Identifier),
            ("G", "6", Identifier),
            ("B", "8", Identifier),
            ("[Oo]", "0", Date),
            ("[Il|]", "1", Date),
            ("S", "5", Date),
            ("B", "8", Date),
            (r"(?i)\bpassep[o0]rt\b", "PASSEPORT", Label),
            (r"(?i)\bpassp[o0]rt\b", "PASSPORT", Label),
            (r"(?i)\bperm[i1l]s\b", "PERMIS", Label),
            (r"(?i)\bc[o0]ndu[i1l]re\b", "CONDUIRE", Label),
            (r"(?i)\b[i1l]dent[i1l]t[eé]\b", "IDENTITE", Label),
            (r"(?i)\bnat[i1l][o0]nale\b", "NATIONALE", Label),
            (r"(?i)\bnat[i1l][o0]nal\b", "NATIONAL", Label),
            (r"(?i)\br[eé]publ[i1l]que\b", "REPUBLIQUE", Label),
            (r"(?i)\bs[eé]j[o0]ur\b", "SEJOUR", Label),
        ];
        let rules = table
            .iter()
            .map(|(pattern, replacement, scope)| {
                CorrectionRule::new(pattern, replacement, *scope).expect("invalid correction rule")
            })
            .collect();
        Self { rules }
    }

    pub fn push(&mut self, rule: CorrectionRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self, scope: FieldScope) -> impl Iterator<Item = &CorrectionRule> {
        self.rules.iter().filter(move |r| r.scope == scope)
    }

    fn apply(&self, scope: FieldScope, value: &str) -> String {
        self.rules(scope).fold(value.to_string(), |acc, rule| {
            rule.pattern.replace_all(&acc, rule.replacement.as_str()).into_owned()
        })
    }

    /// Canonical document number: accents stripped, upper-cased, spaces and
    /// punctuation other than `-` removed, then the identifier rules applied
    /// from the first digit onward. A letter prefix (`AB`, `CI-XYZ-`) is kept.
    pub fn correct_identifier(&self, raw: &str) -> String {
        let normalized = normalize_identifier(raw);
        match normalized.find(|c: char| c.is_ascii_digit()) {
            Some(start) => {
                let (prefix, tail) = normalized.split_at(start);
                format!("{prefix}{}", self.apply(FieldScope::Identifier, tail))
            }
            None => normalized,
        }
    }

    /// Fix confusables inside date-shaped tokens only. Every rule replaces a
    /// single char with a single char, so offsets into the text stay valid.
    pub fn correct_dates(&self, text: &str) -> String {
        re_date_token()
            .replace_all(text, |caps: &regex::Captures| {
                let token = &caps[0];
                if token.chars().filter(char::is_ascii_digit).count() < 2 {
                    return token.to_string();
                }
                self.apply(FieldScope::Date, token)
            })
            .into_owned()
    }

    /// Label vocabulary with common misreads fixed; the result feeds the
    /// classifier and is never shown to callers.
    pub fn correct_labels(&self, text: &str) -> String {
        self.apply(FieldScope::Label, text)
    }
}
