use docmatch_core::text::fold_text;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::config::ConfigError;
use crate::dates::find_dates;

#[derive(Debug, Error)]
pub enum NerError {
    #[error("Entity recognizer '{0}' is not available")]
    Unavailable(String),
    #[error("Entity recognition failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityLabel {
    Person,
    Location,
    Date,
    Organization,
}

/// A tagged span; `start..end` are byte offsets into the recognized text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpan {
    pub label: EntityLabel,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Optional named-entity tagging used to fill fields the rules missed.
pub trait EntityRecognizer: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>, NerError>;
}

/// For rule-only deployments.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableRecognizer;

impl EntityRecognizer for UnavailableRecognizer {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn recognize(&self, _text: &str) -> Result<Vec<EntitySpan>, NerError> {
        Err(NerError::Unavailable(self.name().to_string()))
    }
}

/// Tags every occurrence of a fixed list of `(label, phrase)` pairs.
#[derive(Debug, Default, Clone)]
pub struct StaticRecognizer {
    entities: Vec<(EntityLabel, String)>,
}

impl StaticRecognizer {
    pub fn new(entities: Vec<(EntityLabel, &str)>) -> Self {
        Self { entities: entities.into_iter().map(|(l, t)| (l, t.to_string())).collect() }
    }
}

impl EntityRecognizer for StaticRecognizer {
    fn name(&self) -> &str {
        "static"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>, NerError> {
        let mut spans: Vec<EntitySpan> = self
            .entities
            .iter()
            .flat_map(|(label, phrase)| {
                text.match_indices(phrase.as_str()).map(move |(start, m)| EntitySpan {
                    label: *label,
                    text: m.to_string(),
                    start,
                    end: start + m.len(),
                })
            })
            .collect();
        spans.sort_by_key(|s| s.start);
        Ok(spans)
    }
}

// ── Gazetteer recognizer ─────────────────────────────────────────────────────

/// Vocabularies for [`GazetteerRecognizer`]. Entries are compared after
/// case folding and accent stripping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GazetteerConfig {
    pub locations: Vec<String>,
    pub organizations: Vec<String>,
    /// Known given names; an uppercase run of two or more words containing
    /// one of these is tagged as a person.
    pub given_names: Vec<String>,
    /// Words that end a person run (label vocabulary, headers).
    pub stopwords: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for GazetteerConfig {
    fn default() -> Self {
        Self {
            locations: strings(&[
                "DAKAR", "THIES", "SAINT-LOUIS", "ZIGUINCHOR", "KAOLACK", "TOUBA", "MBOUR",
                "RUFISQUE", "PIKINE", "DIOURBEL", "LOUGA", "TAMBACOUNDA", "KOLDA", "MATAM",
                "FATICK", "KAFFRINE", "KEDOUGOU", "SEDHIOU", "BAMAKO", "ABIDJAN", "CONAKRY",
                "NOUAKCHOTT", "BANJUL", "PARIS", "LYON", "MARSEILLE",
            ]),
            organizations: strings(&[
                "REPUBLIQUE DU SENEGAL",
                "MINISTERE DE L'INTERIEUR",
                "DIRECTION DE L'AUTOMATISATION DES FICHIERS",
                "CEDEAO",
                "ECOWAS",
            ]),
            given_names: strings(&[
                "AMINATA", "AWA", "FATOU", "FATOUMATA", "MARIEME", "KHADY", "ASTOU", "ADAMA",
                "AISSATOU", "NDEYE", "COUMBA", "BINTA", "MAMADOU", "MOUSSA", "IBRAHIMA",
                "OUSMANE", "ABDOULAYE", "CHEIKH", "MODOU", "ALIOU", "SEYDOU", "BOUBACAR",
                "AMADOU", "MOUHAMED", "PAPE", "MALICK", "ANNA", "MARIE", "JEAN", "PIERRE",
            ]),
            stopwords: strings(&[
                "NOM", "NOMS", "PRENOM", "PRENOMS", "SURNAME", "NAME", "GIVEN", "DATE",
                "NAISSANCE", "LIEU", "SEXE", "SEX", "NATIONALITE", "CARTE", "IDENTITE",
                "NATIONALE", "PASSEPORT", "PASSPORT", "PERMIS", "CONDUIRE", "REPUBLIQUE",
                "SENEGAL", "SIGNATURE", "EXPIRATION", "DELIVRANCE", "ADRESSE", "TAILLE",
            ]),
        }
    }
}

impl GazetteerConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_content)?)
    }
}

re!(re_upper_word, r"[A-ZÀ-ÖØ-Þ][A-ZÀ-ÖØ-Þ'\-]+");

/// Dictionary-driven recognizer: locations and organizations by phrase
/// lookup, persons by given-name evidence, dates through the date parser.
pub struct GazetteerRecognizer {
    locations: Vec<String>,
    organizations: Vec<String>,
    given_names: HashSet<String>,
    stopwords: HashSet<String>,
}

impl GazetteerRecognizer {
    pub fn new(config: &GazetteerConfig) -> Self {
        Self {
            locations: folded(&config.locations),
            organizations: folded(&config.organizations),
            given_names: folded(&config.given_names).into_iter().collect(),
            stopwords: folded(&config.stopwords).into_iter().collect(),
        }
    }

    fn phrase_spans(&self, line: &str, offset: usize, phrases: &[String], label: EntityLabel) -> Vec<EntitySpan> {
        let words = word_spans(line);
        let mut spans = Vec::new();
        for phrase in phrases {
            let wanted: Vec<&str> = phrase.split(' ').collect();
            for window in words.windows(wanted.len()) {
                let matches = window.iter().zip(&wanted).all(|((_, _, w), p)| w.as_str() == *p);
                if matches {
                    let (start, end) = (window[0].0, window[window.len() - 1].1);
                    spans.push(EntitySpan {
                        label,
                        text: line[start..end].to_string(),
                        start: offset + start,
                        end: offset + end,
                    });
                }
            }
        }
        spans
    }

    fn person_spans(&self, line: &str, offset: usize) -> Vec<EntitySpan> {
        let mut spans = Vec::new();
        let mut run: Vec<(usize, usize)> = Vec::new();

        let mut flush = |run: &mut Vec<(usize, usize)>| {
            let has_given = run.iter().any(|(s, e)| self.given_names.contains(&fold_text(&line[*s..*e])));
            if run.len() >= 2 && has_given {
                let (start, end) = (run[0].0, run[run.len() - 1].1);
                spans.push(EntitySpan {
                    label: EntityLabel::Person,
                    text: line[start..end].to_string(),
                    start: offset + start,
                    end: offset + end,
                });
            }
            run.clear();
        };

        for m in re_upper_word().find_iter(line) {
            let contiguous = run.last().map_or(true, |(_, prev_end)| {
                line[*prev_end..m.start()].chars().all(char::is_whitespace)
            });
            if !contiguous {
                flush(&mut run);
            }
            if self.stopwords.contains(&fold_text(m.as_str())) {
                flush(&mut run);
                continue;
            }
            run.push((m.start(), m.end()));
        }
        flush(&mut run);
        spans
    }
}

fn folded(items: &[String]) -> Vec<String> {
    items.iter().map(|s| fold_text(s)).filter(|s| !s.is_empty()).collect()
}

/// `(start, end, folded word)` for every whitespace-separated word, with
/// surrounding punctuation trimmed.
fn word_spans(line: &str) -> Vec<(usize, usize, String)> {
    let mut words = Vec::new();
    let mut pos = 0;
    for raw in line.split_whitespace() {
        let Some(found) = line[pos..].find(raw) else { continue };
        let start = pos + found;
        pos = start + raw.len();
        let trimmed = raw.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'' && c != '-');
        if trimmed.is_empty() {
            continue;
        }
        let lead = raw.find(trimmed).unwrap_or(0);
        words.push((start + lead, start + lead + trimmed.len(), fold_text(trimmed)));
    }
    words
}

impl EntityRecognizer for GazetteerRecognizer {
    fn name(&self) -> &str {
        "gazetteer"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>, NerError> {
        let mut spans = Vec::new();
        let mut offset = 0;
        for line in text.split('\n') {
            spans.extend(self.phrase_spans(line, offset, &self.organizations, EntityLabel::Organization));
            spans.extend(self.phrase_spans(line, offset, &self.locations, EntityLabel::Location));
            spans.extend(self.person_spans(line, offset));
            offset += line.len() + 1;
        }
        spans.extend(find_dates(text).into_iter().map(|d| EntitySpan {
            label: EntityLabel::Date,
            text: text[d.start..d.end].to_string(),
            start: d.start,
            end: d.end,
        }));
        spans.sort_by_key(|s| (s.start, s.end));
        Ok(spans)
    }
}
