use docmatch_core::text::{clean_text, fold_text, text_quality};
use tracing::debug;

use crate::config::ConsolidatorConfig;
use crate::types::{ConsolidatedLine, RawTextFragment};

/// Merges fragments from one or more engines into ordered lines.
#[derive(Debug, Clone, Default)]
pub struct Consolidator {
    config: ConsolidatorConfig,
}

struct Group {
    key: String,
    line: ConsolidatedLine,
}

impl Consolidator {
    pub fn new(config: ConsolidatorConfig) -> Self {
        Self { config }
    }

    /// Lines come out in the order their group was first detected.
    pub fn consolidate(&self, fragments: &[RawTextFragment]) -> Vec<ConsolidatedLine> {
        let c = &self.config;
        let mut groups: Vec<Group> = Vec::new();
        let mut dropped = 0usize;

        for fragment in fragments {
            let cleaned = clean_text(&fragment.text);
            if cleaned.chars().count() < c.min_text_len
                || fragment.engine_confidence < c.min_confidence
                || text_quality(&cleaned) < c.min_text_quality
            {
                dropped += 1;
                continue;
            }

            let key: String = fold_text(&cleaned).chars().take(c.key_length).collect();
            match groups.iter_mut().find(|g| self.same_group(&g.key, &key)) {
                Some(group) => {
                    let line = &mut group.line;
                    if !line.contributing_engines.contains(&fragment.source_engine) {
                        line.contributing_engines.push(fragment.source_engine.clone());
                    }
                    // Strictly greater: on ties the earlier detection wins.
                    if fragment.engine_confidence > line.best_confidence {
                        line.text = cleaned;
                        line.best_confidence = fragment.engine_confidence;
                        group.key = key;
                    }
                }
                None => groups.push(Group {
                    key,
                    line: ConsolidatedLine {
                        text: cleaned,
                        best_confidence: fragment.engine_confidence,
                        contributing_engines: vec![fragment.source_engine.clone()],
                    },
                }),
            }
        }

        debug!(input = fragments.len(), dropped, lines = groups.len(), "consolidated fragments");
        groups.into_iter().map(|g| g.line).collect()
    }

    fn same_group(&self, a: &str, b: &str) -> bool {
        if a == b {
            return true;
        }
        let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };
        shorter.chars().count() >= self.config.min_prefix_overlap && longer.starts_with(shorter)
    }
}

/// Newline-joined text of the lines, in order.
pub fn join_lines(lines: &[ConsolidatedLine]) -> String {
    lines.iter().map(|l| l.text.as_str()).collect::<Vec<_>>().join("\n")
}

/// Mean `best_confidence` over the lines; 0.0 when there are none.
pub fn mean_confidence(lines: &[ConsolidatedLine]) -> f32 {
    if lines.is_empty() {
        return 0.0;
    }
    lines.iter().map(|l| l.best_confidence).sum::<f32>() / lines.len() as f32
}
