use std::sync::Arc;

use docmatch_ocr::config::ExtractionConfig;
use docmatch_ocr::{FieldExtractor, GazetteerConfig, GazetteerRecognizer};
use proptest::prelude::*;

fn card_line() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("CARTE NATIONALE D'IDENTITÉ".to_string()),
        Just("PASSEPORT".to_string()),
        "(NOM|PRÉNOM|PRENOMS|LIEU DE NAISSANCE|SEXE|N°) ?: ?[A-ZÉ' -]{0,16}",
        "(NÉ LE|DATE DE NAISSANCE|EXPIRE LE) [0-9OIl]{1,2}[/.-][0-9OIl]{1,2}[/.-][0-9]{2,4}",
        "[A-Z0-9<]{30,44}",
        "[0-9 ]{6,17}",
        "\\PC{0,40}",
    ]
}

fn card_text() -> impl Strategy<Value = String> {
    prop::collection::vec(card_line(), 0..10).prop_map(|lines| lines.join("\n"))
}

proptest! {
    #[test]
    fn rule_extraction_is_deterministic(text in card_text()) {
        let extractor = FieldExtractor::rules_only(ExtractionConfig::default());
        let first = extractor.extract_text(&text);
        let second = extractor.extract_text(&text);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn extraction_with_gazetteer_is_deterministic(text in card_text()) {
        let recognizer = Arc::new(GazetteerRecognizer::new(&GazetteerConfig::default()));
        let extractor = FieldExtractor::new(ExtractionConfig::default(), recognizer);
        let first = extractor.extract_text(&text);
        let again = extractor.clone().extract_text(&text);
        prop_assert_eq!(first, again);
    }
}
