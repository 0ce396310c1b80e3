// Regexes are compiled once on first use.
macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static ::regex::Regex {
            static R: ::std::sync::OnceLock<::regex::Regex> = ::std::sync::OnceLock::new();
            R.get_or_init(|| ::regex::Regex::new($pat).expect("invalid regex"))
        }
    };
}

pub mod cache;
pub mod classify;
pub mod config;
pub mod consolidate;
pub mod correct;
pub mod dates;
pub mod extract;
pub mod hash;
pub mod mrz;
pub mod ner;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod score;
pub mod types;

pub use cache::{CacheError, MemoryCache, NoCache, RecognitionCache};
pub use classify::classify;
pub use config::{ConfigError, PipelineConfig};
pub use consolidate::Consolidator;
pub use correct::{CorrectionRule, Corrections, FieldScope};
pub use extract::{Extraction, FieldExtractor};
pub use hash::ImageDigest;
pub use mrz::{parse_mrz, MrzData, MrzFormat};
pub use ner::{EntityLabel, EntityRecognizer, EntitySpan, GazetteerConfig, GazetteerRecognizer, NerError, UnavailableRecognizer};
pub use pipeline::{run_intake_worker, spawn_intake_watcher, PipelineError, RecognitionPipeline};
pub use preprocess::{ImageNormalizer, PreprocessError};
pub use recognizer::{EngineError, EnginePool, MockEngine, OcrEngine, PoolError, UnavailableEngine};
pub use score::{FieldSource, Scorer};
pub use types::{
    ConsolidatedLine, ExtractedField, ExtractedFields, FlatRecognition, RawTextFragment, RecognitionResult,
    ValidityStatus,
};
