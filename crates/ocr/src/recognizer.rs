use image::GrayImage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::types::RawTextFragment;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine '{0}' is not available")]
    Unavailable(String),
    #[error("Engine '{engine}' failed: {message}")]
    Failed { engine: String, message: String },
    #[error("Engine '{engine}' timed out after {timeout:?}")]
    Timeout { engine: String, timeout: Duration },
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("All {0} recognition engines failed or were unavailable")]
    AllEnginesFailed(usize),
}

/// A text-recognition backend.
///
/// `recognize` is synchronous and may be slow; the pool runs it on the
/// blocking thread pool under a timeout. Engines that need heavy
/// initialization do it in their constructor and report the outcome through
/// `is_available`.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool {
        true
    }

    fn recognize(&self, image: &GrayImage) -> Result<Vec<RawTextFragment>, EngineError>;
}

// ── Mock engine (always available, used for tests) ──────────────────────────

/// Returns a preset list of fragments and counts how often it was called.
pub struct MockEngine {
    name: String,
    fragments: Vec<RawTextFragment>,
    calls: AtomicUsize,
}

impl MockEngine {
    pub fn new(name: impl Into<String>, fragments: Vec<(&str, f32)>) -> Self {
        let name = name.into();
        let fragments = fragments
            .into_iter()
            .map(|(text, conf)| RawTextFragment::new(text, conf, name.clone()))
            .collect();
        Self { name, fragments, calls: AtomicUsize::new(0) }
    }

    /// One fragment per non-blank line of `text`, all with `confidence`.
    pub fn from_text(name: impl Into<String>, text: &str, confidence: f32) -> Self {
        let lines = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| (l, confidence))
            .collect();
        Self::new(name, lines)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrEngine for MockEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn recognize(&self, _image: &GrayImage) -> Result<Vec<RawTextFragment>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.fragments.clone())
    }
}

/// Stands in for an engine whose model could not be loaded.
pub struct UnavailableEngine {
    name: String,
}

impl UnavailableEngine {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl OcrEngine for UnavailableEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        false
    }

    fn recognize(&self, _image: &GrayImage) -> Result<Vec<RawTextFragment>, EngineError> {
        Err(EngineError::Unavailable(self.name.clone()))
    }
}

// ── Tesseract engine (optional, gated behind `tesseract` feature) ────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_engine {
    use super::{EngineError, OcrEngine};
    use crate::preprocess::encode_as_png;
    use crate::types::{BoundingBox, RawTextFragment};
    use image::GrayImage;
    use leptess::{capi, LepTess};
    use tracing::warn;

    pub struct TesseractEngine {
        data_path: Option<String>,
        lang: String,
        available: bool,
    }

    impl TesseractEngine {
        /// Probes the language data once; a failed probe marks the engine
        /// unavailable instead of failing construction.
        pub fn new(data_path: Option<String>, lang: &str) -> Self {
            let available = match LepTess::new(data_path.as_deref(), lang) {
                Ok(_) => true,
                Err(e) => {
                    warn!(lang, error = %e, "tesseract could not be initialised");
                    false
                }
            };
            Self { data_path, lang: lang.to_string(), available }
        }

        fn failed(&self, message: impl ToString) -> EngineError {
            EngineError::Failed { engine: "tesseract".into(), message: message.to_string() }
        }
    }

    impl OcrEngine for TesseractEngine {
        fn name(&self) -> &str {
            "tesseract"
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn recognize(&self, image: &GrayImage) -> Result<Vec<RawTextFragment>, EngineError> {
            let png = encode_as_png(image).map_err(|e| self.failed(e))?;
            let mut lt = LepTess::new(self.data_path.as_deref(), &self.lang)
                .map_err(|e| self.failed(e))?;
            lt.set_image_from_mem(&png).map_err(|e| self.failed(e))?;

            // One fragment per text line, each with its own box and score.
            let Some(boxes) = lt.get_component_boxes(capi::TessPageIteratorLevel_RIL_TEXTLINE, true) else {
                return Ok(Vec::new());
            };
            let mut fragments = Vec::new();
            for b in &boxes {
                lt.set_rectangle_from_box(&b);
                let text = lt.get_utf8_text().map_err(|e| self.failed(e))?;
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                let confidence = (lt.mean_text_conf().max(0) as f32 / 100.0).min(1.0);
                let v = b.get_val();
                let region = BoundingBox::from_signed(v.x, v.y, v.w, v.h);
                fragments.push(RawTextFragment::new(text, confidence, "tesseract").with_region(region));
            }
            Ok(fragments)
        }
    }
}

// ── Engine pool ───────────────────────────────────────────────────────────────

/// Engines tried in priority order. The next engine is consulted whenever
/// the ones so far produced fewer than `min_fragments` fragments, and the
/// outputs are unioned.
#[derive(Clone)]
pub struct EnginePool {
    engines: Vec<Arc<dyn OcrEngine>>,
    config: PoolConfig,
}

impl EnginePool {
    pub fn new(engines: Vec<Arc<dyn OcrEngine>>, config: PoolConfig) -> Self {
        Self { engines, config }
    }

    pub fn engine_names(&self) -> Vec<&str> {
        self.engines.iter().map(|e| e.name()).collect()
    }

    pub fn any_available(&self) -> bool {
        self.engines.iter().any(|e| e.is_available())
    }

    pub async fn recognize(&self, image: Arc<GrayImage>) -> Result<Vec<RawTextFragment>, PoolError> {
        let mut fragments = Vec::new();
        let mut succeeded = 0usize;

        for engine in &self.engines {
            if !engine.is_available() {
                warn!(engine = engine.name(), "engine unavailable, skipping");
                continue;
            }
            match self.run_engine(Arc::clone(engine), Arc::clone(&image)).await {
                Ok(found) => {
                    debug!(engine = engine.name(), fragment_count = found.len(), "engine finished");
                    succeeded += 1;
                    fragments.extend(found);
                    if fragments.len() >= self.config.min_fragments {
                        break;
                    }
                    info!(
                        engine = engine.name(),
                        fragment_count = fragments.len(),
                        "too few fragments, consulting next engine"
                    );
                }
                Err(e) => warn!(engine = engine.name(), error = %e, "engine failed, falling back"),
            }
        }

        if succeeded == 0 {
            return Err(PoolError::AllEnginesFailed(self.engines.len()));
        }
        Ok(fragments)
    }

    async fn run_engine(
        &self,
        engine: Arc<dyn OcrEngine>,
        image: Arc<GrayImage>,
    ) -> Result<Vec<RawTextFragment>, EngineError> {
        let name = engine.name().to_string();
        let timeout = self.config.engine_timeout();
        let task = tokio::task::spawn_blocking(move || engine.recognize(&image));

        match tokio::time::timeout(timeout, task).await {
            Err(_) => Err(EngineError::Timeout { engine: name, timeout }),
            Ok(Err(join_error)) => Err(EngineError::Failed { engine: name, message: join_error.to_string() }),
            Ok(Ok(result)) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    struct FailingEngine;

    impl OcrEngine for FailingEngine {
        fn name(&self) -> &str {
            "failing"
        }
        fn recognize(&self, _image: &GrayImage) -> Result<Vec<RawTextFragment>, EngineError> {
            Err(EngineError::Failed { engine: "failing".into(), message: "model crashed".into() })
        }
    }

    struct PanickingEngine;

    impl OcrEngine for PanickingEngine {
        fn name(&self) -> &str {
            "panicking"
        }
        fn recognize(&self, _image: &GrayImage) -> Result<Vec<RawTextFragment>, EngineError> {
            panic!("native library aborted")
        }
    }

    struct SlowEngine;

    impl OcrEngine for SlowEngine {
        fn name(&self) -> &str {
            "slow"
        }
        fn recognize(&self, _image: &GrayImage) -> Result<Vec<RawTextFragment>, EngineError> {
            std::thread::sleep(Duration::from_millis(400));
            Ok(vec![RawTextFragment::new("TOO LATE", 0.9, "slow")])
        }
    }

    fn blank() -> Arc<GrayImage> {
        Arc::new(ImageBuffer::from_fn(4, 4, |_, _| Luma([255u8])))
    }

    fn fast_config() -> PoolConfig {
        PoolConfig { min_fragments: 3, engine_timeout_ms: 100 }
    }

    fn pool(engines: Vec<Arc<dyn OcrEngine>>) -> EnginePool {
        EnginePool::new(engines, fast_config())
    }

    #[test]
    fn mock_returns_preset_fragments() {
        let engine = MockEngine::from_text("mock", "REPUBLIQUE\n\n  NDIAYE  \n", 0.8);
        let out = engine.recognize(&blank()).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].text, "NDIAYE");
        assert_eq!(out[1].source_engine, "mock");
        assert_eq!(engine.call_count(), 1);
    }

    #[tokio::test]
    async fn primary_with_enough_fragments_skips_fallback() {
        let primary = Arc::new(MockEngine::from_text("primary", "A1\nB2\nC3", 0.9));
        let fallback = Arc::new(MockEngine::from_text("fallback", "D4", 0.9));
        let engines: Vec<Arc<dyn OcrEngine>> = vec![primary, fallback.clone()];
        let out = pool(engines).recognize(blank()).await.unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(fallback.call_count(), 0);
    }

    #[tokio::test]
    async fn sparse_primary_output_is_unioned_with_fallback() {
        let primary = Arc::new(MockEngine::from_text("primary", "NDIAYE", 0.9));
        let fallback = Arc::new(MockEngine::from_text("fallback", "NDIAY\nAWA\n15/06/1991", 0.6));
        let engines: Vec<Arc<dyn OcrEngine>> = vec![primary, fallback];
        let out = pool(engines).recognize(blank()).await.unwrap();
        assert_eq!(out.len(), 4);
        assert_eq!(out[0].source_engine, "primary");
        assert_eq!(out[3].source_engine, "fallback");
    }

    #[tokio::test]
    async fn failing_and_unavailable_engines_fall_back() {
        let last = Arc::new(MockEngine::from_text("last", "A1\nB2\nC3", 0.9));
        let engines: Vec<Arc<dyn OcrEngine>> = vec![
            Arc::new(UnavailableEngine::new("gpu")),
            Arc::new(FailingEngine),
            Arc::new(PanickingEngine),
            last.clone(),
        ];
        let out = pool(engines).recognize(blank()).await.unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(last.call_count(), 1);
    }

    #[tokio::test]
    async fn hung_engine_is_treated_as_failed() {
        let backup = Arc::new(MockEngine::from_text("backup", "A1\nB2\nC3", 0.7));
        let engines: Vec<Arc<dyn OcrEngine>> = vec![Arc::new(SlowEngine), backup];
        let out = pool(engines).recognize(blank()).await.unwrap();
        assert!(out.iter().all(|f| f.source_engine == "backup"));
    }

    #[tokio::test]
    async fn all_engines_failing_is_reported() {
        let engines: Vec<Arc<dyn OcrEngine>> =
            vec![Arc::new(UnavailableEngine::new("a")), Arc::new(FailingEngine)];
        let p = pool(engines);
        assert!(p.any_available());
        let err = p.recognize(blank()).await.unwrap_err();
        assert!(matches!(err, PoolError::AllEnginesFailed(2)));

        let empty = pool(vec![]);
        assert!(!empty.any_available());
        assert!(matches!(empty.recognize(blank()).await, Err(PoolError::AllEnginesFailed(0))));
    }

    #[test]
    fn engine_names_keep_priority_order() {
        let engines: Vec<Arc<dyn OcrEngine>> = vec![
            Arc::new(UnavailableEngine::new("first")),
            Arc::new(MockEngine::new("second", vec![])),
        ];
        let p = pool(engines);
        assert_eq!(p.engine_names(), vec!["first", "second"]);
    }
}
