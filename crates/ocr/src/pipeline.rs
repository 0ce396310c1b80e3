use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::ImageFormat;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cache::RecognitionCache;
use crate::config::PipelineConfig;
use crate::consolidate::{join_lines, Consolidator};
use crate::extract::FieldExtractor;
use crate::hash::ImageDigest;
use crate::ner::EntityRecognizer;
use crate::preprocess::{format_hint, ImageNormalizer};
use crate::recognizer::{EnginePool, OcrEngine};
use crate::score::Scorer;
use crate::types::RecognitionResult;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Orchestrates: digest → cache → normalize → engines → consolidate →
/// extract → score → cache.
///
/// Recognition never fails on bad input: unreadable images and engine
/// outages produce [`RecognitionResult::degraded`].
pub struct RecognitionPipeline<C: RecognitionCache> {
    normalizer: ImageNormalizer,
    pool: EnginePool,
    consolidator: Consolidator,
    extractor: FieldExtractor,
    scorer: Scorer,
    cache: C,
    cache_ttl: Duration,
    engine_fingerprint: String,
}

impl<C: RecognitionCache> RecognitionPipeline<C> {
    pub fn new(
        config: PipelineConfig,
        engines: Vec<Arc<dyn OcrEngine>>,
        recognizer: Arc<dyn EntityRecognizer>,
        cache: C,
    ) -> Self {
        let pool = EnginePool::new(engines, config.pool.clone());
        let engine_fingerprint = pool.engine_names().join("+");
        Self {
            normalizer: ImageNormalizer::new(config.normalizer.clone()),
            pool,
            consolidator: Consolidator::new(config.consolidator.clone()),
            extractor: FieldExtractor::new(config.extraction.clone(), recognizer),
            scorer: Scorer::new(config.scoring.clone()),
            cache,
            cache_ttl: config.cache_ttl(),
            engine_fingerprint,
        }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn engine_names(&self) -> Vec<&str> {
        self.pool.engine_names()
    }

    /// Recognize a file on disk. Only reading the file can fail.
    pub async fn recognize_file(&self, path: &Path) -> Result<RecognitionResult, PipelineError> {
        let bytes = tokio::fs::read(path).await?;
        let hint = path.extension().and_then(|e| e.to_str()).and_then(format_hint);
        Ok(self.recognize_bytes(&bytes, hint).await)
    }

    /// Recognize raw image bytes (upload or camera capture).
    pub async fn recognize_bytes(&self, data: &[u8], hint: Option<ImageFormat>) -> RecognitionResult {
        let started = Instant::now();
        let key = ImageDigest::of_bytes(data).cache_key(&self.engine_fingerprint);

        match self.cache.get(&key).await {
            Ok(Some(hit)) => {
                debug!(key = %key, "recognition cache hit");
                return hit;
            }
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "cache lookup failed, recognizing without cache"),
        }

        let normalizer = self.normalizer.clone();
        let bytes = data.to_vec();
        let image = match tokio::task::spawn_blocking(move || normalizer.prepare(&bytes, hint)).await {
            Ok(Ok(image)) => Arc::new(image),
            Ok(Err(e)) => {
                warn!(key = %key, error = %e, "image unreadable, returning empty result");
                return RecognitionResult::degraded(started.elapsed().as_secs_f64());
            }
            Err(e) => {
                warn!(key = %key, error = %e, "normalization task failed, returning empty result");
                return RecognitionResult::degraded(started.elapsed().as_secs_f64());
            }
        };

        let fragments = match self.pool.recognize(image).await {
            Ok(fragments) => fragments,
            Err(e) => {
                warn!(key = %key, error = %e, "no engine produced text, returning empty result");
                return RecognitionResult::degraded(started.elapsed().as_secs_f64());
            }
        };

        let lines = self.consolidator.consolidate(&fragments);
        let extraction = self.extractor.extract(&lines);
        let (confidence_score, validity_status) = self.scorer.evaluate(&lines, &extraction.fields);

        let result = RecognitionResult {
            document_type: extraction.document_type,
            fields: extraction.fields,
            raw_text: join_lines(&lines),
            confidence_score,
            validity_status,
            processing_time: started.elapsed().as_secs_f64(),
        };

        if let Err(e) = self.cache.put(&key, &result, self.cache_ttl).await {
            warn!(key = %key, error = %e, "could not store recognition in cache");
        }

        info!(
            key = %key,
            document_type = %result.document_type,
            confidence = result.confidence_score,
            validity = %result.validity_status,
            fragment_count = fragments.len(),
            line_count = lines.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "document recognized"
        );
        result
    }
}

// ── Watch-folder integration ──────────────────────────────────────────────────

/// Spawn a notify watcher on `watch_dir` that sends new file paths to `tx`.
/// Returns the watcher; it must be kept alive for watching to continue.
pub fn spawn_intake_watcher(
    watch_dir: &Path,
    tx: mpsc::Sender<PathBuf>,
) -> notify::Result<impl notify::Watcher> {
    use notify::{EventKind, RecursiveMode, Watcher};

    let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        match event {
            Ok(ev) if matches!(ev.kind, EventKind::Create(_)) => {
                for path in ev.paths {
                    if tx.try_send(path).is_err() {
                        warn!("intake queue full or closed, dropping file event");
                    }
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "watch error"),
        }
    })?;

    watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

fn is_image_path(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()).and_then(format_hint).is_some()
}

/// Drain `rx`, recognizing every image path and forwarding the outcome to
/// `results`. Returns when the intake channel closes or nobody listens for
/// results any more.
pub async fn run_intake_worker<C: RecognitionCache>(
    pipeline: Arc<RecognitionPipeline<C>>,
    mut rx: mpsc::Receiver<PathBuf>,
    results: mpsc::Sender<(PathBuf, RecognitionResult)>,
) {
    while let Some(path) = rx.recv().await {
        if !is_image_path(&path) {
            debug!(path = %path.display(), "not an image, skipping");
            continue;
        }
        match pipeline.recognize_file(&path).await {
            Ok(result) => {
                info!(
                    path = %path.display(),
                    document_type = %result.document_type,
                    validity = %result.validity_status,
                    "intake file processed"
                );
                if results.send((path, result)).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!(path = %path.display(), error = %e, "could not read intake file"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheError, MemoryCache, NoCache};
    use crate::ner::UnavailableRecognizer;
    use crate::recognizer::{MockEngine, UnavailableEngine};
    use crate::types::ValidityStatus;
    use docmatch_core::DocumentType;
    use image::{DynamicImage, GrayImage, Luma};
    use std::io::Cursor;

    fn striped_png() -> Vec<u8> {
        let img = GrayImage::from_fn(40, 40, |x, _| Luma([if x % 8 < 4 { 30u8 } else { 220u8 }]));
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn id_card_engine() -> Arc<MockEngine> {
        Arc::new(MockEngine::new(
            "mock",
            vec![
                ("CARTE NATIONALE D'IDENTITÉ", 0.9),
                ("NOM: DIALLO", 0.9),
                ("PRÉNOM: AMINATA", 0.9),
                ("NÉE LE 15/06/1991", 0.9),
                ("N° 1234567890123", 0.9),
            ],
        ))
    }

    struct FailingCache;

    impl RecognitionCache for FailingCache {
        async fn get(&self, _key: &str) -> Result<Option<RecognitionResult>, CacheError> {
            Err(CacheError::Unavailable("backend down".into()))
        }

        async fn put(&self, _key: &str, _result: &RecognitionResult, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("backend down".into()))
        }
    }

    fn pipeline<C: RecognitionCache>(engines: Vec<Arc<dyn OcrEngine>>, cache: C) -> RecognitionPipeline<C> {
        RecognitionPipeline::new(PipelineConfig::default(), engines, Arc::new(UnavailableRecognizer), cache)
    }

    #[tokio::test]
    async fn recognizes_fields_from_engine_output() {
        let engine = id_card_engine();
        let p = pipeline(vec![engine.clone() as Arc<dyn OcrEngine>], NoCache);

        let result = p.recognize_bytes(&striped_png(), Some(ImageFormat::Png)).await;
        assert_eq!(result.document_type, DocumentType::NationalId);
        let flat = result.to_flat();
        assert_eq!(flat.family_name, "DIALLO");
        assert_eq!(flat.given_name, "AMINATA");
        assert_eq!(flat.date_of_birth.as_deref(), Some("1991-06-15"));
        assert_eq!(flat.document_number, "1234567890123");
        assert_eq!(result.validity_status, ValidityStatus::Valid);
        assert!(result.raw_text.contains("DIALLO"));
    }

    #[tokio::test]
    async fn second_recognition_is_served_from_cache() {
        let engine = id_card_engine();
        let p = pipeline(vec![engine.clone() as Arc<dyn OcrEngine>], MemoryCache::new());
        let data = striped_png();

        let first = p.recognize_bytes(&data, None).await;
        let second = p.recognize_bytes(&data, None).await;
        assert_eq!(first, second);
        assert_eq!(engine.call_count(), 1);
        assert_eq!(p.cache().len(), 1);
    }

    #[tokio::test]
    async fn cached_results_are_not_shared_across_engine_sets() {
        let cache = Arc::new(MemoryCache::new());
        let data = striped_png();

        let first_engine = id_card_engine();
        let first = pipeline(vec![first_engine.clone() as Arc<dyn OcrEngine>], cache.clone());
        first.recognize_bytes(&data, None).await;

        let passport = Arc::new(MockEngine::new(
            "passport-mock",
            vec![("PASSEPORT", 0.9), ("NOM: SARR", 0.9), ("PRÉNOM: AWA", 0.9)],
        ));
        let second = pipeline(vec![passport.clone() as Arc<dyn OcrEngine>], cache.clone());
        let result = second.recognize_bytes(&data, None).await;

        assert_eq!(passport.call_count(), 1);
        assert_eq!(result.to_flat().family_name, "SARR");
        assert_eq!(cache.len(), 2);

        first.recognize_bytes(&data, None).await;
        assert_eq!(first_engine.call_count(), 1);
    }

    #[tokio::test]
    async fn failing_cache_is_bypassed() {
        let engine = id_card_engine();
        let p = pipeline(vec![engine.clone() as Arc<dyn OcrEngine>], FailingCache);
        let data = striped_png();

        let first = p.recognize_bytes(&data, Some(ImageFormat::Png)).await;
        assert!(!first.is_degraded());
        assert_eq!(first.validity_status, ValidityStatus::Valid);
        assert_eq!(first.to_flat().family_name, "DIALLO");
        assert_eq!(first.to_flat().document_number, "1234567890123");

        let second = p.recognize_bytes(&data, Some(ImageFormat::Png)).await;
        assert!(!second.is_degraded());
        assert_eq!(engine.call_count(), 2);
    }

    #[tokio::test]
    async fn unreadable_bytes_yield_degraded_result() {
        let engine = id_card_engine();
        let p = pipeline(vec![engine.clone() as Arc<dyn OcrEngine>], MemoryCache::new());

        let result = p.recognize_bytes(b"definitely not an image", None).await;
        assert!(result.is_degraded());
        assert_eq!(result.validity_status, ValidityStatus::Invalid);
        assert_eq!(engine.call_count(), 0);
        assert!(p.cache().is_empty());
    }

    #[tokio::test]
    async fn all_engines_unavailable_is_not_an_error() {
        let engines: Vec<Arc<dyn OcrEngine>> =
            vec![Arc::new(UnavailableEngine::new("a")), Arc::new(UnavailableEngine::new("b"))];
        let p = pipeline(engines, MemoryCache::new());

        let result = p.recognize_bytes(&striped_png(), None).await;
        assert!(result.is_degraded());
        assert_eq!(result.document_type, DocumentType::Unknown);
        assert!(p.cache().is_empty());
    }

    #[tokio::test]
    async fn recognize_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.png");
        std::fs::write(&path, striped_png()).unwrap();

        let p = pipeline(vec![id_card_engine() as Arc<dyn OcrEngine>], NoCache);
        let result = p.recognize_file(&path).await.unwrap();
        assert_eq!(result.to_flat().family_name, "DIALLO");

        let missing = p.recognize_file(&dir.path().join("missing.png")).await;
        assert!(matches!(missing, Err(PipelineError::Io(_))));
    }

    #[tokio::test]
    async fn intake_worker_processes_images_only() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("scan.png");
        let note_path = dir.path().join("notes.txt");
        std::fs::write(&image_path, striped_png()).unwrap();
        std::fs::write(&note_path, "hello").unwrap();

        let p = Arc::new(pipeline(vec![id_card_engine() as Arc<dyn OcrEngine>], NoCache));
        let (tx, rx) = mpsc::channel(8);
        let (results_tx, mut results_rx) = mpsc::channel(8);
        let worker = tokio::spawn(run_intake_worker(p, rx, results_tx));

        tx.send(note_path).await.unwrap();
        tx.send(image_path.clone()).await.unwrap();
        drop(tx);

        let (path, result) = results_rx.recv().await.unwrap();
        assert_eq!(path, image_path);
        assert_eq!(result.to_flat().family_name, "DIALLO");
        assert!(results_rx.recv().await.is_none());
        worker.await.unwrap();
    }
}
