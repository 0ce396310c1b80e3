use std::io::Cursor;
use std::sync::Arc;

use docmatch_core::DocumentType;
use docmatch_ocr::{MockEngine, OcrEngine, PipelineConfig, RecognitionPipeline, UnavailableRecognizer, ValidityStatus};
use docmatch_storage::SqliteStore;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};

fn striped_png() -> Vec<u8> {
    let img = GrayImage::from_fn(40, 40, |x, _| Luma([if x % 8 < 4 { 30u8 } else { 220u8 }]));
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

#[tokio::test]
async fn second_recognition_is_served_from_sqlite_unchanged() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = SqliteStore::open(&dir.path().join("docmatch.db")).await.unwrap();
    let engine = Arc::new(MockEngine::new(
        "mock",
        vec![
            ("CARTE NATIONALE D'IDENTITÉ", 0.9),
            ("NOM: DIALLO", 0.9),
            ("PRÉNOM: AMINATA", 0.9),
            ("NÉE LE 15/06/1991", 0.9),
            ("N° 1234567890123", 0.9),
        ],
    ));
    let pipeline = RecognitionPipeline::new(
        PipelineConfig::default(),
        vec![engine.clone() as Arc<dyn OcrEngine>],
        Arc::new(UnavailableRecognizer),
        store,
    );
    let data = striped_png();

    let first = pipeline.recognize_bytes(&data, Some(ImageFormat::Png)).await;
    let second = pipeline.recognize_bytes(&data, Some(ImageFormat::Png)).await;

    assert_eq!(first.document_type, DocumentType::NationalId);
    assert_eq!(first.validity_status, ValidityStatus::Valid);
    assert_eq!(second, first);
    assert_eq!(second.processing_time.to_bits(), first.processing_time.to_bits());
    assert_eq!(engine.call_count(), 1);
}
