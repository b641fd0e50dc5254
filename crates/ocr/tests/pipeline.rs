use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use scrawl_core::{ConfidenceTier, DebugConfig, PreprocessConfig, ScrawlConfig, TierCounts};
use scrawl_ocr::{
    load_from_path, preprocess, report, InvoicePipeline, MockRecognizer, PipelineError,
    Recognizer, SharedRecognizer,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn quick_config(max_dimension: u32, debug_dir: Option<&Path>) -> ScrawlConfig {
    ScrawlConfig {
        preprocess: PreprocessConfig {
            template_window: 3,
            search_window: 3,
            max_dimension,
            ..PreprocessConfig::default()
        },
        debug: DebugConfig {
            enabled: debug_dir.is_some(),
            directory: debug_dir.map(Path::to_path_buf),
            ..DebugConfig::default()
        },
        ..ScrawlConfig::default()
    }
}

/// A handwritten-ish page: warm paper, uneven lighting, a few dark strokes.
fn write_photo(dir: &Path, name: &str, width: u32, height: u32) -> std::path::PathBuf {
    let img: RgbImage = ImageBuffer::from_fn(width, height, |x, y| {
        let light = 180 + (x * 60 / width) as u8;
        let stroke = (y / 6) % 4 == 1 && (x / 4) % 3 != 2;
        if stroke {
            Rgb([25, 25, 40])
        } else {
            Rgb([light, light, light.saturating_sub(15)])
        }
    });
    let path = dir.join(name);
    img.save(&path).unwrap();
    path
}

#[test]
fn invoice_photo_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let photo = write_photo(dir.path(), "invoice.png", 240, 120);
    let debug_dir = dir.path().join("debug");

    let pipeline = InvoicePipeline::new(
        MockRecognizer::new([("INVOICE", 0.92), ("NO", 0.45), ("123", 0.71)]),
        quick_config(100, Some(&debug_dir)),
    );
    let outcome = pipeline.extract_file(&photo).unwrap();

    assert_eq!(outcome.source, "invoice.png");
    assert_eq!(outcome.processed_dims, (100, 50));

    let result = &outcome.result;
    assert_eq!(result.full_text, "INVOICE NO 123");
    assert_eq!(result.stats.tiers, TierCounts { high: 1, medium: 1, low: 1 });
    assert!((result.stats.average_confidence - 0.693).abs() < 1e-3);
    assert_eq!(result.fragments[1].tier, ConfidenceTier::Low);

    let artifact = outcome.debug_artifact.clone().unwrap();
    assert_eq!(artifact, debug_dir.join("preprocessed_invoice.png"));
    let saved = image::open(&artifact).unwrap();
    assert_eq!((saved.width(), saved.height()), (100, 50));

    let rep = report::format(result, true);
    assert_eq!(rep.record.word_count, 3);
    let json = rep.record.to_json().unwrap();
    let v: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(v["tier_counts"]["medium"], 1);
    assert!(rep.rendered.unwrap().contains("[MED]    3. 123"));
}

#[test]
fn processed_image_is_bounded_for_every_preset() {
    let dir = tempfile::tempdir().unwrap();
    let photo = write_photo(dir.path(), "tall.png", 90, 300);
    let raw = load_from_path(&photo).unwrap();

    for max in [1920, 256, 64] {
        let config = PreprocessConfig { max_dimension: max, ..quick_config(max, None).preprocess };
        let out = preprocess(&raw, &config).unwrap();
        assert!(out.width().max(out.height()) <= max);
        let before = 90.0 / 300.0;
        let after = out.width() as f64 / out.height() as f64;
        assert!((before - after).abs() < 0.02, "aspect drift at {max}");
    }
}

#[test]
fn zero_byte_file_stops_before_preprocessing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.jpg");
    std::fs::write(&path, b"").unwrap();
    let debug_dir = dir.path().join("debug");

    let pipeline = InvoicePipeline::new(MockRecognizer::empty(), quick_config(1920, Some(&debug_dir)));
    let err = pipeline.extract_file(&path).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidImage(_)));
    // No artifact means preprocessing never ran.
    assert!(!debug_dir.exists());
}

#[test]
fn blank_page_is_success_without_text() {
    let dir = tempfile::tempdir().unwrap();
    let photo = write_photo(dir.path(), "blank.png", 60, 40);
    let pipeline = InvoicePipeline::new(MockRecognizer::empty(), quick_config(1920, None));
    let outcome = pipeline.extract_file(&photo).unwrap();
    let record = outcome.result.to_record();
    assert!(record.success);
    assert_eq!(record.word_count, 0);
    assert_eq!(record.average_confidence, 0.0);
    assert_eq!(record.full_text, "");
}

#[test]
fn parallel_invocations_share_one_backend() {
    let dir = tempfile::tempdir().unwrap();
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = loads.clone();
    let backend = Arc::new(SharedRecognizer::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockRecognizer::new([("Qty", 0.83), ("2", 0.66)])) as Arc<dyn Recognizer>)
    }));

    let photos: Vec<_> = (0..4)
        .map(|i| write_photo(dir.path(), &format!("p{i}.png"), 48, 32))
        .collect();

    let handles: Vec<_> = photos
        .into_iter()
        .map(|photo| {
            let backend = Arc::clone(&backend);
            std::thread::spawn(move || {
                let pipeline = InvoicePipeline::new(backend, quick_config(1920, None));
                pipeline.extract_file(&photo).map(|o| o.result.full_text)
            })
        })
        .collect();

    for h in handles {
        assert_eq!(h.join().unwrap().unwrap(), "Qty 2");
    }
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[test]
fn grayscale_input_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gray.png");
    let img: GrayImage = ImageBuffer::from_fn(30, 30, |x, y| Luma([if (x + y) % 9 < 2 { 0 } else { 240 }]));
    img.save(&path).unwrap();

    let raw = load_from_path(&path).unwrap();
    assert_eq!(raw.channels(), 1);
    let pipeline = InvoicePipeline::new(MockRecognizer::new([("ok", 0.5)]), quick_config(1920, None));
    assert_eq!(pipeline.extract_raw(raw).unwrap().result.full_text, "ok");
}
