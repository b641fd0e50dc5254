use scrawl_core::{RecognitionOptions, TextFragment};
use thiserror::Error;

use crate::preprocess::ProcessedImage;

#[derive(Debug, Clone, Error)]
pub enum RecognitionError {
    #[error("Failed to load recognition model: {0}")]
    ModelLoad(String),
    #[error("Recognition engine error: {message}")]
    Engine { message: String, transient: bool },
    #[error("Unsupported input for recognizer: {0}")]
    UnsupportedInput(String),
    #[error("Recognition timed out after {0} ms")]
    Timeout(u64),
    #[error("Tesseract not available — build with `tesseract` feature")]
    NotAvailable,
}

impl RecognitionError {
    pub fn engine(message: impl Into<String>) -> Self {
        RecognitionError::Engine { message: message.into(), transient: false }
    }

    /// Whether the caller may reasonably try the same image again.
    pub fn is_retryable(&self) -> bool {
        match self {
            RecognitionError::Timeout(_) => true,
            RecognitionError::Engine { transient, .. } => *transient,
            _ => false,
        }
    }
}

/// Abstraction over a text recognition backend.
/// Implementations return fragments in detection order, indexed from 0.
pub trait Recognizer: Send + Sync {
    fn name(&self) -> &str;

    fn recognize(
        &self,
        image: &ProcessedImage,
        options: &RecognitionOptions,
    ) -> Result<Vec<TextFragment>, RecognitionError>;
}

impl<R: Recognizer + ?Sized> Recognizer for std::sync::Arc<R> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn recognize(
        &self,
        image: &ProcessedImage,
        options: &RecognitionOptions,
    ) -> Result<Vec<TextFragment>, RecognitionError> {
        (**self).recognize(image, options)
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

#[derive(Debug, Clone)]
struct MockWord {
    text: String,
    confidence: f32,
    detection: f32,
}

/// Returns pre-set fragments (or a pre-set failure) regardless of the image.
///
/// Each word carries a detection score; words scoring below
/// `text_threshold` are not detected, as with a two-stage detector.
pub struct MockRecognizer {
    outcome: Result<Vec<MockWord>, RecognitionError>,
}

impl MockRecognizer {
    /// Every word is detected with certainty.
    pub fn new<S: Into<String>>(fragments: impl IntoIterator<Item = (S, f32)>) -> Self {
        Self::with_detection_scores(fragments.into_iter().map(|(t, c)| (t, c, 1.0)))
    }

    /// Words as `(text, recognition confidence, detection score)`.
    pub fn with_detection_scores<S: Into<String>>(
        words: impl IntoIterator<Item = (S, f32, f32)>,
    ) -> Self {
        Self {
            outcome: Ok(words
                .into_iter()
                .map(|(text, confidence, detection)| MockWord {
                    text: text.into(),
                    confidence,
                    detection,
                })
                .collect()),
        }
    }

    pub fn empty() -> Self {
        Self { outcome: Ok(vec![]) }
    }

    pub fn failing(error: RecognitionError) -> Self {
        Self { outcome: Err(error) }
    }
}

impl Recognizer for MockRecognizer {
    fn name(&self) -> &str {
        "mock"
    }

    fn recognize(
        &self,
        _image: &ProcessedImage,
        options: &RecognitionOptions,
    ) -> Result<Vec<TextFragment>, RecognitionError> {
        let words = self.outcome.clone()?;
        Ok(words
            .into_iter()
            .filter(|w| w.detection >= options.text_threshold)
            .enumerate()
            .map(|(i, w)| TextFragment::new(w.text, w.confidence, i))
            .collect())
    }
}

/// Refuse options asking for parallel or batched recognition from a
/// backend that handles one page at a time.
pub fn ensure_sequential(backend: &str, options: &RecognitionOptions) -> Result<(), RecognitionError> {
    if options.workers > 1 {
        return Err(RecognitionError::UnsupportedInput(format!(
            "{backend} recognizes in the calling thread; workers must be 0 or 1, got {}",
            options.workers
        )));
    }
    if options.batch_size > 1 {
        return Err(RecognitionError::UnsupportedInput(format!(
            "{backend} recognizes one page per call; batch_size must be 1, got {}",
            options.batch_size
        )));
    }
    Ok(())
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

/// Parse Tesseract TSV output into word-level fragments.
///
/// Every recognized word is kept whatever its confidence; rows with a
/// negative confidence are layout entries, not words.
pub fn fragments_from_tsv(tsv: &str) -> Vec<TextFragment> {
    use scrawl_core::BoundingRegion;

    tsv.lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.split('\t').collect();
            // level page block par line word left top width height conf text
            if cols.len() < 12 || cols[0] != "5" {
                return None;
            }
            let conf: f32 = cols[10].trim().parse().ok()?;
            let text = cols[11].trim();
            if conf < 0.0 || text.is_empty() {
                return None;
            }
            let region = BoundingRegion::new(
                cols[6].parse().ok()?,
                cols[7].parse().ok()?,
                cols[8].parse().ok()?,
                cols[9].parse().ok()?,
            );
            Some((text.to_string(), conf / 100.0, region))
        })
        .enumerate()
        .map(|(i, (text, conf, region))| TextFragment::new(text, conf, i).with_region(region))
        .collect()
}

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{ensure_sequential, fragments_from_tsv, RecognitionError, Recognizer};
    use crate::preprocess::ProcessedImage;
    use leptess::LepTess;
    use parking_lot::Mutex;
    use scrawl_core::{RecognitionOptions, TextFragment};

    /// Tesseract engine loaded once and reused for every page.
    ///
    /// Tesseract has no separate detection score, so `text_threshold` and
    /// `low_text` do not apply. Pages are recognized one at a time.
    pub struct TesseractRecognizer {
        engine: Mutex<LepTess>,
    }

    impl TesseractRecognizer {
        pub fn load(data_path: Option<String>, languages: &[String]) -> Result<Self, RecognitionError> {
            let lang = languages
                .iter()
                .map(|l| match l.as_str() {
                    "en" => "eng".to_string(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join("+");
            let engine = LepTess::new(data_path.as_deref(), &lang)
                .map_err(|e| RecognitionError::ModelLoad(e.to_string()))?;
            tracing::debug!(lang = %lang, "tesseract model loaded");
            Ok(Self { engine: Mutex::new(engine) })
        }
    }

    impl Recognizer for TesseractRecognizer {
        fn name(&self) -> &str {
            "tesseract"
        }

        fn recognize(
            &self,
            image: &ProcessedImage,
            options: &RecognitionOptions,
        ) -> Result<Vec<TextFragment>, RecognitionError> {
            ensure_sequential(self.name(), options)?;
            let png = image
                .to_png_bytes()
                .map_err(|e| RecognitionError::UnsupportedInput(e.to_string()))?;
            let mut engine = self.engine.lock();
            engine
                .set_image_from_mem(&png)
                .map_err(|e| RecognitionError::UnsupportedInput(e.to_string()))?;
            let tsv = engine
                .get_tsv_text(0)
                .map_err(|e| RecognitionError::engine(e.to_string()))?;
            Ok(fragments_from_tsv(&tsv))
        }
    }

}
