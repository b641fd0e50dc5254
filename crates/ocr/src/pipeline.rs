use scrawl_core::{ExtractionResult, ScrawlConfig};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::aggregate::aggregate;
use crate::debug::DebugSink;
use crate::loader::{self, LoadError, RawImage};
use crate::preprocess::{self, PreprocessError};
use crate::recognizer::{RecognitionError, Recognizer};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid image: {0}")]
    InvalidImage(#[from] LoadError),
    #[error("Image preprocessing failed: {0}")]
    Preprocessing(#[from] PreprocessError),
    #[error("Text recognition failed: {0}")]
    Recognition(#[from] RecognitionError),
}

impl PipelineError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Recognition(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// The result of a single invoice processing run.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub source: String,
    pub result: ExtractionResult,
    /// Size of the image the recognizer actually saw.
    pub processed_dims: (u32, u32),
    pub debug_artifact: Option<PathBuf>,
}

/// Orchestrates: load → preprocess → debug artifact → recognize → aggregate.
pub struct InvoicePipeline<R: Recognizer> {
    recognizer: R,
    config: ScrawlConfig,
    debug: DebugSink,
}

impl<R: Recognizer> InvoicePipeline<R> {
    pub fn new(recognizer: R, config: ScrawlConfig) -> Self {
        let debug = DebugSink::new(config.debug.clone());
        Self { recognizer, config, debug }
    }

    pub fn config(&self) -> &ScrawlConfig {
        &self.config
    }

    /// Process a file on disk.
    pub fn extract_file(&self, path: &Path) -> Result<ExtractionOutcome, PipelineError> {
        tracing::info!(path = %path.display(), "processing image");
        let raw = loader::load_from_path(path)?;
        self.extract_raw(raw)
    }

    /// Process raw bytes (upload body or camera capture).
    pub fn extract_bytes(&self, data: &[u8], source: &str) -> Result<ExtractionOutcome, PipelineError> {
        tracing::info!(source, bytes = data.len(), "processing image");
        let raw = loader::load_from_bytes(data, source)?;
        self.extract_raw(raw)
    }

    /// Process bytes that arrived without a name, such as a camera capture.
    /// The source id, and so the debug artifact name, comes from the content hash.
    pub fn extract_anonymous(&self, data: &[u8]) -> Result<ExtractionOutcome, PipelineError> {
        let raw = loader::load_anonymous(data)?;
        tracing::info!(source = raw.source(), bytes = data.len(), "processing image");
        self.extract_raw(raw)
    }

    pub fn extract_raw(&self, raw: RawImage) -> Result<ExtractionOutcome, PipelineError> {
        let source = raw.source().to_string();

        // 1. Preprocess; the raw image is dropped once this returns.
        let processed = if self.config.recognition.use_preprocessing {
            preprocess::preprocess(&raw, &self.config.preprocess)?
        } else {
            preprocess::prepare_raw(&raw, &self.config.preprocess)?
        };
        drop(raw);

        // 2. Inspection artifact, never fatal.
        let debug_artifact = self.debug.persist(&processed);

        // 3. Recognize.
        tracing::info!(
            source = %source,
            backend = self.recognizer.name(),
            width = processed.width(),
            height = processed.height(),
            "running text recognition"
        );
        let fragments = self
            .recognizer
            .recognize(&processed, &self.config.recognition)?;

        // 4. Aggregate.
        let result = aggregate(fragments);
        if result.is_empty() {
            tracing::info!(source = %source, "no text detected");
        } else {
            tracing::info!(
                source = %source,
                fragments = result.stats.fragment_count,
                average_confidence = result.stats.average_confidence,
                "extraction complete"
            );
        }

        Ok(ExtractionOutcome {
            source,
            result,
            processed_dims: (processed.width(), processed.height()),
            debug_artifact,
        })
    }
}
