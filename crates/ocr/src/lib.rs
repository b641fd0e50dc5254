pub mod aggregate;
pub mod debug;
pub mod hash;
pub mod loader;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod report;
pub mod service;
pub mod shared;

pub use aggregate::aggregate;
pub use debug::{DebugArtifactError, DebugSink};
pub use hash::{content_source_id, sha256_bytes, to_hex};
pub use loader::{load_anonymous, load_from_bytes, load_from_path, LoadError, RawImage};
pub use pipeline::{ExtractionOutcome, InvoicePipeline, PipelineError};
pub use preprocess::{preprocess, prepare_raw, PreprocessError, ProcessedImage};
pub use recognizer::{MockRecognizer, RecognitionError, Recognizer};
pub use report::{render_text, Report};
pub use service::{OcrService, ServiceResponse};
pub use shared::SharedRecognizer;

#[cfg(feature = "tesseract")]
pub use recognizer::tesseract_backend::TesseractRecognizer;
