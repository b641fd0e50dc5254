use scrawl_core::{FragmentRecord, ScrawlConfig};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::pipeline::{ExtractionOutcome, InvoicePipeline, PipelineError};
use crate::shared::SharedRecognizer;

/// Reply shape for the API layer. Failures become `success: false` rather than errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceResponse {
    pub success: bool,
    pub text: String,
    pub word_count: usize,
    pub words: Vec<FragmentRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceResponse {
    fn failure(error: impl ToString) -> Self {
        ServiceResponse {
            success: false,
            text: String::new(),
            word_count: 0,
            words: vec![],
            error: Some(error.to_string()),
        }
    }
}

/// Long-lived entry point: one shared backend, one pipeline per call.
pub struct OcrService {
    backend: Arc<SharedRecognizer>,
    config: ScrawlConfig,
}

impl OcrService {
    pub fn new(backend: Arc<SharedRecognizer>, config: ScrawlConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &Arc<SharedRecognizer> {
        &self.backend
    }

    pub fn extract_text_from_image(&self, path: &Path) -> ServiceResponse {
        let pipeline = InvoicePipeline::new(Arc::clone(&self.backend), self.config.clone());
        respond(pipeline.extract_file(path), &path.display().to_string())
    }

    /// Same as [`extract_text_from_image`](Self::extract_text_from_image) for an
    /// upload body that carries no file name.
    pub fn extract_text_from_bytes(&self, data: &[u8]) -> ServiceResponse {
        let pipeline = InvoicePipeline::new(Arc::clone(&self.backend), self.config.clone());
        respond(pipeline.extract_anonymous(data), "upload")
    }
}

fn respond(outcome: Result<ExtractionOutcome, PipelineError>, source: &str) -> ServiceResponse {
    match outcome {
        Ok(outcome) => {
            let record = outcome.result.to_record();
            ServiceResponse {
                success: true,
                text: record.full_text,
                word_count: record.word_count,
                words: record.fragments,
                error: None,
            }
        }
        Err(e) => {
            tracing::warn!(source, error = %e, "extraction failed");
            ServiceResponse::failure(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizer::{MockRecognizer, RecognitionError, Recognizer};
    use image::{GrayImage, ImageBuffer, Luma};
    use scrawl_core::{DebugConfig, PreprocessConfig};

    fn service(backend: SharedRecognizer) -> OcrService {
        let config = ScrawlConfig {
            preprocess: PreprocessConfig {
                template_window: 3,
                search_window: 3,
                ..PreprocessConfig::default()
            },
            debug: DebugConfig { enabled: false, ..DebugConfig::default() },
            ..ScrawlConfig::default()
        };
        OcrService::new(Arc::new(backend), config)
    }

    fn write_page(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("invoice.png");
        let img: GrayImage =
            ImageBuffer::from_fn(20, 20, |x, _| Luma([if x % 5 == 0 { 10u8 } else { 230 }]));
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn success_response_carries_words() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(SharedRecognizer::preloaded(Arc::new(MockRecognizer::new([
            ("Paid", 0.88),
            ("cash", 0.61),
        ]))));
        let resp = svc.extract_text_from_image(&write_page(dir.path()));
        assert!(resp.success);
        assert_eq!(resp.text, "Paid cash");
        assert_eq!(resp.word_count, 2);
        assert_eq!(resp.words[1].content, "cash");
        assert!(resp.error.is_none());
    }

    #[test]
    fn missing_file_is_failure_response() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(SharedRecognizer::preloaded(Arc::new(MockRecognizer::empty())));
        let resp = svc.extract_text_from_image(&dir.path().join("gone.jpg"));
        assert!(!resp.success);
        assert_eq!(resp.text, "");
        assert!(resp.error.unwrap().starts_with("Invalid image"));
    }

    #[test]
    fn model_load_failure_is_failure_response() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(SharedRecognizer::new(|| {
            Err(RecognitionError::ModelLoad("no weights".into()))
        }));
        let resp = svc.extract_text_from_image(&write_page(dir.path()));
        assert!(!resp.success);
        assert!(resp.error.unwrap().contains("no weights"));
    }

    #[test]
    fn backend_is_loaded_on_first_request_only() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(SharedRecognizer::new(|| {
            Ok(Arc::new(MockRecognizer::empty()) as Arc<dyn Recognizer>)
        }));
        assert!(!svc.backend().is_loaded());
        let resp = svc.extract_text_from_image(&write_page(dir.path()));
        assert!(resp.success);
        assert_eq!(resp.word_count, 0);
        assert!(svc.backend().is_loaded());
    }

    #[test]
    fn upload_bytes_are_extracted() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = std::fs::read(write_page(dir.path())).unwrap();
        let svc = service(SharedRecognizer::preloaded(Arc::new(MockRecognizer::new([("Net", 0.77)]))));
        let resp = svc.extract_text_from_bytes(&bytes);
        assert!(resp.success);
        assert_eq!(resp.text, "Net");

        let resp = svc.extract_text_from_bytes(b"not an image");
        assert!(!resp.success);
        assert!(resp.error.unwrap().starts_with("Invalid image"));
    }

    #[test]
    fn failure_serializes_error_field() {
        let json = serde_json::to_value(ServiceResponse::failure("boom")).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "boom");
        let ok = ServiceResponse { error: None, ..ServiceResponse::failure("x") };
        assert!(serde_json::to_value(ok).unwrap().get("error").is_none());
    }
}
