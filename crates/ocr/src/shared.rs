use parking_lot::Mutex;
use scrawl_core::{RecognitionOptions, TextFragment};
use std::sync::{Arc, OnceLock};

use crate::preprocess::ProcessedImage;
use crate::recognizer::{RecognitionError, Recognizer};

type Loader = Box<dyn Fn() -> Result<Arc<dyn Recognizer>, RecognitionError> + Send + Sync>;

/// Lazily loaded backend shared by every pipeline in the process.
///
/// The loader runs at most once even when several threads hit the first
/// recognition together; a failed load is reported to the caller and may be
/// retried by the next one. Once loaded, the backend is read-only.
pub struct SharedRecognizer {
    slot: OnceLock<Arc<dyn Recognizer>>,
    init_guard: Mutex<()>,
    loader: Loader,
}

impl SharedRecognizer {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Recognizer>, RecognitionError> + Send + Sync + 'static,
    {
        Self {
            slot: OnceLock::new(),
            init_guard: Mutex::new(()),
            loader: Box::new(loader),
        }
    }

    /// Wrap a backend that is already loaded.
    pub fn preloaded(backend: Arc<dyn Recognizer>) -> Self {
        let shared = Self::new(|| Err(RecognitionError::ModelLoad("backend already set".into())));
        let _ = shared.slot.set(backend);
        shared
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.get().is_some()
    }

    pub fn get(&self) -> Result<Arc<dyn Recognizer>, RecognitionError> {
        if let Some(backend) = self.slot.get() {
            return Ok(Arc::clone(backend));
        }

        let _guard = self.init_guard.lock();
        if let Some(backend) = self.slot.get() {
            return Ok(Arc::clone(backend));
        }
        tracing::info!("loading recognition backend");
        let backend = (self.loader)()?;
        tracing::info!(backend = backend.name(), "recognition backend ready");
        Ok(Arc::clone(self.slot.get_or_init(|| backend)))
    }
}

impl Recognizer for SharedRecognizer {
    fn name(&self) -> &str {
        self.slot.get().map(|b| b.name()).unwrap_or("unloaded")
    }

    fn recognize(
        &self,
        image: &ProcessedImage,
        options: &RecognitionOptions,
    ) -> Result<Vec<TextFragment>, RecognitionError> {
        self.get()?.recognize(image, options)
    }
}
