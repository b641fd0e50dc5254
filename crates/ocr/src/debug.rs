use scrawl_core::DebugConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::preprocess::ProcessedImage;

#[derive(Debug, Error)]
pub enum DebugArtifactError {
    #[error("Failed to create artifact directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to write artifact image: {0}")]
    Encode(#[from] image::ImageError),
}

const RASTER_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "webp"];

/// Best-effort writer for the processed image, kept off the main control path.
#[derive(Debug, Clone)]
pub struct DebugSink {
    config: DebugConfig,
}

impl DebugSink {
    pub fn new(config: DebugConfig) -> Self {
        Self { config }
    }

    pub fn disabled() -> Self {
        Self::new(DebugConfig { enabled: false, ..DebugConfig::default() })
    }

    /// Deterministic artifact location for a source identifier.
    /// Layout: `<directory>/<prefix><file name>[.png]`
    pub fn artifact_path(&self, source: &str) -> PathBuf {
        let name = Path::new(source)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.to_string());
        // Content-hash ids contain ':' which some filesystems reject.
        let name = name.replace([':', '/', '\\'], "_");

        let has_raster_ext = Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| RASTER_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false);
        let file = if has_raster_ext {
            format!("{}{name}", self.config.prefix)
        } else {
            format!("{}{name}.png", self.config.prefix)
        };

        match &self.config.directory {
            Some(dir) => dir.join(file),
            None => PathBuf::from(file),
        }
    }

    /// Write the artifact if enabled. Failures are logged and swallowed.
    pub fn persist(&self, image: &ProcessedImage) -> Option<PathBuf> {
        if !self.config.enabled {
            return None;
        }
        let path = self.artifact_path(image.source());
        match self.write(image, &path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "preprocessed image saved");
                Some(path)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "debug artifact not written");
                None
            }
        }
    }

    fn write(&self, image: &ProcessedImage, path: &Path) -> Result<(), DebugArtifactError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        image.pixels().save(path)?;
        Ok(())
    }
}
