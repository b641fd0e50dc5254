use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Tuning for the image preprocessing chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// CLAHE clip limit, as a multiple of the mean histogram bin height.
    pub clip_limit: f32,
    /// CLAHE tiles as `[columns, rows]`.
    pub tile_grid: [u32; 2],
    /// Non-local-means filter strength `h`.
    pub denoise_strength: f32,
    pub template_window: u32,
    pub search_window: u32,
    /// Side of the square structuring element for open/close.
    pub morph_kernel: u8,
    /// Longest allowed side of the processed image. Never upscaled.
    pub max_dimension: u32,
    pub invert_dark_background: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        PreprocessConfig {
            clip_limit: 2.0,
            tile_grid: [8, 8],
            denoise_strength: 10.0,
            template_window: 7,
            search_window: 21,
            morph_kernel: 2,
            max_dimension: 1920,
            invert_dark_background: true,
        }
    }
}

impl PreprocessConfig {
    /// Lower memory ceiling for constrained hosts.
    pub fn constrained() -> Self {
        PreprocessConfig { max_dimension: 1280, ..Self::default() }
    }

    pub fn minimal() -> Self {
        PreprocessConfig { max_dimension: 800, ..Self::default() }
    }
}

/// Options handed to the recognition backend.
///
/// The two thresholds steer a separate text-detection stage; backends that
/// detect and recognize in one pass (Tesseract) do not use them. Backends that
/// cannot honour `workers` or `batch_size` refuse the call instead of ignoring them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionOptions {
    /// Detection score a region needs to count as text.
    pub text_threshold: f32,
    /// Score below which faint text is dropped during detection.
    pub low_text: f32,
    /// Regions handed to the model at once.
    pub batch_size: usize,
    /// Worker threads for the backend; 0 runs in the calling thread.
    pub workers: usize,
    pub languages: Vec<String>,
    /// When false the raw image is recognized without the enhancement chain.
    pub use_preprocessing: bool,
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        RecognitionOptions {
            text_threshold: 0.6,
            low_text: 0.4,
            batch_size: 1,
            workers: 0,
            languages: vec!["en".to_string()],
            use_preprocessing: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub enabled: bool,
    /// Where artifacts go; `None` means the working directory.
    pub directory: Option<PathBuf>,
    pub prefix: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        DebugConfig {
            enabled: true,
            directory: None,
            prefix: "preprocessed_".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrawlConfig {
    pub preprocess: PreprocessConfig,
    pub recognition: RecognitionOptions,
    pub debug: DebugConfig,
}

impl ScrawlConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: ScrawlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.preprocess;
        if !(p.clip_limit > 0.0) {
            return Err(invalid(format!("clip_limit must be positive, got {}", p.clip_limit)));
        }
        if p.tile_grid[0] == 0 || p.tile_grid[1] == 0 {
            return Err(invalid("tile_grid entries must be non-zero"));
        }
        if !(p.denoise_strength > 0.0) {
            return Err(invalid("denoise_strength must be positive"));
        }
        for (name, w) in [("template_window", p.template_window), ("search_window", p.search_window)] {
            if w == 0 || w % 2 == 0 {
                return Err(invalid(format!("{name} must be odd and non-zero, got {w}")));
            }
        }
        if p.template_window > p.search_window {
            return Err(invalid("template_window cannot exceed search_window"));
        }
        if p.morph_kernel == 0 {
            return Err(invalid("morph_kernel must be non-zero"));
        }
        if p.max_dimension < 32 {
            return Err(invalid(format!("max_dimension must be at least 32, got {}", p.max_dimension)));
        }

        let r = &self.recognition;
        for (name, v) in [("text_threshold", r.text_threshold), ("low_text", r.low_text)] {
            if !(0.0..=1.0).contains(&v) {
                return Err(invalid(format!("{name} must be within 0.0–1.0, got {v}")));
            }
        }
        if r.batch_size == 0 {
            return Err(invalid("batch_size must be at least 1"));
        }
        if r.languages.is_empty() {
            return Err(invalid("at least one recognition language is required"));
        }
        if self.debug.enabled && self.debug.prefix.is_empty() {
            return Err(invalid("debug prefix must not be empty"));
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}
