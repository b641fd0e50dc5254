use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned box around a detected fragment, in processed-image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        BoundingRegion { x, y, width, height }
    }
}

/// A single unit of text reported by the recognition backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub content: String,
    /// Backend confidence, normalized to 0.0–1.0.
    pub confidence: f32,
    /// Position in detection order.
    pub index: usize,
    pub region: Option<BoundingRegion>,
}

impl TextFragment {
    pub fn new(content: impl Into<String>, confidence: f32, index: usize) -> Self {
        let confidence = if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) };
        TextFragment {
            content: content.into(),
            confidence,
            index,
            region: None,
        }
    }

    pub fn with_region(mut self, region: BoundingRegion) -> Self {
        self.region = Some(region);
        self
    }

    pub fn tier(&self) -> ConfidenceTier {
        ConfidenceTier::classify(self.confidence)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    /// Upper bound of MEDIUM (inclusive); anything above is HIGH.
    pub const HIGH_ABOVE: f32 = 0.80;
    /// Lower bound of MEDIUM (inclusive); anything below is LOW.
    pub const MEDIUM_FROM: f32 = 0.50;

    pub fn classify(confidence: f32) -> Self {
        if confidence > Self::HIGH_ABOVE {
            ConfidenceTier::High
        } else if confidence >= Self::MEDIUM_FROM {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }

    /// Fixed-width tag used in the console report.
    pub fn label(self) -> &'static str {
        match self {
            ConfidenceTier::High => "[HIGH]",
            ConfidenceTier::Medium => "[MED] ",
            ConfidenceTier::Low => "[LOW] ",
        }
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceTier::High => write!(f, "high"),
            ConfidenceTier::Medium => write!(f, "medium"),
            ConfidenceTier::Low => write!(f, "low"),
        }
    }
}

impl std::str::FromStr for ConfidenceTier {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(ConfidenceTier::High),
            "medium" => Ok(ConfidenceTier::Medium),
            "low" => Ok(ConfidenceTier::Low),
            other => Err(format!("Unknown confidence tier: '{other}'")),
        }
    }
}
