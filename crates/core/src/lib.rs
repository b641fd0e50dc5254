pub mod config;
pub mod fragment;
pub mod result;

pub use config::{ConfigError, DebugConfig, PreprocessConfig, RecognitionOptions, ScrawlConfig};
pub use fragment::{BoundingRegion, ConfidenceTier, TextFragment};
pub use result::{
    ClassifiedFragment, ExtractionRecord, ExtractionResult, ExtractionStats, FragmentRecord,
    TierCounts,
};
