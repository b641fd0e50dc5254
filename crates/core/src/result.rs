use serde::{Deserialize, Serialize};

use crate::fragment::{BoundingRegion, ConfidenceTier, TextFragment};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl TierCounts {
    pub fn record(&mut self, tier: ConfidenceTier) {
        match tier {
            ConfidenceTier::High => self.high += 1,
            ConfidenceTier::Medium => self.medium += 1,
            ConfidenceTier::Low => self.low += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub fragment_count: usize,
    /// Arithmetic mean over all fragments; 0.0 when nothing was detected.
    pub average_confidence: f32,
    pub tiers: TierCounts,
    /// Characters (not bytes) in `full_text`.
    pub character_count: usize,
    /// Each fragment counts as one logical line.
    pub line_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedFragment {
    pub fragment: TextFragment,
    pub tier: ConfidenceTier,
}

/// Everything recognized in one image, in detection order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Fragment contents joined by a single space, unfiltered.
    pub full_text: String,
    pub fragments: Vec<ClassifiedFragment>,
    pub stats: ExtractionStats,
    pub success: bool,
}

impl ExtractionResult {
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn to_record(&self) -> ExtractionRecord {
        ExtractionRecord {
            full_text: self.full_text.clone(),
            fragments: self
                .fragments
                .iter()
                .map(|c| FragmentRecord {
                    content: c.fragment.content.clone(),
                    confidence: c.fragment.confidence,
                    region: c.fragment.region,
                })
                .collect(),
            word_count: self.stats.fragment_count,
            average_confidence: self.stats.average_confidence,
            tier_counts: self.stats.tiers,
            character_count: self.stats.character_count,
            success: self.success,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentRecord {
    pub content: String,
    pub confidence: f32,
    /// Where the word sits in the processed image, when the backend reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<BoundingRegion>,
}

/// The flat record handed to persistence / API callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub full_text: String,
    pub fragments: Vec<FragmentRecord>,
    pub word_count: usize,
    pub average_confidence: f32,
    pub tier_counts: TierCounts,
    pub character_count: usize,
    pub success: bool,
}

impl ExtractionRecord {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ExtractionResult {
        let a = TextFragment::new("TOTAL", 0.9, 0).with_region(BoundingRegion::new(4, 8, 60, 18));
        let b = TextFragment::new("42", 0.3, 1);
        let mut tiers = TierCounts::default();
        tiers.record(a.tier());
        tiers.record(b.tier());
        ExtractionResult {
            full_text: "TOTAL 42".into(),
            fragments: vec![
                ClassifiedFragment { tier: a.tier(), fragment: a },
                ClassifiedFragment { tier: b.tier(), fragment: b },
            ],
            stats: ExtractionStats {
                fragment_count: 2,
                average_confidence: 0.6,
                tiers,
                character_count: 8,
                line_count: 2,
            },
            success: true,
        }
    }

    #[test]
    fn tier_counts_record() {
        let mut t = TierCounts::default();
        t.record(ConfidenceTier::High);
        t.record(ConfidenceTier::Low);
        t.record(ConfidenceTier::Low);
        assert_eq!(t, TierCounts { high: 1, medium: 0, low: 2 });
        assert_eq!(t.total(), 3);
    }

    #[test]
    fn record_has_external_field_names() {
        let json = sample().to_record().to_json().unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["full_text"], "TOTAL 42");
        assert_eq!(v["word_count"], 2);
        assert_eq!(v["tier_counts"]["high"], 1);
        assert_eq!(v["tier_counts"]["low"], 1);
        assert_eq!(v["character_count"], 8);
        assert_eq!(v["success"], true);
        assert_eq!(v["fragments"][1]["content"], "42");
        assert!(v["fragments"][0].get("index").is_none());
    }

    #[test]
    fn record_carries_word_regions() {
        let record = sample().to_record();
        assert_eq!(record.fragments[0].region, Some(BoundingRegion::new(4, 8, 60, 18)));
        assert_eq!(record.fragments[1].region, None);

        let v = serde_json::to_value(&record).unwrap();
        assert_eq!(v["fragments"][0]["region"]["x"], 4);
        assert_eq!(v["fragments"][0]["region"]["width"], 60);
        assert!(v["fragments"][1].get("region").is_none());
    }
}
