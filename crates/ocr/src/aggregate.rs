use scrawl_core::{ClassifiedFragment, ExtractionResult, ExtractionStats, TextFragment, TierCounts};

/// Fold recognized fragments into a result.
///
/// Order is preserved and nothing is dropped, low-confidence fragments
/// included. No fragments is a successful, empty result.
pub fn aggregate(fragments: Vec<TextFragment>) -> ExtractionResult {
    let full_text = fragments
        .iter()
        .map(|f| f.content.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let mut tiers = TierCounts::default();
    let classified: Vec<ClassifiedFragment> = fragments
        .into_iter()
        .map(|fragment| {
            let tier = fragment.tier();
            tiers.record(tier);
            ClassifiedFragment { fragment, tier }
        })
        .collect();

    let count = classified.len();
    let average_confidence = if count == 0 {
        0.0
    } else {
        let sum: f64 = classified.iter().map(|c| c.fragment.confidence as f64).sum();
        (sum / count as f64) as f32
    };

    let stats = ExtractionStats {
        fragment_count: count,
        average_confidence,
        tiers,
        character_count: full_text.chars().count(),
        line_count: count,
    };

    ExtractionResult {
        full_text,
        fragments: classified,
        stats,
        success: true,
    }
}
