use scrawl_core::{ExtractionRecord, ExtractionResult};

const RULE_WIDTH: usize = 60;

/// Output of the reporter: the flat record, plus the console rendering when requested.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub record: ExtractionRecord,
    pub rendered: Option<String>,
}

pub fn format(result: &ExtractionResult, human_readable: bool) -> Report {
    Report {
        record: result.to_record(),
        rendered: human_readable.then(|| render_text(result)),
    }
}

/// Percentage shown for a confidence, rounded to one decimal.
fn display_percent(confidence: f32) -> f64 {
    (confidence as f64 * 1000.0).round() / 10.0
}

/// One block per full 10%.
pub fn confidence_bar(confidence: f32) -> String {
    let blocks = (display_percent(confidence) / 10.0).floor() as usize;
    "█".repeat(blocks.min(10))
}

pub fn render_text(result: &ExtractionResult) -> String {
    if result.full_text.is_empty() {
        return "No text was detected in the image\n".to_string();
    }

    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();

    out.push_str(&format!("{rule}\nEXTRACTED TEXT FROM INVOICE\n{rule}\n"));
    out.push_str(&format!("{}\n{rule}\n", result.full_text));

    out.push_str(&format!("\n{rule}\nWORD-LEVEL DETAILS (with confidence scores)\n{rule}\n"));
    for (i, c) in result.fragments.iter().enumerate() {
        out.push_str(&format!(
            "{} {:3}. {:<25} | Confidence: {:5.1}% {}\n",
            c.tier.label(),
            i + 1,
            c.fragment.content,
            display_percent(c.fragment.confidence),
            confidence_bar(c.fragment.confidence),
        ));
    }

    let stats = &result.stats;
    out.push_str(&format!("\n{rule}\nSTATISTICS\n{rule}\n"));
    out.push_str(&format!("Total words detected: {}\n", stats.fragment_count));
    out.push_str(&format!(
        "Average confidence: {:.2}%\n",
        stats.average_confidence as f64 * 100.0
    ));
    out.push_str(&format!("High confidence (>80%): {} words\n", stats.tiers.high));
    out.push_str(&format!("Medium confidence (50-80%): {} words\n", stats.tiers.medium));
    out.push_str(&format!("Low confidence (<50%): {} words\n", stats.tiers.low));
    out.push_str(&format!("Character count: {}\n", stats.character_count));
    out.push_str(&format!("Lines detected: {}\n", stats.line_count));
    out.push_str(&format!("{rule}\n"));
    out
}
