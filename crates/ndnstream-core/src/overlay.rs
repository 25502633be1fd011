//! Overlay text rendered over the local preview.
//!
//! The player re-reads the overlay file on every frame, so the whole
//! document is produced at once from the latest statistics record:
//!
//! ```text
//! publishing /ndn/edu/ucla/alex/ndnrtc-client/camera
//!      Frames Captured: 10
//!     Frames Published: 9
//! ```

use crate::naming::escape_overlay_text;
use crate::stats::{ParseWarning, StatRecord};

/// Width of the right-justified caption column.
pub const CAPTION_WIDTH: usize = 20;

/// Width of the left-justified value column.
pub const VALUE_WIDTH: usize = 10;

/// Human-readable captions for the statistics the publisher can gather.
///
/// Statistics not listed here are not shown.
pub const CAPTIONS: &[(&str, &str)] = &[
    ("framesCaptured", "Frames Captured"),
    ("capturedFps", "Capture FPS"),
    ("framesProcessed", "Frames Processed"),
    ("framesEncoded", "Frames Encoded"),
    ("encodingRate", "Encoding FPS"),
    ("droppedNum", "Frames Dropped"),
    ("framesPub", "Frames Published"),
    ("publishedKeyNum", "Key Frames"),
    ("publishRate", "Publish Rate"),
    ("publishedSegNum", "Segments Published"),
    ("bytesPublished", "Bytes Published"),
    ("rawBytesPublished", "Raw Bytes"),
    ("signNum", "Signatures"),
    ("interestsRcvd", "Interests Received"),
];

/// Looks up the caption for a statistic name.
pub fn caption_for(name: &str) -> Option<&'static str> {
    CAPTIONS
        .iter()
        .find(|(stat, _)| *stat == name)
        .map(|(_, caption)| *caption)
}

/// Formats one overlay line.
///
/// Whole values render as integers, everything else with two decimals.
pub fn format_stat_line(caption: &str, value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{caption:>CAPTION_WIDTH$}: {value:<VALUE_WIDTH$.0}")
    } else {
        format!("{caption:>CAPTION_WIDTH$}: {value:<VALUE_WIDTH$.2}")
    }
}

/// Renders the complete overlay document for a record.
///
/// `prefix` is the full publishing prefix shown in the header. Statistics
/// without a caption are reported back as warnings and left out.
pub fn render_overlay(prefix: &str, record: &StatRecord) -> (String, Vec<ParseWarning>) {
    let mut text = format!("publishing {}\n", escape_overlay_text(prefix));
    let mut warnings = Vec::new();

    for (name, value) in record.iter() {
        match caption_for(name) {
            Some(caption) => {
                text.push_str(&format_stat_line(caption, value));
                text.push('\n');
            }
            None => warnings.push(ParseWarning::UnknownStatistic {
                name: name.to_string(),
            }),
        }
    }

    (text, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_value_renders_as_integer() {
        let line = format_stat_line("Frames Captured", 4.0);
        assert_eq!(line, "     Frames Captured: 4         ");
    }

    #[test]
    fn test_fractional_value_renders_two_decimals() {
        let line = format_stat_line("Capture FPS", 4.25);
        assert_eq!(line, "         Capture FPS: 4.25      ");
    }

    #[test]
    fn test_rounding_to_two_decimals() {
        assert!(format_stat_line("Publish Rate", 29.976).contains("29.98"));
    }

    #[test]
    fn test_render_in_declared_order_with_header() {
        let names = ["framesCaptured", "framesPub"];
        let (record, _) = StatRecord::parse("T0\t10\t9", &names);
        let (text, warnings) = render_overlay("/test/ndnrtc-client/camera", &record);

        assert!(warnings.is_empty());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines.first(), Some(&"publishing /test/ndnrtc-client/camera"));
        assert_eq!(lines.get(1).map(|l| l.trim_end()), Some("     Frames Captured: 10"));
        assert_eq!(lines.get(2).map(|l| l.trim_end()), Some("    Frames Published: 9"));
    }

    #[test]
    fn test_unknown_statistic_is_skipped() {
        let names = ["mystery", "framesPub"];
        let (record, _) = StatRecord::parse("T0\t1\t2", &names);
        let (text, warnings) = render_overlay("/p", &record);

        assert!(!text.contains("mystery"));
        assert!(text.contains("Frames Published"));
        assert_eq!(
            warnings,
            vec![ParseWarning::UnknownStatistic {
                name: "mystery".to_string()
            }]
        );
    }

    #[test]
    fn test_header_escapes_percent() {
        let (text, _) = render_overlay("/a%2Fb", &StatRecord::default());
        assert_eq!(text, "publishing /a\\%2Fb\n");
    }

    #[test]
    fn test_caption_lookup() {
        assert_eq!(caption_for("framesPub"), Some("Frames Published"));
        assert_eq!(caption_for("nope"), None);
    }
}
