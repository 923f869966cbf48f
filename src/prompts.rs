//! Prompt-mode identifiers for the OCR engine.
//!
//! The engine selects its behaviour from a closed prompt vocabulary; the
//! identifiers here are the wire values it understands. Centralising them
//! keeps the mapping in one place and lets unit tests pin the vocabulary
//! without a live engine.

use crate::config::{BoundingBox, PromptMode};

/// Full layout detection with text for every region.
pub const PROMPT_LAYOUT_ALL: &str = "prompt_layout_all_en";

/// Layout regions only, no text extraction.
pub const PROMPT_LAYOUT_ONLY: &str = "prompt_layout_only_en";

/// Plain text extraction, no layout.
pub const PROMPT_OCR: &str = "prompt_ocr";

/// OCR constrained to a caller-supplied bounding box.
pub const PROMPT_GROUNDING_OCR: &str = "prompt_grounding_ocr";

/// The engine-side identifier for a prompt mode.
pub fn prompt_name(mode: PromptMode) -> &'static str {
    match mode {
        PromptMode::FullLayout => PROMPT_LAYOUT_ALL,
        PromptMode::LayoutOnly => PROMPT_LAYOUT_ONLY,
        PromptMode::TextOnly => PROMPT_OCR,
        PromptMode::GroundedWithBox => PROMPT_GROUNDING_OCR,
    }
}

/// Grounding suffix appended to the prompt identifier payload: the target
/// box as `[x1, y1, x2, y2]`.
pub fn grounding_suffix(bbox: &BoundingBox) -> String {
    let [x1, y1, x2, y2] = bbox.as_array();
    format!("[{x1}, {y1}, {x2}, {y2}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_cover_all_modes() {
        assert_eq!(prompt_name(PromptMode::FullLayout), "prompt_layout_all_en");
        assert_eq!(prompt_name(PromptMode::LayoutOnly), "prompt_layout_only_en");
        assert_eq!(prompt_name(PromptMode::TextOnly), "prompt_ocr");
        assert_eq!(
            prompt_name(PromptMode::GroundedWithBox),
            "prompt_grounding_ocr"
        );
    }

    #[test]
    fn grounding_suffix_format() {
        let bbox = BoundingBox::new(10, 20, 110, 220).unwrap();
        assert_eq!(grounding_suffix(&bbox), "[10, 20, 110, 220]");
    }
}
