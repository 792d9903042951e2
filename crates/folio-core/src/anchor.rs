#![forbid(unsafe_code)]

//! In-page navigation offsets.

/// Scroll position that puts a section's top edge just below a fixed header.
///
/// `element_top` is the section's top relative to the viewport (as reported by
/// `getBoundingClientRect`), `scroll_y` the current document scroll and
/// `header_height` the fixed header's height. Non-finite inputs count as `0`
/// and the result never goes above the document start.
#[must_use]
pub fn anchor_offset(element_top: f64, scroll_y: f64, header_height: f64) -> f64 {
    let finite = |v: f64| if v.is_finite() { v } else { 0.0 };
    (finite(element_top) + finite(scroll_y) - finite(header_height)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtracts_header() {
        assert_eq!(anchor_offset(400.0, 1200.0, 80.0), 1520.0);
    }

    #[test]
    fn section_above_viewport() {
        assert_eq!(anchor_offset(-300.0, 1200.0, 80.0), 820.0);
    }

    #[test]
    fn clamps_at_document_start() {
        assert_eq!(anchor_offset(20.0, 0.0, 80.0), 0.0);
        assert_eq!(anchor_offset(f64::NAN, 100.0, f64::INFINITY), 100.0);
    }
}
