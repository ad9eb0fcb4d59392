//! Length capping shared by context assembly and answer synthesis.

pub const ELLIPSIS: &str = "...";
const ELLIPSIS_CHARS: usize = 3;

/// Cap `text` to at most `max` Unicode code points.
///
/// Text that fits is returned unchanged. Longer text keeps its first
/// `max - 3` code points followed by `...`, so the result is exactly `max`
/// code points long.
pub fn cap_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max < ELLIPSIS_CHARS {
        return text.chars().take(max).collect();
    }

    let mut capped: String = text.chars().take(max - ELLIPSIS_CHARS).collect();
    capped.push_str(ELLIPSIS);
    capped
}
