/// Checks whether the text consists only of whitespace characters.
/// An empty string counts as blank.
pub fn is_blank(text: &str) -> bool {
    text.chars().all(char::is_whitespace)
}

/// The substring covering the given character-offset span, or None when the
/// span does not fit the text. Offsets are character based, not byte based,
/// so spans never split a multi-byte sequence.
pub fn span_text(text: &str, start: u64, end: u64) -> Option<String> {
    if end < start {
        return None;
    }
    let (start, end) = (start as usize, end as usize);
    if end > text.chars().count() {
        return None;
    }
    Some(text.chars().skip(start).take(end - start).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_detection_covers_all_whitespace_kinds() {
        assert!(is_blank(""));
        assert!(is_blank("   "));
        assert!(is_blank("\t\n\r \u{00A0}"));
        assert!(!is_blank("  a  "));
    }

    #[test]
    fn span_text_uses_character_offsets() {
        assert_eq!(span_text("hello world", 6, 11).as_deref(), Some("world"));
        assert_eq!(span_text("żółć 123", 5, 8).as_deref(), Some("123"));
        assert_eq!(span_text("abc", 1, 1).as_deref(), Some(""));
    }

    #[test]
    fn span_text_rejects_out_of_range_spans() {
        assert_eq!(span_text("abc", 2, 1), None);
        assert_eq!(span_text("abc", 0, 4), None);
    }
}
