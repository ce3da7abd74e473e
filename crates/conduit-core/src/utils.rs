//! Text helpers.

/// Truncate `text` to at most `max_bytes`, backing off to the nearest UTF-8
/// character boundary.
#[must_use]
pub fn truncate_to_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end = end.saturating_sub(1);
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_text_unchanged() {
        assert_eq!(truncate_to_boundary("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate_to_boundary("hello world", 5), "hello");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        // "工作表" is three 3-byte characters.
        assert_eq!(truncate_to_boundary("工作表", 4), "工");
        assert_eq!(truncate_to_boundary("工作表", 2), "");
    }
}
