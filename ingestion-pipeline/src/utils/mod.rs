pub mod llm_instructions;

/// Prefix of at most `max_chars` characters. Never splits a multi-byte character.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_keeps_short_text() {
        assert_eq!(truncate_chars("package main", 500), "package main");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        let text = "héllo wörld";
        assert_eq!(truncate_chars(text, 2), "hé");
        assert_eq!(truncate_chars(text, 8), "héllo wö");
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
    }

    #[test]
    fn test_truncate_chars_zero_is_empty() {
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
