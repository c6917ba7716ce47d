//! IRCv3 message tag escaping.
//!
//! Tag values travel on the wire with a small escape alphabet so that the
//! delimiters of the tags section (`;`, space) and line framing (CR, LF)
//! can appear inside values.

/// Escape a tag value for serialization.
///
/// Escapes special characters according to the IRCv3 message-tags spec:
/// `;` → `\:`, space → `\s`, `\` → `\\`, CR → `\r`, LF → `\n`.
pub fn escape_tag_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            ';' => escaped.push_str("\\:"),
            ' ' => escaped.push_str("\\s"),
            '\\' => escaped.push_str("\\\\"),
            '\r' => escaped.push_str("\\r"),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Unescape a tag value from wire format.
///
/// Reverses [`escape_tag_value`]. A backslash followed by any character
/// outside the escape alphabet yields that character unchanged; a lone
/// trailing backslash is dropped.
pub fn unescape_tag_value(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut iter = value.chars();
    while let Some(c) = iter.next() {
        let r = if c == '\\' {
            match iter.next() {
                Some(':') => ';',
                Some('s') => ' ',
                Some('\\') => '\\',
                Some('r') => '\r',
                Some('n') => '\n',
                Some(c) => c,
                None => break,
            }
        } else {
            c
        };
        unescaped.push(r);
    }
    unescaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unescape_pairs() {
        assert_eq!(unescape_tag_value("a\\:b"), "a;b");
        assert_eq!(unescape_tag_value("hello\\sworld"), "hello world");
        assert_eq!(unescape_tag_value("path\\\\file"), "path\\file");
        assert_eq!(unescape_tag_value("line\\rend"), "line\rend");
        assert_eq!(unescape_tag_value("line\\nend"), "line\nend");
    }

    #[test]
    fn test_unescape_combined() {
        assert_eq!(unescape_tag_value("a\\:b\\sc\\\\d\\re\\nf"), "a;b c\\d\re\nf");
    }

    #[test]
    fn test_unescape_trailing_backslash_dropped() {
        assert_eq!(unescape_tag_value("test\\"), "test");
        assert_eq!(unescape_tag_value("\\"), "");
    }

    #[test]
    fn test_unescape_unknown_escape() {
        assert_eq!(unescape_tag_value("a\\xb"), "axb");
        assert_eq!(unescape_tag_value("\\b"), "b");
    }

    #[test]
    fn test_escape_roundtrip() {
        let values = [
            "simple",
            "with space",
            "with;semicolon",
            "with\\backslash",
            "with\nnewline",
            "with\rcarriage",
            "all; \\ \n \r together",
            "",
        ];
        for original in values {
            let escaped = escape_tag_value(original);
            assert_eq!(
                unescape_tag_value(&escaped),
                original,
                "roundtrip failed for {:?} via {:?}",
                original,
                escaped
            );
        }
    }

    #[test]
    fn test_escaped_form_has_no_delimiters() {
        let escaped = escape_tag_value("a;b c\r\n");
        assert!(!escaped.contains(';'));
        assert!(!escaped.contains(' '));
        assert!(!escaped.contains('\r'));
        assert!(!escaped.contains('\n'));
    }
}
