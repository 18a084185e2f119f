//! Filename sanitization for names surfaced to callers.

use std::borrow::Cow;

/// Replace each CR LF pair, tab, CR and LF in a backend-reported name by a
/// single space, so downstream structured output stays well-formed.
pub fn sanitize_name(name: &str) -> Cow<'_, str> {
    if !name.contains(['\t', '\r', '\n']) {
        return Cow::Borrowed(name);
    }
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                chars.next_if_eq(&'\n');
                out.push(' ');
            }
            '\t' | '\n' => out.push(' '),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_characters() {
        assert_eq!(sanitize_name("file1\tX\r\nY"), "file1 X Y");
        assert_eq!(sanitize_name("a\rb\nc"), "a b c");
        assert_eq!(sanitize_name("a\n\nb"), "a  b");
        assert_eq!(sanitize_name("\r\n\r\n"), "  ");
    }

    #[test]
    fn test_clean_name_borrowed() {
        assert!(matches!(sanitize_name("plain.txt"), Cow::Borrowed("plain.txt")));
    }
}
