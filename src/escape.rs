//! Tag escaping for generated source
//!
//! Names and paths are substituted into the generator's output through
//! `{%...%}` tags. Before a user string is placed inside a tag it is escaped
//! so that it can never contain a tag delimiter; the tag pass unescapes it
//! exactly once when writing the final source.
//!
//! `$` is the marker because neither Rust string literals nor `{:?}`
//! formatting give it a meaning:
//!
//! - `$` becomes `$$`
//! - a `%` directly after `{` gets a `$` in front of it (`{%` → `{$%`)
//! - a `%` directly before `}` gets a `$` after it (`%}` → `%$}`)
//!
//! A lone `$` in escaped text is always an inserted marker and is dropped on
//! unescape, a doubled `$$` is a literal `$`.

/// Escape marker character
pub const MARKER: char = '$';

/// Escape `input` so the result contains neither `{%` nor `%}`
pub fn escape(input: &str) -> String {
    let mut output = String::with_capacity(input.len() + 4);
    let mut prev: Option<char> = None;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            MARKER => {
                output.push(MARKER);
                output.push(MARKER);
            }
            '%' => {
                if prev == Some('{') {
                    output.push(MARKER);
                }
                output.push('%');
                if chars.peek() == Some(&'}') {
                    output.push(MARKER);
                }
            }
            _ => output.push(c),
        }
        prev = Some(c);
    }

    output
}

/// Reverse [`escape`]
pub fn unescape(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != MARKER {
            output.push(c);
            continue;
        }
        if chars.peek() == Some(&MARKER) {
            chars.next();
            output.push(MARKER);
        }
        // lone marker: inserted by escape, drop it
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_roundtrip(input: &str) {
        let escaped = escape(input);
        assert!(!escaped.contains("{%"), "{:?} escaped to {:?}", input, escaped);
        assert!(!escaped.contains("%}"), "{:?} escaped to {:?}", input, escaped);
        assert_eq!(unescape(&escaped), input, "escaped form {:?}", escaped);
    }

    #[test]
    fn test_escape_delimiters() {
        assert_eq!(escape("{%"), "{$%");
        assert_eq!(escape("%}"), "%$}");
        assert_eq!(escape("$"), "$$");
        assert_eq!(escape("plain.txt"), "plain.txt");
    }

    #[test]
    fn test_escape_overlapping_delimiters() {
        assert_eq!(escape("{%}"), "{$%$}");
        assert_roundtrip("{%}");
        assert_roundtrip("{%%}");
        assert_roundtrip("%}{%");
    }

    #[test]
    fn test_roundtrip_with_markers() {
        for input in [
            "",
            "$",
            "$$",
            "$%}",
            "{$%",
            "{%$",
            "$}",
            "{%unescape:x%}",
            "a {% if x %} b {{ y }} %} c",
            "100% {done}",
            "weird $ {% name %} $$ %}{%",
            "日本語 {%テスト%}",
        ] {
            assert_roundtrip(input);
        }
    }

    #[test]
    fn test_roundtrip_exhaustive_small_alphabet() {
        // every string up to length 6 over the characters that matter
        let alphabet = ['{', '%', '}', '$', 'a'];
        let mut current = vec![String::new()];
        for _ in 0..6 {
            let mut next = Vec::new();
            for prefix in &current {
                for c in alphabet {
                    let mut s = prefix.clone();
                    s.push(c);
                    assert_roundtrip(&s);
                    next.push(s);
                }
            }
            current = next;
        }
    }

    #[test]
    fn test_unescape_plain_text_is_unchanged() {
        assert_eq!(unescape("hello/world.txt"), "hello/world.txt");
    }
}
