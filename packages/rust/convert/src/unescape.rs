//! Undo XML entity escaping inside markdown code spans.
//!
//! Problem markup travels through XML, which escapes `&`, `<`, `>` (and the
//! converter's private `&pipe;`) everywhere. Prose can keep the entities,
//! but fenced and inline code must come back verbatim.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Replace `&amp;`, `&pipe;`, `&gt;`, `&lt;` inside backtick-delimited regions.
///
/// Fenced blocks (```` ``` ````) may span lines; inline spans may not.
/// Text outside code is returned unchanged.
pub fn unescape_code_spans(text: &str) -> String {
    static CODE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)```.*?```|`[^`\n]*`").expect("valid regex"));

    CODE_RE
        .replace_all(text, |caps: &Captures| unescape_entities(&caps[0]))
        .into_owned()
}

// Order matters: `&amp;lt;` becomes `<`.
fn unescape_entities(code: &str) -> String {
    code.replace("&amp;", "&")
        .replace("&pipe;", "|")
        .replace("&gt;", ">")
        .replace("&lt;", "<")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_code_is_unescaped() {
        let input = "Use `a &amp;&amp; b` and `x &lt; y` here &amp; there";
        assert_eq!(
            unescape_code_spans(input),
            "Use `a && b` and `x < y` here &amp; there"
        );
    }

    #[test]
    fn fenced_code_spans_lines() {
        let input = "Text &gt; more\n```python\nif a &gt; b &amp;&amp; c:\n    print(x &pipe; y)\n```\n";
        let out = unescape_code_spans(input);
        assert!(out.starts_with("Text &gt; more"));
        assert!(out.contains("if a > b && c:"));
        assert!(out.contains("print(x | y)"));
    }

    #[test]
    fn text_without_code_is_untouched() {
        let input = "Nothing &lt;here&gt;";
        assert_eq!(unescape_code_spans(input), input);
    }
}
