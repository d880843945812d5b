//! In-process markdown conversion.
//!
//! `make_md` and `unescape_md` do not need the external service: HTML →
//! markdown goes through `htmd`, and unescaping is a regex pass. The other
//! methods are delegated to the wrapped converter.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use courseforge_shared::{CourseError, Result};

use crate::unescape::unescape_code_spans;
use crate::{Method, TextConverter};

/// Convert an HTML fragment to markdown.
pub fn html_to_markdown(html: &str) -> Result<String> {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "noscript"])
        .build();

    let markdown = converter
        .convert(html)
        .map_err(|e| CourseError::Conversion(format!("htmd conversion failed: {e}")))?;

    Ok(MULTI_BLANK_RE
        .replace_all(markdown.trim(), "\n\n")
        .into_owned())
}

/// Decorator that answers markdown methods locally.
pub struct LocalMarkdown {
    inner: Box<dyn TextConverter>,
}

impl LocalMarkdown {
    pub fn new(inner: Box<dyn TextConverter>) -> Self {
        Self { inner }
    }
}

impl TextConverter for LocalMarkdown {
    fn convert(&self, method: Method, content: &str) -> Result<String> {
        match method {
            Method::MakeMarkdown => {
                debug!(len = content.len(), "local html→markdown");
                html_to_markdown(content)
            }
            Method::UnescapeMd => Ok(unescape_code_spans(content)),
            Method::MakeHtml | Method::MakeOlx => self.inner.convert(method, content),
        }
    }

    fn name(&self) -> &str {
        "local-markdown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryConverter;

    #[test]
    fn html_to_markdown_basic() {
        let md = html_to_markdown("<p>Hello <strong>world</strong></p>").unwrap();
        assert_eq!(md, "Hello **world**");
    }

    #[test]
    fn html_to_markdown_collapses_blank_runs() {
        let md = html_to_markdown("<p>One</p>\n\n\n\n<p>Two</p>").unwrap();
        assert!(!md.contains("\n\n\n"));
        assert!(md.contains("One"));
        assert!(md.contains("Two"));
    }

    #[test]
    fn decorator_routes_methods() {
        let inner = MemoryConverter::new().with_olx("q", "<problem></problem>");
        let conv = LocalMarkdown::new(Box::new(inner));

        assert_eq!(conv.make_olx("q").unwrap(), "<problem></problem>");
        let md = conv.make_md("<p>hi <code>x</code></p>").unwrap();
        assert_eq!(md, "hi `x`");
        assert_eq!(conv.unescape_md("`a &lt; b`").unwrap(), "`a < b`");
        assert_eq!(conv.name(), "local-markdown");
    }
}
