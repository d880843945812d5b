//! Text conversion between markdown, HTML and OLX problem markup.
//!
//! The conversions themselves are owned by an external service with a fixed
//! contract (see [`TextConverter`]). This crate provides the two ways of
//! reaching it (HTTP and a JSON-lines subprocess bridge), an in-process
//! markdown fallback, and the parser that turns OLX problem markup into the
//! course IR's [`Problem`](courseforge_shared::Problem).

mod bridge;
mod http;
mod local;
mod memory;
pub mod olx;
pub mod unescape;

use std::sync::Arc;

use courseforge_shared::{ConverterBackend, ConverterSettings, Result};

pub use bridge::{BridgeConfig, BridgeConverter};
pub use http::HttpConverter;
pub use local::{LocalMarkdown, html_to_markdown};
pub use memory::MemoryConverter;
pub use olx::parse_problem;

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// The operations the conversion service offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    MakeHtml,
    MakeMarkdown,
    MakeOlx,
    UnescapeMd,
}

impl Method {
    /// Wire name, used as the HTTP path segment and in bridge requests.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MakeHtml => "makehtml",
            Self::MakeMarkdown => "makemarkdown",
            Self::MakeOlx => "makeolx",
            Self::UnescapeMd => "unescapemd",
        }
    }
}

/// A text-transformation service.
///
/// Implementations are blocking: callers on an async runtime must invoke them
/// from `spawn_blocking`. Fenced and inline code must come back verbatim.
pub trait TextConverter: Send + Sync {
    /// Run one conversion.
    fn convert(&self, method: Method, content: &str) -> Result<String>;

    /// Human-readable backend name for tracing.
    fn name(&self) -> &str;

    fn make_html(&self, markdown: &str) -> Result<String> {
        self.convert(Method::MakeHtml, markdown)
    }

    fn make_md(&self, html: &str) -> Result<String> {
        self.convert(Method::MakeMarkdown, html)
    }

    fn make_olx(&self, markdown: &str) -> Result<String> {
        self.convert(Method::MakeOlx, markdown)
    }

    fn unescape_md(&self, text: &str) -> Result<String> {
        self.convert(Method::UnescapeMd, text)
    }
}

/// Build the converter described by the `[converter]` config section.
pub fn from_settings(settings: &ConverterSettings) -> Result<Arc<dyn TextConverter>> {
    let inner: Box<dyn TextConverter> = match settings.backend {
        ConverterBackend::Http => Box::new(HttpConverter::new(
            &settings.http_url,
            std::time::Duration::from_secs(settings.timeout_secs),
        )?),
        ConverterBackend::Bridge => Box::new(BridgeConverter::spawn(&BridgeConfig::from(settings))?),
    };

    tracing::debug!(
        backend = inner.name(),
        local_markdown = settings.local_markdown,
        "text converter ready"
    );

    if settings.local_markdown {
        Ok(Arc::new(LocalMarkdown::new(inner)))
    } else {
        Ok(Arc::from(inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_wire_names() {
        assert_eq!(Method::MakeHtml.as_str(), "makehtml");
        assert_eq!(Method::MakeMarkdown.as_str(), "makemarkdown");
        assert_eq!(Method::MakeOlx.as_str(), "makeolx");
        assert_eq!(Method::UnescapeMd.as_str(), "unescapemd");
    }

    #[test]
    fn default_methods_route_through_convert() {
        let conv = MemoryConverter::new().with_olx("# q", "<problem/>");
        assert_eq!(conv.make_olx("# q").unwrap(), "<problem/>");
        assert_eq!(conv.make_md("text").unwrap(), "text");
    }
}
