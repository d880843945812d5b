//! In-memory converter with canned OLX responses.

use std::collections::HashMap;

use courseforge_shared::{CourseError, Result};

use crate::unescape::unescape_code_spans;
use crate::{Method, TextConverter};

/// A converter that answers `make_olx` from a fixed table, unescapes code
/// spans in-process, and passes HTML/markdown through unchanged.
///
/// Stands in for the conversion service in tests across the workspace.
#[derive(Debug, Default, Clone)]
pub struct MemoryConverter {
    olx: HashMap<String, String>,
}

impl MemoryConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the OLX returned for a given problem markdown (compared trimmed).
    pub fn with_olx(mut self, markdown: &str, olx: &str) -> Self {
        self.olx.insert(markdown.trim().to_string(), olx.to_string());
        self
    }
}

impl TextConverter for MemoryConverter {
    fn convert(&self, method: Method, content: &str) -> Result<String> {
        match method {
            Method::MakeOlx => self.olx.get(content.trim()).cloned().ok_or_else(|| {
                CourseError::Conversion(format!(
                    "no OLX registered for problem starting {:?}",
                    content.chars().take(40).collect::<String>()
                ))
            }),
            Method::UnescapeMd => Ok(unescape_code_spans(content)),
            Method::MakeHtml | Method::MakeMarkdown => Ok(content.to_string()),
        }
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_problem_is_conversion_error() {
        let conv = MemoryConverter::new();
        let err = conv.make_olx("What is 2+2?").unwrap_err();
        assert!(matches!(err, CourseError::Conversion(_)));
        assert!(err.to_string().contains("What is 2+2?"));
    }
}
