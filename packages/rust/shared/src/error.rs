//! Error types for courseforge.
//!
//! Library crates use [`CourseError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Errors fall into three tiers that the resolver and denormalizer treat
//! differently: structural errors abort a walk immediately, per-vertical
//! extraction errors are recorded and aggregated at the end, and
//! denormalization errors abort the conversion of the whole course.

use std::path::PathBuf;

/// Top-level error type for all courseforge operations.
#[derive(Debug, thiserror::Error)]
pub enum CourseError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A directory was found deeper than chapter/sequential/vertical.
    #[error("invalid depth: {path:?} is nested deeper than chapter/sequential/vertical")]
    InvalidDepth { path: PathBuf },

    /// A chapter/sequential/vertical directory name is not `NN_Name`.
    #[error("invalid naming convention at {path:?}: {reason}")]
    InvalidNamingConvention { path: PathBuf, reason: String },

    /// One vertical's blocks could not be extracted.
    #[error("extraction failed at {path:?}: {message}")]
    Extraction { path: PathBuf, message: String },

    /// Aggregated per-vertical extraction failures, reported after the walk.
    #[error("content extraction failed: {message}")]
    ContentExtractionFailed { message: String },

    /// Index file could not be read, parsed, or written.
    #[error("index error at {path:?}: {message}")]
    Index { path: PathBuf, message: String },

    /// Invalid REPL/workspace configuration.
    #[error("repl error: {message}")]
    Repl { message: String },

    /// Problem markup or other structured content could not be parsed.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// The text-conversion service failed.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// The resolved course cannot be turned into storage documents.
    #[error("denormalize error in {entity}: {message}")]
    Denormalize { entity: String, message: String },

    /// Writing a course back to disk failed.
    #[error("export error: {0}")]
    Export(String),

    /// Database or search index error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Data validation error (unsupported format, bad URI, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CourseError>;

impl CourseError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a REPL configuration error.
    pub fn repl(msg: impl Into<String>) -> Self {
        Self::Repl {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an index file error for the given directory.
    pub fn index(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Index {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a naming convention error for the given directory.
    pub fn naming(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidNamingConvention {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a denormalization error naming the offending entity.
    pub fn denormalize(entity: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Denormalize {
            entity: entity.into(),
            message: msg.into(),
        }
    }

    /// Whether this error belongs to the structural tier (aborts a walk at once).
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::InvalidDepth { .. }
                | Self::InvalidNamingConvention { .. }
                | Self::Index { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = CourseError::config("missing converter url");
        assert_eq!(err.to_string(), "config error: missing converter url");

        let err = CourseError::denormalize("exam 3f2a_exam", "vertical has 2 blocks");
        assert!(err.to_string().contains("exam 3f2a_exam"));
        assert!(err.to_string().contains("2 blocks"));
    }

    #[test]
    fn structural_tier() {
        assert!(CourseError::naming("/c/ch", "no prefix").is_structural());
        assert!(
            CourseError::InvalidDepth {
                path: "/c/a/b/c/d".into()
            }
            .is_structural()
        );
        assert!(
            !CourseError::ContentExtractionFailed {
                message: "x".into()
            }
            .is_structural()
        );
        assert!(!CourseError::Conversion("down".into()).is_structural());
    }
}
