//! Core pipeline orchestration for courseforge.
//!
//! This crate ties the resolver, the denormalizer and the storage sinks
//! together into the `verify` and `convert` workflows, and owns the format
//! registry plus the file sinks that need no crate of their own: the JSON
//! document-set writer, the single-file book and OLX course archives, which
//! can also be read back in.

mod atomic;
pub mod book;
pub mod docs_writer;
pub mod format;
pub mod olx;
pub mod pipeline;
pub mod uri;

pub use format::Format;
pub use pipeline::{
    ConvertRequest, PipelineOptions, PipelineSummary, ProgressReporter, SilentProgress, convert,
    verify,
};
