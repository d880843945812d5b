//! Shared types, error model, and configuration for courseforge.
//!
//! This crate is the foundation depended on by all other courseforge crates.
//! It provides:
//! - [`CourseError`] — the unified error type
//! - The course IR ([`Course`], [`Chapter`], [`Sequential`], [`Vertical`], [`Block`])
//! - The REPL/workspace model and environment table
//! - Identifier helpers ([`new_id`], [`global_id`])
//! - Configuration ([`AppConfig`], [`ResolveOptions`], config loading)

pub mod config;
pub mod course;
pub mod error;
pub mod types;
pub mod workspace;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ConverterBackend, ConverterSettings, DocumentsConfig, GitConfig, PrefixPolicy,
    ResolveOptions, ResolverConfig, StorageConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from,
};
pub use course::{
    AssessmentBlock, AttachedRepl, Block, BlockKind, Chapter, Choice, Course, CourseMeta,
    CourseStats, EditorBlock, FINAL_EXAM_PREFIX, FailedBlock, InstructorTimekit, NarrativeBlock,
    Problem, ProblemKind, Sequential, TimekitInterval, Vertical,
};
pub use error::{CourseError, Result};
pub use types::{global_id, new_id, split_global_id};
pub use workspace::{
    ENVIRONMENTS, Environment, FileTree, ReplConfig, ReplDisplay, SUPPORTED_API_VERSION, TreeRole,
    WorkspaceFile, parse_shebang, shebang,
};
