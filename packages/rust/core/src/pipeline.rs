//! End-to-end pipelines: course directory or OLX archive → IR → target format.
//!
//! - [`verify`]: import only, reporting entity counts
//! - [`convert`]: resolve → git timestamps → export (denormalizing first for
//!   the document formats)

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use courseforge_convert::TextConverter;
use courseforge_documents::{DenormalizeOptions, DocumentCounts, denormalize};
use courseforge_resolver::{ResolveProgress, Resolver, enrich_timestamps, export_course};
use courseforge_shared::{
    AppConfig, Course, CourseError, CourseStats, ResolveOptions, Result, StorageConfig,
};
use courseforge_storage::{Storage, StoreReport};

use crate::book::write_book;
use crate::docs_writer::write_document_set;
use crate::format::Format;
use crate::olx::{export_olx, import_olx};
use crate::uri::resolve_uri;

/// Settings shared by both pipelines.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub resolve: ResolveOptions,
    pub documents: DenormalizeOptions,
    pub storage: StorageConfig,
    /// Run the `git log` timestamp pass after resolution.
    pub git_timestamps: bool,
}

impl From<&AppConfig> for PipelineOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            resolve: ResolveOptions::from(config),
            documents: DenormalizeOptions::from(config),
            storage: config.storage.clone(),
            git_timestamps: config.git.timestamps,
        }
    }
}

/// Arguments of one `convert` run.
#[derive(Debug, Clone)]
pub struct ConvertRequest {
    pub from_format: Format,
    pub from_uri: String,
    pub to_format: Format,
    pub to_uri: String,
    /// Replace an existing target.
    pub force: bool,
}

/// Outcome of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub course_id: String,
    pub course_name: String,
    pub stats: CourseStats,
    /// Export target; `None` for `verify`.
    pub target: Option<PathBuf>,
    /// Set when the target format is a document format.
    pub documents: Option<DocumentCounts>,
    /// Set for the `store` format.
    pub stored: Option<StoreReport>,
    /// Verticals that received git timestamps.
    pub timestamped: usize,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once per vertical as its extraction finishes.
    fn vertical_extracted(&self, display_name: &str, failed: bool);
    /// Called when the pipeline completes.
    fn done(&self, summary: &PipelineSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn vertical_extracted(&self, _display_name: &str, _failed: bool) {}
    fn done(&self, _summary: &PipelineSummary) {}
}

/// Resolve the course at `uri` and report its shape.
#[instrument(skip_all, fields(format = %format, uri = %uri))]
pub async fn verify(
    format: Format,
    uri: &str,
    converter: Arc<dyn TextConverter>,
    options: &PipelineOptions,
    progress: &dyn ProgressReporter,
) -> Result<PipelineSummary> {
    let start = Instant::now();
    format.check_import()?;
    let root = resolve_uri(uri)?;

    let course = import(format, &root, converter, options, progress).await?;
    let summary = PipelineSummary {
        course_id: course.meta.url_name.clone(),
        course_name: course.meta.display_name.clone(),
        stats: course.stats(),
        target: None,
        documents: None,
        stored: None,
        timestamped: 0,
        elapsed: start.elapsed(),
    };

    progress.done(&summary);
    info!(
        chapters = summary.stats.chapters,
        sequentials = summary.stats.sequentials,
        verticals = summary.stats.verticals,
        blocks = summary.stats.blocks,
        "course verified"
    );
    Ok(summary)
}

/// Run a full conversion.
#[instrument(skip_all, fields(from = %request.from_format, to = %request.to_format))]
pub async fn convert(
    request: &ConvertRequest,
    converter: Arc<dyn TextConverter>,
    options: &PipelineOptions,
    progress: &dyn ProgressReporter,
) -> Result<PipelineSummary> {
    let start = Instant::now();
    request.from_format.check_import()?;
    request.to_format.check_export()?;
    let source = resolve_uri(&request.from_uri)?;
    let target = resolve_uri(&request.to_uri)?;
    if source == target {
        return Err(CourseError::validation(format!(
            "source and target are the same location: {}",
            source.display()
        )));
    }

    info!(source = %source.display(), target = %target.display(), "starting convert pipeline");

    // --- Phase 1: Import ---
    let mut course = import(
        request.from_format,
        &source,
        converter.clone(),
        options,
        progress,
    )
    .await?;

    // --- Phase 2: Git timestamps ---
    let timestamped = if options.git_timestamps {
        progress.phase("Reading git history");
        enrich_timestamps(&source, &mut course).await
    } else {
        0
    };

    // --- Phase 3: Export ---
    progress.phase(&format!("Writing {}", request.to_format));
    let mut summary = PipelineSummary {
        course_id: course.meta.url_name.clone(),
        course_name: course.meta.display_name.clone(),
        stats: course.stats(),
        target: Some(target.clone()),
        documents: None,
        stored: None,
        timestamped,
        elapsed: Duration::ZERO,
    };
    export(&course, request, &target, converter, options, &mut summary).await?;
    summary.elapsed = start.elapsed();

    progress.done(&summary);
    info!(
        course = %summary.course_id,
        verticals = summary.stats.verticals,
        elapsed_ms = summary.elapsed.as_millis(),
        "convert pipeline complete"
    );
    Ok(summary)
}

async fn import(
    format: Format,
    root: &Path,
    converter: Arc<dyn TextConverter>,
    options: &PipelineOptions,
    progress: &dyn ProgressReporter,
) -> Result<Course> {
    if format == Format::Olx {
        progress.phase("Reading OLX archive");
        return import_olx(root, converter).await;
    }
    progress.phase("Resolving course tree");
    let resolver = Resolver::new(converter, options.resolve.clone());
    resolver
        .resolve(root, &PipelineResolveProgress { inner: progress })
        .await
}

async fn export(
    course: &Course,
    request: &ConvertRequest,
    target: &Path,
    converter: Arc<dyn TextConverter>,
    options: &PipelineOptions,
    summary: &mut PipelineSummary,
) -> Result<()> {
    match request.to_format {
        Format::Eocs => export_course(course, target, request.force).await,
        Format::Olx => {
            export_olx(course, target, converter, request.force).await?;
            Ok(())
        }
        Format::Book => write_book(course, target, request.force),
        Format::Docs => {
            let set = denormalize(course, &options.documents)?;
            summary.documents = Some(set.counts());
            let index_name = options.storage.index_name(&course.meta.language);
            write_document_set(&set, target, &index_name, request.force)?;
            Ok(())
        }
        Format::Store => {
            let set = denormalize(course, &options.documents)?;
            summary.documents = Some(set.counts());
            let storage = Storage::open(target).await?;
            let index_name = options.storage.index_name(&course.meta.language);
            summary.stored = Some(storage.store_document_set(&set, &index_name).await?);
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Resolve progress adapter
// ---------------------------------------------------------------------------

/// Adapts a `ProgressReporter` to the resolver's `ResolveProgress` interface.
struct PipelineResolveProgress<'a> {
    inner: &'a dyn ProgressReporter,
}

impl ResolveProgress for PipelineResolveProgress<'_> {
    fn vertical_extracted(&self, display_name: &str, failed: bool) {
        self.inner.vertical_extracted(display_name, failed);
    }
}
