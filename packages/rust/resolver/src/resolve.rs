//! Tree resolver: course directory → [`Course`].
//!
//! The walk is single-threaded and pre-order, so chapter and sequential
//! ordering is fixed by traversal. Verticals are handed to the
//! [`ExtractionPool`] as they are met and the walk moves on; the pool is
//! joined once the walk is done.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument};
use walkdir::{DirEntry, WalkDir};

use courseforge_convert::TextConverter;
use courseforge_shared::{
    Block, Chapter, Course, CourseError, ResolveOptions, Result, Sequential, Vertical,
};

use crate::extract::VerticalJob;
use crate::index::{ChapterRecord, CourseRecord, IndexStore, SequentialRecord, VerticalRecord};
use crate::naming::{check_position, is_hierarchy_name, parse_prefixed};
use crate::pool::ExtractionPool;

/// Per-vertical progress callbacks from a resolution pass.
pub trait ResolveProgress: Send + Sync {
    /// Called once per vertical as its extraction finishes.
    fn vertical_extracted(&self, display_name: &str, failed: bool);
}

/// A [`ResolveProgress`] that ignores everything.
pub struct NoProgress;

impl ResolveProgress for NoProgress {
    fn vertical_extracted(&self, _display_name: &str, _failed: bool) {}
}

/// Resolves course directories into the IR.
pub struct Resolver {
    converter: Arc<dyn TextConverter>,
    store: IndexStore,
    options: ResolveOptions,
}

impl Resolver {
    /// A resolver over index files on disk.
    pub fn new(converter: Arc<dyn TextConverter>, options: ResolveOptions) -> Self {
        Self {
            converter,
            store: IndexStore::filesystem(),
            options,
        }
    }

    /// Replace the index store.
    pub fn with_store(mut self, store: IndexStore) -> Self {
        self.store = store;
        self
    }

    /// Resolve the course at `root`, failing if any vertical could not be
    /// extracted. The error lists every failed vertical.
    pub async fn resolve(&self, root: &Path, progress: &dyn ResolveProgress) -> Result<Course> {
        let course = self.resolve_partial(root, progress).await?;
        check_extraction(&course)?;
        Ok(course)
    }

    /// Resolve the course at `root`, leaving failed verticals in place as
    /// sentinel blocks. Structural errors still abort.
    #[instrument(skip_all, fields(root = %root.display()))]
    pub async fn resolve_partial(
        &self,
        root: &Path,
        progress: &dyn ResolveProgress,
    ) -> Result<Course> {
        let meta = self.read_root(root)?;
        info!(course = %meta.display_name, id = %meta.url_name, "resolving course");

        let mut course = Course {
            meta,
            chapters: Vec::new(),
        };
        let mut pool = ExtractionPool::start(
            self.options.concurrency,
            Arc::clone(&self.converter),
            self.options.sort_blocks,
        );

        let options = &self.options;
        let mut walker = WalkDir::new(root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_pruned(entry, options));

        while let Some(entry) = walker.next() {
            let entry = entry.map_err(walk_error)?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let path = entry.path();
            let name = entry.file_name().to_string_lossy();
            let (prefix, display) = parse_prefixed(path, &name)?;

            match entry.depth() {
                1 => {
                    let index = course.chapters.len();
                    check_position(options.prefix_policy, path, prefix, index)?;
                    let (record, _) = self.store.get_or_assign::<ChapterRecord>(path, &display)?;
                    course.chapters.push(Chapter {
                        url_name: record.url_name,
                        display_name: record.display_name,
                        index,
                        sequentials: Vec::new(),
                    });
                }
                2 => {
                    let chapter = course
                        .chapters
                        .last_mut()
                        .ok_or_else(|| CourseError::InvalidDepth { path: path.to_path_buf() })?;
                    let index = chapter.sequentials.len();
                    check_position(options.prefix_policy, path, prefix, index)?;
                    let (record, _) =
                        self.store.get_or_assign::<SequentialRecord>(path, &display)?;
                    chapter.sequentials.push(Sequential {
                        url_name: record.url_name,
                        display_name: record.display_name,
                        index,
                        graded: record.graded,
                        format: record.format,
                        verticals: Vec::new(),
                    });
                }
                3 => {
                    let chapter_index = course.chapters.len().saturating_sub(1);
                    let sequential = course
                        .chapters
                        .last_mut()
                        .and_then(|c| c.sequentials.last_mut())
                        .ok_or_else(|| CourseError::InvalidDepth { path: path.to_path_buf() })?;
                    let sequential_index = sequential.index;
                    let index = sequential.verticals.len();
                    check_position(options.prefix_policy, path, prefix, index)?;
                    let (record, _) = self.store.get_or_assign::<VerticalRecord>(path, &display)?;

                    reject_nested_hierarchy(path, options)?;
                    walker.skip_current_dir();

                    let rel_dir = relative_dir(root, path);
                    pool.submit(
                        (chapter_index, sequential_index, index),
                        VerticalJob {
                            dir: path.to_path_buf(),
                            rel_dir: rel_dir.clone(),
                            label: format!("vertical '{}' ({})", record.display_name, record.url_name),
                        },
                    )?;
                    sequential.verticals.push(Vertical {
                        url_name: record.url_name,
                        display_name: record.display_name,
                        index,
                        fs_path: rel_dir,
                        blocks: Vec::new(),
                        created_at: None,
                        updated_at: None,
                    });
                }
                _ => return Err(CourseError::InvalidDepth { path: path.to_path_buf() }),
            }
        }

        drop(walker);
        debug!(queued = pool.submitted(), "walk finished, waiting for extraction");
        pool.join(|(c, s, v), blocks| {
            if let Some(vertical) = course
                .chapters
                .get_mut(c)
                .and_then(|ch| ch.sequentials.get_mut(s))
                .and_then(|seq| seq.verticals.get_mut(v))
            {
                let failed = blocks.iter().any(|b| matches!(b, Block::Failed(_)));
                progress.vertical_extracted(&vertical.display_name, failed);
                vertical.blocks = blocks;
            }
        })
        .await?;

        let stats = course.stats();
        info!(
            chapters = stats.chapters,
            sequentials = stats.sequentials,
            verticals = stats.verticals,
            blocks = stats.blocks,
            "course resolved"
        );
        Ok(course)
    }

    fn read_root(&self, root: &Path) -> Result<CourseRecord> {
        if !root.is_dir() {
            return Err(CourseError::index(root, "course root is not a directory"));
        }
        if self.store.read::<CourseRecord>(root)?.is_none() {
            return Err(CourseError::index(root, "course root has no index.yaml"));
        }
        let fallback = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (record, _) = self.store.get_or_assign::<CourseRecord>(root, &fallback)?;
        Ok(record)
    }
}

/// Fail with one aggregated error if any vertical holds a sentinel block.
pub fn check_extraction(course: &Course) -> Result<()> {
    let failures: Vec<&str> = course.verticals().filter_map(Vertical::failure).collect();
    if failures.is_empty() {
        return Ok(());
    }
    Err(CourseError::ContentExtractionFailed {
        message: format!(
            "{} of {} verticals failed:\n{}",
            failures.len(),
            course.stats().verticals,
            failures.join("\n")
        ),
    })
}

fn is_pruned(entry: &DirEntry, options: &ResolveOptions) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    options.is_ignored(&name) || name.starts_with('.') || name.ends_with(".repl")
}

/// A vertical's subtree belongs to its blocks, except that a `NN_Name`
/// directory in it would be a fourth hierarchy level.
fn reject_nested_hierarchy(dir: &Path, options: &ResolveOptions) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| CourseError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| CourseError::io(dir, e))?;
        let is_dir = entry
            .file_type()
            .map_err(|e| CourseError::io(entry.path(), e))?
            .is_dir();
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_dir
            && is_hierarchy_name(&name)
            && !name.ends_with(".repl")
            && !options.is_ignored(&name)
        {
            return Err(CourseError::InvalidDepth { path: entry.path() });
        }
    }
    Ok(())
}

fn relative_dir(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn walk_error(err: walkdir::Error) -> CourseError {
    let path = err.path().map(Path::to_path_buf).unwrap_or_else(PathBuf::new);
    let source = err
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
    CourseError::io(path, source)
}
