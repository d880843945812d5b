//! Block classification and extraction for a single vertical directory.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

use courseforge_convert::{TextConverter, parse_problem};
use courseforge_shared::{
    AssessmentBlock, AttachedRepl, Block, CourseError, EditorBlock, FailedBlock, NarrativeBlock,
    ProblemKind, Result, new_id, parse_shebang,
};

use crate::naming::block_display_name;
use crate::repl::load_repl;

/// What a file inside a vertical becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockFile {
    Assessment,
    Narrative,
    EmbeddedEditor,
}

/// Classify a file by its suffix; `None` means the file is not a block.
pub fn classify(file_name: &str) -> Option<BlockFile> {
    if file_name.ends_with(".prob.md") {
        Some(BlockFile::Assessment)
    } else if file_name.ends_with(".md") {
        Some(BlockFile::Narrative)
    } else if file_name.ends_with(".repl.yaml") && !file_name.ends_with(".prob.repl.yaml") {
        Some(BlockFile::EmbeddedEditor)
    } else {
        None
    }
}

/// One vertical's worth of extraction work.
#[derive(Debug, Clone)]
pub struct VerticalJob {
    /// Absolute vertical directory.
    pub dir: PathBuf,
    /// Directory relative to the course root, `/`-separated.
    pub rel_dir: String,
    /// Display name and identifier, for messages.
    pub label: String,
}

/// Extract a vertical's blocks, folding any failure into one sentinel block.
pub fn extract_or_sentinel(
    job: &VerticalJob,
    converter: &dyn TextConverter,
    sort_blocks: bool,
) -> Vec<Block> {
    match extract_blocks(&job.dir, &job.rel_dir, converter, sort_blocks) {
        Ok(blocks) => blocks,
        Err(e) => {
            warn!(vertical = %job.label, error = %e, "vertical extraction failed");
            vec![Block::Failed(FailedBlock {
                message: format!("{} at {}: {e}", job.label, job.rel_dir),
            })]
        }
    }
}

/// Extract the blocks of the vertical at `dir`.
#[instrument(skip_all, fields(vertical = %rel_dir))]
pub fn extract_blocks(
    dir: &Path,
    rel_dir: &str,
    converter: &dyn TextConverter,
    sort_blocks: bool,
) -> Result<Vec<Block>> {
    let mut names = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|e| CourseError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| CourseError::io(dir, e))?;
        let is_file = entry
            .file_type()
            .map_err(|e| CourseError::io(entry.path(), e))?
            .is_file();
        if is_file {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    if sort_blocks {
        names.sort();
    }

    let mut blocks = Vec::new();
    for name in names {
        let Some(kind) = classify(&name) else {
            continue;
        };
        let fs_path = format!("{rel_dir}/{name}");
        let block = extract_block(kind, dir, &name, &fs_path, converter).map_err(|e| {
            CourseError::Extraction {
                path: PathBuf::from(&fs_path),
                message: e.to_string(),
            }
        })?;
        blocks.push(block);
    }

    debug!(blocks = blocks.len(), "extracted vertical");
    Ok(blocks)
}

fn extract_block(
    kind: BlockFile,
    dir: &Path,
    name: &str,
    fs_path: &str,
    converter: &dyn TextConverter,
) -> Result<Block> {
    let path = dir.join(name);
    let display_name = block_display_name(name);

    match kind {
        BlockFile::Narrative => {
            let markdown = read(&path)?;
            Ok(Block::Narrative(NarrativeBlock {
                url_name: new_id(),
                display_name,
                fs_path: fs_path.to_string(),
                markdown,
            }))
        }
        BlockFile::Assessment => {
            let markdown = read(&path)?;
            let olx = converter.make_olx(&markdown)?;
            let problem = parse_problem(&olx, converter)?;

            let repl = match &problem.kind {
                ProblemKind::FreeResponse { answer } if answer.starts_with("#!") => {
                    let rel = parse_shebang(answer).ok_or_else(|| {
                        CourseError::parse(format!("invalid REPL shebang {answer:?}"))
                    })?;
                    let config = load_repl(&dir.join(&rel))?;
                    Some(AttachedRepl { path: rel, config })
                }
                _ => None,
            };

            Ok(Block::Assessment(AssessmentBlock {
                url_name: new_id(),
                display_name,
                fs_path: fs_path.to_string(),
                markdown,
                problem,
                repl,
            }))
        }
        BlockFile::EmbeddedEditor => Ok(Block::EmbeddedEditor(EditorBlock {
            url_name: new_id(),
            display_name,
            fs_path: fs_path.to_string(),
            repl: load_repl(&path)?,
        })),
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| CourseError::io(path, e))
}
