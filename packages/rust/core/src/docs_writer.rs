//! JSON directory sink for a [`DocumentSet`].
//!
//! Layout:
//! ```text
//! <root>/
//! ├── course.json
//! ├── exams/<id>.json
//! ├── questions/<id>.json
//! ├── versioned_contents/<id>.json
//! └── search/<index name>.json
//! ```
//! Every file is written to a temporary sibling first and renamed into place.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, instrument};

use courseforge_documents::DocumentSet;
use courseforge_shared::{CourseError, Result};

use crate::atomic::write_atomic;

/// Write `set` under `root`. An existing `root` is replaced only when `force` is set.
/// Returns the number of files written.
#[instrument(skip_all, fields(root = %root.display(), course = %set.course.id))]
pub fn write_document_set(set: &DocumentSet, root: &Path, index_name: &str, force: bool) -> Result<usize> {
    if root.exists() {
        if !force {
            return Err(CourseError::Export(format!(
                "target {} already exists (pass --force to replace it)",
                root.display()
            )));
        }
        std::fs::remove_dir_all(root).map_err(|e| CourseError::io(root, e))?;
    }
    for dir in ["exams", "questions", "versioned_contents", "search"] {
        let dir = root.join(dir);
        std::fs::create_dir_all(&dir).map_err(|e| CourseError::io(&dir, e))?;
    }

    let mut written = 0;
    write_json(root, "course.json", &set.course)?;
    written += 1;
    for exam in &set.exams {
        write_json(&root.join("exams"), &file_name(&exam.id)?, exam)?;
        written += 1;
    }
    for question in &set.questions {
        write_json(&root.join("questions"), &file_name(&question.id)?, question)?;
        written += 1;
    }
    for content in &set.versioned_contents {
        write_json(&root.join("versioned_contents"), &file_name(&content.id)?, content)?;
        written += 1;
    }
    write_json(&root.join("search"), &file_name(index_name)?, &set.search_docs)?;
    written += 1;

    info!(files = written, "document set written");
    Ok(written)
}

/// Identifiers come from user-editable index files; keep them inside their directory.
fn file_name(id: &str) -> Result<String> {
    if id.is_empty() || id.starts_with('.') || id.contains(['/', '\\']) {
        return Err(CourseError::validation(format!(
            "identifier '{id}' cannot be used as a file name"
        )));
    }
    Ok(format!("{id}.json"))
}

/// Write a pretty-printed JSON file atomically.
fn write_json<T: Serialize>(dir: &Path, name: &str, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| CourseError::validation(format!("JSON serialization failed: {e}")))?;

    let target = dir.join(name);
    write_atomic(&target, json)?;

    debug!(path = %target.display(), "wrote JSON file");
    Ok(())
}
