//! Atomic file replacement.

use std::path::Path;

use courseforge_shared::{CourseError, Result};

/// Write `contents` to a temporary sibling of `target`, then rename it into place.
pub(crate) fn write_atomic(target: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| CourseError::Export(format!("invalid file path {}", target.display())))?;
    let temp = target.with_file_name(format!(".{name}.tmp"));
    std::fs::write(&temp, contents).map_err(|e| CourseError::io(&temp, e))?;
    std::fs::rename(&temp, target).map_err(|e| CourseError::io(target, e))
}
