//! Location arguments: bare paths or `file://` URIs.

use std::path::PathBuf;

use url::Url;

use courseforge_shared::{CourseError, Result};

/// Turn a location argument into an absolute path.
pub fn resolve_uri(uri: &str) -> Result<PathBuf> {
    let uri = uri.trim();
    if uri.is_empty() {
        return Err(CourseError::validation("empty location"));
    }

    let path = if uri.contains("://") {
        let url = Url::parse(uri)
            .map_err(|e| CourseError::validation(format!("invalid URI '{uri}': {e}")))?;
        if url.scheme() != "file" {
            return Err(CourseError::validation(format!(
                "unsupported URI scheme '{}' in '{uri}' (only file:// is supported)",
                url.scheme()
            )));
        }
        url.to_file_path()
            .map_err(|()| CourseError::validation(format!("'{uri}' is not a local file URI")))?
    } else {
        PathBuf::from(uri)
    };

    std::path::absolute(&path).map_err(|e| CourseError::io(path, e))
}
