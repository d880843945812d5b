//! Directory naming rules: `NN_Display Name`.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use courseforge_shared::{CourseError, PrefixPolicy, Result};

static PREFIXED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)_(.+)$").expect("valid regex"));

/// Split a hierarchy directory name into its numeric prefix and display name.
pub fn parse_prefixed(path: &Path, name: &str) -> Result<(u32, String)> {
    let caps = PREFIXED_RE
        .captures(name)
        .ok_or_else(|| CourseError::naming(path, "name must take the form `02_Display Name`"))?;
    let index = caps[1]
        .parse::<u32>()
        .map_err(|e| CourseError::naming(path, format!("numeric prefix out of range: {e}")))?;
    Ok((index, caps[2].to_string()))
}

/// Whether `name` looks like a hierarchy directory.
pub fn is_hierarchy_name(name: &str) -> bool {
    PREFIXED_RE.is_match(name)
}

/// Directory name for an entity at 0-based `index`.
pub fn prefixed_name(index: usize, display: &str) -> String {
    format!("{index:02}_{}", sanitize(display))
}

/// Block file stem: the file name up to the first `.`, without its `NN_` prefix.
pub fn block_display_name(file_name: &str) -> String {
    let stem = file_name.split('.').next().unwrap_or(file_name);
    match PREFIXED_RE.captures(stem) {
        Some(caps) => caps[2].to_string(),
        None => stem.to_string(),
    }
}

/// Apply the prefix policy to an entity found at 0-based `position`.
pub fn check_position(policy: PrefixPolicy, path: &Path, prefix: u32, position: usize) -> Result<()> {
    match policy {
        PrefixPolicy::Hint => Ok(()),
        PrefixPolicy::Strict if prefix as usize == position => Ok(()),
        PrefixPolicy::Strict => Err(CourseError::naming(
            path,
            format!("prefix {prefix:02} does not match position {position:02} (reordered or gap)"),
        )),
    }
}

/// Make a display name safe to use as a single path component.
fn sanitize(display: &str) -> String {
    display
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '-',
            c => c,
        })
        .collect()
}
