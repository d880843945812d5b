//! Single-file markdown rendering of a course.

use std::fmt::Write as _;
use std::path::Path;

use tracing::{info, instrument};

use courseforge_shared::{Block, Course, CourseError, Result};

use crate::atomic::write_atomic;

/// File name written inside the target directory.
pub const BOOK_FILE: &str = "book.md";

/// Render the course as one markdown document: a heading per chapter,
/// sequential and vertical, followed by the vertical's narrative blocks.
pub fn render_book(course: &Course) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", course.meta.display_name);
    if !course.meta.description.is_empty() {
        let _ = writeln!(out, "{}\n", course.meta.description.trim());
    }

    for chapter in &course.chapters {
        let _ = writeln!(out, "## {}\n", chapter.display_name);
        for sequential in &chapter.sequentials {
            let _ = writeln!(out, "### {}\n", sequential.display_name);
            for vertical in &sequential.verticals {
                let _ = writeln!(out, "#### {}\n", vertical.display_name);
                for block in &vertical.blocks {
                    if let Block::Narrative(n) = block {
                        let _ = writeln!(out, "{}\n", n.markdown.trim_end());
                    }
                }
            }
        }
    }
    out
}

/// Write `book.md` into `dir`. An existing book is replaced only when `force` is set.
#[instrument(skip_all, fields(dir = %dir.display(), course = %course.meta.url_name))]
pub fn write_book(course: &Course, dir: &Path, force: bool) -> Result<()> {
    let target = dir.join(BOOK_FILE);
    if target.exists() && !force {
        return Err(CourseError::Export(format!(
            "target {} already exists (pass --force to replace it)",
            target.display()
        )));
    }
    std::fs::create_dir_all(dir).map_err(|e| CourseError::io(dir, e))?;

    let book = render_book(course);
    write_atomic(&target, &book)?;

    info!(bytes = book.len(), "book written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use courseforge_shared::{
        Chapter, CourseMeta, FailedBlock, NarrativeBlock, Sequential, Vertical,
    };

    fn course() -> Course {
        let text = |md: &str| {
            Block::Narrative(NarrativeBlock {
                url_name: "b".into(),
                display_name: "t".into(),
                fs_path: "t.md".into(),
                markdown: md.into(),
            })
        };
        Course {
            meta: CourseMeta {
                display_name: "Python".into(),
                description: "Learn Python.".into(),
                ..Default::default()
            },
            chapters: vec![Chapter {
                display_name: "Intro".into(),
                sequentials: vec![Sequential {
                    display_name: "Setup".into(),
                    verticals: vec![Vertical {
                        display_name: "Install".into(),
                        blocks: vec![
                            text("Download it.\n"),
                            Block::Failed(FailedBlock {
                                message: "ignored".into(),
                            }),
                            text("Run it."),
                        ],
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }],
        }
    }

    #[test]
    fn renders_headings_and_narrative() {
        let book = render_book(&course());
        assert_eq!(
            book,
            "# Python\n\nLearn Python.\n\n## Intro\n\n### Setup\n\n#### Install\n\nDownload it.\n\nRun it.\n\n"
        );
    }

    #[test]
    fn write_respects_force() {
        let dir = tempfile::tempdir().unwrap();
        write_book(&course(), dir.path(), false).unwrap();
        assert!(write_book(&course(), dir.path(), false).is_err());
        write_book(&course(), dir.path(), true).unwrap();
        let written = std::fs::read_to_string(dir.path().join(BOOK_FILE)).unwrap();
        assert!(written.starts_with("# Python"));
    }
}
