//! [`Course`] → OLX archive.

use std::path::Path;

use tracing::{info, instrument, warn};

use courseforge_convert::TextConverter;
use courseforge_shared::{
    AssessmentBlock, Block, Chapter, Course, CourseError, NarrativeBlock, Result, Sequential,
    Vertical,
};

use crate::atomic::write_atomic;

use super::tree::{self, Element};
use super::{COURSE_ATTRS, COURSE_FILE, checked_url_name};

/// Write `course` under `root`, which must already exist. Returns the
/// number of files written.
#[instrument(skip_all, fields(root = %root.display(), course = %course.meta.url_name))]
pub fn write_course(course: &Course, root: &Path, converter: &dyn TextConverter) -> Result<usize> {
    let mut writer = ArchiveWriter {
        root,
        converter,
        written: 0,
    };
    let meta = &course.meta;
    let url_name = checked_url_name(&meta.url_name)?;

    writer.write(
        Path::new(COURSE_FILE),
        &Element::new("course")
            .with_attr("url_name", url_name)
            .with_attr("org", &meta.org)
            .with_attr("course", &meta.course),
    )?;

    let mut full = Element::new("course")
        .with_attr("display_name", &meta.display_name)
        .with_attr("language", &meta.language)
        .with_attr("course_image", &meta.course_image);
    for (key, value) in &meta.extra {
        if COURSE_ATTRS.contains(&key.as_str()) {
            continue;
        }
        if let Some(value) = scalar(value) {
            full = full.with_attr(key, &value);
        }
    }
    for chapter in &course.chapters {
        full.push(writer.chapter(chapter)?);
    }
    writer.write_definition("course", url_name, &full)?;

    info!(files = writer.written, "OLX course written");
    Ok(writer.written)
}

struct ArchiveWriter<'a> {
    root: &'a Path,
    converter: &'a dyn TextConverter,
    written: usize,
}

impl ArchiveWriter<'_> {
    /// Writes the chapter definition and returns its pointer.
    fn chapter(&mut self, chapter: &Chapter) -> Result<Element> {
        let mut el = Element::new("chapter").with_attr("display_name", &chapter.display_name);
        for sequential in &chapter.sequentials {
            el.push(self.sequential(sequential)?);
        }
        self.write_definition("chapter", &chapter.url_name, &el)
    }

    fn sequential(&mut self, sequential: &Sequential) -> Result<Element> {
        let mut el = Element::new("sequential")
            .with_attr("display_name", &sequential.display_name)
            .with_attr("graded", if sequential.graded { "true" } else { "false" })
            .with_attr("format", &sequential.format);
        for vertical in &sequential.verticals {
            el.push(self.vertical(vertical)?);
        }
        self.write_definition("sequential", &sequential.url_name, &el)
    }

    fn vertical(&mut self, vertical: &Vertical) -> Result<Element> {
        if let Some(message) = vertical.failure() {
            return Err(CourseError::Export(format!(
                "vertical {} failed extraction: {message}",
                vertical.url_name
            )));
        }
        let mut el = Element::new("vertical").with_attr("display_name", &vertical.display_name);
        for block in &vertical.blocks {
            match block {
                Block::Narrative(b) => el.push(self.html(b)?),
                Block::Assessment(b) => el.push(self.problem(b)?),
                Block::EmbeddedEditor(b) => {
                    warn!(vertical = %vertical.url_name, block = %b.display_name, "embedded editors have no OLX form; skipped");
                }
                Block::Failed(_) => {}
            }
        }
        self.write_definition("vertical", &vertical.url_name, &el)
    }

    fn html(&mut self, block: &NarrativeBlock) -> Result<Element> {
        let url_name = checked_url_name(&block.url_name)?;
        let html = self.converter.make_html(&block.markdown)?;
        self.write_raw(&Path::new("html").join(format!("{url_name}.html")), &html)?;

        let el = Element::new("html")
            .with_attr("filename", url_name)
            .with_attr("display_name", &block.display_name);
        self.write_definition("html", url_name, &el)
    }

    fn problem(&mut self, block: &AssessmentBlock) -> Result<Element> {
        if block.markdown.trim().is_empty() {
            return Err(CourseError::Export(format!(
                "problem {} has no markdown source",
                block.url_name
            )));
        }
        let olx = self.converter.make_olx(&block.markdown)?;
        let mut el = tree::parse(&olx, &format!("OLX for problem {}", block.url_name))?;
        if el.name != "problem" {
            return Err(CourseError::Export(format!(
                "converter returned <{}> instead of <problem> for {}",
                el.name, block.url_name
            )));
        }
        el.set_attr("display_name", block.display_name.as_str());
        el.set_attr("markdown", block.markdown.as_str());
        self.write_definition("problem", &block.url_name, &el)
    }

    /// Write `el` to `<kind>/<url_name>.xml` and return the pointer to it.
    fn write_definition(&mut self, kind: &str, url_name: &str, el: &Element) -> Result<Element> {
        let url_name = checked_url_name(url_name)?;
        self.write(&Path::new(kind).join(format!("{url_name}.xml")), el)?;
        Ok(Element::new(kind).with_attr("url_name", url_name))
    }

    fn write(&mut self, rel: &Path, el: &Element) -> Result<()> {
        self.write_raw(rel, &format!("{}\n", el.to_xml()))
    }

    fn write_raw(&mut self, rel: &Path, contents: &str) -> Result<()> {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CourseError::io(parent, e))?;
        }
        write_atomic(&path, contents)?;
        self.written += 1;
        Ok(())
    }
}

/// String form of a scalar metadata value; sequences and maps have no
/// attribute form.
fn scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
