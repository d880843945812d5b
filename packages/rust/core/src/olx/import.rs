//! OLX archive → [`Course`].

use std::path::Path;

use tracing::{debug, info, instrument};

use courseforge_convert::{TextConverter, parse_problem};
use courseforge_shared::{
    AssessmentBlock, Block, Chapter, Course, CourseError, CourseMeta, NarrativeBlock, Result,
    Sequential, Vertical, new_id,
};

use super::tree::{self, Element};
use super::{COURSE_ATTRS, COURSE_FILE, checked_url_name};

/// Read the archive rooted at `root`.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn read_course(root: &Path, converter: &dyn TextConverter) -> Result<Course> {
    let pointer = read_element(root, Path::new(COURSE_FILE))?;
    expect_name(&pointer, "course", COURSE_FILE)?;
    let url_name = pointer.attr_or_empty("url_name").to_string();
    if url_name.is_empty() {
        return Err(CourseError::parse(format!("{COURSE_FILE} has no url_name")));
    }

    let mut full = definition(root, &pointer)?;
    for key in ["org", "course"] {
        let value = pointer.attr_or_empty(key);
        if !value.is_empty() {
            full.set_attr(key, value);
        }
    }

    let meta = CourseMeta {
        display_name: non_empty(full.attr_or_empty("display_name"), &url_name),
        org: full.attr_or_empty("org").to_string(),
        course: full.attr_or_empty("course").to_string(),
        course_image: full.attr_or_empty("course_image").to_string(),
        language: full.attr_or_empty("language").to_string(),
        extra: full
            .attrs
            .iter()
            .filter(|(k, _)| !COURSE_ATTRS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), serde_yaml::Value::String(v.clone())))
            .collect(),
        url_name,
        ..Default::default()
    };

    let chapters = children(&full, "chapter")
        .enumerate()
        .map(|(index, el)| read_chapter(root, el, index, converter))
        .collect::<Result<Vec<_>>>()?;

    let course = Course { meta, chapters };
    let stats = course.stats();
    info!(
        chapters = stats.chapters,
        verticals = stats.verticals,
        blocks = stats.blocks,
        "OLX course read"
    );
    Ok(course)
}

fn read_chapter(
    root: &Path,
    pointer: &Element,
    index: usize,
    converter: &dyn TextConverter,
) -> Result<Chapter> {
    let el = definition(root, pointer)?;
    let (url_name, display_name) = identity(&el)?;
    let sequentials = children(&el, "sequential")
        .enumerate()
        .map(|(i, s)| read_sequential(root, s, i, converter))
        .collect::<Result<Vec<_>>>()?;
    Ok(Chapter {
        url_name,
        display_name,
        index,
        sequentials,
    })
}

fn read_sequential(
    root: &Path,
    pointer: &Element,
    index: usize,
    converter: &dyn TextConverter,
) -> Result<Sequential> {
    let el = definition(root, pointer)?;
    let (url_name, display_name) = identity(&el)?;
    let verticals = children(&el, "vertical")
        .enumerate()
        .map(|(i, v)| read_vertical(root, v, i, converter))
        .collect::<Result<Vec<_>>>()?;
    Ok(Sequential {
        url_name,
        display_name,
        index,
        graded: el.attr_or_empty("graded").eq_ignore_ascii_case("true"),
        format: el.attr_or_empty("format").to_string(),
        verticals,
    })
}

fn read_vertical(
    root: &Path,
    pointer: &Element,
    index: usize,
    converter: &dyn TextConverter,
) -> Result<Vertical> {
    let el = definition(root, pointer)?;
    let (url_name, display_name) = identity(&el)?;
    let fs_path = format!("vertical/{url_name}.xml");

    let mut blocks = Vec::new();
    for child in el.elements() {
        blocks.push(read_block(root, child, &fs_path, converter)?);
    }
    debug!(vertical = %url_name, blocks = blocks.len(), "read OLX vertical");

    Ok(Vertical {
        url_name,
        display_name,
        index,
        fs_path,
        blocks,
        ..Default::default()
    })
}

fn read_block(
    root: &Path,
    pointer: &Element,
    vertical_path: &str,
    converter: &dyn TextConverter,
) -> Result<Block> {
    let el = definition(root, pointer)?;
    let url_name = match el.attr("url_name") {
        Some(u) if !u.is_empty() => checked_url_name(u)?.to_string(),
        _ => new_id(),
    };
    let display_name = non_empty(el.attr_or_empty("display_name"), &url_name);

    match el.name.as_str() {
        "html" => {
            let (html, fs_path) = html_source(root, &el, vertical_path)?;
            Ok(Block::Narrative(NarrativeBlock {
                markdown: converter.make_md(&html)?,
                url_name,
                display_name,
                fs_path,
            }))
        }
        "problem" => {
            let problem = parse_problem(&el.to_xml(), converter)?;
            Ok(Block::Assessment(AssessmentBlock {
                fs_path: format!("problem/{url_name}.xml"),
                markdown: el.attr_or_empty("markdown").to_string(),
                url_name,
                display_name,
                problem,
                repl: None,
            }))
        }
        other => Err(CourseError::parse(format!(
            "unsupported OLX block <{other}> in {vertical_path}"
        ))),
    }
}

/// HTML of an `html` block: the file named by `filename` when present,
/// otherwise the element's inline content.
fn html_source(root: &Path, el: &Element, vertical_path: &str) -> Result<(String, String)> {
    let filename = el.attr_or_empty("filename");
    if !filename.is_empty() {
        let stem = checked_url_name(filename.strip_suffix(".html").unwrap_or(filename))?;
        let rel = format!("html/{stem}.html");
        let path = root.join(&rel);
        if path.is_file() {
            let html = std::fs::read_to_string(&path).map_err(|e| CourseError::io(&path, e))?;
            return Ok((html, rel));
        }
    }
    Ok((el.inner_xml(), vertical_path.to_string()))
}

/// Follow a pointer element (`<chapter url_name="x"/>`) to its definition
/// file (`chapter/x.xml`). Elements without a definition file are their own
/// definition.
fn definition(root: &Path, el: &Element) -> Result<Element> {
    let url_name = el.attr_or_empty("url_name");
    if url_name.is_empty() {
        return Ok(el.clone());
    }
    let rel = Path::new(&el.name).join(format!("{}.xml", checked_url_name(url_name)?));
    if !root.join(&rel).is_file() {
        return Ok(el.clone());
    }
    let mut full = read_element(root, &rel)?;
    expect_name(&full, &el.name, &rel.display().to_string())?;
    full.set_attr("url_name", url_name);
    Ok(full)
}

fn read_element(root: &Path, rel: &Path) -> Result<Element> {
    let path = root.join(rel);
    let xml = std::fs::read_to_string(&path).map_err(|e| CourseError::io(&path, e))?;
    tree::parse(&xml, &rel.display().to_string())
}

fn expect_name(el: &Element, name: &str, origin: &str) -> Result<()> {
    if el.name == name {
        Ok(())
    } else {
        Err(CourseError::parse(format!(
            "{origin}: expected <{name}>, found <{}>",
            el.name
        )))
    }
}

/// `url_name` (assigned when missing) and the required `display_name`.
fn identity(el: &Element) -> Result<(String, String)> {
    let url_name = match el.attr("url_name") {
        Some(u) if !u.is_empty() => checked_url_name(u)?.to_string(),
        _ => new_id(),
    };
    let display_name = el.attr_or_empty("display_name");
    if display_name.is_empty() {
        return Err(CourseError::parse(format!(
            "invalid {} {url_name}: missing display_name",
            el.name
        )));
    }
    Ok((url_name, display_name.to_string()))
}

fn children<'a>(el: &'a Element, name: &'a str) -> impl Iterator<Item = &'a Element> {
    el.elements().filter(move |c| c.name == name)
}

fn non_empty(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}
