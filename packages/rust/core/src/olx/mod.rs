//! OLX course archives, the Open edX export layout.
//!
//! ```text
//! <root>/
//! ├── course.xml                   <course url_name org course/>
//! ├── course/<url_name>.xml        display name, language, chapter pointers
//! ├── chapter/<url_name>.xml       sequential pointers
//! ├── sequential/<url_name>.xml    graded, format, vertical pointers
//! ├── vertical/<url_name>.xml      block pointers
//! ├── html/<url_name>.{xml,html}   narrative blocks
//! └── problem/<url_name>.xml       problems, with their markdown source
//! ```
//!
//! Reading also accepts definitions inlined into their parent element, as in
//! a single-file `course.xml`. Only `html` and `problem` blocks have an IR
//! counterpart; embedded editors are skipped on the way out.
//!
//! Conversion-service calls are blocking, so both directions run on the
//! blocking thread pool.

mod export;
mod import;
mod tree;

use std::path::Path;
use std::sync::Arc;

use courseforge_convert::TextConverter;
use courseforge_shared::{Course, CourseError, Result};

pub use export::write_course;
pub use import::read_course;

/// Root file of every archive.
pub const COURSE_FILE: &str = "course.xml";

/// Course attributes mapped onto [`CourseMeta`](courseforge_shared::CourseMeta)
/// fields; any other attribute is carried in its `extra` map.
const COURSE_ATTRS: [&str; 6] = [
    "url_name",
    "display_name",
    "org",
    "course",
    "course_image",
    "language",
];

/// Read the archive at `root`.
pub async fn import_olx(root: &Path, converter: Arc<dyn TextConverter>) -> Result<Course> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || read_course(&root, converter.as_ref()))
        .await
        .map_err(|e| CourseError::parse(format!("OLX import task failed: {e}")))?
}

/// Write `course` as an archive at `root`. An existing `root` is replaced
/// only when `force` is set. Returns the number of files written.
pub async fn export_olx(
    course: &Course,
    root: &Path,
    converter: Arc<dyn TextConverter>,
    force: bool,
) -> Result<usize> {
    if root.exists() {
        if !force {
            return Err(CourseError::Export(format!(
                "target {} already exists (pass --force to replace it)",
                root.display()
            )));
        }
        tokio::fs::remove_dir_all(root)
            .await
            .map_err(|e| CourseError::io(root, e))?;
    }
    tokio::fs::create_dir_all(root)
        .await
        .map_err(|e| CourseError::io(root, e))?;

    let course = course.clone();
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || write_course(&course, &root, converter.as_ref()))
        .await
        .map_err(|e| CourseError::Export(format!("OLX export task failed: {e}")))?
}

/// `url_name`s become file names; keep them inside their directory.
fn checked_url_name(url_name: &str) -> Result<&str> {
    if url_name.is_empty() || url_name.starts_with('.') || url_name.contains(['/', '\\']) {
        return Err(CourseError::validation(format!(
            "url_name '{url_name}' cannot be used as a file name"
        )));
    }
    Ok(url_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use courseforge_convert::{MemoryConverter, parse_problem};
    use courseforge_shared::{
        AssessmentBlock, Block, Chapter, CourseMeta, EditorBlock, NarrativeBlock, ProblemKind,
        ReplConfig, Sequential, Vertical,
    };

    const QUIZ_MD: &str = "Pick\n\n( ) A\n(x) B\n";
    const QUIZ_OLX: &str = r#"<problem><multiplechoiceresponse><label>Pick</label><choicegroup><choice correct="false">A</choice><choice correct="true">B</choice></choicegroup></multiplechoiceresponse></problem>"#;

    fn converter() -> Arc<dyn TextConverter> {
        Arc::new(MemoryConverter::new().with_olx(QUIZ_MD, QUIZ_OLX))
    }

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn sample_course() -> Course {
        let conv = MemoryConverter::new();
        Course {
            meta: CourseMeta {
                url_name: "rust101".into(),
                display_name: "Rust".into(),
                org: "acme".into(),
                language: "en".into(),
                ..Default::default()
            },
            chapters: vec![Chapter {
                url_name: "ch1".into(),
                display_name: "Basics".into(),
                index: 0,
                sequentials: vec![Sequential {
                    url_name: "s1".into(),
                    display_name: "Final".into(),
                    graded: true,
                    format: "Final Exam".into(),
                    verticals: vec![Vertical {
                        url_name: "v1".into(),
                        display_name: "Hello".into(),
                        blocks: vec![
                            Block::Narrative(NarrativeBlock {
                                url_name: "b1".into(),
                                display_name: "intro".into(),
                                fs_path: "00_Basics/00_Final/00_Hello/intro.md".into(),
                                markdown: "# Hello & welcome\n".into(),
                            }),
                            Block::Assessment(AssessmentBlock {
                                url_name: "b2".into(),
                                display_name: "quiz".into(),
                                fs_path: "00_Basics/00_Final/00_Hello/quiz.prob.md".into(),
                                markdown: QUIZ_MD.into(),
                                problem: parse_problem(QUIZ_OLX, &conv).unwrap(),
                                repl: None,
                            }),
                            Block::EmbeddedEditor(EditorBlock {
                                url_name: "b3".into(),
                                display_name: "editor".into(),
                                fs_path: "00_Basics/00_Final/00_Hello/editor.repl.yaml".into(),
                                repl: ReplConfig::default(),
                            }),
                        ],
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
            }],
        }
    }

    #[test]
    fn reads_single_file_archive() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            COURSE_FILE,
            r#"<course url_name="py101" org="acme" course="PY101" display_name="Python" language="en" license="cc-by">
  <chapter url_name="ch1" display_name="Basics">
    <sequential url_name="s1" display_name="Intro" graded="false">
      <vertical url_name="v1" display_name="Hello">
        <html url_name="h1" display_name="Welcome"><p>Hi <b>there</b></p></html>
        <problem url_name="p1" markdown="Pick&#10;&#10;( ) A&#10;(x) B&#10;"><multiplechoiceresponse><label>Pick</label><choicegroup><choice correct="false">A</choice><choice correct="true">B</choice></choicegroup></multiplechoiceresponse></problem>
      </vertical>
    </sequential>
    <sequential url_name="s2" display_name="Final" graded="True" format="Final Exam"/>
  </chapter>
</course>"#,
        );

        let course = read_course(dir.path(), &MemoryConverter::new()).unwrap();
        assert_eq!(course.meta.url_name, "py101");
        assert_eq!(course.meta.display_name, "Python");
        assert_eq!(course.meta.course, "PY101");
        assert!(course.meta.extra.contains_key("license"));
        assert!(!course.meta.extra.contains_key("org"));

        let chapter = &course.chapters[0];
        assert_eq!(chapter.sequentials.len(), 2);
        assert!(!chapter.sequentials[0].is_final_exam());
        assert!(chapter.sequentials[1].is_final_exam());
        assert_eq!(chapter.sequentials[1].index, 1);

        let vertical = &chapter.sequentials[0].verticals[0];
        let Block::Narrative(html) = &vertical.blocks[0] else {
            panic!("expected narrative block");
        };
        assert_eq!(html.markdown, "<p>Hi <b>there</b></p>");
        assert_eq!(html.display_name, "Welcome");
        let Block::Assessment(problem) = &vertical.blocks[1] else {
            panic!("expected assessment block");
        };
        assert_eq!(problem.markdown, QUIZ_MD);
        assert_eq!(problem.display_name, "p1");
        let ProblemKind::SingleChoice(choices) = &problem.problem.kind else {
            panic!("expected single choice");
        };
        assert!(choices[1].correct);
    }

    #[test]
    fn follows_pointers_to_definition_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, COURSE_FILE, r#"<course url_name="c" org="o"/>"#);
        write(root, "course/c.xml", r#"<course display_name="C" org="ignored"><chapter url_name="ch"/></course>"#);
        write(root, "chapter/ch.xml", r#"<chapter display_name="Ch"><sequential url_name="s"/></chapter>"#);
        write(root, "sequential/s.xml", r#"<sequential display_name="S"><vertical url_name="v"/></sequential>"#);
        write(root, "vertical/v.xml", r#"<vertical display_name="V"><html url_name="h"/></vertical>"#);
        write(root, "html/h.xml", r#"<html filename="h" display_name="Text"/>"#);
        write(root, "html/h.html", "<p>file body</p>");

        let course = read_course(root, &MemoryConverter::new()).unwrap();
        assert_eq!(course.meta.display_name, "C");
        assert_eq!(course.meta.org, "o");
        let vertical = &course.chapters[0].sequentials[0].verticals[0];
        assert_eq!(vertical.url_name, "v");
        assert_eq!(vertical.fs_path, "vertical/v.xml");
        let Block::Narrative(html) = &vertical.blocks[0] else {
            panic!("expected narrative block");
        };
        assert_eq!(html.markdown, "<p>file body</p>");
        assert_eq!(html.fs_path, "html/h.html");
        assert_eq!(html.display_name, "Text");
    }

    #[test]
    fn invalid_archives_are_rejected() {
        let cases = [
            (
                r#"<course url_name="c" display_name="C"><chapter url_name="ch"/></course>"#,
                "missing display_name",
            ),
            (
                r#"<course url_name="c" display_name="C"><chapter url_name="ch" display_name="Ch"><sequential url_name="s" display_name="S"><vertical url_name="v" display_name="V"><video url_name="x"/></vertical></sequential></chapter></course>"#,
                "unsupported OLX block <video>",
            ),
            (
                r#"<course url_name="c" display_name="C"><chapter url_name="../etc" display_name="Ch"/></course>"#,
                "cannot be used as a file name",
            ),
            (r#"<course display_name="C"/>"#, "has no url_name"),
            (r#"<chapter url_name="c"/>"#, "expected <course>"),
        ];
        for (xml, expected) in cases {
            let dir = tempfile::tempdir().unwrap();
            write(dir.path(), COURSE_FILE, xml);
            let err = read_course(dir.path(), &MemoryConverter::new()).unwrap_err();
            assert!(err.to_string().contains(expected), "{expected}: {err}");
        }
    }

    #[tokio::test]
    async fn export_then_import_keeps_the_course() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("olx");
        let course = sample_course();

        let written = export_olx(&course, &root, converter(), false).await.unwrap();
        // course.xml, course, chapter, sequential, vertical, html (.xml + .html), problem
        assert_eq!(written, 8);
        assert!(root.join("problem/b2.xml").is_file());
        assert!(root.join("html/b1.html").is_file());

        let back = import_olx(&root, converter()).await.unwrap();
        assert_eq!(back.meta.url_name, "rust101");
        assert_eq!(back.meta.display_name, "Rust");
        assert_eq!(back.meta.org, "acme");
        assert_eq!(back.meta.language, "en");

        let sequential = &back.chapters[0].sequentials[0];
        assert_eq!(back.chapters[0].display_name, "Basics");
        assert!(sequential.is_final_exam());
        let vertical = &sequential.verticals[0];
        assert_eq!(vertical.display_name, "Hello");
        assert_eq!(vertical.blocks.len(), 2, "editor blocks are not exported");

        let Block::Narrative(html) = &vertical.blocks[0] else {
            panic!("expected narrative block");
        };
        assert_eq!(html.markdown, "# Hello & welcome\n");
        let (Block::Assessment(original), Block::Assessment(problem)) =
            (&course.chapters[0].sequentials[0].verticals[0].blocks[1], &vertical.blocks[1])
        else {
            panic!("expected assessment blocks");
        };
        assert_eq!(problem.markdown, original.markdown);
        assert_eq!(problem.problem, original.problem);
        assert_eq!(problem.display_name, "quiz");
    }

    #[tokio::test]
    async fn export_requires_force_for_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        let course = sample_course();
        let err = export_olx(&course, dir.path(), converter(), false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
        export_olx(&course, dir.path(), converter(), true).await.unwrap();
        assert!(dir.path().join(COURSE_FILE).is_file());
    }
}
