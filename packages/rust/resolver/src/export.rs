//! Directory exporter: [`Course`] → course directory.
//!
//! Writes the same layout the resolver reads, with index files pinning every
//! identifier. Chapters are independent on the way out and are written on
//! separate blocking tasks; the export returns once all of them finish.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, instrument};

use courseforge_shared::{Block, Chapter, Course, CourseError, Result};

use crate::index::{ChapterRecord, IndexStore, SequentialRecord, VerticalRecord};
use crate::naming::prefixed_name;
use crate::repl::write_repl;

/// Export `course` to `root`. An existing `root` is replaced only when `force` is set.
#[instrument(skip_all, fields(root = %root.display(), course = %course.meta.url_name))]
pub async fn export_course(course: &Course, root: &Path, force: bool) -> Result<()> {
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

    let store = IndexStore::filesystem();
    store.write(root, &course.meta)?;

    let tasks: Vec<_> = course
        .chapters
        .iter()
        .enumerate()
        .map(|(position, chapter)| {
            let dir = root.join(prefixed_name(position, &chapter.display_name));
            let chapter = chapter.clone();
            let store = store.clone();
            tokio::task::spawn_blocking(move || write_chapter(&store, &dir, &chapter))
        })
        .collect();

    let mut first_error = None;
    for task in tasks {
        let outcome = task
            .await
            .map_err(|e| CourseError::Export(format!("chapter export task failed: {e}")))
            .and_then(|r| r);
        if let Err(e) = outcome {
            first_error.get_or_insert(e);
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }

    let stats = course.stats();
    info!(chapters = stats.chapters, verticals = stats.verticals, "course exported");
    Ok(())
}

fn write_chapter(store: &IndexStore, dir: &Path, chapter: &Chapter) -> Result<()> {
    create_dir(dir)?;
    store.write(
        dir,
        &ChapterRecord {
            url_name: chapter.url_name.clone(),
            display_name: chapter.display_name.clone(),
            ..Default::default()
        },
    )?;

    for (s, sequential) in chapter.sequentials.iter().enumerate() {
        let seq_dir = dir.join(prefixed_name(s, &sequential.display_name));
        create_dir(&seq_dir)?;
        store.write(
            &seq_dir,
            &SequentialRecord {
                url_name: sequential.url_name.clone(),
                display_name: sequential.display_name.clone(),
                graded: sequential.graded,
                format: sequential.format.clone(),
                ..Default::default()
            },
        )?;

        for (v, vertical) in sequential.verticals.iter().enumerate() {
            let vert_dir = seq_dir.join(prefixed_name(v, &vertical.display_name));
            create_dir(&vert_dir)?;
            store.write(
                &vert_dir,
                &VerticalRecord {
                    url_name: vertical.url_name.clone(),
                    display_name: vertical.display_name.clone(),
                    ..Default::default()
                },
            )?;
            for (b, block) in vertical.blocks.iter().enumerate() {
                write_block(&vert_dir, b, block).map_err(|e| {
                    CourseError::Export(format!(
                        "vertical '{}' ({}): {e}",
                        vertical.display_name, vertical.url_name
                    ))
                })?;
            }
        }
    }

    debug!(chapter = %chapter.display_name, "chapter exported");
    Ok(())
}

fn write_block(dir: &Path, position: usize, block: &Block) -> Result<()> {
    match block {
        Block::Narrative(n) => {
            write_file(&dir.join(format!("{}.md", prefixed_name(position, &n.display_name))), &n.markdown)
        }
        Block::Assessment(a) => {
            let name = format!("{}.prob.md", prefixed_name(position, &a.display_name));
            write_file(&dir.join(name), &a.markdown)?;
            if let Some(attached) = &a.repl {
                let rel = relative_inside(&attached.path)?;
                write_repl(&dir.join(rel), &attached.config)?;
            }
            Ok(())
        }
        Block::EmbeddedEditor(e) => {
            let name = format!("{}.repl.yaml", prefixed_name(position, &e.display_name));
            write_repl(&dir.join(name), &e.repl)
        }
        Block::Failed(f) => Err(CourseError::Export(format!(
            "cannot export a vertical that failed extraction: {}",
            f.message
        ))),
    }
}

/// Shebang paths must stay inside the vertical directory.
fn relative_inside(path: &str) -> Result<PathBuf> {
    let p = Path::new(path);
    let escapes = p
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        return Err(CourseError::Export(format!(
            "REPL path {path} points outside its vertical"
        )));
    }
    Ok(p.to_path_buf())
}

fn create_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| CourseError::io(dir, e))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).map_err(|e| CourseError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use courseforge_convert::{MemoryConverter, TextConverter};
    use courseforge_shared::{FailedBlock, ResolveOptions, Vertical};

    use crate::resolve::{NoProgress, Resolver};

    const CODE_MD: &str = "Add numbers\n\n= #!exl::repl('./add.prob.repl.yaml')\n";
    const CODE_OLX: &str = r##"<problem><stringresponse answer="#!exl::repl('./add.prob.repl.yaml')"><label>Add numbers</label></stringresponse></problem>"##;
    const QUIZ_MD: &str = "Pick\n\n[x] A\n[x] B\n[ ] C\n";
    const QUIZ_OLX: &str = r#"<problem><choiceresponse><label>Pick</label><checkboxgroup><choice correct="true">A</choice><choice correct="true">B</choice><choice correct="false">C</choice></checkboxgroup></choiceresponse></problem>"#;

    fn converter() -> Arc<dyn TextConverter> {
        Arc::new(
            MemoryConverter::new()
                .with_olx(CODE_MD, CODE_OLX)
                .with_olx(QUIZ_MD, QUIZ_OLX),
        )
    }

    fn write(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn source_tree(root: &Path) {
        write(
            &root.join("index.yaml"),
            "display_name: Java Basics\nlanguage: en\nrepo_url: https://github.com/acme/java\ncustom_key: kept\n",
        );
        let v = root.join("03_Intro/02_Syntax/05_Hello");
        write(&v.join("a_text.md"), "# Hello\n");
        write(&v.join("b_add.prob.md"), CODE_MD);
        write(
            &v.join("add.prob.repl.yaml"),
            "api_version: 1\nenvironment: java\nsrc_path: ./add/src\ntest_path: ./add/test\ntests:\n  unit: [mvn test]\n",
        );
        write(&v.join("add/src/Add.java"), "class Add {}\n");
        write(&v.join("add/test/AddTest.java"), "class AddTest {}\n");
        write(&v.join("c_play.repl.yaml"), "api_version: 1\nenvironment: python3\nsrc_path: ./play\n");
        write(&v.join("play/main.py"), "print('hi')\n");

        write(&root.join("03_Intro/02_Syntax/index.yaml"), "graded: true\nformat: Homework\n");
        write(&root.join("03_Intro/02_Syntax/07_Quiz/q.prob.md"), QUIZ_MD);
        write(&root.join("09_Outro/00_Wrap/00_End/end.md"), "Bye\n");
    }

    fn shape(course: &Course) -> Vec<String> {
        let mut out = Vec::new();
        for ch in &course.chapters {
            out.push(format!("C {}", ch.display_name));
            for seq in &ch.sequentials {
                out.push(format!("S {} {} {}", seq.display_name, seq.graded, seq.format));
                for v in &seq.verticals {
                    out.push(format!("V {}", v.display_name));
                    for b in &v.blocks {
                        let content = match b {
                            Block::Narrative(n) => n.markdown.clone(),
                            Block::Assessment(a) => format!(
                                "{}|{:?}|{:?}",
                                a.markdown,
                                a.problem,
                                a.repl.as_ref().map(|r| (&r.config.src_files, &r.config.test_files, &r.config.tests))
                            ),
                            Block::EmbeddedEditor(e) => format!("{:?}", e.repl.src_files),
                            Block::Failed(f) => f.message.clone(),
                        };
                        out.push(format!("B {:?} {} {}", b.kind(), b.display_name(), content));
                    }
                }
            }
        }
        out
    }

    #[tokio::test]
    async fn export_then_import_round_trips() {
        let src = tempfile::tempdir().unwrap();
        source_tree(src.path());
        let resolver = Resolver::new(converter(), ResolveOptions::default());
        let original = resolver.resolve(src.path(), &NoProgress).await.unwrap();

        let out = tempfile::tempdir().unwrap();
        let target = out.path().join("exported");
        export_course(&original, &target, false).await.unwrap();

        assert!(target.join("00_Intro/00_Syntax/00_Hello/00_a_text.md").is_file());
        assert!(target.join("00_Intro/00_Syntax/00_Hello/add.prob.repl.yaml").is_file());
        assert!(target.join("00_Intro/00_Syntax/00_Hello/02_c_play.repl/src/main.py").is_file());
        assert!(target.join("01_Outro/index.yaml").is_file());

        let reimported = resolver.resolve(&target, &NoProgress).await.unwrap();
        assert_eq!(shape(&reimported), shape(&original));
        assert_eq!(reimported.meta, original.meta);

        let ids = |c: &Course| c.verticals().map(|v| v.url_name.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&reimported), ids(&original));
    }

    #[tokio::test]
    async fn existing_target_requires_force() {
        let out = tempfile::tempdir().unwrap();
        let course = Course::default();
        std::fs::write(out.path().join("stale.txt"), "x").unwrap();

        let err = export_course(&course, out.path(), false).await.unwrap_err();
        assert!(err.to_string().contains("already exists"));

        export_course(&course, out.path(), true).await.unwrap();
        assert!(!out.path().join("stale.txt").exists());
        assert!(out.path().join("index.yaml").is_file());
    }

    #[tokio::test]
    async fn failed_vertical_aborts_export() {
        let out = tempfile::tempdir().unwrap();
        let course = Course {
            chapters: vec![Chapter {
                display_name: "A".into(),
                sequentials: vec![courseforge_shared::Sequential {
                    display_name: "S".into(),
                    verticals: vec![Vertical {
                        display_name: "Broken".into(),
                        url_name: "v1".into(),
                        blocks: vec![Block::Failed(FailedBlock {
                            message: "boom".into(),
                        })],
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        };

        let err = export_course(&course, &out.path().join("x"), false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("'Broken' (v1)"));
    }

    #[test]
    fn repl_paths_must_stay_inside() {
        assert!(relative_inside("./a.prob.repl.yaml").is_ok());
        assert!(relative_inside("../a.yaml").is_err());
        assert!(relative_inside("/etc/a.yaml").is_err());
    }
}
