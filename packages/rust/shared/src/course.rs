//! Intermediate representation of a course.
//!
//! Every import adapter produces a [`Course`] and every export adapter
//! consumes one. The tree is rebuilt from scratch on each resolution pass;
//! only identifiers persist, through the index files.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::workspace::ReplConfig;

/// Format prefix that routes a graded sequential to the exam path.
pub const FINAL_EXAM_PREFIX: &str = "Final Exam";

// ---------------------------------------------------------------------------
// Course metadata (the root index record)
// ---------------------------------------------------------------------------

/// Course-level metadata, read from and written to the root index file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseMeta {
    #[serde(default)]
    pub url_name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub org: String,
    /// Course code, e.g. `CS101`.
    #[serde(default)]
    pub course: String,
    #[serde(default)]
    pub course_image: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub primary_topic: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub skill_level: String,
    #[serde(default)]
    pub info_md: String,
    #[serde(default)]
    pub repo_url: String,
    #[serde(default)]
    pub weight: i64,
    #[serde(default)]
    pub est_minutes: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor_timekit: Option<InstructorTimekit>,

    /// Keys this tool does not interpret; preserved across write-back.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Instructor booking intervals attached to a course.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructorTimekit {
    #[serde(default)]
    pub intervals: Vec<TimekitInterval>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimekitInterval {
    #[serde(default)]
    pub credits: i64,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub duration_seconds: i64,
}

/// Accept `skill_level: 2` as well as `skill_level: "2"`.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_yaml::Value::Null) => String::new(),
        Some(serde_yaml::Value::String(s)) => s,
        Some(serde_yaml::Value::Number(n)) => n.to_string(),
        Some(serde_yaml::Value::Bool(b)) => b.to_string(),
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "expected a string or number, got {other:?}"
            )));
        }
    })
}

// ---------------------------------------------------------------------------
// Hierarchy
// ---------------------------------------------------------------------------

/// Root of the course tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Course {
    pub meta: CourseMeta,
    pub chapters: Vec<Chapter>,
}

/// A chapter; denormalizes to a unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chapter {
    pub url_name: String,
    pub display_name: String,
    /// 0-based position among its siblings.
    pub index: usize,
    pub sequentials: Vec<Sequential>,
}

/// A sequential; denormalizes to a section, or to an exam when graded as one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sequential {
    pub url_name: String,
    pub display_name: String,
    pub index: usize,
    pub graded: bool,
    pub format: String,
    pub verticals: Vec<Vertical>,
}

impl Sequential {
    /// Whether this sequential denormalizes to an exam.
    pub fn is_final_exam(&self) -> bool {
        self.graded && self.format.starts_with(FINAL_EXAM_PREFIX)
    }
}

/// A vertical; denormalizes to a card and one versioned content record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vertical {
    pub url_name: String,
    pub display_name: String,
    pub index: usize,
    /// Directory relative to the course root.
    pub fs_path: String,
    pub blocks: Vec<Block>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Vertical {
    /// The sentinel message, if this vertical failed extraction.
    pub fn failure(&self) -> Option<&str> {
        self.blocks.iter().find_map(|b| match b {
            Block::Failed(f) => Some(f.message.as_str()),
            _ => None,
        })
    }
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// A content item inside a vertical.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Narrative(NarrativeBlock),
    Assessment(AssessmentBlock),
    EmbeddedEditor(EditorBlock),
    /// Sentinel recording that the vertical's extraction failed.
    Failed(FailedBlock),
}

/// Discriminant of [`Block`], for counting and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BlockKind {
    Narrative,
    Assessment,
    EmbeddedEditor,
    Failed,
}

impl Block {
    pub fn kind(&self) -> BlockKind {
        match self {
            Block::Narrative(_) => BlockKind::Narrative,
            Block::Assessment(_) => BlockKind::Assessment,
            Block::EmbeddedEditor(_) => BlockKind::EmbeddedEditor,
            Block::Failed(_) => BlockKind::Failed,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Block::Narrative(b) => &b.display_name,
            Block::Assessment(b) => &b.display_name,
            Block::EmbeddedEditor(b) => &b.display_name,
            Block::Failed(_) => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NarrativeBlock {
    pub url_name: String,
    pub display_name: String,
    /// Path relative to the course root.
    pub fs_path: String,
    pub markdown: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentBlock {
    pub url_name: String,
    pub display_name: String,
    pub fs_path: String,
    /// Problem source as authored, kept for export.
    pub markdown: String,
    pub problem: Problem,
    pub repl: Option<AttachedRepl>,
}

/// A REPL config referenced from a free-response answer shebang.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachedRepl {
    /// Shebang path, relative to the problem file's directory.
    pub path: String,
    pub config: ReplConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditorBlock {
    pub url_name: String,
    pub display_name: String,
    pub fs_path: String,
    pub repl: ReplConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedBlock {
    pub message: String,
}

// ---------------------------------------------------------------------------
// Problems
// ---------------------------------------------------------------------------

/// A parsed assessment problem.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Problem {
    pub label: String,
    pub demand_hint: Option<String>,
    pub kind: ProblemKind,
}

/// Response type of a problem.
#[derive(Debug, Clone, PartialEq)]
pub enum ProblemKind {
    SingleChoice(Vec<Choice>),
    MultiChoice(Vec<Choice>),
    FreeResponse { answer: String },
    /// A response element this tool does not understand.
    Unsupported(String),
}

impl Default for ProblemKind {
    fn default() -> Self {
        ProblemKind::Unsupported(String::new())
    }
}

/// One answer option of a choice problem.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Choice {
    /// Markdown text.
    pub text: String,
    pub explanation: Option<String>,
    pub correct: bool,
}

// ---------------------------------------------------------------------------
// Traversal helpers
// ---------------------------------------------------------------------------

/// Entity counts for a resolved course.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CourseStats {
    pub chapters: usize,
    pub sequentials: usize,
    pub verticals: usize,
    pub blocks: usize,
}

impl Course {
    /// Iterate every vertical in tree order.
    pub fn verticals(&self) -> impl Iterator<Item = &Vertical> {
        self.chapters
            .iter()
            .flat_map(|c| c.sequentials.iter())
            .flat_map(|s| s.verticals.iter())
    }

    /// Mutable variant of [`Course::verticals`].
    pub fn verticals_mut(&mut self) -> impl Iterator<Item = &mut Vertical> {
        self.chapters
            .iter_mut()
            .flat_map(|c| c.sequentials.iter_mut())
            .flat_map(|s| s.verticals.iter_mut())
    }

    pub fn stats(&self) -> CourseStats {
        let sequentials = self.chapters.iter().map(|c| c.sequentials.len()).sum();
        let (verticals, blocks) = self
            .verticals()
            .fold((0, 0), |(v, b), vert| (v + 1, b + vert.blocks.len()));
        CourseStats {
            chapters: self.chapters.len(),
            sequentials,
            verticals,
            blocks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn narrative(name: &str) -> Block {
        Block::Narrative(NarrativeBlock {
            url_name: name.into(),
            display_name: name.into(),
            fs_path: format!("00_A/00_B/00_C/{name}.md"),
            markdown: "# Hi".into(),
        })
    }

    #[test]
    fn final_exam_routing() {
        let mut seq = Sequential {
            graded: true,
            format: "Final Exam - Midterm".into(),
            ..Default::default()
        };
        assert!(seq.is_final_exam());
        seq.graded = false;
        assert!(!seq.is_final_exam());
        seq.graded = true;
        seq.format = "Homework".into();
        assert!(!seq.is_final_exam());
    }

    #[test]
    fn stats_and_failures() {
        let course = Course {
            meta: CourseMeta::default(),
            chapters: vec![Chapter {
                sequentials: vec![Sequential {
                    verticals: vec![
                        Vertical {
                            blocks: vec![narrative("a"), narrative("b")],
                            ..Default::default()
                        },
                        Vertical {
                            blocks: vec![Block::Failed(FailedBlock {
                                message: "boom".into(),
                            })],
                            ..Default::default()
                        },
                    ],
                    ..Default::default()
                }],
                ..Default::default()
            }],
        };
        let stats = course.stats();
        assert_eq!(stats.chapters, 1);
        assert_eq!(stats.sequentials, 1);
        assert_eq!(stats.verticals, 2);
        assert_eq!(stats.blocks, 3);
        let failures: Vec<_> = course.verticals().filter_map(|v| v.failure()).collect();
        assert_eq!(failures, vec!["boom"]);
    }

    #[test]
    fn course_meta_accepts_numeric_skill_level_and_keeps_extra_keys() {
        let yaml = "url_name: intro\ndisplay_name: Intro\nskill_level: 2\nlicense: cc-by\n";
        let meta: CourseMeta = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(meta.skill_level, "2");
        assert!(meta.extra.contains_key("license"));

        let out = serde_yaml::to_string(&meta).expect("serialize");
        assert!(out.contains("license: cc-by"));
    }
}
