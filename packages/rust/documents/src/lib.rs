//! Denormalization of a resolved course into storage documents.
//!
//! [`denormalize`] turns a [`courseforge_shared::Course`] into a
//! [`DocumentSet`]: one course document with embedded units, sections and
//! cards, plus the exams, questions, versioned contents and search
//! documents that reference it.

pub mod denormalize;
pub mod embed;
pub mod models;

pub use denormalize::{
    ANSWER_SEQUENCE_STEP, DEFAULT_GRADING_STRATEGY, DenormalizeOptions, denormalize, exam_minutes,
    github_edit_url,
};
pub use embed::{EditorEmbed, workspace_json};
pub use models::{
    AnswerChoice, Card, CodeQuestionData, CourseDoc, CourseItemRef, DocKind, DocRef,
    DocumentCounts, DocumentSet, Exam, IntlString, IntlStringWrapper, Question, QuestionData,
    QuestionType, SearchDoc, Section, Unit, VersionedContent,
};
