//! Storage documents produced by the denormalizer.
//!
//! Field names follow the document-store schema the learning platform
//! reads, which is why several wrappers use capitalised keys (`Units`,
//! `Sections`, `Cards`) and ids serialize as `_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use courseforge_shared::InstructorTimekit;

// ---------------------------------------------------------------------------
// Localised strings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntlString {
    pub content: String,
    pub is_default: bool,
    pub locale: String,
}

/// A string with one default translation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntlStringWrapper {
    #[serde(rename = "intlString")]
    pub strings: Vec<IntlString>,
}

impl IntlStringWrapper {
    pub fn new(content: impl Into<String>, locale: &str) -> Self {
        Self {
            strings: vec![IntlString {
                content: content.into(),
                is_default: true,
                locale: locale.to_string(),
            }],
        }
    }

    /// The default translation's text.
    pub fn text(&self) -> &str {
        self.strings
            .iter()
            .find(|s| s.is_default)
            .or_else(|| self.strings.first())
            .map(|s| s.content.as_str())
            .unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Course tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseDoc {
    #[serde(rename = "_id")]
    pub id: String,
    pub is_organization_only: bool,
    pub title: IntlStringWrapper,
    pub headline: IntlStringWrapper,
    pub description: IntlStringWrapper,
    pub info_md: IntlStringWrapper,
    pub subscription_level: u32,
    pub view_count: u64,
    pub enrolled_count: u64,
    pub skill_level: i64,
    pub est_minutes: i64,
    pub primary_topic: String,
    pub units: UnitsWrapper,
    pub cover_url: String,
    pub logo_url: String,
    pub is_published: bool,
    pub verified_cert_cost: f64,
    pub organization_ids: Vec<String>,
    pub topics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor_timekit: Option<InstructorTimekit>,
    pub repo_url: String,
    pub weight: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub content_updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitsWrapper {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "Units")]
    pub units: Vec<Unit>,
}

/// A chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: IntlStringWrapper,
    pub headline: IntlStringWrapper,
    pub index: usize,
    pub sections: SectionsWrapper,
    #[serde(rename = "final_exams")]
    pub final_exam_ids: Vec<String>,
    pub final_exam_weight_pct: f64,
    pub attempts_allowed_per_day: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionsWrapper {
    #[serde(rename = "Sections")]
    pub sections: Vec<Section>,
}

/// A sequential that is not a final exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: IntlStringWrapper,
    pub headline: IntlStringWrapper,
    pub index: usize,
    pub cards: CardsWrapper,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardsWrapper {
    #[serde(rename = "Cards")]
    pub cards: Vec<Card>,
}

/// A vertical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: IntlStringWrapper,
    pub headline: IntlStringWrapper,
    pub index: usize,
    pub content_id: String,
    pub question_ids: Vec<String>,
    pub course_item_ref: CourseItemRef,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub github_edit_url: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ancestor chain of a card or question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseItemRef {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub course_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub unit_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub section_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub card_id: String,
}

// ---------------------------------------------------------------------------
// Versioned content
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedContent {
    #[serde(rename = "_id")]
    pub id: String,
    pub latest_version: u32,
    pub contents: Vec<Content>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(rename = "_id")]
    pub id: String,
    pub version: u32,
    pub content: IntlStringWrapper,
}

// ---------------------------------------------------------------------------
// Questions and exams
// ---------------------------------------------------------------------------

/// Question type tags understood by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
    /// Multiple choice, single answer.
    #[serde(rename = "MCSA")]
    Mcsa,
    /// Multiple choice, multiple answers.
    #[serde(rename = "MCMA")]
    Mcma,
    /// Write-code question.
    #[serde(rename = "WSCQ")]
    Wscq,
}

impl QuestionType {
    /// Estimated answering time.
    pub fn est_time_secs(self) -> u32 {
        match self {
            QuestionType::Mcsa | QuestionType::Mcma => 60,
            QuestionType::Wscq => 5 * 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub question_type: QuestionType,
    pub question_text: IntlStringWrapper,
    pub data: QuestionData,
    pub points: f64,
    pub compl_level: u32,
    pub est_time_sec: u32,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<IntlStringWrapper>,
    pub doc_ref: DocRef,
    pub exam_only: bool,
    pub course_item_ref: CourseItemRef,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestionData {
    Choices(Vec<AnswerChoice>),
    Code(Box<CodeQuestionData>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerChoice {
    #[serde(rename = "_id")]
    pub id: String,
    pub seq: u32,
    pub text: IntlStringWrapper,
    pub is_answer: bool,
    pub explanation: IntlStringWrapper,
}

/// Payload of a write-code question; the trees and tests are JSON strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeQuestionData {
    #[serde(rename = "_id")]
    pub id: String,
    pub api_version: u32,
    pub environment: String,
    pub src: String,
    pub tmpl: String,
    pub test: String,
    pub grading_strategy: String,
    pub grading_tests: String,
    pub explanation: IntlStringWrapper,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocRef {
    #[serde(rename = "EmbeddedDocRef")]
    pub embedded_doc_ref: EmbeddedDocRefWrapper,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedDocRefWrapper {
    #[serde(rename = "EmbeddedDocRefs")]
    pub refs: Vec<EmbeddedDocRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedDocRef {
    pub doc_id: String,
    pub level: String,
}

impl DocRef {
    /// Build from `(level, id)` pairs, outermost first.
    pub fn chain<'a>(levels: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            embedded_doc_ref: EmbeddedDocRefWrapper {
                refs: levels
                    .into_iter()
                    .map(|(level, id)| EmbeddedDocRef {
                        doc_id: id.to_string(),
                        level: level.to_string(),
                    })
                    .collect(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exam {
    #[serde(rename = "_id")]
    pub id: String,
    pub question_count: usize,
    pub creator_id: String,
    pub question_ids: Vec<String>,
    pub use_ide_test_mode: bool,
    pub tags: Vec<String>,
    /// Minutes.
    pub time_limit: i64,
    /// Minutes.
    pub est_time: i64,
    pub pass_mark_pct: f64,
    pub random_order: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Kind of entity a search document describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocKind {
    Course,
    Unit,
    Section,
    Card,
}

impl DocKind {
    /// Prefix used in global identifiers (`Card:<id>`).
    pub fn global_prefix(self) -> &'static str {
        match self {
            DocKind::Course => "Course",
            DocKind::Unit => "Unit",
            DocKind::Section => "Section",
            DocKind::Card => "Card",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocKind::Course => "course",
            DocKind::Unit => "unit",
            DocKind::Section => "section",
            DocKind::Card => "card",
        }
    }
}

/// A flattened search-index document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDoc {
    /// Global identifier; the index key.
    pub id: String,
    pub doc_type: DocKind,
    pub title: String,
    pub headline: String,
    #[serde(default)]
    pub text_content: String,
    #[serde(default)]
    pub code_content: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub course_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub unit_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub section_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub card_id: String,
}

// ---------------------------------------------------------------------------
// Document set
// ---------------------------------------------------------------------------

/// Everything one course denormalizes to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSet {
    pub course: CourseDoc,
    pub exams: Vec<Exam>,
    pub questions: Vec<Question>,
    pub versioned_contents: Vec<VersionedContent>,
    pub search_docs: Vec<SearchDoc>,
}

/// Document counts, for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DocumentCounts {
    pub units: usize,
    pub sections: usize,
    pub cards: usize,
    pub exams: usize,
    pub questions: usize,
    pub versioned_contents: usize,
    pub search_docs: usize,
}

impl DocumentSet {
    pub fn counts(&self) -> DocumentCounts {
        let units = &self.course.units.units;
        let sections = units.iter().map(|u| u.sections.sections.len()).sum();
        let cards = units
            .iter()
            .flat_map(|u| &u.sections.sections)
            .map(|s| s.cards.cards.len())
            .sum();
        DocumentCounts {
            units: units.len(),
            sections,
            cards,
            exams: self.exams.len(),
            questions: self.questions.len(),
            versioned_contents: self.versioned_contents.len(),
            search_docs: self.search_docs.len(),
        }
    }
}
